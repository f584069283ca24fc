//! Background status poller.
//!
//! One recurring task for the lifetime of the engine: while the session is
//! connected, each cycle reads the handshake flag and every auxiliary status
//! word, then delivers one immutable [`StatusSample`] to the presentation
//! layer over an ordered channel. A failed read abandons the rest of the
//! cycle — the gateway has already dropped the session — and the next cycle
//! skips all reads while disconnected.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::codec::RegisterImage;
use crate::core::model::{AuxValue, SessionState, StatusSample};
use crate::core::schema::RegisterSchema;
use crate::error::IoError;
use crate::usecase::gateway::SessionGateway;

pub struct StatusPoller {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
    latest: Arc<Mutex<Option<StatusSample>>>,
}

impl StatusPoller {
    /// Spawn the polling loop. Samples arrive on the returned channel in
    /// cycle order; failed cycles deliver nothing.
    pub fn spawn(
        gateway: Arc<SessionGateway>,
        schema: Arc<RegisterSchema>,
        interval: Duration,
    ) -> (Self, mpsc::Receiver<StatusSample>) {
        let (sample_tx, sample_rx) = mpsc::channel(16);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let latest = Arc::new(Mutex::new(None));
        let latest_for_task = Arc::clone(&latest);

        let join = tokio::spawn(async move {
            loop {
                if *stop_rx.borrow() {
                    break;
                }

                if gateway.state() == SessionState::Connected {
                    match poll_once(&gateway, &schema).await {
                        Ok(sample) => {
                            *latest_for_task.lock() = Some(sample.clone());
                            if sample_tx.send(sample).await.is_err() {
                                debug!("status receiver dropped; caching samples only");
                            }
                        }
                        Err(err) => {
                            warn!(error = %err, "poll cycle aborted");
                            gateway.disconnect().await;
                        }
                    }
                } else {
                    // Status displays show "unknown" while disconnected.
                    latest_for_task.lock().take();
                }

                tokio::select! {
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        (
            Self {
                stop_tx,
                join,
                latest,
            },
            sample_rx,
        )
    }

    /// Most recent successful sample, if any since the last disconnect.
    pub fn latest(&self) -> Option<StatusSample> {
        self.latest.lock().clone()
    }

    /// Signal the loop to stop and wait for it to exit (one-second grace).
    pub async fn stop(self) -> bool {
        let _ = self.stop_tx.send(true);
        tokio::time::timeout(Duration::from_secs(1), self.join)
            .await
            .map(|join| join.is_ok())
            .unwrap_or(false)
    }
}

async fn poll_once(
    gateway: &SessionGateway,
    schema: &RegisterSchema,
) -> Result<StatusSample, IoError> {
    let handshake = gateway
        .read_bit(schema.handshake.byte_base, schema.handshake.bit)
        .await?;

    let mut aux = Vec::with_capacity(schema.aux_reads.len());
    for read in &schema.aux_reads {
        let bytes = gateway.read_block(read.block, read.offset, 2).await?;
        let value = RegisterImage::new(bytes).get_i16(0);
        aux.push(AuxValue {
            label: read.label.clone(),
            value,
        });
    }

    Ok(StatusSample {
        handshake,
        aux,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::adapters::driver::MockDriver;
    use crate::core::model::ControllerProfile;

    const POLL: Duration = Duration::from_millis(500);

    fn engine_parts(driver: MockDriver) -> (Arc<SessionGateway>, Arc<RegisterSchema>) {
        (
            Arc::new(SessionGateway::new(Arc::new(driver))),
            Arc::new(RegisterSchema::sign_farm()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_samples_in_schema_order_while_connected() {
        let driver = MockDriver::new()
            .with_bit(150, 0, true)
            .with_block(5, {
                // Panel 5 status word (offset 18) = 321.
                let mut block = vec![0; 20];
                block[18..20].copy_from_slice(&321i16.to_be_bytes());
                block
            });
        let (gateway, schema) = engine_parts(driver);
        gateway.connect(&ControllerProfile::default()).await.unwrap();

        let (poller, mut sample_rx) = StatusPoller::spawn(Arc::clone(&gateway), schema, POLL);

        let sample = sample_rx.recv().await.unwrap();
        assert!(sample.handshake);
        assert_eq!(sample.aux.len(), 23);
        for (i, aux) in sample.aux.iter().enumerate() {
            assert_eq!(aux.label, format!("P{}", i + 1));
        }
        assert_eq!(sample.aux[4].value, 321);
        assert_eq!(sample.aux[0].value, 0);

        assert_eq!(poller.latest().unwrap().aux[4].value, 321);
        assert!(poller.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cycle_delivers_nothing_and_disconnects() {
        let driver = MockDriver::new();
        let state = driver.state();
        let (gateway, schema) = engine_parts(driver);
        gateway.connect(&ControllerProfile::default()).await.unwrap();

        // Fail the read of panel 7's status block, mid-cycle.
        state.lock().fail_reads_of_block = Some(7);

        let (poller, mut sample_rx) = StatusPoller::spawn(Arc::clone(&gateway), schema, POLL);

        // Give the first cycle time to run and abort.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(gateway.state(), SessionState::Disconnected);
        assert!(poller.latest().is_none());

        let ops_after_abort = state.lock().ops;
        // 1 handshake read + 6 good aux reads + the failing read of block 7.
        assert_eq!(ops_after_abort, 8);

        // Later cycles perform no reads while disconnected.
        tokio::time::sleep(POLL * 4).await;
        assert_eq!(state.lock().ops, ops_after_abort);

        assert!(sample_rx.try_recv().is_err());
        assert!(poller.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_resumes_polling() {
        let driver = MockDriver::new();
        let state = driver.state();
        let (gateway, schema) = engine_parts(driver);
        gateway.connect(&ControllerProfile::default()).await.unwrap();

        let (poller, mut sample_rx) = StatusPoller::spawn(Arc::clone(&gateway), schema, POLL);
        assert!(sample_rx.recv().await.is_some());

        let served = state.lock().ops;
        state.lock().fail_after = Some(served);
        tokio::time::sleep(POLL * 2).await;
        assert_eq!(gateway.state(), SessionState::Disconnected);

        // Recovery is a fresh user-initiated connect.
        state.lock().fail_after = None;
        gateway.connect(&ControllerProfile::default()).await.unwrap();
        while sample_rx.try_recv().is_ok() {}
        assert!(sample_rx.recv().await.is_some());

        assert!(poller.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_exits_within_grace_period() {
        let (gateway, schema) = engine_parts(MockDriver::new());
        let (poller, _sample_rx) = StatusPoller::spawn(gateway, schema, POLL);

        let started = tokio::time::Instant::now();
        assert!(poller.stop().await);
        assert!(started.elapsed() <= Duration::from_secs(1));
    }
}
