//! Engine facade: wires the gateway, the poller and the commit sequencer
//! together and exposes the channels a presentation layer binds to.
//!
//! Delivery is one channel per data kind — status samples, commit outcomes,
//! connection state — always ordered, never by direct cross-thread mutation
//! of presentation state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::warn;
use uuid::Uuid;

use crate::adapters::driver::SessionDriver;
use crate::core::codec::{self, RegisterImage};
use crate::core::model::{ControllerProfile, SessionState, StatusSample, TagValue};
use crate::core::schema::RegisterSchema;
use crate::error::{CommitError, ConnectError, InputError, IoError};
use crate::usecase::commit::{self, RegisterEdit};
use crate::usecase::gateway::SessionGateway;
use crate::usecase::poller::StatusPoller;

/// Outcome of one submitted commit, delivered on the outcome channel.
#[derive(Debug)]
pub struct CommitOutcome {
    pub id: Uuid,
    pub result: Result<(), CommitError>,
}

/// The presentation layer's inputs: everything it renders arrives here.
pub struct EngineChannels {
    pub status_rx: mpsc::Receiver<StatusSample>,
    pub outcome_rx: mpsc::Receiver<CommitOutcome>,
    pub state_rx: watch::Receiver<SessionState>,
}

pub struct SignEngine {
    gateway: Arc<SessionGateway>,
    schema: Arc<RegisterSchema>,
    profile: ControllerProfile,
    poller: StatusPoller,
    commit_lock: Arc<Mutex<()>>,
    outcome_tx: mpsc::Sender<CommitOutcome>,
}

impl SignEngine {
    /// Build the engine and start the background poller. Must be called
    /// inside a tokio runtime.
    pub fn start(
        driver: Arc<dyn SessionDriver>,
        schema: RegisterSchema,
        profile: ControllerProfile,
    ) -> (Self, EngineChannels) {
        debug_assert_eq!(schema.validate(), Ok(()), "register schema is malformed");

        let gateway = Arc::new(SessionGateway::new(driver));
        let schema = Arc::new(schema);
        let state_rx = gateway.subscribe_state();
        let (poller, status_rx) = StatusPoller::spawn(
            Arc::clone(&gateway),
            Arc::clone(&schema),
            Duration::from_millis(profile.poll_interval_ms),
        );
        let (outcome_tx, outcome_rx) = mpsc::channel(4);

        let engine = Self {
            gateway,
            schema: Arc::clone(&schema),
            profile,
            poller,
            commit_lock: Arc::new(Mutex::new(())),
            outcome_tx,
        };
        (
            engine,
            EngineChannels {
                status_rx,
                outcome_rx,
                state_rx,
            },
        )
    }

    pub fn schema(&self) -> &RegisterSchema {
        &self.schema
    }

    pub fn session_state(&self) -> SessionState {
        self.gateway.state()
    }

    pub async fn connect(&self) -> Result<(), ConnectError> {
        self.gateway.connect(&self.profile).await
    }

    pub async fn disconnect(&self) {
        self.gateway.disconnect().await;
    }

    /// Most recent successful status sample, for pull-style rendering.
    pub fn latest_sample(&self) -> Option<StatusSample> {
        self.poller.latest()
    }

    /// Encode per-tag display selections into register edits. The first bad
    /// selection aborts the whole batch; nothing is partially encoded.
    pub fn encode_selections(
        &self,
        selections: &[(String, String)],
    ) -> Result<Vec<RegisterEdit>, InputError> {
        selections
            .iter()
            .map(|(label, display)| {
                let tag = self.schema.tag(label).ok_or_else(|| InputError::UnknownTag {
                    label: label.clone(),
                })?;
                let value = codec::encode(tag.domain, display)?;
                Ok(RegisterEdit {
                    offset: tag.offset,
                    value,
                })
            })
            .collect()
    }

    /// Queue the write-and-pulse sequence on a short-lived worker task.
    ///
    /// Commits are serialized: a second submission waits for the first to
    /// finish, even if the presentation layer forgets to disable its
    /// trigger. The outcome arrives on the outcome channel under the
    /// returned id, in submission order.
    pub fn submit_commit(&self, edits: Vec<RegisterEdit>) -> Uuid {
        let id = Uuid::new_v4();
        let gateway = Arc::clone(&self.gateway);
        let schema = Arc::clone(&self.schema);
        let dwell = Duration::from_millis(self.profile.pulse_dwell_ms);
        let lock = Arc::clone(&self.commit_lock);
        let outcome_tx = self.outcome_tx.clone();

        tokio::spawn(async move {
            let _guard = lock.lock().await;
            let result = commit::commit(&gateway, &schema, dwell, &edits).await;
            if let Err(err) = &result {
                warn!(%id, error = %err, "commit failed");
            }
            if outcome_tx.send(CommitOutcome { id, result }).await.is_err() {
                warn!(%id, "outcome receiver dropped");
            }
        });

        id
    }

    /// Read the configuration block once and decode every tag for display.
    pub async fn reload(&self) -> Result<Vec<TagValue>, IoError> {
        let bytes = self
            .gateway
            .read_block(self.schema.block, self.schema.start, self.schema.size)
            .await?;
        let image = RegisterImage::new(bytes);
        Ok(self
            .schema
            .tags
            .iter()
            .map(|tag| TagValue {
                label: tag.label.clone(),
                display: codec::decode(tag.domain, image.get_i16(tag.offset)),
            })
            .collect())
    }

    /// Orderly shutdown: stop the poller first, wait out any in-flight
    /// commit (a half-finished pulse is worse than a slow exit), then drop
    /// the session.
    pub async fn shutdown(self) {
        if !self.poller.stop().await {
            warn!("status poller did not stop within the grace period");
        }
        let _guard = self.commit_lock.lock().await;
        self.gateway.disconnect().await;
    }
}
