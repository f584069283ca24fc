//! Session gateway: owns the one controller link and serializes access.
//!
//! Every low-level call takes the lock for its own duration only; a
//! multi-step sequence (the commit's read-modify-write-pulse) interleaves
//! with poll reads at step granularity, never byte granularity. Any I/O
//! failure against an established session drops the link immediately
//! (fail-fast, no automatic reconnect) and publishes `Disconnected`.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::adapters::driver::{ControllerLink, DriverError, SessionDriver};
use crate::core::model::{ControllerProfile, SessionState};
use crate::error::{ConnectError, ConnectionError, InputError, IoError};

type Link = Option<Box<dyn ControllerLink>>;

pub struct SessionGateway {
    driver: Arc<dyn SessionDriver>,
    link: Mutex<Link>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionGateway {
    pub fn new(driver: Arc<dyn SessionDriver>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            driver,
            link: Mutex::new(None),
            state_tx,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Connection-state notifications for the presentation layer.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Establish the session. An empty address is rejected before any I/O;
    /// a transport failure leaves the state `Disconnected`.
    pub async fn connect(&self, profile: &ControllerProfile) -> Result<(), ConnectError> {
        if profile.address.trim().is_empty() {
            return Err(InputError::EmptyAddress.into());
        }

        let mut guard = self.link.lock().await;
        if guard.is_some() {
            debug!("connect requested while already connected; ignored");
            return Ok(());
        }

        let link = self
            .driver
            .connect(profile)
            .await
            .map_err(ConnectionError)?;
        *guard = Some(link);
        drop(guard);

        self.state_tx.send_replace(SessionState::Connected);
        info!(address = %profile.address, port = profile.port, "controller session established");
        Ok(())
    }

    /// Tear the session down. Idempotent: disconnecting while already
    /// disconnected still re-publishes `Disconnected` so dependent status
    /// displays reset.
    pub async fn disconnect(&self) {
        let mut guard = self.link.lock().await;
        if guard.take().is_some() {
            info!("controller session closed");
        }
        drop(guard);
        self.state_tx.send_replace(SessionState::Disconnected);
    }

    pub async fn read_block(&self, block: u16, offset: u16, len: u16) -> Result<Vec<u8>, IoError> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(IoError::NotConnected)?;
        let result = link.read_block(block, offset, len).await;
        match result {
            Ok(bytes) if bytes.len() == len as usize => Ok(bytes),
            Ok(bytes) => Err(self.fail_fast(
                guard,
                "block read",
                DriverError::Comm {
                    message: format!("short read: expected {len} bytes, got {}", bytes.len()),
                },
            )),
            Err(err) => Err(self.fail_fast(guard, "block read", err)),
        }
    }

    pub async fn write_block(&self, block: u16, offset: u16, bytes: &[u8]) -> Result<(), IoError> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(IoError::NotConnected)?;
        let result = link.write_block(block, offset, bytes).await;
        match result {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail_fast(guard, "block write", err)),
        }
    }

    pub async fn read_bit(&self, byte_base: u16, bit: u8) -> Result<bool, IoError> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(IoError::NotConnected)?;
        let result = link.read_bit(byte_base, bit).await;
        match result {
            Ok(value) => Ok(value),
            Err(err) => Err(self.fail_fast(guard, "bit read", err)),
        }
    }

    pub async fn write_bit(&self, byte_base: u16, bit: u8, value: bool) -> Result<(), IoError> {
        let mut guard = self.link.lock().await;
        let link = guard.as_mut().ok_or(IoError::NotConnected)?;
        let result = link.write_bit(byte_base, bit, value).await;
        match result {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail_fast(guard, "bit write", err)),
        }
    }

    /// Drop the broken session and publish the state change before the error
    /// reaches the caller.
    fn fail_fast(
        &self,
        mut guard: MutexGuard<'_, Link>,
        op: &'static str,
        err: DriverError,
    ) -> IoError {
        guard.take();
        drop(guard);
        self.state_tx.send_replace(SessionState::Disconnected);
        warn!(op, error = %err, "controller i/o failed, session dropped");
        IoError::Driver(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::adapters::driver::MockDriver;

    fn gateway_with(driver: MockDriver) -> SessionGateway {
        SessionGateway::new(Arc::new(driver))
    }

    #[tokio::test]
    async fn empty_address_is_an_input_error_and_state_stays_down() {
        let gateway = gateway_with(MockDriver::new());
        let profile = ControllerProfile {
            address: "  ".to_string(),
            ..ControllerProfile::default()
        };

        let err = gateway.connect(&profile).await.unwrap_err();
        assert_eq!(err, ConnectError::Input(InputError::EmptyAddress));
        assert_eq!(gateway.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn connect_publishes_connected() {
        let gateway = gateway_with(MockDriver::new());
        let mut state_rx = gateway.subscribe_state();

        gateway.connect(&ControllerProfile::default()).await.unwrap();

        assert_eq!(gateway.state(), SessionState::Connected);
        state_rx.changed().await.unwrap();
        assert_eq!(*state_rx.borrow(), SessionState::Connected);
    }

    #[tokio::test]
    async fn failed_connect_surfaces_connection_error() {
        let driver = MockDriver::new();
        driver.state().lock().fail_connects = true;
        let gateway = gateway_with(driver);

        let err = gateway.connect(&ControllerProfile::default()).await.unwrap_err();
        assert!(matches!(err, ConnectError::Connection(_)));
        assert_eq!(gateway.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_republishes() {
        let gateway = gateway_with(MockDriver::new());
        let mut state_rx = gateway.subscribe_state();

        gateway.disconnect().await;
        assert_eq!(gateway.state(), SessionState::Disconnected);
        // A no-op disconnect still notifies, so displays reset.
        state_rx.changed().await.unwrap();
        assert_eq!(*state_rx.borrow(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn io_failure_drops_the_session() {
        let driver = MockDriver::new();
        let state = driver.state();
        let gateway = gateway_with(driver);
        gateway.connect(&ControllerProfile::default()).await.unwrap();

        state.lock().fail_after = Some(0);
        let err = gateway.read_block(54, 0, 2).await.unwrap_err();
        assert!(matches!(err, IoError::Driver(_)));
        assert_eq!(gateway.state(), SessionState::Disconnected);

        // The session is gone; later calls see NotConnected without I/O.
        state.lock().fail_after = None;
        let err = gateway.read_block(54, 0, 2).await.unwrap_err();
        assert_eq!(err, IoError::NotConnected);
    }

    #[tokio::test]
    async fn reads_when_disconnected_touch_no_io() {
        let driver = MockDriver::new();
        let state = driver.state();
        let gateway = gateway_with(driver);

        let err = gateway.read_bit(150, 0).await.unwrap_err();
        assert_eq!(err, IoError::NotConnected);
        assert_eq!(state.lock().ops, 0);
    }
}
