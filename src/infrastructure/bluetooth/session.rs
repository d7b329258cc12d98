//! Link Session
//!
//! Owns the liveness of one unit's channel: the staged connection state
//! machine, the init handshake, and the guarded write path. Acknowledgement
//! semantics live one layer up in the coordinator; this layer only knows
//! whether the channel is usable.

use crate::domain::models::{SessionState, UnitRole};
use crate::error::LinkError;
use crate::infrastructure::bluetooth::protocol::{self, Notification};
use crate::infrastructure::bluetooth::transport::{TransportEvent, UnitTransport, WriteMode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Per-unit session. Cheap to clone; clones share connection state.
///
/// State machine: `Disconnected → Connecting → ServicesDiscovered → Ready`,
/// with any stage dropping back to `Disconnected` on link loss. Re-entering
/// `Ready` always re-runs discovery and the init handshake; characteristic
/// handles cached by the transport from a prior connection are never reused.
#[derive(Clone)]
pub struct LinkSession {
    role: UnitRole,
    transport: Arc<dyn UnitTransport>,
    state: Arc<Mutex<SessionState>>,
}

impl LinkSession {
    pub fn new(role: UnitRole, transport: Arc<dyn UnitTransport>) -> Self {
        Self {
            role,
            transport,
            state: Arc::new(Mutex::new(SessionState::Disconnected)),
        }
    }

    pub fn role(&self) -> UnitRole {
        self.role
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap() = state;
        debug!(role = %self.role, ?state, "session state");
    }

    /// Connect, discover the UART service, run the init handshake, and
    /// declare the session `Ready`.
    ///
    /// Returns the remaining notification stream for the coordinator to
    /// consume. Any failure resets the session to `Disconnected`.
    pub async fn establish(
        &self,
        init_timeout: Duration,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, LinkError> {
        self.set_state(SessionState::Connecting);
        info!(role = %self.role, name = self.transport.peripheral_name(), "connecting");

        let result = self.establish_inner(init_timeout).await;
        match result {
            Ok(rx) => {
                self.set_state(SessionState::Ready);
                info!(role = %self.role, "session ready");
                Ok(rx)
            }
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                self.transport.disconnect().await;
                Err(e)
            }
        }
    }

    async fn establish_inner(
        &self,
        init_timeout: Duration,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>, LinkError> {
        self.transport.connect().await?;
        self.transport.discover_uart().await?;
        let mut rx = self.transport.subscribe().await?;
        self.set_state(SessionState::ServicesDiscovered);

        // Init handshake: the session is not usable until the device
        // acknowledges the init command.
        self.transport
            .write(&protocol::init(), WriteMode::WithResponse)
            .await?;
        self.await_init_ack(&mut rx, init_timeout).await?;
        Ok(rx)
    }

    async fn await_init_ack(
        &self,
        rx: &mut mpsc::UnboundedReceiver<TransportEvent>,
        init_timeout: Duration,
    ) -> Result<(), LinkError> {
        let wait = async {
            while let Some(event) = rx.recv().await {
                match event {
                    TransportEvent::Notification(data) => {
                        match Notification::decode(&data) {
                            Notification::InitAck => return Ok(()),
                            other => {
                                // Anything arriving before the init ack is
                                // not interesting yet.
                                debug!(role = %self.role, ?other, "notification before init ack");
                            }
                        }
                    }
                    TransportEvent::Disconnected => {
                        return Err(LinkError::Disconnected(self.role));
                    }
                }
            }
            Err(LinkError::Disconnected(self.role))
        };

        match tokio::time::timeout(init_timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                warn!(role = %self.role, "init ack timed out");
                Err(LinkError::InitTimeout(self.role))
            }
        }
    }

    /// Write a frame. Requires `Ready`; writing on a session that is not
    /// ready is an error surfaced to the caller, never a silent drop.
    pub async fn write(&self, frame: &[u8], mode: WriteMode) -> Result<(), LinkError> {
        if !self.is_ready() {
            return Err(LinkError::NotReady(self.role));
        }
        self.transport.write(frame, mode).await
    }

    /// Drop back to `Disconnected` and forget the connection. Called on
    /// link loss or write failure; in-flight ack state that depended on
    /// this unit is invalidated by the coordinator.
    pub fn reset(&self) {
        self.set_state(SessionState::Disconnected);
    }
}
