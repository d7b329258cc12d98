//! Injected transport seam.
//!
//! One [`UnitTransport`] stands in for one physical unit's GATT plumbing:
//! connect, UART service discovery, writes to the TX characteristic and a
//! notification stream from the RX characteristic. The engine never talks
//! to a platform Bluetooth stack directly; a platform binding implements
//! this trait, and tests drive the engine with scripted fakes.

use crate::domain::models::UnitRole;
use crate::error::LinkError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Whether a write asks the peripheral for a link-layer response.
///
/// This is distinct from protocol-level acknowledgement, which arrives as a
/// notification and is the coordinator's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    WithResponse,
    WithoutResponse,
}

/// Something the transport observed on its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A value arrived on the notify characteristic.
    Notification(Vec<u8>),
    /// The link dropped. The session owning this transport resets to
    /// `Disconnected`; cached handles must not be reused afterwards.
    Disconnected,
}

/// One peripheral's serial-like channel.
#[async_trait]
pub trait UnitTransport: Send + Sync {
    /// Advertised peripheral name (used for role classification and logs).
    fn peripheral_name(&self) -> &str;

    /// Establish the link-layer connection.
    async fn connect(&self) -> Result<(), LinkError>;

    /// Discover the UART service and its TX/RX characteristics and enable
    /// notifications. Must be re-run after every reconnect.
    async fn discover_uart(&self) -> Result<(), LinkError>;

    /// Take the event stream. Yields notifications until the connection
    /// drops, then a final [`TransportEvent::Disconnected`].
    async fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<TransportEvent>, LinkError>;

    /// Write one frame to the TX characteristic. Fire-and-forget at this
    /// layer; failures mean the bytes never left the host.
    async fn write(&self, frame: &[u8], mode: WriteMode) -> Result<(), LinkError>;

    /// Tear the connection down.
    async fn disconnect(&self);
}

/// A discovered peripheral together with the role its name advertises.
pub struct DiscoveredUnit {
    pub role: UnitRole,
    pub transport: std::sync::Arc<dyn UnitTransport>,
}

impl std::fmt::Debug for DiscoveredUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveredUnit")
            .field("role", &self.role)
            .field("name", &self.transport.peripheral_name())
            .finish()
    }
}
