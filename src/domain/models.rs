use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Which physical half of the glasses a peripheral is.
///
/// Exactly zero or one peripheral may hold each role at a time; the role is
/// derived from the advertised name and immutable for a connection's
/// lifetime. The units are asymmetric: only the Right unit carries the
/// microphone and the AI trigger touchpad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitRole {
    Left,
    Right,
}

impl UnitRole {
    pub fn opposite(self) -> Self {
        match self {
            UnitRole::Left => UnitRole::Right,
            UnitRole::Right => UnitRole::Left,
        }
    }
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitRole::Left => write!(f, "left"),
            UnitRole::Right => write!(f, "right"),
        }
    }
}

/// Connection lifecycle of a single unit's link session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// UART service and characteristics found; init handshake in flight.
    ServicesDiscovered,
    /// Init acknowledged; the session accepts writes.
    Ready,
}

/// Battery notification decoded from a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReport {
    pub role: UnitRole,
    pub percent: u8,
    pub charging: bool,
    /// Cell voltage in millivolts (wire carries mV/10, little-endian).
    pub millivolts: u16,
}

/// One mirrored quick note. The device exposes four slots; the list is
/// resynchronized wholesale (clear then rewrite) on any mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickNote {
    pub id: u64,
    pub text: String,
    pub created_at: SystemTime,
}

/// Events the engine produces for its consumers (UI, speech-to-text, …).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlassesEvent {
    /// Both units reached `Ready`; the dual session is operational.
    ConnectionReady,
    /// A unit dropped; the dual session is no longer operational.
    ConnectionLost(UnitRole),
    Battery(BatteryReport),
    /// Raw PCM voice chunk from the Right unit, 2-byte header stripped.
    VoiceChunk(Vec<u8>),
    /// AI listening started or stopped (mic state changes, timeouts).
    AiListening(bool),
    WearChanged { worn: bool },
    CaseChanged { open: bool },
    SilentModeChanged { enabled: bool },
    DisplayPower { on: bool },
    /// The device paged through a pending multi-page text delivery.
    PageChanged { current: u8, total: u8 },
}
