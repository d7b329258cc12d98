//! Command/response engine for Even Realities G1 smart glasses.
//!
//! The glasses are two BLE peripherals (a Left and a Right unit) that must
//! be driven as one logical device: most commands are fanned out to both
//! units and succeed only when both acknowledge. This crate owns that whole
//! concern — frame encoding, per-unit session lifecycle, dual-unit
//! coordination with retries, text paging, and the session state machine
//! that reacts to device-origin orders.
//!
//! The entry point is [`GlassesService`]: feed it one transport per unit
//! (anything implementing [`UnitTransport`]), call `connect`, and consume
//! the returned [`GlassesEvent`] stream.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{BatteryReport, GlassesEvent, QuickNote, SessionState, UnitRole};
pub use domain::settings::{LogSettings, Settings, SettingsService};
pub use error::{CommandError, LinkError};
pub use infrastructure::bluetooth::coordinator::CoordinatorConfig;
pub use infrastructure::bluetooth::discovery::{classify_unit_name, PairDiscovery};
pub use infrastructure::bluetooth::protocol::TranslateLanguage;
pub use infrastructure::bluetooth::transport::{
    DiscoveredUnit, TransportEvent, UnitTransport, WriteMode,
};
pub use infrastructure::bluetooth::{GlassesService, ServiceConfig};
pub use infrastructure::logging::{init_logger, LoggingGuard};
