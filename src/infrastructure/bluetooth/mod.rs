//! Bluetooth Module
//!
//! Everything needed to drive a pair of G1 units over BLE UART.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     GlassesService                      │
//! │   (public API: text, voice, translation, settings)      │
//! └────────────┬────────────────────────────────────────────┘
//!              │
//!              ▼
//! ┌─────────────────────────┐     ┌───────────────────────┐
//! │   DualUnitCoordinator   │     │  SessionStateMachine  │
//! │ - fan-out, ack pair     │     │ - AI / voice / trans- │
//! │ - retries, heartbeat    │     │   lation axes         │
//! └──────┬───────────┬──────┘     └───────────────────────┘
//!        │           │
//!        ▼           ▼
//! ┌────────────┐ ┌────────────┐   ┌──────────┐ ┌─────────┐
//! │LinkSession │ │LinkSession │   │ Protocol │ │  Pager  │
//! │   (left)   │ │  (right)   │   │ - frames │ │ - wrap  │
//! └──────┬─────┘ └──────┬─────┘   │ - parsing│ │ - pages │
//!        │              │         └──────────┘ └─────────┘
//!        ▼              ▼
//!    UnitTransport (per peripheral, injected)
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Wire frame encoding and notification parsing
//! - [`transport`] - The per-peripheral transport abstraction
//! - [`discovery`] - Peripheral name classification and pair assembly
//! - [`session`] - Per-unit connection lifecycle and init handshake
//! - [`coordinator`] - Dual-unit fan-out, ack aggregation, retries, heartbeat
//! - [`pager`] - Line wrapping, paging and wire chunking for text display
//! - [`state`] - Pure session state machine for device-origin orders
//! - [`service`] - Main service facade

pub mod coordinator;
pub mod discovery;
pub mod pager;
pub mod protocol;
pub mod service;
pub mod session;
pub mod state;
pub mod transport;

#[cfg(test)]
pub(crate) mod testkit;

// Re-export the facade for convenience
pub use service::{GlassesService, ServiceConfig};
