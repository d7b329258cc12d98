//! Error taxonomy for the link engine.
//!
//! Transport-level failures reset the affected session and surface only as
//! the outcome of the in-flight operation. Nothing here is fatal to the
//! process; losing a unit is always a recoverable condition.

use crate::domain::models::UnitRole;
use thiserror::Error;

/// Errors raised by a single unit's link (transport or session layer).
#[derive(Debug, Error)]
pub enum LinkError {
    /// A write was attempted before the session reached `Ready`.
    #[error("{0} unit link is not ready")]
    NotReady(UnitRole),

    /// The underlying transport rejected or lost a write.
    #[error("write to {peripheral} failed: {reason}")]
    WriteFailed { peripheral: String, reason: String },

    /// The peripheral dropped the connection.
    #[error("{0} unit disconnected")]
    Disconnected(UnitRole),

    /// Connecting or service/characteristic discovery failed.
    #[error("connection to {peripheral} failed: {reason}")]
    ConnectFailed { peripheral: String, reason: String },

    /// The init command was sent but no init acknowledgement arrived in time.
    #[error("{0} unit did not acknowledge the init command")]
    InitTimeout(UnitRole),
}

/// Outcome errors for coordinated (dual-unit) operations.
#[derive(Debug, Error)]
pub enum CommandError {
    /// One of the two required peripherals is not connected; the operation
    /// fails fast with no partial send.
    #[error("{0} unit is missing, cannot address both units")]
    UnitMissing(UnitRole),

    /// The required acknowledgement did not arrive within the ack window.
    #[error("acknowledgement timed out")]
    AckTimeout,

    /// A chunk failed all of its configured attempts; the surrounding
    /// multi-page transfer is abandoned.
    #[error("chunk {chunk} failed after {attempts} attempts")]
    ExhaustedRetries { chunk: usize, attempts: u32 },

    /// A single-unit link error bubbled up through the coordinated path.
    #[error(transparent)]
    Link(#[from] LinkError),
}
