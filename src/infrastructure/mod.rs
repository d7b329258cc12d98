//! Infrastructure Module
//!
//! Side-effectful layers: the BLE link stack and logging setup.

pub mod bluetooth;
pub mod logging;
