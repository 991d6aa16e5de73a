//! Application core: dispatch orchestration, zero I/O.
//!
//! This module contains the session rules for the dispatcher: table
//! loading with retry, scan admission, and the notify cycle.  All
//! interaction with the network, flash and the reader happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
