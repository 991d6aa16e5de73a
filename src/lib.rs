//! Sonotify firmware library.
//!
//! Maps NFC tag identifiers to media URIs and tells a home-automation
//! gateway to play them.  Exposes the pure-logic modules for integration
//! testing; all ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod fsm;

pub mod adapters;
