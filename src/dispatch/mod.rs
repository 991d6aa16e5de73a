//! Tag-dispatch decision engine: pure, no I/O.
//!
//! ```text
//!  raw bytes ──▶ table::parse ──▶ MappingTable
//!                                      │
//!  TagId (or none) ──────────▶ resolver::resolve ──▶ DispatchDecision
//!                                                         │ Found
//!                                  notification::build ◀──┘
//!                                          │
//!                                          ▼
//!                                 NotificationRequest
//! ```

pub mod notification;
pub mod resolver;
pub mod table;
pub mod tag;
