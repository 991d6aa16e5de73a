//! Outbound application events.
//!
//! The [`DispatchSession`](super::service::DispatchSession) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Every
//! reportable outcome (table loaded, tag not found, notification failed)
//! surfaces here; nothing is swallowed.

use crate::dispatch::tag::TagId;
use crate::error::{NotificationError, TableError};
use crate::fsm::StateId;

/// Why an incoming presentation did not start a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Positional deployments do not take scans.
    PositionalMode,
    /// The session is not accepting scans (loading, or terminal).
    NotReady(StateId),
    /// A newer scan replaced this one while a notification was in flight.
    Superseded,
}

/// Structured events emitted by the dispatch session.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The session has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A mapping table became active.
    TableLoaded { entries: usize, source: &'static str },

    /// One acquisition attempt failed; more may follow.
    TableLoadFailed { attempt: u32, error: TableError },

    /// A periodic refresh replaced the active table.
    TableRefreshed { entries: usize },

    /// A periodic refresh failed; the previous table stays active.
    TableRefreshFailed(TableError),

    /// No table could be obtained; the session will not dispatch.
    Unrecoverable { attempts: u32 },

    /// A presentation was dropped or replaced.
    ScanIgnored { tag: TagId, reason: IgnoreReason },

    /// A row was found and its notification handed to the transport.
    Dispatching {
        cycle: u32,
        tag: Option<TagId>,
        uri: String,
        description: Option<String>,
    },

    /// Identifier-matched lookup missed.
    NotFound(TagId),

    /// Positional lookup on a table with no rows.
    EmptyTable,

    /// The gateway acknowledged the notification.
    Notified { cycle: u32, status: u16 },

    /// The notification failed or timed out.
    NotificationFailed { cycle: u32, error: NotificationError },
}
