//! Shared mutable context threaded through every FSM handler.
//!
//! `SessionContext` is the single struct that state handlers read from and
//! write to.  It holds the active mapping table, the identifier being
//! dispatched, the decision and outbound request for the current cycle,
//! and the transport's answer once it arrives.  The session service fills
//! in the I/O results; handlers only react to them.

use crate::config::{DispatchConfig, DispatchMode};
use crate::dispatch::notification::NotificationRequest;
use crate::dispatch::resolver::DispatchDecision;
use crate::dispatch::table::MappingTable;
use crate::dispatch::tag::TagId;
use crate::error::{NotificationError, TableError};

/// The shared context passed to every state handler function.
pub struct SessionContext {
    // -- Timing --
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,

    // -- Configuration --
    pub config: DispatchConfig,

    // -- Table --
    /// Active mapping table.  Replaced wholesale on refresh.
    pub table: Option<MappingTable>,
    /// Failed acquisition attempts since loading began.
    pub load_attempts: u32,
    pub load_error: Option<TableError>,

    // -- Current cycle --
    /// Monotonic cycle number; bumped each time resolution starts.
    pub cycle: u32,
    /// Identifier being dispatched (`None` in positional mode).
    pub scanned: Option<TagId>,
    pub decision: Option<DispatchDecision>,
    /// Request built on entering `Notifying`, taken by the session.
    pub outbound: Option<NotificationRequest>,
    /// Transport outcome for the current cycle, written by the session.
    pub notify_result: Option<Result<u16, NotificationError>>,
    /// Outcome of the most recently finished cycle.
    pub last_notify: Option<Result<u16, NotificationError>>,
}

impl SessionContext {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            ticks_in_state: 0,
            config,
            table: None,
            load_attempts: 0,
            load_error: None,
            cycle: 0,
            scanned: None,
            decision: None,
            outbound: None,
            notify_result: None,
            last_notify: None,
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.config.mode
    }

    pub fn record_load_failure(&mut self, error: TableError) {
        self.load_attempts += 1;
        self.load_error = Some(error);
    }

    pub fn load_exhausted(&self) -> bool {
        self.load_attempts >= self.config.table_max_attempts
    }

    /// Drop the in-flight parts of the previous cycle.  Its decision and
    /// outcome stay readable until the next resolution overwrites them.
    pub fn clear_cycle(&mut self) {
        self.scanned = None;
        self.outbound = None;
        self.notify_result = None;
    }
}
