//! Dispatch session: the hexagonal core.
//!
//! [`DispatchSession`] owns the FSM, the shared context and the scan
//! admission bookkeeping (active tag, pending tag).  It exposes a
//! hardware-agnostic API; all I/O flows through port traits injected at
//! call sites, so the whole session is testable with mock adapters.
//!
//! ```text
//!  TableSource ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                  │     DispatchSession       │
//!  SessionEvent ──▶│  FSM · admission · cycle  │ ──▶ Notifier
//!                  └──────────────────────────┘
//! ```
//!
//! The session is single-threaded: collaborators on other threads talk to
//! it only through [`EventQueue`](crate::events::EventQueue).  No lock is
//! held while a port is called.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::config::{DispatchConfig, DispatchMode};
use crate::dispatch::resolver::DispatchDecision;
use crate::dispatch::table::{self, MappingTable};
use crate::dispatch::tag::TagId;
use crate::error::{NotificationError, TableError};
use crate::events::SessionEvent;
use crate::fsm::context::SessionContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId, Transition};

use super::events::{AppEvent, IgnoreReason};
use super::ports::{EventSink, Notifier, TableSource};

// ───────────────────────────────────────────────────────────────
// DispatchSession
// ───────────────────────────────────────────────────────────────

pub struct DispatchSession {
    fsm: Fsm,
    ctx: SessionContext,
    /// Tag whose presentation started the latest cycle, until removed.
    active_tag: Option<TagId>,
    /// Distinct tag seen while a notification was in flight.  Depth 1,
    /// newest wins.
    pending: Option<PendingScan>,
}

/// A queued presentation and whether its tag is still in the field.
struct PendingScan {
    tag: TagId,
    present: bool,
}

impl DispatchSession {
    /// Construct the session.  Does **not** load the table; call
    /// [`start`](Self::start) next.
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Idle),
            ctx: SessionContext::new(config),
            active_tag: None,
            pending: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load the mapping table and settle into the first stable state.
    ///
    /// Makes up to `table_max_attempts` acquisitions, sleeping
    /// `table_retry_delay_ms` between them.  In positional mode this also
    /// submits the single notification.
    pub fn start(
        &mut self,
        source: &mut impl TableSource,
        notifier: &mut impl Notifier,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) {
        self.fsm.start(&mut self.ctx);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!(
            "DispatchSession starting ({:?} mode, table via {})",
            self.ctx.mode(),
            source.name()
        );

        self.transition_to(StateId::TableLoading, notifier, sink);
        loop {
            match self.load(source) {
                Ok(table) => {
                    sink.emit(&AppEvent::TableLoaded {
                        entries: table.len(),
                        source: source.name(),
                    });
                    self.ctx.table = Some(table);
                }
                Err(error) => {
                    self.ctx.record_load_failure(error);
                    sink.emit(&AppEvent::TableLoadFailed {
                        attempt: self.ctx.load_attempts,
                        error,
                    });
                }
            }
            self.settle(notifier, sink);
            if self.fsm.current_state() != StateId::TableLoading {
                break;
            }
            delay.delay_ms(self.ctx.config.table_retry_delay_ms);
        }
    }

    // ── Event handling ────────────────────────────────────────

    /// Apply one event from the session queue.
    pub fn handle_event(
        &mut self,
        event: SessionEvent,
        notifier: &mut impl Notifier,
        sink: &mut impl EventSink,
    ) {
        match event {
            SessionEvent::Presented(tag) => self.on_presented(tag, notifier, sink),
            SessionEvent::Removed(tag) => {
                if self.active_tag.as_ref() == Some(&tag) {
                    debug!("Tag {} removed", tag);
                    self.active_tag = None;
                }
                if let Some(pending) = self.pending.as_mut().filter(|p| p.tag == tag) {
                    debug!("Queued tag {} removed before its cycle", tag);
                    pending.present = false;
                }
            }
            SessionEvent::NotificationCompleted { cycle, result } => {
                let in_flight = self.fsm.current_state() == StateId::Notifying
                    && cycle == self.ctx.cycle
                    && self.ctx.notify_result.is_none();
                if in_flight {
                    self.ctx.notify_result = Some(result);
                    self.settle(notifier, sink);
                } else {
                    debug!(
                        "Dropping stale completion for cycle {} (current {})",
                        cycle, self.ctx.cycle
                    );
                }
            }
        }
    }

    /// Advance session time by one poll interval.
    pub fn tick(&mut self, notifier: &mut impl Notifier, sink: &mut impl EventSink) {
        if let Some(t) = self.fsm.tick(&mut self.ctx) {
            self.after_transition(t, notifier, sink);
        }
        self.settle(notifier, sink);
    }

    /// Re-acquire the table and swap it in whole.
    ///
    /// Only runs between cycles (`AwaitingScan`) so an in-flight lookup
    /// never sees a half-replaced table.  On failure the previous table
    /// stays active.  Returns `true` when a new table was installed.
    pub fn refresh_table(
        &mut self,
        source: &mut impl TableSource,
        sink: &mut impl EventSink,
    ) -> bool {
        if self.fsm.current_state() != StateId::AwaitingScan {
            debug!("Refresh skipped in {:?}", self.fsm.current_state());
            return false;
        }
        match self.load(source) {
            Ok(table) => {
                sink.emit(&AppEvent::TableRefreshed {
                    entries: table.len(),
                });
                self.ctx.table = Some(table);
                true
            }
            Err(error) => {
                sink.emit(&AppEvent::TableRefreshFailed(error));
                false
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn table(&self) -> Option<&MappingTable> {
        self.ctx.table.as_ref()
    }

    /// Number of the most recent resolution cycle (0 before the first).
    pub fn cycle(&self) -> u32 {
        self.ctx.cycle
    }

    pub fn active_tag(&self) -> Option<&TagId> {
        self.active_tag.as_ref()
    }

    pub fn pending_tag(&self) -> Option<&TagId> {
        self.pending.as_ref().map(|p| &p.tag)
    }

    /// Outcome of the most recently finished notification.
    pub fn last_notification(&self) -> Option<Result<u16, NotificationError>> {
        self.ctx.last_notify
    }

    /// No further scans will be processed.
    pub fn is_finished(&self) -> bool {
        self.fsm.current_state().is_terminal()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.ctx.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn load(&self, source: &mut impl TableSource) -> Result<MappingTable, TableError> {
        let raw = source.acquire()?;
        Ok(table::parse(&raw, self.ctx.mode())?)
    }

    fn on_presented(
        &mut self,
        tag: TagId,
        notifier: &mut impl Notifier,
        sink: &mut impl EventSink,
    ) {
        if self.ctx.mode() == DispatchMode::Positional {
            sink.emit(&AppEvent::ScanIgnored {
                tag,
                reason: IgnoreReason::PositionalMode,
            });
            return;
        }
        if self.active_tag.as_ref() == Some(&tag) {
            debug!("Tag {} still present, coalesced", tag);
            return;
        }

        match self.fsm.current_state() {
            StateId::AwaitingScan => self.begin_cycle(tag, true, notifier, sink),
            StateId::Notifying => {
                if let Some(pending) = self.pending.as_mut().filter(|p| p.tag == tag) {
                    pending.present = true;
                    return;
                }
                debug!("Cycle {} in flight, queueing {}", self.ctx.cycle, tag);
                let queued = PendingScan { tag, present: true };
                if let Some(replaced) = self.pending.replace(queued) {
                    sink.emit(&AppEvent::ScanIgnored {
                        tag: replaced.tag,
                        reason: IgnoreReason::Superseded,
                    });
                }
            }
            other => sink.emit(&AppEvent::ScanIgnored {
                tag,
                reason: IgnoreReason::NotReady(other),
            }),
        }
    }

    /// Start resolving `tag`.  Only a tag still in the field is armed for
    /// coalescing; one already lifted leaves the next tap free.
    fn begin_cycle(
        &mut self,
        tag: TagId,
        present: bool,
        notifier: &mut impl Notifier,
        sink: &mut impl EventSink,
    ) {
        self.active_tag = present.then(|| tag.clone());
        self.ctx.scanned = Some(tag);
        self.transition_to(StateId::Resolving, notifier, sink);
        self.settle(notifier, sink);
    }

    fn transition_to(
        &mut self,
        state: StateId,
        notifier: &mut impl Notifier,
        sink: &mut impl EventSink,
    ) {
        if let Some(t) = self.fsm.force_transition(state, &mut self.ctx) {
            self.after_transition(t, notifier, sink);
        }
    }

    /// Step the FSM until it rests, then start a queued cycle if one is
    /// waiting.
    fn settle(&mut self, notifier: &mut impl Notifier, sink: &mut impl EventSink) {
        while let Some(t) = self.fsm.step(&mut self.ctx) {
            self.after_transition(t, notifier, sink);
        }
        if self.fsm.current_state() == StateId::AwaitingScan {
            if let Some(PendingScan { tag, present }) = self.pending.take() {
                self.begin_cycle(tag, present, notifier, sink);
            }
        }
    }

    /// Report what the transition means and perform the I/O hand-offs
    /// the handlers only prepared.
    fn after_transition(
        &mut self,
        t: Transition,
        notifier: &mut impl Notifier,
        sink: &mut impl EventSink,
    ) {
        match t.from {
            StateId::Notifying => match self.ctx.last_notify {
                Some(Ok(status)) => sink.emit(&AppEvent::Notified {
                    cycle: self.ctx.cycle,
                    status,
                }),
                Some(Err(error)) => sink.emit(&AppEvent::NotificationFailed {
                    cycle: self.ctx.cycle,
                    error,
                }),
                None => {}
            },
            StateId::Resolving => match &self.ctx.decision {
                Some(DispatchDecision::NotFound(id)) => {
                    sink.emit(&AppEvent::NotFound(id.clone()));
                }
                Some(DispatchDecision::EmptyTable) => sink.emit(&AppEvent::EmptyTable),
                _ => {}
            },
            _ => {}
        }

        sink.emit(&AppEvent::StateChanged {
            from: t.from,
            to: t.to,
        });

        match t.to {
            StateId::Unrecoverable => sink.emit(&AppEvent::Unrecoverable {
                attempts: self.ctx.load_attempts,
            }),
            StateId::Notifying => self.submit_outbound(notifier, sink),
            _ => {}
        }
    }

    fn submit_outbound(&mut self, notifier: &mut impl Notifier, sink: &mut impl EventSink) {
        let cycle = self.ctx.cycle;
        let Some(request) = self.ctx.outbound.take() else {
            warn!("Cycle {} entered Notifying without a request", cycle);
            self.ctx.notify_result = Some(Err(NotificationError::TransportFailure));
            return;
        };
        if let Some(entry) = self.ctx.decision.as_ref().and_then(DispatchDecision::entry) {
            sink.emit(&AppEvent::Dispatching {
                cycle,
                tag: self.ctx.scanned.clone(),
                uri: entry.target_uri.clone(),
                description: entry.description.clone(),
            });
        }
        if let Err(error) = notifier.submit(cycle, request) {
            self.ctx.notify_result = Some(Err(error));
        }
    }
}
