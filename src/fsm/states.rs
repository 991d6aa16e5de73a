//! Concrete state handler functions and table builder.
//!
//! ```text
//!  IDLE ──[start]──▶ TABLE_LOADING ──[attempts exhausted]──▶ UNRECOVERABLE
//!                          │
//!                     [table ok]
//!                          ▼
//!                     TABLE_READY ──[positional]──────────┐
//!                          │                              │
//!                      [matched]                          │
//!                          ▼                              ▼
//!    ┌──────────────▶ AWAITING_SCAN ──[tag]──────▶   RESOLVING
//!    │                                                │      │
//!    │◀──────────[not found / empty, matched]─────────┘   [found]
//!    │                                                       ▼
//!    └──────────[done / failed / timeout, matched]────── NOTIFYING
//!
//!  positional: RESOLVING / NOTIFYING ──[cycle over]──▶ FINISHED
//! ```

use super::context::SessionContext;
use super::{StateDescriptor, StateId};
use crate::config::DispatchMode;
use crate::dispatch::notification;
use crate::dispatch::resolver::{self, DispatchDecision};
use crate::dispatch::table::MappingTable;
use crate::error::NotificationError;
use log::{debug, error, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: None,
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: TableLoading
        StateDescriptor {
            id: StateId::TableLoading,
            name: "TableLoading",
            on_enter: Some(table_loading_enter),
            on_exit: None,
            on_update: table_loading_update,
        },
        // Index 2: TableReady
        StateDescriptor {
            id: StateId::TableReady,
            name: "TableReady",
            on_enter: None,
            on_exit: None,
            on_update: table_ready_update,
        },
        // Index 3: AwaitingScan
        StateDescriptor {
            id: StateId::AwaitingScan,
            name: "AwaitingScan",
            on_enter: Some(awaiting_scan_enter),
            on_exit: None,
            on_update: awaiting_scan_update,
        },
        // Index 4: Resolving
        StateDescriptor {
            id: StateId::Resolving,
            name: "Resolving",
            on_enter: Some(resolving_enter),
            on_exit: None,
            on_update: resolving_update,
        },
        // Index 5: Notifying
        StateDescriptor {
            id: StateId::Notifying,
            name: "Notifying",
            on_enter: Some(notifying_enter),
            on_exit: Some(notifying_exit),
            on_update: notifying_update,
        },
        // Index 6: Unrecoverable
        StateDescriptor {
            id: StateId::Unrecoverable,
            name: "Unrecoverable",
            on_enter: Some(unrecoverable_enter),
            on_exit: None,
            on_update: terminal_update,
        },
        // Index 7: Finished
        StateDescriptor {
            id: StateId::Finished,
            name: "Finished",
            on_enter: Some(finished_enter),
            on_exit: None,
            on_update: terminal_update,
        },
    ]
}

/// Where a cycle ends: positional deployments dispatch exactly once.
fn cycle_over(ctx: &SessionContext) -> StateId {
    match ctx.mode() {
        DispatchMode::Matched => StateId::AwaitingScan,
        DispatchMode::Positional => StateId::Finished,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE: waiting for the session to start loading
// ═══════════════════════════════════════════════════════════════════════════

fn idle_update(_ctx: &mut SessionContext) -> Option<StateId> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  TABLE_LOADING: acquisition attempts are made by the session
// ═══════════════════════════════════════════════════════════════════════════

fn table_loading_enter(ctx: &mut SessionContext) {
    ctx.load_attempts = 0;
    ctx.load_error = None;
    info!(
        "TABLE_LOADING: up to {} attempts",
        ctx.config.table_max_attempts
    );
}

fn table_loading_update(ctx: &mut SessionContext) -> Option<StateId> {
    if ctx.table.is_some() {
        return Some(StateId::TableReady);
    }
    if ctx.load_exhausted() {
        return Some(StateId::Unrecoverable);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  TABLE_READY
// ═══════════════════════════════════════════════════════════════════════════

fn table_ready_update(ctx: &mut SessionContext) -> Option<StateId> {
    match ctx.mode() {
        DispatchMode::Positional => Some(StateId::Resolving),
        DispatchMode::Matched => Some(StateId::AwaitingScan),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  AWAITING_SCAN: the session moves us on when a tag is accepted
// ═══════════════════════════════════════════════════════════════════════════

fn awaiting_scan_enter(ctx: &mut SessionContext) {
    ctx.clear_cycle();
    debug!("AWAITING_SCAN: ready for the next tag");
}

fn awaiting_scan_update(_ctx: &mut SessionContext) -> Option<StateId> {
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  RESOLVING
// ═══════════════════════════════════════════════════════════════════════════

fn resolving_enter(ctx: &mut SessionContext) {
    ctx.cycle = ctx.cycle.wrapping_add(1);
    ctx.outbound = None;
    ctx.notify_result = None;

    let empty = MappingTable::default();
    let table = ctx.table.as_ref().unwrap_or(&empty);
    let decision = resolver::resolve(table, ctx.scanned.as_ref());
    debug!("RESOLVING: cycle {} → {:?}", ctx.cycle, decision);
    ctx.decision = Some(decision);
}

fn resolving_update(ctx: &mut SessionContext) -> Option<StateId> {
    match ctx.decision {
        Some(DispatchDecision::Found(_)) => Some(StateId::Notifying),
        _ => Some(cycle_over(ctx)),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  NOTIFYING: one request in flight, bounded by notify_timeout_ms
// ═══════════════════════════════════════════════════════════════════════════

fn notifying_enter(ctx: &mut SessionContext) {
    if let Some(entry) = ctx.decision.as_ref().and_then(DispatchDecision::entry) {
        ctx.outbound = Some(notification::build(
            entry,
            &ctx.config.target_device,
            &ctx.config.webhook_url,
        ));
    }
}

fn notifying_exit(ctx: &mut SessionContext) {
    ctx.last_notify = ctx.notify_result.take();
    ctx.outbound = None;
}

fn notifying_update(ctx: &mut SessionContext) -> Option<StateId> {
    if ctx.notify_result.is_some() {
        return Some(cycle_over(ctx));
    }
    if ctx.ticks_in_state >= ctx.config.notify_timeout_ticks() {
        warn!(
            "NOTIFYING: cycle {} gave no answer within {} ms",
            ctx.cycle, ctx.config.notify_timeout_ms
        );
        ctx.notify_result = Some(Err(NotificationError::Timeout));
        return Some(cycle_over(ctx));
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  Terminal states
// ═══════════════════════════════════════════════════════════════════════════

fn unrecoverable_enter(ctx: &mut SessionContext) {
    error!(
        "UNRECOVERABLE: table unavailable after {} attempts",
        ctx.load_attempts
    );
}

fn finished_enter(ctx: &mut SessionContext) {
    info!("FINISHED: positional dispatch complete (cycle {})", ctx.cycle);
}

fn terminal_update(_ctx: &mut SessionContext) -> Option<StateId> {
    None
}
