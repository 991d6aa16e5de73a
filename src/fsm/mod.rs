//! Function-pointer finite state machine engine.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  StateTable                                                   │
//! │  ┌───────────────┬───────────┬──────────┬───────────────────┐ │
//! │  │ StateId       │ on_enter  │ on_exit  │ on_update         │ │
//! │  ├───────────────┼───────────┼──────────┼───────────────────┤ │
//! │  │ Idle          │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ TableLoading  │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ ...           │           │          │                   │ │
//! │  └───────────────┴───────────┴──────────┴───────────────────┘ │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Fsm::step`] evaluates `on_update` for the current state without
//! advancing time; [`Fsm::tick`] advances time by one period first.
//! If `on_update` returns `Some(next_id)`, the engine runs `on_exit` for
//! the current state, then `on_enter` for the next.  All handlers receive
//! `&mut SessionContext` and never perform I/O themselves.

pub mod context;
pub mod states;

use context::SessionContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all session states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    TableLoading = 1,
    TableReady = 2,
    AwaitingScan = 3,
    Resolving = 4,
    Notifying = 5,
    /// Table acquisition exhausted its retries; no further dispatches.
    Unrecoverable = 6,
    /// Positional deployments stop here after their single dispatch.
    Finished = 7,
}

impl StateId {
    /// Total number of states; sizes the table array.
    pub const COUNT: usize = 8;

    /// Convert an index back to `StateId`.  Out-of-range indices map to
    /// `Unrecoverable` (debug builds assert).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::TableLoading,
            2 => Self::TableReady,
            3 => Self::AwaitingScan,
            4 => Self::Resolving,
            5 => Self::Notifying,
            6 => Self::Unrecoverable,
            7 => Self::Finished,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Unrecoverable
            }
        }
    }

    /// States that process no further scans.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Unrecoverable | Self::Finished)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut SessionContext);

/// Signature for the update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut SessionContext) -> Option<StateId>;

/// Static descriptor for a single state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

/// A transition the engine just performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: StateId,
    pub to: StateId,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    pub fn start(&mut self, ctx: &mut SessionContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance time by one period, then evaluate the current state.
    pub fn tick(&mut self, ctx: &mut SessionContext) -> Option<Transition> {
        self.tick_count += 1;
        self.step(ctx)
    }

    /// Evaluate the current state's `on_update` without advancing time.
    pub fn step(&mut self, ctx: &mut SessionContext) -> Option<Transition> {
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;

        let next = (self.table[self.current].on_update)(ctx)?;
        self.force_transition(next, ctx)
    }

    /// Jump to `next` regardless of what `on_update` would return.
    pub fn force_transition(
        &mut self,
        next: StateId,
        ctx: &mut SessionContext,
    ) -> Option<Transition> {
        if next as usize == self.current {
            return None;
        }
        let from = self.current_state();
        self.transition(next, ctx);
        Some(Transition { from, to: next })
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    fn transition(&mut self, next_id: StateId, ctx: &mut SessionContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
