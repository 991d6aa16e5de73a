//! Message-passing between collaborator threads and the session.
//!
//! Reader and notifier completions arrive from other threads.  Instead of
//! calling into the session from those contexts, they post
//! [`SessionEvent`]s into a bounded queue that the main loop drains one
//! at a time, so every session transition happens on a single thread.
//!
//! ```text
//! ┌──────────────┐ Presented/Removed  ┌──────────────┐
//! │ Reader task  │───────────────────▶│              │     ┌───────────────┐
//! └──────────────┘                    │  EventQueue  │────▶│  Main loop    │
//! ┌──────────────┐ Completed          │  (bounded)   │     │  → Session    │
//! │ Notifier     │───────────────────▶│              │     └───────┬───────┘
//! └──────▲───────┘                    └──────────────┘             │
//!        │            NotifyJob       ┌──────────────┐             │
//!        └────────────────────────────│ NotifyOutbox │◀────────────┘
//!                                     └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::warn;

use crate::dispatch::notification::NotificationRequest;
use crate::dispatch::tag::TagId;
use crate::error::NotificationError;

/// Pending session events.  Tag taps are human-paced; this is ample.
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Notifications waiting for the transport.  At most one cycle is in
/// flight, the extra slot absorbs a completion/timeout race.
pub const OUTBOX_DEPTH: usize = 2;

/// Inputs to the dispatch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A tag entered the field.
    Presented(TagId),
    /// A previously reported tag left the field.
    Removed(TagId),
    /// The transport finished (or failed) the notification of `cycle`.
    NotificationCompleted {
        cycle: u32,
        result: Result<u16, NotificationError>,
    },
}

/// Bounded single-consumer queue of [`SessionEvent`]s.
pub struct EventQueue {
    inner: Channel<CriticalSectionRawMutex, SessionEvent, EVENT_QUEUE_DEPTH>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            inner: Channel::new(),
        }
    }

    /// Enqueue an event.  When full, the oldest pending event is evicted
    /// to make room and returned; the new event is always accepted.
    pub fn push(&self, event: SessionEvent) -> Option<SessionEvent> {
        let mut event = event;
        let mut evicted = None;
        loop {
            match self.inner.try_send(event) {
                Ok(()) => return evicted,
                Err(TrySendError::Full(back)) => {
                    event = back;
                    if let Ok(oldest) = self.inner.try_receive() {
                        warn!("Event queue full, evicting {:?}", oldest);
                        evicted = Some(oldest);
                    }
                }
            }
        }
    }

    pub fn pop(&self) -> Option<SessionEvent> {
        self.inner.try_receive().ok()
    }

    /// Hand every pending event to `handler` in arrival order.
    pub fn drain(&self, mut handler: impl FnMut(SessionEvent)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// One notification handed to the transport worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyJob {
    pub cycle: u32,
    pub request: NotificationRequest,
}

/// Session → notifier worker hand-off.
pub type NotifyOutbox = Channel<CriticalSectionRawMutex, NotifyJob, OUTBOX_DEPTH>;
