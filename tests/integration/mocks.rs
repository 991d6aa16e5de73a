//! Mock adapters for integration tests.
//!
//! Every mock records what the session asked of it so tests can assert
//! on the full history without a network, flash or reader attached.

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use sonotify::app::events::AppEvent;
use sonotify::app::ports::{EventSink, NotificationTransport, Notifier, TableSource};
use sonotify::dispatch::notification::NotificationRequest;
use sonotify::error::{AcquisitionError, NotificationError};

pub const SONG_X_TABLE: &[u8] =
    br#"[{"tagId":"04A1B2C3","spotifyUri":"spotify:track:X","description":"Song X"}]"#;

pub const TWO_SONG_TABLE: &[u8] = br#"[
    {"tagId":"04A1B2C3","spotifyUri":"spotify:track:X","description":"Song X"},
    {"tagId":"0499AABB","spotifyUri":"spotify:album:Y"}
]"#;

// ── Table source ──────────────────────────────────────────────

/// Replays a script of acquisition outcomes; repeats the last one.
pub struct ScriptedSource {
    script: VecDeque<Result<Vec<u8>, AcquisitionError>>,
    pub calls: u32,
}

#[allow(dead_code)]
impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<u8>, AcquisitionError>>) -> Self {
        Self {
            script: script.into(),
            calls: 0,
        }
    }

    pub fn ok(raw: &[u8]) -> Self {
        Self::new(vec![Ok(raw.to_vec())])
    }

    pub fn failing(error: AcquisitionError) -> Self {
        Self::new(vec![Err(error)])
    }
}

impl TableSource for ScriptedSource {
    fn acquire(&mut self) -> Result<Vec<u8>, AcquisitionError> {
        self.calls += 1;
        if self.script.len() > 1 {
            self.script
                .pop_front()
                .unwrap_or(Err(AcquisitionError::TransportFailure))
        } else {
            self.script
                .front()
                .cloned()
                .unwrap_or(Err(AcquisitionError::TransportFailure))
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// ── Notifier ──────────────────────────────────────────────────

/// Accepts every submission and keeps it; completions are delivered by
/// the test through `handle_event`.
#[derive(Default)]
pub struct RecordingNotifier {
    pub submitted: Vec<(u32, NotificationRequest)>,
    pub reject_with: Option<NotificationError>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn bodies(&self) -> Vec<&str> {
        self.submitted.iter().map(|(_, r)| r.body.as_str()).collect()
    }

    pub fn last_cycle(&self) -> Option<u32> {
        self.submitted.last().map(|(c, _)| *c)
    }
}

impl Notifier for RecordingNotifier {
    fn submit(&mut self, cycle: u32, request: NotificationRequest) -> Result<(), NotificationError> {
        if let Some(e) = self.reject_with {
            return Err(e);
        }
        self.submitted.push((cycle, request));
        Ok(())
    }
}

/// Transport answering every POST with a fixed outcome.
pub struct FixedTransport {
    pub outcome: Result<u16, NotificationError>,
    pub posted: Vec<NotificationRequest>,
}

#[allow(dead_code)]
impl FixedTransport {
    pub fn new(outcome: Result<u16, NotificationError>) -> Self {
        Self {
            outcome,
            posted: Vec::new(),
        }
    }
}

impl NotificationTransport for FixedTransport {
    fn post(&mut self, request: &NotificationRequest) -> Result<u16, NotificationError> {
        self.posted.push(request.clone());
        self.outcome
    }
}

// ── Sink ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Delay ─────────────────────────────────────────────────────

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct NoDelay {
    pub total_ns: u64,
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
