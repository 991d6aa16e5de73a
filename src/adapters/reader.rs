//! Tag reader boundary.
//!
//! The reader module sits on a UART and prints one identifier per line
//! for every poll in which a tag is in the field.  This adapter turns that
//! byte stream into [`SessionEvent`]s:
//!
//! ```text
//!  UART bytes ──▶ UidLineDecoder ──▶ TagFormat::normalize ──▶ PresenceTracker
//!                                                                │
//!                                        Presented / Removed ◀───┘
//! ```
//!
//! Identifiers are normalized here, before they ever reach the resolver.
//! Lines that do not parse as a tag identifier are dropped.

use core::fmt;

use log::{debug, info, warn};

use super::utils::is_printable_ascii;
use crate::dispatch::tag::{TagFormat, TagId};
use crate::events::{EventQueue, SessionEvent};

#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::{delay::NON_BLOCK, uart::UartDriver};

/// Longest accepted line.  Ten UID bytes with separators fit easily.
pub const MAX_LINE: usize = 64;

// ───────────────────────────────────────────────────────────────
// Link
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderError {
    /// The UART driver reported an error.
    Io,
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "reader link I/O error"),
        }
    }
}

/// Byte source from the reader module.
pub trait ReaderLink {
    /// Copy pending bytes into `buf` without blocking.  `Ok(0)` means
    /// nothing is pending.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, ReaderError>;
}

#[cfg(target_os = "espidf")]
impl ReaderLink for UartDriver<'_> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, ReaderError> {
        self.read(buf, NON_BLOCK).map_err(|e| {
            warn!("Reader UART read failed: {}", e);
            ReaderError::Io
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Line decoder
// ───────────────────────────────────────────────────────────────

/// Streaming newline-terminated line decoder.
///
/// Accumulates bytes across reads; `\r` and `\n` both end a line.
/// An over-long line is discarded up to its terminator.
pub struct UidLineDecoder {
    buf: heapless::Vec<u8, MAX_LINE>,
    overflow: bool,
}

impl UidLineDecoder {
    pub fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            overflow: false,
        }
    }

    /// Feed one byte.  Returns the completed line, trimmed, when `byte`
    /// terminates a non-empty printable line.
    pub fn feed(&mut self, byte: u8) -> Option<heapless::String<MAX_LINE>> {
        if byte == b'\n' || byte == b'\r' {
            let overflowed = core::mem::replace(&mut self.overflow, false);
            let line = core::mem::take(&mut self.buf);
            if overflowed {
                debug!("Reader line over {} bytes discarded", MAX_LINE);
                return None;
            }
            let text = core::str::from_utf8(&line).ok()?.trim();
            if text.is_empty() || !is_printable_ascii(text) {
                return None;
            }
            let mut out = heapless::String::new();
            out.push_str(text).ok()?;
            return Some(out);
        }
        if !self.overflow && self.buf.push(byte).is_err() {
            self.overflow = true;
            self.buf.clear();
        }
        None
    }

    /// Discard any partial line.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.overflow = false;
    }
}

impl Default for UidLineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Presence tracking
// ───────────────────────────────────────────────────────────────

/// Turns per-poll sightings into presentation and removal events.
///
/// A tag that appears is reported once as `Presented`; polls that keep
/// seeing it post nothing.  `Removed` follows after `release_polls`
/// consecutive polls without a sighting, or at once when a different tag
/// shows up.
pub struct PresenceTracker {
    current: Option<TagId>,
    misses: u32,
    release_polls: u32,
}

impl PresenceTracker {
    pub fn new(release_polls: u32) -> Self {
        Self {
            current: None,
            misses: 0,
            release_polls: release_polls.max(1),
        }
    }

    pub fn current(&self) -> Option<&TagId> {
        self.current.as_ref()
    }

    /// Record the outcome of one poll.
    pub fn observe(&mut self, seen: Option<TagId>, mut emit: impl FnMut(SessionEvent)) {
        match seen {
            Some(tag) => {
                self.misses = 0;
                if self.current.as_ref() == Some(&tag) {
                    return;
                }
                if let Some(previous) = self.current.replace(tag.clone()) {
                    emit(SessionEvent::Removed(previous));
                }
                emit(SessionEvent::Presented(tag));
            }
            None => {
                if self.current.is_none() {
                    return;
                }
                self.misses += 1;
                if self.misses >= self.release_polls {
                    self.misses = 0;
                    if let Some(previous) = self.current.take() {
                        emit(SessionEvent::Removed(previous));
                    }
                }
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Polling
// ───────────────────────────────────────────────────────────────

/// Reader-thread state: link plus decoding pipeline.
pub struct ReaderPoller<L> {
    link: L,
    decoder: UidLineDecoder,
    tracker: PresenceTracker,
    format: TagFormat,
}

impl<L: ReaderLink> ReaderPoller<L> {
    pub fn new(link: L, format: TagFormat, release_polls: u32) -> Self {
        Self {
            link,
            decoder: UidLineDecoder::new(),
            tracker: PresenceTracker::new(release_polls),
            format,
        }
    }

    /// Drain the link once and post the resulting events.
    pub fn poll(&mut self, queue: &EventQueue) -> Result<(), ReaderError> {
        let mut seen = None;
        let mut chunk = [0u8; MAX_LINE];
        loop {
            let n = self.link.read_available(&mut chunk)?;
            if n == 0 {
                break;
            }
            for &byte in &chunk[..n] {
                let Some(line) = self.decoder.feed(byte) else {
                    continue;
                };
                match self.format.normalize(&line) {
                    Some(tag) => seen = Some(tag),
                    None => debug!("Reader line '{}' is not a tag identifier", line),
                }
            }
        }
        self.tracker.observe(seen, |event| {
            queue.push(event);
        });
        Ok(())
    }

    /// Reader thread body: poll every `interval_ms` forever.
    pub fn run(&mut self, queue: &EventQueue, interval_ms: u32) -> ! {
        info!("Reader polling every {} ms ({:?} identifiers)", interval_ms, self.format);
        loop {
            if let Err(e) = self.poll(queue) {
                warn!("Reader poll failed: {}", e);
                self.decoder.reset();
            }
            std::thread::sleep(std::time::Duration::from_millis(u64::from(interval_ms)));
        }
    }
}
