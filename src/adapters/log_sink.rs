//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each application event as one
//! tagged line to the ESP-IDF logger (UART / USB-CDC in production).
//! This is the dispatcher's diagnostics channel.

use log::{debug, error, info, warn};

use crate::app::events::{AppEvent, IgnoreReason};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::TableLoaded { entries, source } => {
                info!("TABLE | loaded {} entries via {}", entries, source);
            }
            AppEvent::TableLoadFailed { attempt, error } => {
                warn!("TABLE | attempt {} failed: {}", attempt, error);
            }
            AppEvent::TableRefreshed { entries } => {
                info!("TABLE | refreshed, {} entries", entries);
            }
            AppEvent::TableRefreshFailed(e) => {
                warn!("TABLE | refresh failed, keeping previous table: {}", e);
            }
            AppEvent::Unrecoverable { attempts } => {
                error!(
                    "TABLE | no usable table after {} attempts, dispatch disabled",
                    attempts
                );
            }
            AppEvent::ScanIgnored { tag, reason } => match reason {
                IgnoreReason::Superseded => {
                    warn!("SCAN | {} dropped, replaced by a newer scan", tag);
                }
                IgnoreReason::PositionalMode => {
                    debug!("SCAN | {} ignored in positional mode", tag);
                }
                IgnoreReason::NotReady(state) => {
                    info!("SCAN | {} ignored while {:?}", tag, state);
                }
            },
            AppEvent::Dispatching {
                cycle,
                tag,
                uri,
                description,
            } => {
                info!(
                    "SCAN | #{} tag={} -> {} ({})",
                    cycle,
                    tag.as_ref().map_or("-", |t| t.as_str()),
                    uri,
                    description.as_deref().unwrap_or("no description"),
                );
            }
            AppEvent::NotFound(tag) => {
                warn!("SCAN | no entry for tag {}", tag);
            }
            AppEvent::EmptyTable => {
                warn!("SCAN | table has no entries");
            }
            AppEvent::Notified { cycle, status } => {
                info!("NOTIFY | #{} delivered (HTTP {})", cycle, status);
            }
            AppEvent::NotificationFailed { cycle, error } => {
                error!("NOTIFY | #{} failed: {}", cycle, error);
            }
        }
    }
}
