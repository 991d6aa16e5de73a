//! Port traits: the hexagonal boundary between the dispatch session and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DispatchSession (domain)
//! ```
//!
//! Driven adapters (table sources, notifiers, event sinks, config storage)
//! implement these traits.  The [`DispatchSession`](super::service::DispatchSession)
//! consumes them via generics, so the session never touches the network,
//! the filesystem or flash directly.

use crate::config::DispatchConfig;
use crate::dispatch::notification::NotificationRequest;
use crate::error::{AcquisitionError, NotificationError};

// ───────────────────────────────────────────────────────────────
// Table source port (driven adapter: network / flash → domain)
// ───────────────────────────────────────────────────────────────

/// Produces the raw bytes of the mapping table.
///
/// Implementations enforce their own size cap and timeout; a body that
/// would exceed the cap is an [`AcquisitionError::Truncated`], never a
/// silently shortened buffer.
pub trait TableSource {
    fn acquire(&mut self) -> Result<Vec<u8>, AcquisitionError>;

    /// Short label for logs ("https", "file", ...).
    fn name(&self) -> &'static str;
}

// ───────────────────────────────────────────────────────────────
// Notification ports (domain → media gateway)
// ───────────────────────────────────────────────────────────────

/// Accepts a notification for delivery.
///
/// `submit` must not block on the network.  The outcome arrives later as a
/// [`SessionEvent::NotificationCompleted`](crate::events::SessionEvent)
/// carrying the same `cycle`.
pub trait Notifier {
    fn submit(&mut self, cycle: u32, request: NotificationRequest) -> Result<(), NotificationError>;
}

/// Performs one blocking POST.  Used by the notifier worker.
///
/// `Ok(status)` is only returned for 2xx responses.
pub trait NotificationTransport {
    fn post(&mut self, request: &NotificationRequest) -> Result<u16, NotificationError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The session emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists deployment configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid values are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`DispatchConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<DispatchConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &DispatchConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
