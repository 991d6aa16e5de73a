//! Error taxonomy for the dispatcher firmware.
//!
//! Every failure the session can observe is one of a handful of small,
//! `Clone + Eq` enums so it can be carried inside [`SessionEvent`]s and
//! [`AppEvent`]s without allocation.  Expected lookup misses are *not*
//! errors; see [`DispatchDecision`](crate::dispatch::resolver::DispatchDecision).
//!
//! [`SessionEvent`]: crate::events::SessionEvent
//! [`AppEvent`]: crate::app::events::AppEvent

use core::fmt;

// ---------------------------------------------------------------------------
// Table acquisition
// ---------------------------------------------------------------------------

/// Failures surfaced by a table-acquisition collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionError {
    /// The fetch did not complete within its bound.
    Timeout,
    /// Connection, TLS or read failure.
    TransportFailure,
    /// The file (or remote resource) does not exist.
    NotFound,
    /// The source returned zero bytes.
    Empty,
    /// The server answered with something other than 200.
    Status(u16),
    /// The body hit the size bound or ended before its declared length.
    Truncated {
        read: usize,
        declared: Option<usize>,
    },
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "acquisition timed out"),
            Self::TransportFailure => write!(f, "transport failure"),
            Self::NotFound => write!(f, "table not found"),
            Self::Empty => write!(f, "table source is empty"),
            Self::Status(code) => write!(f, "unexpected HTTP status {code}"),
            Self::Truncated {
                read,
                declared: Some(declared),
            } => write!(f, "body truncated ({read} of {declared} bytes)"),
            Self::Truncated { read, declared: None } => {
                write!(f, "body truncated at {read} bytes")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Table parsing
// ---------------------------------------------------------------------------

/// Failures surfaced by [`parse`](crate::dispatch::table::parse).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Input is not a JSON array of objects, or a field violates its bounds.
    Malformed(&'static str),
    /// Row `index` lacks the required string field `field`.
    MissingField { index: usize, field: &'static str },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(why) => write!(f, "malformed table: {why}"),
            Self::MissingField { index, field } => {
                write!(f, "row {index} is missing required field '{field}'")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// "No usable table"
// ---------------------------------------------------------------------------

/// Acquisition and parse failures are handled identically by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    Acquisition(AcquisitionError),
    Parse(ParseError),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acquisition(e) => write!(f, "acquisition: {e}"),
            Self::Parse(e) => write!(f, "parse: {e}"),
        }
    }
}

impl From<AcquisitionError> for TableError {
    fn from(e: AcquisitionError) -> Self {
        Self::Acquisition(e)
    }
}

impl From<ParseError> for TableError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// Failures of one outbound notification.  Never fatal to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationError {
    /// Connection or write failure before a status line was received.
    TransportFailure,
    /// The gateway answered outside the 2xx range.
    NonSuccessStatus(u16),
    /// No completion arrived within the notification bound.
    Timeout,
    /// The hand-off queue to the transport was full.
    Busy,
}

impl fmt::Display for NotificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransportFailure => write!(f, "transport failure"),
            Self::NonSuccessStatus(code) => write!(f, "gateway returned HTTP {code}"),
            Self::Timeout => write!(f, "no response within timeout"),
            Self::Busy => write!(f, "notifier busy"),
        }
    }
}
