//! Outbound notification construction.
//!
//! The gateway webhook expects a form body:
//! ```text
//! uri=<target_uri>&entity_id=<target_device>
//! ```
//! Values are escaped so a `&`, `=` or `%` inside a URI can never split
//! or corrupt the form.  Characters that are legal and common in media
//! URIs (`:`, `/`, `.`) are left as-is; the webhook compares them verbatim.

use super::table::DispatchEntry;

/// `Content-Type` of every notification body.
pub const CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A fully-formed POST, handed to the transport and then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    /// Webhook URL (fixed per deployment).
    pub endpoint: String,
    pub body: String,
}

/// Build the notification for `entry`.  Pure formatter, no I/O.
pub fn build(entry: &DispatchEntry, target_device: &str, endpoint: &str) -> NotificationRequest {
    let mut body = String::with_capacity(entry.target_uri.len() + target_device.len() + 16);
    body.push_str("uri=");
    escape_into(&mut body, &entry.target_uri);
    body.push_str("&entity_id=");
    escape_into(&mut body, target_device);
    NotificationRequest {
        endpoint: endpoint.into(),
        body,
    }
}

fn passes_through(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b':' | b'/' | b'@' | b',')
}

/// Percent-escape `value` for an `application/x-www-form-urlencoded` body.
pub fn escape_into(out: &mut String, value: &str) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    for b in value.bytes() {
        if passes_through(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
}
