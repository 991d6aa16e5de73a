//! Tag identifiers and their canonical text form.
//!
//! Table lookups compare identifiers as exact, case-sensitive strings.
//! Whatever the reader reports is therefore rewritten at the boundary
//! into the single form the deployment's table was authored in.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Longest UID a contactless tag carries (triple-size ISO 14443-A).
pub const MAX_UID_BYTES: usize = 10;

/// String identifier of a physical tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagId(String);

impl TagId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Canonical rendering of a UID for one deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagFormat {
    /// `04A1B2C3`
    Plain,
    /// `04:A1:B2:C3`
    Colon,
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

impl TagFormat {
    /// Render raw UID bytes as upper-case hex in this format.
    pub fn render(self, uid: &[u8]) -> TagId {
        let mut out = String::with_capacity(uid.len() * 3);
        for (i, byte) in uid.iter().enumerate() {
            if i > 0 && self == Self::Colon {
                out.push(':');
            }
            out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
            out.push(HEX_DIGITS[(byte & 0x0F) as usize] as char);
        }
        TagId(out)
    }

    /// Rewrite a reader-reported identifier into this format.
    ///
    /// Accepts either case and `:`, `-` or space separators.  Returns `None`
    /// for anything that is not 1–10 whole bytes of hex.
    pub fn normalize(self, reported: &str) -> Option<TagId> {
        let uid = decode_hex(reported)?;
        Some(self.render(&uid))
    }
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn decode_hex(text: &str) -> Option<heapless::Vec<u8, MAX_UID_BYTES>> {
    let mut uid = heapless::Vec::new();
    let mut high: Option<u8> = None;
    for c in text.trim().bytes() {
        if matches!(c, b':' | b'-' | b' ') {
            // Separators may only sit between whole bytes.
            if high.is_some() {
                return None;
            }
            continue;
        }
        let n = nibble(c)?;
        match high.take() {
            None => high = Some(n),
            Some(h) => uid.push((h << 4) | n).ok()?,
        }
    }
    if high.is_some() || uid.is_empty() {
        return None;
    }
    Some(uid)
}
