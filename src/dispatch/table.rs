//! Mapping-table ingestion and validation.
//!
//! Wire format (the file on SPIFFS or the downloaded body):
//! ```text
//! [
//!   { "tagId": "04A1B2C3", "spotifyUri": "spotify:track:X", "description": "Song X" },
//!   ...
//! ]
//! ```
//!
//! `tagId` is required only in [`DispatchMode::Matched`] deployments;
//! `description` is always optional.  There is no schema version.

use serde::Deserialize;
use serde_json::Value;

use crate::config::DispatchMode;
use crate::error::ParseError;

use super::tag::TagId;

/// Upper bound on a `tagId` string (10 bytes, colon-separated).
pub const MAX_TAG_ID_LEN: usize = 32;
/// Upper bound on a `spotifyUri` string.
pub const MAX_URI_LEN: usize = 256;
/// Upper bound on a `description` string.
pub const MAX_DESCRIPTION_LEN: usize = 128;

/// One row of the mapping table.  Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchEntry {
    /// `None` only in positional tables, where rows are never matched.
    pub tag_id: Option<TagId>,
    pub target_uri: String,
    pub description: Option<String>,
}

impl DispatchEntry {
    /// Human label for logs: the description, or the URI when absent.
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.target_uri)
    }
}

/// Ordered dispatch rows; insertion order is the tie-break order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: Vec<DispatchEntry>,
}

impl MappingTable {
    pub fn new(entries: Vec<DispatchEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[DispatchEntry] {
        &self.entries
    }

    pub fn first(&self) -> Option<&DispatchEntry> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DispatchEntry> {
        self.entries.iter()
    }
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(rename = "tagId")]
    tag_id: Option<String>,
    #[serde(rename = "spotifyUri")]
    spotify_uri: Option<String>,
    description: Option<String>,
}

/// Parse an untrusted byte buffer into an owned table.
///
/// Pure: the returned table holds no references into `raw`.
pub fn parse(raw: &[u8], mode: DispatchMode) -> Result<MappingTable, ParseError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::Malformed("empty input"));
    }

    let root: Value =
        serde_json::from_slice(raw).map_err(|_| ParseError::Malformed("invalid JSON"))?;
    let Value::Array(rows) = root else {
        return Err(ParseError::Malformed("top level is not an array"));
    };

    let mut entries = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        entries.push(parse_row(index, row, mode)?);
    }
    Ok(MappingTable::new(entries))
}

fn parse_row(index: usize, row: Value, mode: DispatchMode) -> Result<DispatchEntry, ParseError> {
    if !row.is_object() {
        return Err(ParseError::Malformed("row is not an object"));
    }
    let raw = RawEntry::deserialize(row)
        .map_err(|_| ParseError::Malformed("field has the wrong type"))?;

    let target_uri = raw
        .spotify_uri
        .filter(|uri| !uri.is_empty())
        .ok_or(ParseError::MissingField {
            index,
            field: "spotifyUri",
        })?;
    if target_uri.len() > MAX_URI_LEN {
        return Err(ParseError::Malformed("spotifyUri too long"));
    }

    let tag_id = match (mode, raw.tag_id) {
        (_, Some(id)) if id.len() > MAX_TAG_ID_LEN => {
            return Err(ParseError::Malformed("tagId too long"));
        }
        (DispatchMode::Matched, None) => {
            return Err(ParseError::MissingField {
                index,
                field: "tagId",
            });
        }
        (DispatchMode::Matched, Some(id)) if id.is_empty() => {
            return Err(ParseError::MissingField {
                index,
                field: "tagId",
            });
        }
        (_, id) => id.map(TagId::new),
    };

    if raw
        .description
        .as_ref()
        .is_some_and(|d| d.len() > MAX_DESCRIPTION_LEN)
    {
        return Err(ParseError::Malformed("description too long"));
    }

    Ok(DispatchEntry {
        tag_id,
        target_uri,
        description: raw.description,
    })
}
