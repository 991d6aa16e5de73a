//! Dispatch resolution: scanned identifier + table → one row (or why not).

use super::table::{DispatchEntry, MappingTable};
use super::tag::TagId;

/// Outcome of one lookup.  Misses are expected, reportable outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchDecision {
    Found(DispatchEntry),
    /// Identifier-matched lookup found no row with this id.
    NotFound(TagId),
    /// Positional lookup on a table with no rows.
    EmptyTable,
}

impl DispatchDecision {
    pub fn entry(&self) -> Option<&DispatchEntry> {
        match self {
            Self::Found(entry) => Some(entry),
            _ => None,
        }
    }
}

/// Select a row.
///
/// With an identifier the first row whose `tag_id` equals it exactly wins
/// (duplicates resolve in table order).  Without one, the first row is
/// always chosen.
pub fn resolve(table: &MappingTable, scanned: Option<&TagId>) -> DispatchDecision {
    match scanned {
        Some(id) => table
            .iter()
            .find(|e| e.tag_id.as_ref() == Some(id))
            .map_or_else(
                || DispatchDecision::NotFound(id.clone()),
                |e| DispatchDecision::Found(e.clone()),
            ),
        None => table
            .first()
            .map_or(DispatchDecision::EmptyTable, |e| {
                DispatchDecision::Found(e.clone())
            }),
    }
}
