//! Fuzz target: mapping-table `parse`
//!
//! Arbitrary bytes must yield a table or a typed error, never a panic.
//! Every accepted row honours the field bounds, and a matched-mode
//! table always carries a non-empty `tagId` on every row.
//!
//! cargo fuzz run fuzz_table_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use sonotify::config::DispatchMode;
use sonotify::dispatch::resolver::resolve;
use sonotify::dispatch::table::{MAX_DESCRIPTION_LEN, MAX_TAG_ID_LEN, MAX_URI_LEN, parse};

fuzz_target!(|data: &[u8]| {
    for mode in [DispatchMode::Matched, DispatchMode::Positional] {
        let Ok(table) = parse(data, mode) else {
            continue;
        };
        for entry in table.iter() {
            assert!(!entry.target_uri.is_empty());
            assert!(entry.target_uri.len() <= MAX_URI_LEN);
            assert!(entry.description.as_ref().is_none_or(|d| d.len() <= MAX_DESCRIPTION_LEN));
            match (&entry.tag_id, mode) {
                (Some(id), DispatchMode::Matched) => {
                    assert!(!id.as_str().is_empty() && id.as_str().len() <= MAX_TAG_ID_LEN);
                }
                (Some(id), DispatchMode::Positional) => assert!(id.as_str().len() <= MAX_TAG_ID_LEN),
                (None, DispatchMode::Matched) => panic!("matched row without tagId"),
                (None, DispatchMode::Positional) => {}
            }
        }
        // Positional lookup always lands on row 0 when one exists.
        assert_eq!(resolve(&table, None).entry(), table.first());
    }
});
