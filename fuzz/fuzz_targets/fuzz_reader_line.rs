//! Fuzz target: reader line decoding + identifier normalisation
//!
//! Streams arbitrary serial bytes through `UidLineDecoder` and feeds each
//! completed line to both `TagFormat`s.  Any identifier produced must
//! normalise to itself.
//!
//! cargo fuzz run fuzz_reader_line

#![no_main]

use libfuzzer_sys::fuzz_target;
use sonotify::adapters::reader::{MAX_LINE, UidLineDecoder};
use sonotify::dispatch::tag::TagFormat;

fuzz_target!(|data: &[u8]| {
    let mut decoder = UidLineDecoder::new();
    for &byte in data {
        let Some(line) = decoder.feed(byte) else {
            continue;
        };
        assert!(!line.is_empty() && line.len() <= MAX_LINE);
        for format in [TagFormat::Plain, TagFormat::Colon] {
            if let Some(tag) = format.normalize(&line) {
                assert_eq!(format.normalize(tag.as_str()).as_ref(), Some(&tag));
            }
        }
    }
    decoder.reset();
});
