//! Fuzz target for zip parsing with arbitrary byte input.
//!
//! Feeds arbitrary bytes through end-record discovery, central directory
//! parsing and local header decoding. Any panic or hang is a bug; errors
//! are expected.
//!
//! Run with: cargo +nightly fuzz run archive_open

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use zipkit::format::{DiskLayout, LocalFileHeader, parse_archive};

fuzz_target!(|data: &[u8]| {
    let layout = DiskLayout::single(data.len() as u64);
    let mut cursor = Cursor::new(data);

    let Ok(parsed) = parse_archive(&mut cursor, &layout) else {
        return;
    };

    for record in &parsed.records {
        let _ = record.name_str();
        let _ = record.comment_str();
        let _ = record.is_directory();
        let _ = record.is_encrypted();

        // Follow the record to its local header
        let mut cursor = Cursor::new(data);
        cursor.set_position(record.local_header_offset);
        let _ = LocalFileHeader::read(&mut cursor, record.local_header_offset);
    }
});
