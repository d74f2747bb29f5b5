//! Fuzz target for entry name validation with arbitrary string input.
//!
//! Run with: cargo +nightly fuzz run archive_path
//!
//! Properties checked on every accepted name:
//! - no `..` segment
//! - not absolute
//! - no NUL bytes
//! - extraction resolves below the destination

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::path::Path;
use zipkit::ArchivePath;
use zipkit::safety::{PathSafety, resolve_extract_path};

fuzz_target!(|data: &[u8]| {
    let Ok(name) = std::str::from_utf8(data) else {
        return;
    };

    for result in [ArchivePath::new(name), ArchivePath::normalize(name)] {
        let Ok(path) = result else {
            continue;
        };
        let normalized = path.as_str();

        assert!(
            path.components().all(|c| c != ".."),
            "Path traversal found in normalized path: {:?}",
            normalized
        );
        assert!(!normalized.starts_with('/'), "Absolute path accepted: {:?}", normalized);
        assert!(!normalized.contains('\0'), "NUL byte in normalized path: {:?}", normalized);
    }

    let dest = Path::new("/tmp/zipkit-fuzz-dest");
    if let Ok(resolved) = resolve_extract_path(name, dest, PathSafety::Strict) {
        assert!(resolved.starts_with(dest), "{:?} escaped to {:?}", name, resolved);
    }
});
