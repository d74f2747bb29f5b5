//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use zipkit::{ZipFile, ZipParameters};

/// Creates an archive at `dir/name` holding `entries`, all added with `params`.
///
/// Entries are added in one batch, so the archive is written once.
pub fn create_archive(dir: &Path, name: &str, entries: &[(&str, &[u8])], params: &ZipParameters) -> PathBuf {
    let path = dir.join(name);
    let mut zip = ZipFile::create(&path).expect("create archive");
    let operations = entries
        .iter()
        .map(|(entry, data)| zipkit::Operation::add_data(entry, data.to_vec(), params).expect("valid entry name"))
        .collect();
    let result = zip.apply(operations).expect("write archive");
    assert_eq!(result.entries_added, entries.len());
    path
}

/// Asserts that the archive at `path` holds exactly `entries`, in order.
pub fn verify_archive_contents(path: &Path, password: Option<&str>, entries: &[(&str, &[u8])]) {
    let mut zip = ZipFile::open(path).expect("open archive");
    if let Some(password) = password {
        zip.set_password(password);
    }
    assert_eq!(zip.entry_count(), entries.len(), "entry count");
    for (index, (name, data)) in entries.iter().enumerate() {
        assert_eq!(zip.entry_at(index).unwrap().name, *name);
        let extracted = zip.extract_data(name).unwrap_or_else(|e| panic!("extract {}: {}", name, e));
        assert_eq!(extracted.as_slice(), *data, "contents of {}", name);
    }
}

/// Deterministic pseudo-random bytes; effectively incompressible.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill_bytes(&mut data);
    data
}

/// Highly compressible text of roughly `len` bytes.
pub fn text_bytes(len: usize) -> Vec<u8> {
    b"The quick brown fox jumps over the lazy dog. "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

/// Names of the regular files in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
