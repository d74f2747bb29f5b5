//! Tests for malformed and corrupted archive handling.
//!
//! Damaged input must produce an error of the right kind, never a panic,
//! a hang or silently wrong data.

mod common;

use std::fs;
use std::path::Path;

use zipkit::{CompressionMethod, EncryptionMethod, Error, ErrorKind, ZipFile, ZipParameters};

const MARKER: &[u8] = b"UNIQUE-PAYLOAD-MARKER-0123456789";

fn stored() -> ZipParameters {
    ZipParameters::new().compression(CompressionMethod::Store)
}

fn write_bytes(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn find(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("needle present")
}

/// Offset of the first entry's payload, read from its local header.
fn first_payload_offset(bytes: &[u8]) -> usize {
    let name_len = u16::from_le_bytes([bytes[26], bytes[27]]) as usize;
    let extra_len = u16::from_le_bytes([bytes[28], bytes[29]]) as usize;
    30 + name_len + extra_len
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = ZipFile::open(dir.path().join("absent.zip")).unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));
    assert_eq!(err.status_code().code(), -2);
}

#[test]
fn test_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bytes(dir.path(), "empty.zip", b"");
    let err = ZipFile::open(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat(_)), "{err:?}");
    assert_eq!(err.status_code().code(), -3);
}

#[test]
fn test_garbage_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bytes(dir.path(), "garbage.zip", &common::random_bytes(4096, 13));
    let err = ZipFile::open(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format, "{err:?}");
}

#[test]
fn test_truncated_archive() {
    let dir = tempfile::tempdir().unwrap();
    let text = common::text_bytes(20_000);
    let path = common::create_archive(dir.path(), "t.zip", &[("t.txt", &text)], &ZipParameters::default());
    let bytes = fs::read(&path).unwrap();

    let half = write_bytes(dir.path(), "half.zip", &bytes[..bytes.len() / 2]);
    let err = ZipFile::open(&half).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format, "{err:?}");

    // Every shorter prefix fails cleanly
    for cut in (0..bytes.len()).step_by(97) {
        let path = write_bytes(dir.path(), "cut.zip", &bytes[..cut]);
        if let Ok(zip) = ZipFile::open(&path) {
            let _ = zip.extract_data("t.txt");
        }
    }
}

#[test]
fn test_damaged_directory_signature() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::create_archive(dir.path(), "d.zip", &[("a.txt", b"abc")], &stored());
    let mut bytes = fs::read(&path).unwrap();
    let eocd = bytes.len() - 22;
    let cd_offset = u32::from_le_bytes(bytes[eocd + 16..eocd + 20].try_into().unwrap()) as usize;
    bytes[cd_offset] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let err = ZipFile::open(&path).unwrap_err();
    assert!(err.is_corruption(), "{err:?}");
}

#[test]
fn test_corrupt_payload_fails_crc() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::create_archive(
        dir.path(),
        "crc.zip",
        &[("a.txt", MARKER), ("b.txt", b"untouched")],
        &stored(),
    );
    let mut bytes = fs::read(&path).unwrap();
    let at = find(&bytes, MARKER) + MARKER.len() / 2;
    bytes[at] ^= 0x01;
    fs::write(&path, &bytes).unwrap();

    let zip = ZipFile::open(&path).unwrap();
    assert!(matches!(zip.extract_data("a.txt"), Err(Error::CrcMismatch { .. })));
    assert_eq!(zip.extract_data("b.txt").unwrap(), b"untouched");

    let err = zip.test_archive().unwrap_err();
    assert!(err.is_corruption());
    assert_eq!(err.entry_name(), Some("a.txt"));

    let out = dir.path().join("out");
    assert!(zip.extract_file("a.txt", &out).is_err());
    assert!(!out.join("a.txt").exists());
}

#[test]
fn test_tampered_aes_ciphertext() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aes.zip");
    let mut zip = ZipFile::create(&path).unwrap();
    zip.set_password("pw");
    let params = stored().encryption(EncryptionMethod::AES_256);
    zip.add_data("secret.bin", common::random_bytes(1000, 3), &params).unwrap();
    drop(zip);

    let mut bytes = fs::read(&path).unwrap();
    // Past the 16-byte salt and 2-byte verifier
    let at = first_payload_offset(&bytes) + 18 + 100;
    bytes[at] ^= 0x80;
    fs::write(&path, &bytes).unwrap();

    let zip = ZipFile::open_with_password(&path, "pw").unwrap();
    let err = zip.extract_data("secret.bin").unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed { .. }), "{err:?}");
    assert_eq!(err.status_code().code(), -15);
}

#[test]
fn test_single_byte_corruption_never_panics() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::create_archive(
        dir.path(),
        "small.zip",
        &[("a.txt", b"alpha alpha alpha"), ("dir/b.txt", b"beta")],
        &ZipParameters::default(),
    );
    let original = fs::read(&path).unwrap();
    let target = dir.path().join("mutated.zip");

    for pos in 0..original.len() {
        for flip in [0x01u8, 0xFF] {
            let mut bytes = original.clone();
            bytes[pos] ^= flip;
            fs::write(&target, &bytes).unwrap();
            let Ok(zip) = ZipFile::open(&target) else {
                continue;
            };
            for entry in zip.entries() {
                let _ = zip.extract_data(&entry.name);
            }
            let _ = zip.test_archive();
        }
    }
}

#[test]
fn test_entry_count_overflow() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::create_archive(dir.path(), "n.zip", &[("a.txt", b"a")], &stored());
    let mut bytes = fs::read(&path).unwrap();
    let eocd = bytes.len() - 22;
    // Claim far more records than the directory holds
    bytes[eocd + 8..eocd + 10].copy_from_slice(&5000u16.to_le_bytes());
    bytes[eocd + 10..eocd + 12].copy_from_slice(&5000u16.to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    let err = ZipFile::open(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format, "{err:?}");
}
