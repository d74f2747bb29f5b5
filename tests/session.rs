//! Handle-based API tests.
//!
//! Drives the session the way a foreign caller would: raw integer handles in,
//! integer status codes out.

mod common;

use zipkit::{
    ArchiveHandle, CompressionMethod, EncryptionMethod, EntryHandle, Session, ZipParameters, status_of,
};

#[test]
fn test_create_reopen_through_raw_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.zip");
    let mut session = Session::new();

    let raw = session.create_archive(&path).unwrap().to_raw();
    let zip = ArchiveHandle::from_raw(raw);
    assert_eq!(status_of(&session.add_data(zip, "x.txt", b"hello", &ZipParameters::default())), 0);
    assert_eq!(status_of(&session.close_archive(zip)), 0);
    assert_eq!(status_of(&session.close_archive(zip)), -1);

    let zip = session.open_archive(&path).unwrap();
    assert_ne!(zip.to_raw(), raw);
    assert_eq!(session.entry_count(zip).unwrap(), 1);
    assert_eq!(session.extract_to_buffer(zip, "x.txt").unwrap(), b"hello");

    let out = dir.path().join("out");
    session.extract_file(zip, "x.txt", &out).unwrap();
    assert_eq!(std::fs::read(out.join("x.txt")).unwrap(), b"hello");
}

#[test]
fn test_unknown_raw_handles_are_rejected() {
    let mut session = Session::new();
    for raw in [0, 1, u64::MAX, 42 << 32] {
        assert_eq!(status_of(&session.entry_count(ArchiveHandle::from_raw(raw))), -1);
        assert_eq!(status_of(&session.entry(EntryHandle::from_raw(raw)).map(|_| ())), -1);
    }
}

#[test]
fn test_password_status_codes() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new();
    let path = dir.path().join("enc.zip");
    let zip = session.create_archive(&path).unwrap();
    session.set_password(zip, "secret123").unwrap();
    let zipcrypto = ZipParameters::new().encryption(EncryptionMethod::ZipCrypto);
    let aes = ZipParameters::new().encryption(EncryptionMethod::AES_256);
    session.add_data(zip, "zc.txt", b"zipcrypto", &zipcrypto).unwrap();
    session.add_data(zip, "aes.txt", b"aes", &aes).unwrap();
    assert!(session.is_encrypted(zip).unwrap());
    session.close_archive(zip).unwrap();

    let zip = session.open_archive_with_password(&path, "wrong").unwrap();
    assert_eq!(status_of(&session.extract_to_buffer(zip, "zc.txt")), -14);
    let aes_status = status_of(&session.extract_to_buffer(zip, "aes.txt"));
    assert!(aes_status == -14 || aes_status == -15, "status {}", aes_status);

    session.set_password(zip, "secret123").unwrap();
    assert_eq!(session.extract_to_buffer(zip, "aes.txt").unwrap(), b"aes");
}

#[test]
fn test_split_and_merge_through_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new();
    let path = dir.path().join("split.zip");
    let zip = session.create_split_archive(&path, zipkit::MIN_VOLUME_SIZE).unwrap();
    let data = common::random_bytes(200_000, 77);
    let stored = ZipParameters::new().compression(CompressionMethod::Store);
    session.add_data(zip, "big.bin", &data, &stored).unwrap();

    assert!(session.is_split(zip).unwrap());
    assert!(session.split_files(zip).unwrap().len() >= 3);

    let merged = dir.path().join("merged.zip");
    session.merge_split_files(zip, &merged).unwrap();
    let single = session.open_archive(&merged).unwrap();
    assert!(!session.is_split(single).unwrap());
    assert_eq!(session.extract_to_buffer(single, "big.bin").unwrap(), data);

    assert_eq!(status_of(&session.create_split_archive(dir.path().join("t.zip"), 10)), -5);
}

#[test]
fn test_stream_through_entry_handle() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new();
    let zip = session.create_archive(dir.path().join("s.zip")).unwrap();
    let text = common::text_bytes(40_000);
    session.add_data(zip, "t.txt", &text, &ZipParameters::default()).unwrap();

    let entry = session.entry_by_index(zip, 0).unwrap();
    let stream = session.open_entry_stream(entry).unwrap();
    let mut out = Vec::new();
    let mut buf = vec![0u8; 4096];
    loop {
        let n = session.read_stream(stream, &mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, text);
    session.close_stream(stream).unwrap();
    assert_eq!(status_of(&session.read_stream(stream, &mut buf)), -1);
}
