//! Round-trip integration tests for zipkit.
//!
//! This file focuses on:
//! - Every compression method and level
//! - Empty files and empty archives
//! - Unicode and nested names
//! - Directory trees added from disk and extracted back
//! - Streaming reads

mod common;

use std::fs;
use std::io::Read;

use filetime::FileTime;
use zipkit::{CompressionMethod, Entry, ExtractOptions, ZipFile, ZipParameters};

fn stored() -> ZipParameters {
    ZipParameters::new().compression(CompressionMethod::Store)
}

#[test]
fn test_create_reopen_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.zip");

    let mut zip = ZipFile::create(&path).unwrap();
    zip.add_data("x.txt", b"hello", &ZipParameters::default()).unwrap();
    drop(zip);

    let zip = ZipFile::open(&path).unwrap();
    assert_eq!(zip.entry_count(), 1);
    assert_eq!(zip.extract_data("x.txt").unwrap(), b"hello");

    let out = dir.path().join("out");
    zip.extract_file("x.txt", &out).unwrap();
    assert_eq!(fs::read(out.join("x.txt")).unwrap(), b"hello");
}

#[test]
fn test_extract_into_missing_destination() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::create_archive(dir.path(), "d.zip", &[("x.txt", b"hello")], &ZipParameters::default());
    let zip = ZipFile::open(&path).unwrap();

    let by_name = dir.path().join("fresh");
    zip.extract_file("x.txt", &by_name).unwrap();
    assert_eq!(fs::read(by_name.join("x.txt")).unwrap(), b"hello");

    let by_index = dir.path().join("a").join("b");
    zip.extract_entry(0, &by_index).unwrap();
    assert_eq!(fs::read(by_index.join("x.txt")).unwrap(), b"hello");
}

#[test]
fn test_all_methods_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let text = common::text_bytes(200_000);
    let noise = common::random_bytes(50_000, 7);
    let entries: [(&str, &[u8]); 4] = [
        ("text.txt", &text),
        ("noise.bin", &noise),
        ("empty.txt", b""),
        ("one.txt", b"1"),
    ];

    for (i, params) in [stored(), ZipParameters::default()].into_iter().enumerate() {
        let path = common::create_archive(dir.path(), &format!("m{}.zip", i), &entries, &params);
        common::verify_archive_contents(&path, None, &entries);
    }
}

#[test]
fn test_deflate_levels() {
    let dir = tempfile::tempdir().unwrap();
    let text = common::text_bytes(100_000);
    let entries: [(&str, &[u8]); 1] = [("text.txt", &text)];

    for level in [0, 1, 6, 9] {
        let params = ZipParameters::new().level(level).unwrap();
        let path = common::create_archive(dir.path(), &format!("l{}.zip", level), &entries, &params);
        common::verify_archive_contents(&path, None, &entries);

        let zip = ZipFile::open(&path).unwrap();
        let entry = zip.entry("text.txt").unwrap();
        assert_eq!(entry.compression_method().unwrap(), CompressionMethod::Deflate);
        if level > 0 {
            assert!(entry.compressed_size < entry.size / 4, "level {} barely compressed", level);
        }
    }
}

#[test]
fn test_invalid_level_rejected() {
    assert!(ZipParameters::new().level(10).is_err());
}

#[test]
fn test_stored_sizes_match() {
    let dir = tempfile::tempdir().unwrap();
    let data = common::random_bytes(4096, 1);
    let path = common::create_archive(dir.path(), "s.zip", &[("r.bin", &data)], &stored());

    let zip = ZipFile::open(&path).unwrap();
    let entry = zip.entry("r.bin").unwrap();
    assert_eq!(entry.size, 4096);
    assert_eq!(entry.compressed_size, 4096);
    assert_eq!(entry.crc32, crc32fast::hash(&data));
}

#[test]
fn test_unicode_and_nested_names() {
    let dir = tempfile::tempdir().unwrap();
    let entries: [(&str, &[u8]); 4] = [
        ("日本語/ファイル.txt", b"japanese"),
        ("ελληνικά.txt", b"greek"),
        ("emoji/🎉.txt", b"party"),
        ("a/b/c/d/e/f/g/deep.txt", b"deep"),
    ];
    let path = common::create_archive(dir.path(), "u.zip", &entries, &ZipParameters::default());
    common::verify_archive_contents(&path, None, &entries);

    let zip = ZipFile::open(&path).unwrap();
    zip.extract_all(dir.path().join("out")).unwrap();
    assert_eq!(
        fs::read(dir.path().join("out").join("日本語").join("ファイル.txt")).unwrap(),
        b"japanese"
    );
}

#[test]
fn test_empty_archive_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.zip");
    let mut zip = ZipFile::create(&path).unwrap();
    zip.set_comment("nothing here").unwrap();
    assert!(zip.is_valid());

    let zip = ZipFile::open(&path).unwrap();
    assert_eq!(zip.entry_count(), 0);
    assert_eq!(zip.comment(), "nothing here");
    zip.test_archive().unwrap();
    zip.extract_all(dir.path().join("out")).unwrap();
    assert!(dir.path().join("out").is_dir());
}

#[test]
fn test_directory_tree_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("project");
    fs::create_dir_all(src.join("src/nested")).unwrap();
    fs::create_dir_all(src.join("empty")).unwrap();
    fs::write(src.join("README.md"), b"# project").unwrap();
    fs::write(src.join("src/main.rs"), b"fn main() {}").unwrap();
    fs::write(src.join("src/nested/data.bin"), common::random_bytes(10_000, 3)).unwrap();

    let path = dir.path().join("tree.zip");
    let mut zip = ZipFile::create(&path).unwrap();
    zip.add_directory(&src, &ZipParameters::default()).unwrap();

    let names: Vec<&str> = zip.entries().iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"project/"));
    assert!(names.contains(&"project/empty/"));
    assert!(names.contains(&"project/src/nested/data.bin"));
    assert!(zip.entry("project/empty").unwrap().is_directory);

    let out = dir.path().join("out");
    zip.extract_all(&out).unwrap();
    for rel in ["README.md", "src/main.rs", "src/nested/data.bin"] {
        assert_eq!(
            fs::read(out.join("project").join(rel)).unwrap(),
            fs::read(src.join(rel)).unwrap(),
            "{}",
            rel
        );
    }
    assert!(out.join("project/empty").is_dir());
}

#[test]
fn test_add_directory_rejects_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("plain.txt");
    fs::write(&file, b"x").unwrap();
    let mut zip = ZipFile::create(dir.path().join("d.zip")).unwrap();
    assert!(zip.add_directory(&file, &ZipParameters::default()).is_err());
    assert!(!zip.is_valid());
}

#[test]
fn test_extract_directory_entry_with_children() {
    let dir = tempfile::tempdir().unwrap();
    let mut zip = ZipFile::create(dir.path().join("d.zip")).unwrap();
    let params = ZipParameters::default();
    zip.add_directory_entry("docs", &params).unwrap();
    zip.add_data("docs/a.txt", b"a", &params).unwrap();
    zip.add_data("docs/sub/b.txt", b"b", &params).unwrap();
    zip.add_data("other.txt", b"o", &params).unwrap();

    let out = dir.path().join("out");
    zip.extract_file("docs", &out).unwrap();
    assert_eq!(fs::read(out.join("docs/sub/b.txt")).unwrap(), b"b");
    assert!(!out.join("other.txt").exists());

    let renamed = dir.path().join("renamed");
    zip.extract_file_with("docs/", &renamed, Some("manual"), &ExtractOptions::default())
        .unwrap();
    assert_eq!(fs::read(renamed.join("manual/a.txt")).unwrap(), b"a");
}

#[test]
fn test_modification_time_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("dated.txt");
    fs::write(&src, b"old news").unwrap();
    let mtime = FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(&src, mtime).unwrap();

    let mut zip = ZipFile::create(dir.path().join("t.zip")).unwrap();
    zip.add_file(&src, &ZipParameters::default()).unwrap();

    let out = dir.path().join("out");
    zip.extract_all(&out).unwrap();
    let extracted = FileTime::from_last_modification_time(&fs::metadata(out.join("dated.txt")).unwrap());
    assert_eq!(extracted.unix_seconds(), 1_600_000_000);
}

#[test]
fn test_streaming_reads_in_small_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let data = common::text_bytes(300_000);
    let path = common::create_archive(dir.path(), "s.zip", &[("big.txt", &data)], &ZipParameters::default());

    let zip = ZipFile::open(&path).unwrap();
    let mut stream = zip.input_stream("big.txt").unwrap();
    assert_eq!(stream.size(), data.len() as u64);

    let mut out = Vec::new();
    let mut buf = [0u8; 1000];
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, data);
    // Past the end is EOF, not an error
    assert_eq!(stream.read(&mut buf).unwrap(), 0);
}

#[test]
fn test_concurrent_streams() {
    let dir = tempfile::tempdir().unwrap();
    let a = common::text_bytes(50_000);
    let b = common::random_bytes(50_000, 9);
    let path = common::create_archive(dir.path(), "c.zip", &[("a", &a), ("b", &b)], &ZipParameters::default());
    let zip = ZipFile::open(&path).unwrap();

    std::thread::scope(|scope| {
        let first = scope.spawn(|| {
            let mut out = Vec::new();
            zip.input_stream("a").unwrap().read_to_end(&mut out).unwrap();
            out
        });
        let second = scope.spawn(|| {
            let mut out = Vec::new();
            zip.input_stream_at(1).unwrap().read_to_end(&mut out).unwrap();
            out
        });
        assert_eq!(first.join().unwrap(), a);
        assert_eq!(second.join().unwrap(), b);
    });
}

#[test]
fn test_entry_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let mut zip = ZipFile::create(dir.path().join("meta.zip")).unwrap();
    zip.add_data("f.txt", common::text_bytes(1000), &ZipParameters::default())
        .unwrap();
    zip.add_directory_entry("d", &ZipParameters::default()).unwrap();

    let file: &Entry = zip.entry_at(0).unwrap();
    assert_eq!(file.name, "f.txt");
    assert_eq!(file.size, 1000);
    assert!(file.is_file());
    assert!(!file.is_encrypted());
    assert!(file.modified().is_some());
    assert!(file.compression_ratio() < 1.0);

    let dir_entry = zip.entry_at(1).unwrap();
    assert_eq!(dir_entry.name, "d/");
    assert!(dir_entry.is_directory);
    assert_eq!(dir_entry.size, 0);
}
