//! Property-based tests using proptest.
//!
//! These tests check invariants of entry names, extraction paths and the
//! data path through an archive with randomly generated inputs.

use proptest::prelude::*;
use zipkit::safety::resolve_extract_path;
use zipkit::{ArchivePath, CompressionMethod, EncryptionMethod, PathSafety, ZipFile, ZipParameters};

/// Strategy for names accepted by `ArchivePath::new`.
fn valid_path_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-zA-Z0-9][a-zA-Z0-9_.-]{0,9}", 1..5).prop_map(|parts| parts.join("/"))
}

/// Names as a hostile archive might carry them.
fn hostile_name_strategy() -> impl Strategy<Value = String> {
    let segment = prop_oneof![
        Just("..".to_string()),
        Just(".".to_string()),
        Just(String::new()),
        "[a-z]{1,6}",
    ];
    (proptest::collection::vec(segment, 1..6), any::<bool>(), any::<bool>()).prop_map(
        |(parts, leading_slash, backslashes)| {
            let sep = if backslashes { "\\" } else { "/" };
            let joined = parts.join(sep);
            if leading_slash { format!("/{}", joined) } else { joined }
        },
    )
}

proptest! {
    #[test]
    fn valid_paths_parse_unchanged(path in valid_path_strategy()) {
        let parsed = ArchivePath::new(&path).unwrap();
        prop_assert_eq!(parsed.as_str(), path.as_str());
        prop_assert_eq!(parsed.components().count(), path.split('/').count());
        prop_assert!(parsed.starts_with(parsed.as_str()));
        if let Some(parent) = parsed.parent() {
            prop_assert!(parsed.starts_with(parent.as_str()));
        }
    }

    #[test]
    fn normalize_is_idempotent(path in valid_path_strategy(), prefix in "(\\./){0,2}/{0,2}", dir in any::<bool>()) {
        let input = format!("{}{}{}", prefix, path.replace('/', "\\"), if dir { "/" } else { "" });
        let once = ArchivePath::normalize(&input).unwrap();
        let twice = ArchivePath::normalize(once.as_str()).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.as_str(), path.as_str());
    }

    #[test]
    fn parent_segments_rejected(prefix in valid_path_strategy(), suffix in valid_path_strategy()) {
        let name = format!("{}/../{}", prefix, suffix);
        prop_assert!(ArchivePath::new(&name).is_err());
        prop_assert!(ArchivePath::normalize(&name).is_err());
    }

    #[test]
    fn nul_bytes_rejected(prefix in "[a-z]{0,5}", suffix in "[a-z]{0,5}") {
        let joined = format!("{}\0{}", prefix, suffix);
        prop_assert!(ArchivePath::new(&joined).is_err());
    }

    #[test]
    fn resolved_paths_stay_inside_destination(name in hostile_name_strategy()) {
        let dest = tempfile::tempdir().unwrap();
        for policy in [PathSafety::Strict, PathSafety::Relaxed] {
            if let Ok(resolved) = resolve_extract_path(&name, dest.path(), policy) {
                prop_assert!(resolved.starts_with(dest.path()), "{} escaped to {}", name, resolved.display());
                prop_assert!(resolved != dest.path());
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn data_survives_archive(
        data in proptest::collection::vec(any::<u8>(), 0..20_000),
        method in prop_oneof![Just(CompressionMethod::Store), Just(CompressionMethod::Deflate)],
        encryption in prop_oneof![
            Just(EncryptionMethod::None),
            Just(EncryptionMethod::ZipCrypto),
            Just(EncryptionMethod::AES_256),
        ],
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.zip");
        let mut zip = ZipFile::create(&path).unwrap();
        zip.set_password("prop");
        let params = ZipParameters::new().compression(method).encryption(encryption);
        zip.add_data("data.bin", &data, &params).unwrap();
        drop(zip);

        let zip = ZipFile::open_with_password(&path, "prop").unwrap();
        let entry = zip.entry("data.bin").unwrap();
        prop_assert_eq!(entry.size, data.len() as u64);
        prop_assert_eq!(zip.extract_data("data.bin").unwrap(), data);
    }
}
