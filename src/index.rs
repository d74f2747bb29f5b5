//! In-memory index of an archive's entries.

use std::collections::HashMap;

use crate::format::{CentralDirectoryHeader, DiskLayout};
use crate::{Entry, Error, Result};

/// Entries in central directory order plus a name lookup.
///
/// The index is rebuilt from the archive after every successful mutation,
/// so it always describes what is on disk.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
}

impl ArchiveIndex {
    /// Builds the index from parsed central directory records.
    ///
    /// When a name appears twice the later record wins the lookup, matching
    /// what extraction tools do with such archives.
    pub(crate) fn from_records(records: Vec<CentralDirectoryHeader>, layout: &DiskLayout) -> Result<Self> {
        let mut entries = Vec::with_capacity(records.len());
        let mut by_name = HashMap::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let entry = Entry::from_record(index, record, layout)?;
            if by_name.insert(entry.name.clone(), index).is_some() {
                log::warn!("archive contains '{}' more than once", entry.name);
            }
            entries.push(entry);
        }
        Ok(Self { entries, by_name })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in central directory order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryIndexOutOfRange`] past the end.
    pub fn get(&self, index: usize) -> Result<&Entry> {
        self.entries.get(index).ok_or(Error::EntryIndexOutOfRange {
            index,
            count: self.entries.len(),
        })
    }

    /// Entry named `name`. A directory is also found without its trailing
    /// slash.
    pub fn by_name(&self, name: &str) -> Option<&Entry> {
        let index = match self.by_name.get(name) {
            Some(&index) => index,
            None if !name.ends_with('/') => *self.by_name.get(&format!("{}/", name))?,
            None => return None,
        };
        self.entries.get(index)
    }

    /// Like [`by_name`](Self::by_name), failing with
    /// [`Error::EntryNotFound`].
    pub fn require(&self, name: &str) -> Result<&Entry> {
        self.by_name(name).ok_or_else(|| Error::entry_not_found(name))
    }

    /// Returns true if an entry with exactly this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Entries whose name starts with the directory `prefix` (which must end
    /// in `/`), the directory entry itself included.
    pub fn under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries.iter().filter(move |e| e.name.starts_with(prefix))
    }

    /// Sum of uncompressed sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Returns true if any entry is encrypted.
    pub fn has_encrypted_entries(&self) -> bool {
        self.entries.iter().any(Entry::is_encrypted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ExtraFields, flags, version};
    use crate::timestamp::DosDateTime;

    fn record(name: &str, size: u64) -> CentralDirectoryHeader {
        CentralDirectoryHeader {
            version_made_by: version::MADE_BY,
            version_needed: version::DEFAULT,
            flags: flags::UTF8,
            method: 0,
            modified: DosDateTime::MIN,
            crc32: 0,
            compressed_size: size,
            uncompressed_size: size,
            disk_number_start: 0,
            internal_attributes: 0,
            external_attributes: 0,
            local_header_offset: 0,
            name: name.as_bytes().to_vec(),
            extra: ExtraFields::default(),
            comment: Vec::new(),
        }
    }

    fn index(names: &[&str]) -> ArchiveIndex {
        let records = names.iter().map(|n| record(n, 3)).collect();
        ArchiveIndex::from_records(records, &DiskLayout::single(100)).unwrap()
    }

    #[test]
    fn test_lookup() {
        let index = index(&["dir/", "dir/a.txt", "b.txt"]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.by_name("b.txt").unwrap().index, 2);
        assert_eq!(index.by_name("dir").unwrap().name, "dir/");
        assert!(index.by_name("missing").is_none());
        assert!(matches!(index.require("missing"), Err(Error::EntryNotFound { .. })));
        assert!(matches!(
            index.get(3),
            Err(Error::EntryIndexOutOfRange { index: 3, count: 3 })
        ));
        assert_eq!(index.total_size(), 9);
    }

    #[test]
    fn test_under_prefix() {
        let index = index(&["dir/", "dir/a.txt", "dirt.txt", "dir/sub/b"]);
        let names: Vec<_> = index.under("dir/").map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["dir/", "dir/a.txt", "dir/sub/b"]);
    }

    #[test]
    fn test_duplicate_name_later_wins() {
        let index = index(&["a", "a"]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.by_name("a").unwrap().index, 1);
    }
}
