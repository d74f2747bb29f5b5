//! Archive modification operations.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::write::{EntryMeta, ZipParameters};
use crate::{ArchivePath, Error, Result};

/// Where the data of an added entry comes from.
pub enum EntrySource {
    /// A file on disk, read when the archive is rebuilt.
    File(PathBuf),
    /// An empty directory entry.
    Directory,
    /// Bytes in memory.
    Data(Vec<u8>),
    /// Any reader, consumed once.
    Stream(Box<dyn Read + Send>),
}

impl EntrySource {
    /// Opens the source for reading. Directories yield nothing.
    pub(crate) fn open(self) -> Result<Box<dyn Read + Send>> {
        Ok(match self {
            EntrySource::File(path) => Box::new(BufReader::new(File::open(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::FileNotFound { path: path.clone() }
                } else {
                    Error::Io(e)
                }
            })?)),
            EntrySource::Directory => Box::new(std::io::empty()),
            EntrySource::Data(data) => Box::new(Cursor::new(data)),
            EntrySource::Stream(reader) => reader,
        })
    }
}

impl std::fmt::Debug for EntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntrySource::File(path) => f.debug_tuple("File").field(path).finish(),
            EntrySource::Directory => f.write_str("Directory"),
            EntrySource::Data(data) => write!(f, "Data({} bytes)", data.len()),
            EntrySource::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A pending modification of an archive.
#[derive(Debug)]
pub enum Operation {
    /// Add an entry, replacing one of the same name if the parameters allow.
    Add {
        /// Name inside the archive.
        path: ArchivePath,
        /// Entry contents.
        source: EntrySource,
        /// Entry metadata.
        meta: EntryMeta,
        /// Compression and encryption settings.
        params: ZipParameters,
    },
    /// Remove an entry; a directory is removed with everything under it.
    Remove {
        /// Name as stored in the archive.
        name: String,
    },
    /// Rename an entry; a directory is renamed with everything under it.
    Rename {
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// Replace the archive comment.
    SetComment {
        /// New comment bytes.
        comment: Vec<u8>,
    },
}

impl Operation {
    /// Adds `data` under `name`.
    pub fn add_data(name: &str, data: impl Into<Vec<u8>>, params: &ZipParameters) -> Result<Self> {
        let data = data.into();
        Ok(Operation::Add {
            path: ArchivePath::normalize(name)?,
            meta: EntryMeta::file(data.len() as u64),
            source: EntrySource::Data(data),
            params: params.clone(),
        })
    }

    /// Adds the contents of `reader` under `name`.
    pub fn add_stream(name: &str, reader: impl Read + Send + 'static, params: &ZipParameters) -> Result<Self> {
        Ok(Operation::Add {
            path: ArchivePath::normalize(name)?,
            source: EntrySource::Stream(Box::new(reader)),
            meta: EntryMeta::default(),
            params: params.clone(),
        })
    }

    /// Adds an empty directory entry.
    pub fn add_directory_entry(name: &str, params: &ZipParameters) -> Result<Self> {
        Ok(Operation::Add {
            path: ArchivePath::normalize(name)?,
            source: EntrySource::Directory,
            meta: EntryMeta::directory(),
            params: params.clone(),
        })
    }

    /// Expands a file or directory on disk into add operations.
    ///
    /// A file is stored under its own name, or the parameters' name
    /// override. A directory is walked recursively and stored under its own
    /// name unless `include_root_folder` is off. Both are placed below the
    /// parameters' root folder when one is set.
    pub fn add_path(path: impl AsRef<Path>, params: &ZipParameters) -> Result<Vec<Self>> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        let base = match params.root_folder_name() {
            Some(root) if !root.trim_matches('/').is_empty() => Some(ArchivePath::normalize(root)?),
            _ => None,
        };
        let own_name = match params.name_override() {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| Error::InvalidParameter(format!("{} has no usable file name", path.display())))?
                .to_string(),
        };
        let under_base = |name: &str| -> Result<ArchivePath> {
            match &base {
                Some(base) => base.join(name),
                None => ArchivePath::normalize(name),
            }
        };

        if !metadata.is_dir() {
            return Ok(vec![Operation::Add {
                path: under_base(&own_name)?,
                source: EntrySource::File(path.to_path_buf()),
                meta: EntryMeta::from_metadata(&metadata),
                params: params.clone(),
            }]);
        }

        let root = if params.includes_root_folder() {
            Some(under_base(&own_name)?)
        } else {
            base.clone()
        };
        let mut operations = Vec::new();
        for item in WalkDir::new(path).sort_by_file_name() {
            let item = item.map_err(|e| match e.into_io_error() {
                Some(io) => Error::Io(io),
                None => Error::InvalidParameter(format!("cannot walk {}", path.display())),
            })?;
            let relative = item.path().strip_prefix(path).map_err(|_| {
                Error::InvalidParameter(format!("{} escapes {}", item.path().display(), path.display()))
            })?;
            let entry_path = if relative.as_os_str().is_empty() {
                match &root {
                    Some(root) => root.clone(),
                    None => continue,
                }
            } else {
                let relative = ArchivePath::from_relative_path(relative)?;
                match &root {
                    Some(root) => root.join(relative.as_str())?,
                    None => relative,
                }
            };
            let metadata = item.metadata().map_err(|e| match e.into_io_error() {
                Some(io) => Error::Io(io),
                None => Error::InvalidParameter(format!("cannot stat {}", item.path().display())),
            })?;
            let source = if metadata.is_dir() {
                EntrySource::Directory
            } else {
                EntrySource::File(item.path().to_path_buf())
            };
            operations.push(Operation::Add {
                path: entry_path,
                source,
                meta: EntryMeta::from_metadata(&metadata),
                params: params.clone(),
            });
        }
        Ok(operations)
    }

    /// Returns the operation type as a string.
    pub fn operation_type(&self) -> &'static str {
        match self {
            Operation::Add { .. } => "add",
            Operation::Remove { .. } => "remove",
            Operation::Rename { .. } => "rename",
            Operation::SetComment { .. } => "comment",
        }
    }

    /// Bytes of new data this operation brings in, as far as known.
    #[cfg(test)]
    pub(crate) fn input_size(&self) -> u64 {
        match self {
            Operation::Add { meta, .. } => meta.size,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn added_names(ops: &[Operation]) -> Vec<String> {
        ops.iter()
            .map(|op| match op {
                Operation::Add { path, meta, .. } => path.to_zip_name(meta.is_directory),
                other => other.operation_type().to_string(),
            })
            .collect()
    }

    #[test]
    fn test_add_data_normalizes_name() {
        let op = Operation::add_data("./docs\\a.txt", b"abc".to_vec(), &ZipParameters::default()).unwrap();
        match op {
            Operation::Add { path, meta, .. } => {
                assert_eq!(path.as_str(), "docs/a.txt");
                assert_eq!(meta.size, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Operation::add_data("../x", Vec::new(), &ZipParameters::default()).is_err());
    }

    #[test]
    fn test_add_path_directory_walk() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("photos");
        fs::create_dir_all(root.join("2024")).unwrap();
        fs::write(root.join("a.jpg"), b"a").unwrap();
        fs::write(root.join("2024").join("b.jpg"), b"bb").unwrap();

        let ops = Operation::add_path(&root, &ZipParameters::default()).unwrap();
        assert_eq!(added_names(&ops), ["photos/", "photos/2024/", "photos/2024/b.jpg", "photos/a.jpg"]);

        let flat = ZipParameters::new().include_root_folder(false);
        let ops = Operation::add_path(&root, &flat).unwrap();
        assert_eq!(added_names(&ops), ["2024/", "2024/b.jpg", "a.jpg"]);

        let nested = ZipParameters::new().root_folder("backup");
        let ops = Operation::add_path(&root, &nested).unwrap();
        assert_eq!(added_names(&ops)[0], "backup/photos/");
    }

    #[test]
    fn test_add_path_file_with_override() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.txt");
        fs::write(&file, b"hello").unwrap();
        let params = ZipParameters::new().file_name("renamed.txt").root_folder("docs/");
        let ops = Operation::add_path(&file, &params).unwrap();
        assert_eq!(added_names(&ops), ["docs/renamed.txt"]);
        assert_eq!(ops[0].input_size(), 5);
    }

    #[test]
    fn test_add_path_missing() {
        let err = Operation::add_path("/definitely/not/here", &ZipParameters::default()).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }
}
