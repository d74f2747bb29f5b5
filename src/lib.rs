//! # zipkit
//!
//! A pure-Rust engine for reading, writing and editing zip archives.
//!
//! Archives are opened as a [`ZipFile`], which keeps an index of the entries
//! in memory and rewrites the archive on every change. Entries can be stored
//! or Deflate-compressed and encrypted with ZipCrypto or WinZip AES. Archives
//! can be split across fixed-size volumes and merged back.
//!
//! ## Quick Start
//!
//! ### Creating an Archive
//!
//! ```rust,no_run
//! use zipkit::{CompressionMethod, Result, ZipFile, ZipParameters};
//!
//! fn main() -> Result<()> {
//!     let mut zip = ZipFile::create("new.zip")?;
//!
//!     // Add files or whole directories from disk
//!     zip.add_file("file.txt", &ZipParameters::default())?;
//!
//!     // Add data from memory, uncompressed
//!     let stored = ZipParameters::new().compression(CompressionMethod::Store);
//!     zip.add_data("hello.txt", b"Hello, World!", &stored)?;
//!     Ok(())
//! }
//! ```
//!
//! ### Extracting an Archive
//!
//! ```rust,no_run
//! use zipkit::{Result, ZipFile};
//!
//! fn main() -> Result<()> {
//!     let zip = ZipFile::open("archive.zip")?;
//!
//!     for entry in zip.entries() {
//!         println!("{}: {} bytes", entry.name, entry.size);
//!     }
//!
//!     zip.extract_all("./output")?;
//!     Ok(())
//! }
//! ```
//!
//! ### Encryption
//!
//! ```rust,no_run
//! use zipkit::{EncryptionMethod, Result, ZipFile, ZipParameters};
//!
//! fn main() -> Result<()> {
//!     let mut zip = ZipFile::create("secret.zip")?;
//!     zip.set_password("secret123");
//!     let params = ZipParameters::new().encryption(EncryptionMethod::AES_256);
//!     zip.add_data("notes.txt", b"Secret data", &params)?;
//!
//!     let zip = ZipFile::open_with_password("secret.zip", "secret123")?;
//!     assert_eq!(zip.extract_data("notes.txt")?, b"Secret data");
//!     Ok(())
//! }
//! ```
//!
//! ### Split Archives
//!
//! ```rust,no_run
//! use zipkit::{Result, ZipFile, ZipParameters};
//!
//! fn main() -> Result<()> {
//!     let mut zip = ZipFile::create_split("parts.zip", 1024 * 1024)?;
//!     zip.add_file("big.iso", &ZipParameters::default())?;
//!     println!("volumes: {:?}", zip.split_files());
//!
//!     zip.merge_split_files("whole.zip")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Deflate compression |
//! | `aes` | Yes | WinZip AES encryption |
//! | `cli` | No | Command-line interface tool |
//!
//! ZipCrypto is always available.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`]. Every [`Error`] maps to an
//! [`ErrorKind`] and a stable integer [`StatusCode`]:
//!
//! ```rust,no_run
//! use zipkit::{Error, ZipFile};
//!
//! fn read_one(path: &str) -> zipkit::Result<Vec<u8>> {
//!     let zip = ZipFile::open_with_password(path, "guess")?;
//!     match zip.extract_data("x.txt") {
//!         Err(e @ Error::WrongPassword { .. }) => {
//!             eprintln!("Incorrect password (status {})", e.status_code().code());
//!             Err(e)
//!         }
//!         other => other,
//!     }
//! }
//! # fn main() {}
//! ```
//!
//! ## Safety
//!
//! - **Path traversal protection**: entry names cannot escape the
//!   extraction directory ([`PathSafety`]).
//! - **Size checks**: decompressed output may not exceed the declared size.
//! - **Integrity**: CRC-32 and AES authentication codes are verified.
//! - **Atomic edits**: a failed or cancelled change leaves the archive
//!   untouched.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

/// Default buffer size for read operations (8 KiB).
pub(crate) const READ_BUFFER_SIZE: usize = 8192;

/// Default buffer size for file output (64 KiB).
pub(crate) const WRITE_BUFFER_SIZE: usize = 64 * 1024;

pub mod archive_path;
pub mod checksum;
pub mod codec;
pub mod crypto;
pub mod edit;
pub mod error;
pub mod format;
pub mod index;
pub mod progress;
pub mod read;
pub mod safety;
pub mod session;
pub mod task;
pub mod timestamp;
pub mod volume;
pub mod write;
mod zipfile;

pub use archive_path::ArchivePath;
pub use error::{Error, ErrorKind, PasswordDetectionMethod, Result, StatusCode};
pub use timestamp::DosDateTime;

pub use codec::{CompressionLevel, CompressionMethod};
pub use crypto::{AesStrength, EncryptionMethod, Password};

// Archive facade
pub use index::ArchiveIndex;
pub use zipfile::ZipFile;

// Reading
pub use read::{Entry, EntryReader, ExtractOptions, OverwritePolicy, PathSafety};

// Writing and editing
pub use edit::{EditResult, Operation};
pub use write::{EntryMeta, ZipParameters};

// Split archives
pub use volume::{MAX_VOLUMES, MIN_VOLUME_SIZE, SplitConfig};

// Progress and background work
pub use progress::{MonitorState, NoProgress, OperationKind, Outcome, ProgressMonitor, ProgressReporter, progress_fn};
pub use task::BackgroundTask;

// Handle boundary
pub use session::{ArchiveHandle, EntryHandle, MonitorHandle, Session, StreamHandle, status_of};
