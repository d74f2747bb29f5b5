//! Error types for zip archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when working with zip archives, along with a convenient
//! [`Result<T>`] type alias.
//!
//! Every error also maps onto two coarser views:
//!
//! - [`ErrorKind`], the taxonomy callers usually branch on
//!   (not found, format error, wrong password, ...).
//! - [`StatusCode`], the stable integer code reported across the
//!   [`Session`](crate::session::Session) boundary.
//!
//! # Error Handling
//!
//! ```rust,no_run
//! use zipkit::{Error, ErrorKind, ZipFile};
//!
//! fn read_entry(path: &str, name: &str, password: &str) -> zipkit::Result<Vec<u8>> {
//!     let zip = ZipFile::open_with_password(path, password)?;
//!     match zip.extract_data(name) {
//!         Err(e) if e.kind() == ErrorKind::InvalidPassword => {
//!             eprintln!("Incorrect password for {}", name);
//!             Err(e)
//!         }
//!         other => other,
//!     }
//! }
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;

/// How a wrong password was detected.
///
/// Use [`Error::PasswordRequired`] instead when no password was provided at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PasswordDetectionMethod {
    /// The verification value stored in the encryption header did not match.
    ///
    /// For ZipCrypto this is the check byte of the 12-byte header, for WinZip
    /// AES it is the 2-byte password verifier derived alongside the keys.
    VerifierMismatch,

    /// Detected after decompression via CRC-32 mismatch.
    CrcMismatch,

    /// The decrypted data caused the decompressor to fail.
    DecompressionFailure,
}

impl fmt::Display for PasswordDetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VerifierMismatch => write!(f, "password verifier mismatch"),
            Self::CrcMismatch => write!(f, "CRC mismatch after decompression"),
            Self::DecompressionFailure => write!(f, "decompression failure"),
        }
    }
}

struct EntryNameDisplay<'a>(Option<&'a str>);

impl fmt::Display for EntryNameDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(name) => write!(f, " for entry '{}'", name),
            None => Ok(()),
        }
    }
}

/// The main error type for zip archive operations.
///
/// | Category | Variants |
/// |----------|----------|
/// | I/O | [`Io`][Self::Io], [`FileNotFound`][Self::FileNotFound] |
/// | Format | [`InvalidFormat`][Self::InvalidFormat], [`CorruptHeader`][Self::CorruptHeader], [`CrcMismatch`][Self::CrcMismatch] |
/// | Passwords | [`WrongPassword`][Self::WrongPassword], [`AuthenticationFailed`][Self::AuthenticationFailed], [`PasswordRequired`][Self::PasswordRequired] |
/// | Entries | [`EntryNotFound`][Self::EntryNotFound], [`EntryExists`][Self::EntryExists], [`InvalidArchivePath`][Self::InvalidArchivePath] |
/// | Volumes | [`VolumeMissing`][Self::VolumeMissing], [`IncompleteArchive`][Self::IncompleteArchive] |
/// | Boundary | [`InvalidHandle`][Self::InvalidHandle], [`InvalidParameter`][Self::InvalidParameter] |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A file given as a source or an archive expected on disk does not exist.
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// The path that could not be found.
        path: PathBuf,
    },

    /// The data is not a zip archive, or a structural record is missing.
    #[error("Invalid zip format: {0}")]
    InvalidFormat(String),

    /// A record inside the archive is corrupt or truncated.
    ///
    /// The offset is absolute within the (possibly multi-volume) archive.
    #[error("Corrupt header at offset {offset:#x}: {reason}")]
    CorruptHeader {
        /// The byte offset where corruption was detected.
        offset: u64,
        /// A description of the corruption.
        reason: String,
    },

    /// The archive uses a compression method not supported by this build.
    ///
    /// Method `8` (Deflate) requires the `deflate` feature.
    #[error("Unsupported compression method: {method}")]
    UnsupportedMethod {
        /// The zip method number.
        method: u16,
    },

    /// A feature required by the archive or the request is not supported.
    #[error("Unsupported feature: {feature}")]
    UnsupportedFeature {
        /// The name of the unsupported feature.
        feature: &'static str,
    },

    /// The password is incorrect.
    ///
    /// Distinct from corruption: the archive structure is intact but the
    /// supplied password does not unlock the entry.
    #[error("Wrong password{} ({detection_method})", EntryNameDisplay(entry_name.as_deref()))]
    WrongPassword {
        /// The entry where the wrong password was detected (if known).
        entry_name: Option<String>,
        /// How the wrong password was detected.
        detection_method: PasswordDetectionMethod,
    },

    /// The authentication code of an AES entry did not match its contents.
    ///
    /// Raised before any plaintext of the entry is returned.
    #[error("Authentication failed for entry '{entry_name}': data was modified or is corrupt")]
    AuthenticationFailed {
        /// The entry that failed authentication.
        entry_name: String,
    },

    /// An encrypted entry was accessed without a password.
    #[error("Password required to access encrypted entry '{entry_name}'")]
    PasswordRequired {
        /// The encrypted entry.
        entry_name: String,
    },

    /// The operation was cancelled through its progress monitor.
    ///
    /// Rewrite-based operations leave the archive untouched when this is returned.
    #[error("Operation cancelled")]
    Cancelled,

    /// A cryptographic primitive failed (RNG, key setup).
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// The CRC checksum does not match the expected value.
    #[error("CRC mismatch for entry '{entry_name}': expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// The entry with the CRC mismatch.
        entry_name: String,
        /// The expected CRC value from the archive.
        expected: u32,
        /// The actual CRC value of the extracted data.
        actual: u32,
    },

    /// Path traversal detected while extracting an entry.
    ///
    /// Raised when an entry name such as `../../etc/passwd` would escape the
    /// extraction directory.
    #[error("Path traversal detected in entry: {path}")]
    PathTraversal {
        /// The offending entry name.
        path: String,
    },

    /// A resource limit was exceeded (sizes, counts, memory).
    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    /// An entry name is invalid.
    #[error("Invalid archive path: {0}")]
    InvalidArchivePath(String),

    /// A caller-supplied argument is out of range or inconsistent.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A volume file is missing from a split archive.
    ///
    /// All volumes (`.z01`, `.z02`, ... and the final `.zip`) must live in the
    /// same directory.
    #[error("Volume {volume} missing: expected at '{}'", path.display())]
    VolumeMissing {
        /// The zero-based disk number of the missing volume.
        volume: u32,
        /// The expected path.
        path: PathBuf,
        /// The underlying error from opening the volume.
        #[source]
        source: io::Error,
    },

    /// A split archive has fewer volumes than its end record declares.
    #[error("Incomplete volume set: expected {expected} volumes, found {found}")]
    IncompleteArchive {
        /// Number of volumes declared by the archive.
        expected: u32,
        /// Number of volumes found on disk.
        found: u32,
    },

    /// No entry with the given name exists.
    #[error("Entry not found: {name}")]
    EntryNotFound {
        /// The name that was searched for.
        name: String,
    },

    /// An entry index is past the end of the archive.
    #[error("Entry index {index} out of range (archive has {count} entries)")]
    EntryIndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of entries.
        count: usize,
    },

    /// An entry with the given name already exists.
    #[error("Entry already exists: {name}")]
    EntryExists {
        /// The conflicting name.
        name: String,
    },

    /// A compression level outside `0..=9` was requested.
    #[error("Invalid compression level {level}: must be between 0 and 9")]
    InvalidCompressionLevel {
        /// The rejected level.
        level: u32,
    },

    /// A handle no longer refers to a live object.
    ///
    /// Returned when a handle is used after the object it named was closed
    /// or released.
    #[error("Invalid {kind} handle")]
    InvalidHandle {
        /// What kind of object the handle referred to.
        kind: &'static str,
    },

    /// The archive was marked invalid by an earlier fatal error.
    ///
    /// Reopen the archive to clear this state.
    #[error("Archive '{}' is invalid after a fatal error; reopen it to continue", path.display())]
    ArchiveInvalidated {
        /// The archive path.
        path: PathBuf,
    },
}

/// Result type alias for zip operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A handle did not refer to a live object.
    InvalidHandle,
    /// A file or entry does not exist.
    NotFound,
    /// The archive is malformed.
    Format,
    /// An I/O operation failed.
    Io,
    /// A caller-supplied parameter was rejected.
    InvalidParameter,
    /// A size, count or memory limit was hit.
    ResourceExhausted,
    /// Authentication failed or no password was supplied.
    Authentication,
    /// The supplied password is wrong.
    InvalidPassword,
    /// A split archive is missing volumes.
    IncompleteVolumeSet,
    /// The operation was cancelled.
    Cancelled,
    /// The archive or request needs something this build cannot do.
    Unsupported,
    /// Anything else.
    Unknown,
}

/// Integer status codes reported across the session boundary.
///
/// `0` is success, every failure is negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    /// The operation succeeded.
    Success = 0,
    /// A handle was stale or never issued.
    InvalidHandle = -1,
    /// A file on disk was not found.
    FileNotFound = -2,
    /// The archive is malformed or could not be processed.
    ZipException = -3,
    /// An I/O operation failed.
    IoException = -4,
    /// A parameter was rejected.
    InvalidParameter = -5,
    /// A size or memory limit was hit.
    OutOfMemory = -6,
    /// The entry does not exist.
    EntryNotFound = -7,
    /// A caller buffer was too small.
    BufferTooSmall = -8,
    /// The operation was cancelled.
    Cancelled = -9,
    /// The operation is not supported.
    Unsupported = -10,
    /// A required value was absent.
    NullPointer = -11,
    /// The OS denied access.
    PermissionDenied = -12,
    /// The disk is full.
    DiskFull = -13,
    /// The password is wrong.
    InvalidPassword = -14,
    /// Authentication failed or a password is required.
    AuthenticationFailed = -15,
    /// A split archive is missing volumes.
    IncompleteVolumeSet = -16,
    /// Any other failure.
    Unknown = -999,
}

impl StatusCode {
    /// Returns the integer value of this code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Returns the status code describing a result.
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(e) => e.status_code(),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

impl Error {
    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => ErrorKind::NotFound,
                io::ErrorKind::OutOfMemory => ErrorKind::ResourceExhausted,
                _ => ErrorKind::Io,
            },
            Error::FileNotFound { .. }
            | Error::EntryNotFound { .. }
            | Error::EntryIndexOutOfRange { .. } => ErrorKind::NotFound,
            Error::InvalidFormat(_)
            | Error::CorruptHeader { .. }
            | Error::CrcMismatch { .. }
            | Error::PathTraversal { .. }
            | Error::ArchiveInvalidated { .. } => ErrorKind::Format,
            Error::UnsupportedMethod { .. } | Error::UnsupportedFeature { .. } => {
                ErrorKind::Unsupported
            }
            Error::WrongPassword { .. } => ErrorKind::InvalidPassword,
            Error::AuthenticationFailed { .. } | Error::PasswordRequired { .. } => {
                ErrorKind::Authentication
            }
            Error::Cancelled => ErrorKind::Cancelled,
            Error::CryptoError(_) => ErrorKind::Unknown,
            Error::ResourceLimitExceeded(_) => ErrorKind::ResourceExhausted,
            Error::InvalidArchivePath(_)
            | Error::InvalidParameter(_)
            | Error::EntryExists { .. }
            | Error::InvalidCompressionLevel { .. } => ErrorKind::InvalidParameter,
            Error::VolumeMissing { .. } | Error::IncompleteArchive { .. } => {
                ErrorKind::IncompleteVolumeSet
            }
            Error::InvalidHandle { .. } => ErrorKind::InvalidHandle,
        }
    }

    /// Returns the integer status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Io(e) => match e.kind() {
                io::ErrorKind::NotFound => StatusCode::FileNotFound,
                io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
                io::ErrorKind::StorageFull => StatusCode::DiskFull,
                io::ErrorKind::OutOfMemory => StatusCode::OutOfMemory,
                _ => StatusCode::IoException,
            },
            Error::FileNotFound { .. } => StatusCode::FileNotFound,
            Error::EntryNotFound { .. } | Error::EntryIndexOutOfRange { .. } => {
                StatusCode::EntryNotFound
            }
            Error::Cancelled => StatusCode::Cancelled,
            Error::CryptoError(_) => StatusCode::Unknown,
            _ => match self.kind() {
                ErrorKind::InvalidHandle => StatusCode::InvalidHandle,
                ErrorKind::Format => StatusCode::ZipException,
                ErrorKind::InvalidParameter => StatusCode::InvalidParameter,
                ErrorKind::ResourceExhausted => StatusCode::OutOfMemory,
                ErrorKind::Authentication => StatusCode::AuthenticationFailed,
                ErrorKind::InvalidPassword => StatusCode::InvalidPassword,
                ErrorKind::IncompleteVolumeSet => StatusCode::IncompleteVolumeSet,
                ErrorKind::Unsupported => StatusCode::Unsupported,
                _ => StatusCode::Unknown,
            },
        }
    }

    /// Returns true if retrying with different input could succeed.
    ///
    /// Wrong passwords, missing volumes, cancellation and missing files are
    /// recoverable. Structural corruption is not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidPassword
                | ErrorKind::Authentication
                | ErrorKind::IncompleteVolumeSet
                | ErrorKind::Cancelled
                | ErrorKind::NotFound
                | ErrorKind::InvalidParameter
        )
    }

    /// Returns true if this error indicates a damaged archive.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::InvalidFormat(_) | Error::CorruptHeader { .. } | Error::CrcMismatch { .. }
        )
    }

    /// Returns true if this error is about passwords or encryption.
    pub fn is_encryption_error(&self) -> bool {
        matches!(
            self,
            Error::WrongPassword { .. }
                | Error::AuthenticationFailed { .. }
                | Error::PasswordRequired { .. }
                | Error::CryptoError(_)
        )
    }

    /// Returns the entry name associated with this error, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Error::WrongPassword { entry_name, .. } => entry_name.as_deref(),
            Error::AuthenticationFailed { entry_name }
            | Error::PasswordRequired { entry_name }
            | Error::CrcMismatch { entry_name, .. } => Some(entry_name),
            Error::EntryNotFound { name } | Error::EntryExists { name } => Some(name),
            Error::PathTraversal { path } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Error::CorruptHeader {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn wrong_password(
        entry_name: impl Into<String>,
        detection_method: PasswordDetectionMethod,
    ) -> Self {
        Error::WrongPassword {
            entry_name: Some(entry_name.into()),
            detection_method,
        }
    }

    pub(crate) fn entry_not_found(name: impl Into<String>) -> Self {
        Error::EntryNotFound { name: name.into() }
    }
}

/// Recovers an [`Error`] tunnelled through an `io::Error`.
///
/// Readers in this crate report failures through `std::io::Read`, which
/// forces our errors into `io::Error::other`. This unwraps them again so
/// callers see the original kind.
pub fn map_io_error(e: io::Error) -> Error {
    if !e.get_ref().is_some_and(|inner| inner.is::<Error>()) {
        return Error::Io(e);
    }
    let kind = e.kind();
    match e.into_inner().map(|inner| inner.downcast::<Error>()) {
        Some(Ok(err)) => *err,
        Some(Err(other)) => Error::Io(io::Error::new(kind, other)),
        None => Error::Io(io::Error::from(kind)),
    }
}

/// Tunnels an [`Error`] through `std::io::Read`.
pub(crate) fn into_io_error(e: Error) -> io::Error {
    match e {
        Error::Io(io) => io,
        other => io::Error::other(other),
    }
}
