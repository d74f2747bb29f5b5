//! Exit codes for the CLI tool.

use zipkit::{Error, ErrorKind};

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Fatal error occurred
pub const FATAL_ERROR: i32 = 2;
/// Archive format error
pub const BAD_ARCHIVE: i32 = 3;
/// Wrong password
pub const WRONG_PASSWORD: i32 = 4;
/// I/O error
pub const IO_ERROR: i32 = 5;
/// A file, entry or volume does not exist
pub const NOT_FOUND: i32 = 6;
/// Ctrl+C (128 + SIGINT)
pub const USER_INTERRUPT: i32 = 130;
/// Invalid command line arguments
pub const BAD_ARGS: i32 = 255;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    FatalError,
    BadArchive,
    WrongPassword,
    IoError,
    NotFound,
    UserInterrupt,
    BadArgs,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::FatalError => FATAL_ERROR,
            Self::BadArchive => BAD_ARCHIVE,
            Self::WrongPassword => WRONG_PASSWORD,
            Self::IoError => IO_ERROR,
            Self::NotFound => NOT_FOUND,
            Self::UserInterrupt => USER_INTERRUPT,
            Self::BadArgs => BAD_ARGS,
        }
    }
}

/// Converts a zipkit error to an exit code
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error.kind() {
        ErrorKind::Io => ExitCode::IoError,
        ErrorKind::NotFound => ExitCode::NotFound,
        ErrorKind::Format => ExitCode::BadArchive,
        ErrorKind::InvalidPassword | ErrorKind::Authentication => ExitCode::WrongPassword,
        ErrorKind::InvalidParameter => ExitCode::BadArgs,
        ErrorKind::IncompleteVolumeSet => ExitCode::NotFound,
        ErrorKind::Cancelled => ExitCode::UserInterrupt,
        _ => ExitCode::FatalError,
    }
}

/// Prints `error` and returns its exit code.
pub fn report(error: &Error) -> ExitCode {
    eprintln!("Error: {}", error);
    error_to_exit_code(error)
}
