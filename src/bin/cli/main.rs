//! CLI tool for zipkit archive operations.

mod commands;
mod exit_codes;
mod output;
mod password;
mod progress;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Zip archive tool
#[derive(Parser)]
#[command(name = "zipkit")]
#[command(author, version, about = "Zip archive tool", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Suppress progress output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Log verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List archive contents (alias: l)
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Show packed size, method, encryption and CRC
        #[arg(long)]
        technical: bool,
    },

    /// Add files to an archive, creating it if needed (alias: a)
    #[command(alias = "a")]
    Add {
        /// Archive file
        archive: PathBuf,

        /// Files and directories to add
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Compression method
        #[arg(short = 'm', long, value_enum, default_value = "deflate")]
        method: Method,

        /// Compression level (0-9)
        #[arg(short = 'l', long, default_value = "6")]
        level: u32,

        /// Encryption method
        #[arg(short = 'e', long, value_enum, default_value = "none")]
        encryption: Encryption,

        /// Password (prompted for when encrypting without one)
        #[arg(short = 'p', long, env = "ZIPKIT_PASSWORD")]
        password: Option<String>,

        /// Folder inside the archive to add below
        #[arg(long)]
        root: Option<String>,

        /// Write a split archive with volumes of this many bytes
        #[arg(long)]
        split: Option<u64>,
    },

    /// Extract files from an archive (alias: x)
    #[command(alias = "x")]
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Entries to extract (all when omitted)
        entries: Vec<String>,

        /// Output directory
        #[arg(short = 'o', long, default_value = ".")]
        output: PathBuf,

        /// What to do with existing files
        #[arg(long, value_enum, default_value = "always")]
        overwrite: OverwriteMode,

        /// Password (prompted for when needed)
        #[arg(short = 'p', long, env = "ZIPKIT_PASSWORD")]
        password: Option<String>,
    },

    /// Test archive integrity (alias: t)
    #[command(alias = "t")]
    Test {
        /// Archive file to test
        archive: PathBuf,

        /// Password (prompted for when needed)
        #[arg(short = 'p', long, env = "ZIPKIT_PASSWORD")]
        password: Option<String>,
    },

    /// Remove entries from an archive (alias: d)
    #[command(alias = "d")]
    Remove {
        /// Archive file
        archive: PathBuf,

        /// Entries to remove; directories are removed with their contents
        #[arg(required = true)]
        entries: Vec<String>,
    },

    /// Rename an entry
    Rename {
        /// Archive file
        archive: PathBuf,

        /// Current entry name
        from: String,

        /// New entry name
        to: String,
    },

    /// Show or set the archive comment
    Comment {
        /// Archive file
        archive: PathBuf,

        /// New comment; prints the current one when omitted
        text: Option<String>,
    },

    /// Write an archive as a split archive
    Split {
        /// Archive file to split
        archive: PathBuf,

        /// Path of the final .zip volume
        output: PathBuf,

        /// Maximum volume size in bytes
        #[arg(short = 's', long)]
        size: u64,
    },

    /// Merge a split archive into one file
    Merge {
        /// Final .zip volume of the split archive
        archive: PathBuf,

        /// Output archive
        output: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Method {
    Store,
    Deflate,
}

impl From<Method> for zipkit::CompressionMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Store => zipkit::CompressionMethod::Store,
            Method::Deflate => zipkit::CompressionMethod::Deflate,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Encryption {
    None,
    Standard,
    Aes128,
    Aes256,
}

impl From<Encryption> for zipkit::EncryptionMethod {
    fn from(encryption: Encryption) -> Self {
        match encryption {
            Encryption::None => zipkit::EncryptionMethod::None,
            Encryption::Standard => zipkit::EncryptionMethod::ZipCrypto,
            Encryption::Aes128 => zipkit::EncryptionMethod::AES_128,
            Encryption::Aes256 => zipkit::EncryptionMethod::AES_256,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OverwriteMode {
    Always,
    Never,
    Error,
}

impl From<OverwriteMode> for zipkit::OverwritePolicy {
    fn from(mode: OverwriteMode) -> Self {
        match mode {
            OverwriteMode::Always => zipkit::OverwritePolicy::Overwrite,
            OverwriteMode::Never => zipkit::OverwritePolicy::Skip,
            OverwriteMode::Error => zipkit::OverwritePolicy::Error,
        }
    }
}

fn main() {
    // Ctrl+C cancels the running operation; the archive is left untouched
    ctrlc::set_handler(progress::request_interrupt).ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let quiet = cli.quiet;
    let exit_code = match cli.command {
        Commands::List { archive, technical } => commands::list(&archive, technical),

        Commands::Add {
            archive,
            files,
            method,
            level,
            encryption,
            password,
            root,
            split,
        } => commands::add(&commands::AddConfig {
            archive_path: &archive,
            files: &files,
            method,
            level,
            encryption,
            password,
            root: root.as_deref(),
            split,
            quiet,
        }),

        Commands::Extract {
            archive,
            entries,
            output,
            overwrite,
            password,
        } => commands::extract(&commands::ExtractConfig {
            archive_path: &archive,
            entries: &entries,
            output_dir: &output,
            overwrite,
            password,
            quiet,
        }),

        Commands::Test { archive, password } => commands::test(&archive, password, quiet),

        Commands::Remove { archive, entries } => commands::remove(&archive, &entries, quiet),

        Commands::Rename { archive, from, to } => commands::rename(&archive, &from, &to, quiet),

        Commands::Comment { archive, text } => commands::comment(&archive, text.as_deref()),

        Commands::Split { archive, output, size } => commands::split(&archive, &output, size, quiet),

        Commands::Merge { archive, output } => commands::merge(&archive, &output, quiet),
    };

    std::process::exit(exit_code.code());
}

/// Routes library log records to stderr.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}
