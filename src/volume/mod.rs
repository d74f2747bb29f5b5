//! Split archive support.
//!
//! A split archive is an ordinary zip archive whose bytes are spread over
//! numbered volume files of bounded size:
//!
//! - `archive.z01` - first volume, starting with the split marker
//! - `archive.z02`, ... - further volumes
//! - `archive.zip` - last volume, holding the end of central directory
//!
//! Entry payloads may cross a volume boundary, but local headers, central
//! directory records and the end records never do. Every offset stored in
//! the archive is relative to the volume it points into.
//!
//! # Writing
//!
//! ```rust,no_run
//! use zipkit::{ZipFile, ZipParameters};
//!
//! let mut zip = ZipFile::create_split("backup.zip", 10 * 1024 * 1024)?;
//! zip.add_file("big.iso", &ZipParameters::default())?;
//! for path in zip.split_files() {
//!     println!("{}", path.display());
//! }
//! # Ok::<(), zipkit::Error>(())
//! ```
//!
//! # Reading and merging
//!
//! Open the `.zip` volume; the others are found next to it.
//!
//! ```rust,no_run
//! use zipkit::ZipFile;
//!
//! let mut zip = ZipFile::open("backup.zip")?;
//! assert!(zip.is_split());
//! zip.merge_split_files("merged.zip")?;
//! # Ok::<(), zipkit::Error>(())
//! ```

mod config;
mod merge;
mod reader;
mod writer;

pub use config::{MAX_VOLUMES, MIN_VOLUME_SIZE, SplitConfig, split_volume_path, volume_path};
pub use merge::merge_volumes;
pub use reader::{VolumeReader, VolumeSet};
pub use writer::SplitWriter;
