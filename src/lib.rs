//! # zipdex
//!
//! An indexed ZIP reader/writer.
//!
//! Opening an archive walks its central directory once and builds an index
//! of every entry. Lookups by name are case-insensitive and filtered by a
//! cheap hash; when two entries share a name the first one wins. Entry data
//! is decoded whole into memory and checked against its CRC-32.
//!
//! ## Features
//!
//! - Open archives from a path, any `Read + Seek` stream, or an HTTP URL
//!   (via Range requests)
//! - ZIP64 archives
//! - STORED and DEFLATE entries, CP437 and UTF-8 names
//! - Create archives from files on disk, one DEFLATE entry per file
//!
//! ## Example
//!
//! ```no_run
//! use zipdex::{ZipArchive, ZipCreator};
//!
//! let mut creator = ZipCreator::new();
//! creator.add_file("notes/Report.TXT", None)?;
//! creator.save_as("out.zip")?;
//!
//! let archive = ZipArchive::open("out.zip");
//! let data = archive.get_data_by_name("notes/report.txt")?;
//! archive.extract_to("notes/report.txt", "extracted", None)?;
//! # Ok::<(), zipdex::ZipError>(())
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Result, ZipError};
pub use io::{HttpRangeReader, LocalFileReader, ReadAt, StreamReader};
pub use zip::{EntryRecord, ZipArchive, ZipCreator};
