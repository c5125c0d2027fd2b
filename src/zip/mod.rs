//! ZIP archive indexing, extraction and creation.
//!
//! ## Architecture
//!
//! - [`structures`]: on-disk records (EOCD, ZIP64 records, entry descriptors)
//!   and DOS time conversion
//! - [`parser`]: reads those records from any [`ReadAt`](crate::io::ReadAt) source
//! - [`index`]: the per-archive entry index with case-insensitive lookup
//! - [`archive`]: [`ZipArchive`], the read-side handle
//! - [`writer`] and [`creator`]: [`ZipWriter`] and the file-queueing [`ZipCreator`]
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Archives are enumerated from the central directory, never by scanning
//! local headers. Entry names are CP437 unless general purpose bit 11 marks
//! them UTF-8.
//!
//! ## Limitations
//!
//! - Encrypted entries are listed but not decoded
//! - Only STORED and DEFLATE are read; only DEFLATE is written
//! - No multi-disk archive support

pub mod archive;
pub mod cp437;
pub mod creator;
pub mod hash;
pub mod index;
pub mod parser;
pub mod structures;
pub mod writer;

pub use archive::{ZipArchive, destination_path, join_with_separator, payload_len};
pub use creator::{PendingEntry, ZipCreator};
pub use hash::quick_hash;
pub use index::{ArchiveIndex, EntryRecord, Locator};
pub use parser::{CentralDirectory, ZipParser};
pub use structures::*;
pub use writer::ZipWriter;
