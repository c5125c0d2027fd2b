//! Read access to indexed archives.
//!
//! [`ZipArchive`] walks the central directory once on open and answers
//! lookups, metadata queries, decoding and extraction from that index.

use flate2::read::DeflateDecoder;
use std::io::{self, Cursor, Read, Seek};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Result, ZipError};
use crate::io::{LocalFileReader, ReadAt, StreamReader};

use super::index::{ArchiveIndex, EntryRecord, Locator};
use super::parser::{CentralDirectory, ZipParser};
use super::structures::{CompressionMethod, EntryInfo};

/// Bytes reserved after every payload for a two-byte terminator.
const TERMINATOR_LEN: usize = 2;

struct OpenArchive<R: ReadAt> {
    parser: ZipParser<R>,
    dir: CentralDirectory,
}

/// An indexed, read-only ZIP archive.
///
/// The entry index is built once when the archive is opened. A handle whose
/// source could not be opened is *closed*: it has no entries and every read
/// fails with [`ZipError::Closed`] instead of panicking.
///
/// ```no_run
/// use zipdex::ZipArchive;
///
/// let archive = ZipArchive::open("book.epub");
/// if let Some(i) = archive.find_index("META-INF/container.xml") {
///     let xml = archive.get_data(i)?;
///     println!("{} bytes", xml.len());
/// }
/// # Ok::<(), zipdex::ZipError>(())
/// ```
pub struct ZipArchive<R: ReadAt> {
    inner: Option<OpenArchive<R>>,
    index: ArchiveIndex,
}

impl ZipArchive<LocalFileReader> {
    /// Open an archive on disk, yielding a closed handle on failure.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::try_open(path).unwrap_or_else(|e| {
            log::debug!("cannot open {}: {}", path.display(), e);
            Self::closed()
        })
    }

    /// Open an archive on disk, reporting why it failed.
    pub fn try_open(path: impl AsRef<Path>) -> Result<Self> {
        let reader = LocalFileReader::new(path.as_ref())
            .map_err(|e| ZipError::Open(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::try_from_reader(reader)
    }
}

impl<S: Read + Seek> ZipArchive<StreamReader<S>> {
    /// Open an archive held in a seekable stream, yielding a closed handle
    /// on failure.
    pub fn from_stream(stream: S) -> Self {
        match StreamReader::new(stream) {
            Ok(reader) => Self::from_reader(reader),
            Err(e) => {
                log::debug!("cannot size archive stream: {}", e);
                Self::closed()
            }
        }
    }
}

impl ZipArchive<StreamReader<Cursor<Vec<u8>>>> {
    /// Open an archive from bytes already in memory.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::from_stream(Cursor::new(bytes))
    }
}

impl<R: ReadAt> ZipArchive<R> {
    /// Open an archive from any random-access source, yielding a closed
    /// handle on failure.
    pub fn from_reader(reader: R) -> Self {
        Self::try_from_reader(reader).unwrap_or_else(|e| {
            log::debug!("cannot open archive: {}", e);
            Self::closed()
        })
    }

    /// Open an archive from any random-access source.
    pub fn try_from_reader(reader: R) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let dir = parser.central_directory()?;
        let index = Self::build_index(&parser, &dir);
        Ok(Self {
            inner: Some(OpenArchive { parser, dir }),
            index,
        })
    }

    fn closed() -> Self {
        Self {
            inner: None,
            index: ArchiveIndex::new(),
        }
    }

    /// Single pass over the central directory.
    fn build_index(parser: &ZipParser<R>, dir: &CentralDirectory) -> ArchiveIndex {
        parser
            .list_entries(dir)
            .into_iter()
            .map(|info| {
                let locator = parser
                    .is_plausible_offset(info.lfh_offset)
                    .then_some(Locator {
                        lfh_offset: info.lfh_offset,
                    });
                EntryRecord::new(info, locator)
            })
            .collect()
    }

    /// Release the source. The handle behaves as closed afterwards.
    pub fn close(&mut self) {
        self.inner = None;
        self.index = ArchiveIndex::new();
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Length of the archive comment, 0 when closed.
    pub fn comment_len(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |open| open.dir.comment_len as usize)
    }

    pub fn file_name(&self, index: usize) -> Option<&str> {
        self.index.get(index).map(|r| r.name.as_str())
    }

    pub fn entry(&self, index: usize) -> Option<&EntryRecord> {
        self.index.get(index)
    }

    /// Entries in archive order.
    pub fn entries(&self) -> impl Iterator<Item = &EntryRecord> {
        self.index.iter()
    }

    /// Lowest index whose name matches `name` ignoring case.
    pub fn find_index(&self, name: &str) -> Option<usize> {
        self.index.find_index(name)
    }

    /// The source this archive reads from, if open.
    pub fn reader(&self) -> Option<&R> {
        self.inner.as_ref().map(|open| open.parser.reader())
    }

    /// Decode the full contents of entry `index`.
    ///
    /// The payload is CRC-checked; a short read or a CRC mismatch is an
    /// error. The handle stays usable after any failure.
    pub fn get_data(&self, index: usize) -> Result<Vec<u8>> {
        let open = self.inner.as_ref().ok_or(ZipError::Closed)?;
        let record = self.index.get(index).ok_or(ZipError::IndexOutOfRange {
            index,
            count: self.index.len(),
        })?;
        let info = &record.info;

        let data_offset = Self::locate(open, record)?;

        if info.is_encrypted() {
            return Err(ZipError::Unsupported(format!(
                "{} is encrypted",
                record.name
            )));
        }

        let size = payload_len(info.uncompressed_size)?;
        let mut data = alloc_payload(size)?;

        match info.compression_method {
            CompressionMethod::Stored => {
                if info.compressed_size != info.uncompressed_size {
                    return Err(ZipError::Corrupt(format!(
                        "{}: stored entry sizes differ ({} vs {})",
                        record.name, info.compressed_size, info.uncompressed_size
                    )));
                }
                data.resize(size, 0);
                let n = open.parser.reader().read_full_at(data_offset, &mut data)?;
                data.truncate(n);
            }
            CompressionMethod::Deflate => {
                let compressed = open.parser.read_data(data_offset, info.compressed_size)?;
                if (compressed.len() as u64) < info.compressed_size {
                    return Err(ZipError::Corrupt(format!(
                        "{}: archive ends inside compressed data",
                        record.name
                    )));
                }
                let decoder = DeflateDecoder::new(compressed.as_slice());
                decoder
                    .take(size as u64)
                    .read_to_end(&mut data)
                    .map_err(|e| ZipError::Corrupt(format!("{}: {}", record.name, e)))?;
            }
            CompressionMethod::Unknown(m) => {
                return Err(ZipError::Unsupported(format!(
                    "{} uses compression method {}",
                    record.name, m
                )));
            }
        }

        if data.len() != size {
            return Err(ZipError::Corrupt(format!(
                "{}: expected {} bytes, read {}",
                record.name,
                size,
                data.len()
            )));
        }

        let computed = crc32fast::hash(&data);
        if computed != info.crc32 {
            return Err(ZipError::CrcMismatch {
                expected: info.crc32,
                computed,
            });
        }

        Ok(data)
    }

    /// Decode the full contents of the entry named `name`.
    pub fn get_data_by_name(&self, name: &str) -> Result<Vec<u8>> {
        if !self.is_open() {
            return Err(ZipError::Closed);
        }
        let index = self
            .find_index(name)
            .ok_or_else(|| ZipError::NotFound(name.to_string()))?;
        self.get_data(index)
    }

    /// Find where the entry's data starts.
    ///
    /// Tries the cached locator first, then searches the central directory
    /// for the name re-encoded the way it was stored.
    fn locate(open: &OpenArchive<R>, record: &EntryRecord) -> Result<u64> {
        if let Some(locator) = record.locator {
            match open.parser.data_offset(locator.lfh_offset) {
                Ok(offset) => return Ok(offset),
                Err(e) => log::debug!("stale locator for {}: {}", record.name, e),
            }
        }

        let raw_name = record.info.name_encoding().encode(&record.name);
        let found: EntryInfo = open
            .parser
            .locate_by_name(&open.dir, &raw_name)
            .ok_or_else(|| ZipError::NotFound(record.name.clone()))?;
        open.parser.data_offset(found.lfh_offset)
    }

    /// The archive-level comment.
    pub fn comment(&self) -> Result<Vec<u8>> {
        let open = self.inner.as_ref().ok_or(ZipError::Closed)?;
        let comment = open.parser.read_comment(&open.dir)?;
        if comment.is_empty() {
            return Err(ZipError::NotFound("archive comment".to_string()));
        }
        Ok(comment)
    }

    /// Modification time of entry `index`.
    ///
    /// `None` when the handle is closed, the index is unknown, or the
    /// stored DOS fields are not a valid date.
    pub fn file_time(&self, index: usize) -> Option<SystemTime> {
        self.inner.as_ref()?;
        self.index.get(index)?.info.modified()
    }

    /// Modification time of the entry named `name`.
    pub fn file_time_by_name(&self, name: &str) -> Option<SystemTime> {
        self.file_time(self.find_index(name)?)
    }

    /// Write the entry named `name` into `dest_dir`.
    ///
    /// The file is written as `override_name` when given, otherwise under
    /// the entry name with `/` mapped to the host separator. Missing parent
    /// directories are created. Returns the path written.
    pub fn extract_to(
        &self,
        name: &str,
        dest_dir: impl AsRef<Path>,
        override_name: Option<&str>,
    ) -> Result<PathBuf> {
        let data = self.get_data_by_name(name)?;
        let path = destination_path(dest_dir.as_ref(), name, override_name);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&path, &data)?;

        Ok(path)
    }
}

/// Payload length for an entry, guarding the platform size type.
///
/// Fails when the size does not fit in `usize` or when adding the
/// terminator padding would wrap.
pub fn payload_len(uncompressed_size: u64) -> Result<usize> {
    let size =
        usize::try_from(uncompressed_size).map_err(|_| ZipError::Overflow(uncompressed_size))?;
    size.checked_add(TERMINATOR_LEN)
        .ok_or(ZipError::Overflow(uncompressed_size))?;
    Ok(size)
}

/// Empty buffer with room for `size` bytes plus the terminator.
fn alloc_payload(size: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size + TERMINATOR_LEN)
        .map_err(|_| ZipError::Io(io::Error::from(io::ErrorKind::OutOfMemory)))?;
    Ok(buf)
}

/// Join `dest_dir` and an entry name with exactly one `separator` between.
///
/// `override_name` is used as-is; otherwise `/` in `name` becomes
/// `separator`. An empty `dest_dir` is the current directory.
pub fn join_with_separator(
    dest_dir: &str,
    name: &str,
    override_name: Option<&str>,
    separator: char,
) -> String {
    let mut path = String::with_capacity(dest_dir.len() + name.len() + 1);
    path.push_str(dest_dir);
    if !path.is_empty() && !path.ends_with(separator) {
        path.push(separator);
    }
    path.push_str(&relative_name(name, override_name, separator));
    path
}

/// Host path an entry is extracted to.
pub fn destination_path(dest_dir: &Path, name: &str, override_name: Option<&str>) -> PathBuf {
    if dest_dir.as_os_str().is_empty() {
        return PathBuf::from(relative_name(name, override_name, MAIN_SEPARATOR));
    }
    let mut path = dest_dir.as_os_str().to_owned();
    if !dest_dir.to_string_lossy().ends_with(MAIN_SEPARATOR) {
        path.push(MAIN_SEPARATOR.to_string());
    }
    path.push(relative_name(name, override_name, MAIN_SEPARATOR));
    PathBuf::from(path)
}

fn relative_name(name: &str, override_name: Option<&str>, separator: char) -> String {
    match override_name {
        Some(o) => o.to_string(),
        None => name.replace('/', &separator.to_string()),
    }
}
