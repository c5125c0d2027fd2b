//! Record-level reads over a [`ReadAt`] source.
//!
//! An archive is opened from its tail: the end record (possibly behind a
//! comment, possibly deferring to ZIP64 records) says where the central
//! directory is, and the central directory is the only list of entries.
//! Local headers are read only to find where an entry's data begins.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::error::{Result, ZipError};
use crate::io::ReadAt;

use super::structures::*;

/// Longest archive comment; bounds the backwards search for the end record.
const MAX_COMMENT_SIZE: u64 = u16::MAX as u64;

/// Where the central directory lives, as announced by the EOCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralDirectory {
    pub offset: u64,
    pub size: u64,
    pub total_entries: u64,
    pub comment_offset: u64,
    pub comment_len: u16,
}

/// Low-level ZIP file parser.
///
/// Generic over the reader type so the same code serves local files,
/// in-memory streams and HTTP sources. Typically used through
/// [`ZipArchive`](super::ZipArchive) rather than directly.
pub struct ZipParser<R: ReadAt> {
    reader: R,
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Read exactly `buf.len()` bytes at `offset` or fail as corrupt.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8], what: &str) -> Result<()> {
        let n = self.reader.read_full_at(offset, buf)?;
        if n != buf.len() {
            return Err(ZipError::Corrupt(format!(
                "{what}: expected {} bytes at offset {offset}, got {n}",
                buf.len()
            )));
        }
        Ok(())
    }

    /// Locate the end record, returning it with its offset.
    ///
    /// The record is the last 22 bytes unless a comment follows it; then the
    /// tail is scanned backwards for a signature whose comment length
    /// reaches exactly to the end of the source. Failing that, the last
    /// signature with room for a whole record is taken, so archives with
    /// bytes appended after them still open.
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        const SIZE: usize = EndOfCentralDirectory::SIZE;
        if self.size < SIZE as u64 {
            return Err(ZipError::Open("file too small to be a ZIP archive".to_string()));
        }

        let tail_len = (MAX_COMMENT_SIZE + SIZE as u64).min(self.size);
        let tail_start = self.size - tail_len;
        let mut tail = vec![0u8; tail_len as usize];
        self.read_exact_at(tail_start, &mut tail, "archive tail")?;

        let mut last_fit = None;
        let mut exact = None;
        for i in (0..=tail.len() - SIZE).rev() {
            if !tail[i..].starts_with(EndOfCentralDirectory::SIGNATURE) {
                continue;
            }
            let comment_len = u16::from_le_bytes([tail[i + 20], tail[i + 21]]) as usize;
            if i + SIZE + comment_len == tail.len() {
                exact = Some(i);
                break;
            }
            last_fit.get_or_insert(i);
        }

        let i = match (exact, last_fit) {
            (Some(i), _) => i,
            (None, Some(i)) => {
                log::debug!(
                    "end record at {} does not reach the end of the source",
                    tail_start + i as u64
                );
                i
            }
            (None, None) => {
                return Err(ZipError::Open("no end of central directory record".to_string()));
            }
        };
        let eocd = EndOfCentralDirectory::from_bytes(&tail[i..i + SIZE])?;
        Ok((eocd, tail_start + i as u64))
    }

    /// Follow the locator that sits right before the end record at
    /// `eocd_offset` to the ZIP64 end record.
    pub fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(|| ZipError::Open("missing ZIP64 locator".to_string()))?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.read_exact_at(locator_offset, &mut locator_buf, "ZIP64 locator")?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.read_exact_at(locator.eocd64_offset, &mut eocd64_buf, "ZIP64 EOCD")?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// Locate the central directory and the archive comment.
    pub fn central_directory(&self) -> Result<CentralDirectory> {
        let (eocd, eocd_offset) = self.find_eocd()?;

        let (offset, size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset)?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            )
        };

        if offset > eocd_offset {
            return Err(ZipError::Open(format!(
                "central directory offset {offset} lies past the end record"
            )));
        }

        Ok(CentralDirectory {
            offset,
            size,
            total_entries,
            comment_offset: eocd_offset + EndOfCentralDirectory::SIZE as u64,
            comment_len: eocd.comment_len,
        })
    }

    /// Walk the central directory in on-disk order.
    ///
    /// Stops at the first header that cannot be decoded and returns the
    /// entries collected so far. Never reads past the data the source
    /// actually returns, whatever the announced entry count.
    pub fn list_entries(&self, dir: &CentralDirectory) -> Vec<EntryInfo> {
        let available = self.size.saturating_sub(dir.offset);
        let cd_len = dir.size.min(available) as usize;

        let mut cd_data = vec![0u8; cd_len];
        let cd_len = match self.reader.read_full_at(dir.offset, &mut cd_data) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("cannot read central directory: {}", e);
                return Vec::new();
            }
        };
        cd_data.truncate(cd_len);

        let max_entries = (cd_len / CDFH_MIN_SIZE) as u64;
        let mut entries = Vec::with_capacity(dir.total_entries.min(max_entries) as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for i in 0..dir.total_entries {
            match Self::parse_cdfh(&mut cursor) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    log::warn!(
                        "central directory walk stopped at entry {} of {}: {}",
                        i,
                        dir.total_entries,
                        e
                    );
                    break;
                }
            }
        }

        entries
    }

    /// Parse a Central Directory File Header from a cursor.
    fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<EntryInfo> {
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            return Err(ZipError::Corrupt(
                "invalid central directory file header".to_string(),
            ));
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut raw_name = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut raw_name)?;

        let mut extra = vec![0u8; extra_field_length as usize];
        cursor.read_exact(&mut extra)?;

        let mut raw_comment = vec![0u8; file_comment_length as usize];
        cursor.read_exact(&mut raw_comment)?;

        // ZIP64 values are present only for header fields saturated to 0xFFFFFFFF
        if let Some(zip64) = find_extra_field(&extra, ZIP64_EXTRA_ID) {
            let mut field = Cursor::new(zip64);
            if uncompressed_size == 0xFFFFFFFF {
                uncompressed_size = field.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF {
                compressed_size = field.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == 0xFFFFFFFF {
                lfh_offset = field.read_u64::<LittleEndian>()?;
            }
        }

        let comment = NameEncoding::from_flags(flags).decode(&raw_comment);

        Ok(EntryInfo {
            raw_name,
            flags,
            compression_method: CompressionMethod::from(compression_method),
            compressed_size,
            uncompressed_size,
            crc32,
            last_mod_time,
            last_mod_date,
            lfh_offset,
            comment,
        })
    }

    /// Search the central directory for an entry by its stored name bytes.
    pub fn locate_by_name(&self, dir: &CentralDirectory, raw_name: &[u8]) -> Option<EntryInfo> {
        self.list_entries(dir)
            .into_iter()
            .find(|e| e.raw_name == raw_name)
    }

    /// Get the actual data offset for an entry.
    ///
    /// The Local File Header has variable-length fields that may differ from
    /// the central directory copy, so it is read to find where data begins.
    /// Fails if there is no local header signature at `lfh_offset`.
    pub fn data_offset(&self, lfh_offset: u64) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.read_exact_at(lfh_offset, &mut lfh_buf, "local file header")?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(ZipError::Corrupt(format!(
                "no local file header at offset {lfh_offset}"
            )));
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        Ok(lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    /// Whether `lfh_offset` could address a local header in this source.
    pub fn is_plausible_offset(&self, lfh_offset: u64) -> bool {
        lfh_offset
            .checked_add(LFH_SIZE as u64)
            .is_some_and(|end| end <= self.size)
    }

    /// Read `len` bytes of entry data starting at `offset`.
    ///
    /// Returns fewer bytes if the source ends early.
    pub fn read_data(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let len = len.min(self.size.saturating_sub(offset));
        let len = usize::try_from(len).map_err(|_| ZipError::Overflow(len))?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| ZipError::Overflow(len as u64))?;
        buf.resize(len, 0);
        let n = self.reader.read_full_at(offset, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Read the archive comment.
    pub fn read_comment(&self, dir: &CentralDirectory) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; dir.comment_len as usize];
        let n = self.reader.read_full_at(dir.comment_offset, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }
}

/// Find the payload of the extra field with header `id`.
fn find_extra_field(extra: &[u8], id: u16) -> Option<&[u8]> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let header_id = u16::from_le_bytes([extra[pos], extra[pos + 1]]);
        let size = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        let start = pos + 4;
        let end = (start + size).min(extra.len());
        if header_id == id {
            return Some(&extra[start..end]);
        }
        pos = start + size;
    }
    None
}
