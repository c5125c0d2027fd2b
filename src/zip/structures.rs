//! On-disk ZIP records and the small value types decoded from them.
//!
//! Only the fields the reader and writer act on are kept; multi-disk
//! bookkeeping is skipped over.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use chrono::{DateTime, Datelike, Local, NaiveDate, TimeDelta, TimeZone, Timelike};
use std::time::SystemTime;

use crate::error::{Result, ZipError};

use super::cp437;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl From<u16> for CompressionMethod {
    fn from(code: u16) -> Self {
        match code {
            METHOD_STORED => Self::Stored,
            METHOD_DEFLATE => Self::Deflate,
            other => Self::Unknown(other),
        }
    }
}

impl CompressionMethod {
    /// Method code as written in headers.
    pub fn code(self) -> u16 {
        match self {
            Self::Stored => METHOD_STORED,
            Self::Deflate => METHOD_DEFLATE,
            Self::Unknown(code) => code,
        }
    }
}

/// General purpose flag: entry is encrypted.
pub const FLAG_ENCRYPTED: u16 = 1 << 0;
/// General purpose flag: name and comment are UTF-8 rather than CP437.
pub const FLAG_UTF8: u16 = 1 << 11;

/// Header ID of the ZIP64 extended information extra field.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Text encoding of an entry name, chosen by [`FLAG_UTF8`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameEncoding {
    Utf8,
    Cp437,
}

impl NameEncoding {
    pub fn from_flags(flags: u16) -> Self {
        if flags & FLAG_UTF8 != 0 {
            NameEncoding::Utf8
        } else {
            NameEncoding::Cp437
        }
    }

    pub fn decode(self, raw: &[u8]) -> String {
        match self {
            NameEncoding::Utf8 => String::from_utf8_lossy(raw).into_owned(),
            NameEncoding::Cp437 => cp437::decode(raw),
        }
    }

    pub fn encode(self, name: &str) -> Vec<u8> {
        match self {
            NameEncoding::Utf8 => name.as_bytes().to_vec(),
            NameEncoding::Cp437 => cp437::encode(name),
        }
    }
}

/// Fixed-size record body following `signature`, or an open error naming
/// the record.
fn record_body<'a>(
    data: &'a [u8],
    signature: &[u8],
    len: usize,
    what: &str,
) -> Result<Cursor<&'a [u8]>> {
    if data.len() < len || !data.starts_with(signature) {
        return Err(ZipError::Open(format!("bad {what} record")));
    }
    Ok(Cursor::new(&data[signature.len()..len]))
}

/// End of central directory record, without its trailing comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub entries_on_disk: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut body = record_body(
            data,
            Self::SIGNATURE,
            Self::SIZE,
            "end of central directory",
        )?;
        body.set_position(4); // disk numbers
        Ok(Self {
            entries_on_disk: body.read_u16::<LittleEndian>()?,
            total_entries: body.read_u16::<LittleEndian>()?,
            cd_size: body.read_u32::<LittleEndian>()?,
            cd_offset: body.read_u32::<LittleEndian>()?,
            comment_len: body.read_u16::<LittleEndian>()?,
        })
    }

    /// A saturated field defers to the ZIP64 record.
    pub fn is_zip64(&self) -> bool {
        self.entries_on_disk == u16::MAX
            || self.total_entries == u16::MAX
            || self.cd_size == u32::MAX
            || self.cd_offset == u32::MAX
    }
}

/// Points from just before the end record to the ZIP64 end record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64EOCDLocator {
    pub eocd64_offset: u64,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut body = record_body(data, Self::SIGNATURE, Self::SIZE, "ZIP64 locator")?;
        body.set_position(4); // disk holding the ZIP64 end record
        Ok(Self {
            eocd64_offset: body.read_u64::<LittleEndian>()?,
        })
    }
}

/// ZIP64 end of central directory record (fixed part).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zip64EOCD {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut body = record_body(data, Self::SIGNATURE, Self::MIN_SIZE, "ZIP64 end")?;
        // record size, versions, disk numbers, entries on this disk
        body.set_position(28);
        Ok(Self {
            total_entries: body.read_u64::<LittleEndian>()?,
            cd_size: body.read_u64::<LittleEndian>()?,
            cd_offset: body.read_u64::<LittleEndian>()?,
        })
    }
}

pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
/// Central directory header size before name, extra field and comment.
pub const CDFH_MIN_SIZE: usize = 46;

pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
/// Local header size before name and extra field.
pub const LFH_SIZE: usize = 30;

/// Entry descriptor as recorded in the central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Name bytes exactly as stored.
    pub raw_name: Vec<u8>,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    /// Offset of the local file header.
    pub lfh_offset: u64,
    /// Per-entry comment, decoded with the name's encoding.
    pub comment: String,
}

impl EntryInfo {
    pub fn name_encoding(&self) -> NameEncoding {
        NameEncoding::from_flags(self.flags)
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    pub fn is_directory(&self) -> bool {
        self.raw_name.last() == Some(&b'/')
    }

    /// `(year, month, day)` of the stored DOS date.
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let d = self.last_mod_date;
        (1980 + (d >> 9), ((d >> 5) & 0x0F) as u8, (d & 0x1F) as u8)
    }

    /// `(hour, minute, second)` of the stored DOS time, to 2s precision.
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let t = self.last_mod_time;
        ((t >> 11) as u8, ((t >> 5) & 0x3F) as u8, ((t & 0x1F) * 2) as u8)
    }

    /// Modification time as an absolute timestamp.
    pub fn modified(&self) -> Option<SystemTime> {
        dos_to_system_time(self.last_mod_date, self.last_mod_time)
    }
}

/// Convert a packed DOS date and time to a [`SystemTime`].
///
/// DOS timestamps are wall-clock time in the local zone. An ambiguous time
/// (clocks turned back) resolves to the earlier instant; a time skipped by
/// a forward shift is read one hour later. Returns `None` for fields that
/// do not form a calendar date and time.
pub fn dos_to_system_time(date: u16, time: u16) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(
        1980 + (date >> 9) as i32,
        ((date >> 5) & 0x0F) as u32,
        (date & 0x1F) as u32,
    )?
    .and_hms_opt(
        (time >> 11) as u32,
        ((time >> 5) & 0x3F) as u32,
        ((time & 0x1F) * 2) as u32,
    )?;

    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(naive + TimeDelta::hours(1)))
                .earliest()
        })?;
    Some(SystemTime::from(local))
}

/// Convert a [`SystemTime`] to packed DOS `(date, time)` in the local zone,
/// clamped to the representable 1980..=2107 range.
pub fn system_time_to_dos(t: SystemTime) -> (u16, u16) {
    const MIN: (u16, u16) = ((1 << 5) | 1, 0);
    const MAX: (u16, u16) = ((127 << 9) | (12 << 5) | 31, (23 << 11) | (59 << 5) | 29);

    let local = DateTime::<Local>::from(t);
    match local.year() {
        year if year < 1980 => MIN,
        year if year > 2107 => MAX,
        year => {
            let date = (((year - 1980) as u16) << 9)
                | ((local.month() as u16) << 5)
                | local.day() as u16;
            let time = ((local.hour() as u16) << 11)
                | ((local.minute() as u16) << 5)
                | (local.second() as u16 / 2);
            (date, time)
        }
    }
}
