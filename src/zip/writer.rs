//! Streaming ZIP writer.
//!
//! Entries are written one after another as local header + DEFLATE data;
//! [`ZipWriter::finish`] appends the central directory and end records.
//! ZIP64 fields are emitted only when a size, offset or count needs them.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;
use std::time::SystemTime;

use crate::error::{Result, ZipError};

use super::structures::*;

const VERSION_DEFAULT: u16 = 20;
const VERSION_ZIP64: u16 = 45;
const U32_SATURATED: u32 = 0xFFFF_FFFF;
const U16_SATURATED: u16 = 0xFFFF;

/// What the central directory needs to know about a written entry.
struct CentralRecord {
    raw_name: Vec<u8>,
    flags: u16,
    dos_time: u16,
    dos_date: u16,
    crc32: u32,
    compressed_size: u64,
    uncompressed_size: u64,
    lfh_offset: u64,
}

impl CentralRecord {
    fn needs_zip64(&self) -> bool {
        self.compressed_size >= U32_SATURATED as u64
            || self.uncompressed_size >= U32_SATURATED as u64
            || self.lfh_offset >= U32_SATURATED as u64
    }
}

/// Writes a ZIP archive to any [`Write`] sink.
pub struct ZipWriter<W: Write> {
    inner: W,
    offset: u64,
    central: Vec<CentralRecord>,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            offset: 0,
            central: Vec::new(),
        }
    }

    /// Number of entries written so far.
    pub fn len(&self) -> usize {
        self.central.len()
    }

    pub fn is_empty(&self) -> bool {
        self.central.is_empty()
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    /// Compress `data` with DEFLATE at the default level and write it as
    /// entry `name`.
    ///
    /// Non-ASCII names are stored as UTF-8 with general purpose bit 11 set.
    /// Names longer than the 16-bit length field are refused before
    /// anything is written.
    pub fn write_entry(&mut self, name: &str, data: &[u8], modified: SystemTime) -> Result<()> {
        if name.len() > U16_SATURATED as usize {
            return Err(ZipError::Precondition(format!(
                "entry name is {} bytes, at most {} fit in a header",
                name.len(),
                U16_SATURATED
            )));
        }

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;

        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8 };
        let (dos_date, dos_time) = system_time_to_dos(modified);
        let record = CentralRecord {
            raw_name: name.as_bytes().to_vec(),
            flags,
            dos_time,
            dos_date,
            crc32: crc32fast::hash(data),
            compressed_size: compressed.len() as u64,
            uncompressed_size: data.len() as u64,
            lfh_offset: self.offset,
        };

        let header = local_header(&record)?;
        self.emit(&header)?;
        self.emit(&compressed)?;
        self.central.push(record);
        Ok(())
    }

    /// Write the central directory and end records, returning the sink.
    pub fn finish(mut self) -> Result<W> {
        let cd_offset = self.offset;
        let mut cd = Vec::new();
        for record in &self.central {
            write_central_header(&mut cd, record)?;
        }
        self.emit(&cd)?;
        let cd_size = cd.len() as u64;
        let count = self.central.len() as u64;

        let zip64 = count >= U16_SATURATED as u64
            || cd_size >= U32_SATURATED as u64
            || cd_offset >= U32_SATURATED as u64;

        let mut tail = Vec::new();
        if zip64 {
            let eocd64_offset = self.offset;
            tail.write_all(Zip64EOCD::SIGNATURE)?;
            tail.write_u64::<LittleEndian>((Zip64EOCD::MIN_SIZE - 12) as u64)?;
            tail.write_u16::<LittleEndian>(VERSION_ZIP64)?;
            tail.write_u16::<LittleEndian>(VERSION_ZIP64)?;
            tail.write_u32::<LittleEndian>(0)?;
            tail.write_u32::<LittleEndian>(0)?;
            tail.write_u64::<LittleEndian>(count)?;
            tail.write_u64::<LittleEndian>(count)?;
            tail.write_u64::<LittleEndian>(cd_size)?;
            tail.write_u64::<LittleEndian>(cd_offset)?;

            tail.write_all(Zip64EOCDLocator::SIGNATURE)?;
            tail.write_u32::<LittleEndian>(0)?;
            tail.write_u64::<LittleEndian>(eocd64_offset)?;
            tail.write_u32::<LittleEndian>(1)?;
        }

        let count16 = if zip64 { U16_SATURATED } else { count as u16 };
        tail.write_all(EndOfCentralDirectory::SIGNATURE)?;
        tail.write_u16::<LittleEndian>(0)?;
        tail.write_u16::<LittleEndian>(0)?;
        tail.write_u16::<LittleEndian>(count16)?;
        tail.write_u16::<LittleEndian>(count16)?;
        tail.write_u32::<LittleEndian>(saturate(cd_size, zip64))?;
        tail.write_u32::<LittleEndian>(saturate(cd_offset, zip64))?;
        tail.write_u16::<LittleEndian>(0)?;
        self.emit(&tail)?;

        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn saturate(value: u64, zip64: bool) -> u32 {
    if zip64 || value >= U32_SATURATED as u64 {
        U32_SATURATED
    } else {
        value as u32
    }
}

fn local_header(record: &CentralRecord) -> Result<Vec<u8>> {
    // The local copy carries both sizes whenever either needs 64 bits
    let zip64 = record.compressed_size >= U32_SATURATED as u64
        || record.uncompressed_size >= U32_SATURATED as u64;
    let mut extra = Vec::new();
    if zip64 {
        extra.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
        extra.write_u16::<LittleEndian>(16)?;
        extra.write_u64::<LittleEndian>(record.uncompressed_size)?;
        extra.write_u64::<LittleEndian>(record.compressed_size)?;
    }

    let mut buf = Vec::with_capacity(LFH_SIZE + record.raw_name.len() + extra.len());
    buf.write_all(LFH_SIGNATURE)?;
    buf.write_u16::<LittleEndian>(if zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT })?;
    buf.write_u16::<LittleEndian>(record.flags)?;
    buf.write_u16::<LittleEndian>(CompressionMethod::Deflate.code())?;
    buf.write_u16::<LittleEndian>(record.dos_time)?;
    buf.write_u16::<LittleEndian>(record.dos_date)?;
    buf.write_u32::<LittleEndian>(record.crc32)?;
    buf.write_u32::<LittleEndian>(saturate(record.compressed_size, zip64))?;
    buf.write_u32::<LittleEndian>(saturate(record.uncompressed_size, zip64))?;
    buf.write_u16::<LittleEndian>(record.raw_name.len() as u16)?;
    buf.write_u16::<LittleEndian>(extra.len() as u16)?;
    buf.write_all(&record.raw_name)?;
    buf.write_all(&extra)?;
    Ok(buf)
}

fn write_central_header(buf: &mut Vec<u8>, record: &CentralRecord) -> Result<()> {
    let zip64 = record.needs_zip64();
    let mut extra = Vec::new();
    if zip64 {
        let mut fields = Vec::new();
        if record.uncompressed_size >= U32_SATURATED as u64 {
            fields.write_u64::<LittleEndian>(record.uncompressed_size)?;
        }
        if record.compressed_size >= U32_SATURATED as u64 {
            fields.write_u64::<LittleEndian>(record.compressed_size)?;
        }
        if record.lfh_offset >= U32_SATURATED as u64 {
            fields.write_u64::<LittleEndian>(record.lfh_offset)?;
        }
        extra.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
        extra.write_u16::<LittleEndian>(fields.len() as u16)?;
        extra.write_all(&fields)?;
    }

    let version = if zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT };
    buf.write_all(CDFH_SIGNATURE)?;
    buf.write_u16::<LittleEndian>(version)?;
    buf.write_u16::<LittleEndian>(version)?;
    buf.write_u16::<LittleEndian>(record.flags)?;
    buf.write_u16::<LittleEndian>(CompressionMethod::Deflate.code())?;
    buf.write_u16::<LittleEndian>(record.dos_time)?;
    buf.write_u16::<LittleEndian>(record.dos_date)?;
    buf.write_u32::<LittleEndian>(record.crc32)?;
    buf.write_u32::<LittleEndian>(saturate(record.compressed_size, false))?;
    buf.write_u32::<LittleEndian>(saturate(record.uncompressed_size, false))?;
    buf.write_u16::<LittleEndian>(record.raw_name.len() as u16)?;
    buf.write_u16::<LittleEndian>(extra.len() as u16)?;
    buf.write_u16::<LittleEndian>(0)?; // comment length
    buf.write_u16::<LittleEndian>(0)?; // disk number start
    buf.write_u16::<LittleEndian>(0)?; // internal attributes
    buf.write_u32::<LittleEndian>(0)?; // external attributes
    buf.write_u32::<LittleEndian>(saturate(record.lfh_offset, false))?;
    buf.write_all(&record.raw_name)?;
    buf.write_all(&extra)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::ZipArchive;
    use std::time::{Duration, UNIX_EPOCH};

    fn build(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let when = UNIX_EPOCH + Duration::from_secs(1_709_214_330);
        let mut writer = ZipWriter::new(Vec::new());
        for (name, data) in entries {
            writer.write_entry(name, data, when).unwrap();
        }
        assert_eq!(writer.len(), entries.len());
        writer.finish().unwrap()
    }

    #[test]
    fn empty_archive_is_just_an_end_record() {
        let bytes = build(&[]);
        assert_eq!(bytes.len(), EndOfCentralDirectory::SIZE);
        let archive = ZipArchive::from_bytes(bytes);
        assert!(archive.is_open());
        assert!(archive.is_empty());
    }

    #[test]
    fn overlong_name_writes_nothing() {
        let name = "d/".repeat(32768) + "x";
        let mut writer = ZipWriter::new(Vec::new());
        let err = writer.write_entry(&name, b"data", UNIX_EPOCH).unwrap_err();
        assert!(matches!(err, ZipError::Precondition(_)));
        assert!(writer.is_empty());

        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len(), EndOfCentralDirectory::SIZE);
    }

    #[test]
    fn written_entries_read_back() {
        let big = vec![b'z'; 100_000];
        let bytes = build(&[("a.txt", b"alpha"), ("dir/big.bin", &big), ("empty", b"")]);
        let archive = ZipArchive::from_bytes(bytes);

        assert_eq!(archive.len(), 3);
        assert_eq!(archive.get_data(0).unwrap(), b"alpha");
        assert_eq!(archive.get_data_by_name("DIR/BIG.BIN").unwrap(), big);
        assert_eq!(archive.get_data(2).unwrap(), b"");

        let entry = archive.entry(1).unwrap();
        assert_eq!(entry.info.compression_method, CompressionMethod::Deflate);
        assert!(entry.info.compressed_size < 1_000);
        assert_eq!(
            archive.file_time(0),
            Some(UNIX_EPOCH + Duration::from_secs(1_709_214_330))
        );
    }

    #[test]
    fn non_ascii_names_are_flagged_utf8() {
        let bytes = build(&[("caf\u{00E9}.txt", b"x"), ("plain.txt", b"y")]);
        let archive = ZipArchive::from_bytes(bytes);
        let first = archive.entry(0).unwrap();
        assert_eq!(first.name, "caf\u{00E9}.txt");
        assert_ne!(first.info.flags & FLAG_UTF8, 0);
        assert_eq!(archive.entry(1).unwrap().info.flags & FLAG_UTF8, 0);
        assert_eq!(archive.get_data_by_name("CAF\u{00C9}.TXT").unwrap(), b"x");
    }
}
