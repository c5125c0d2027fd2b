//! Shared test utilities for integration tests.
//!
//! [`RawEntry`] and [`build_zip`] lay out archives byte by byte so tests can
//! produce shapes the crate's own writer never emits: CP437 names, stored
//! entries, wrong CRCs, saturated ZIP64 sizes, bogus offsets.

#![allow(dead_code)]

/// One entry to lay out. Data is always stored uncompressed.
pub struct RawEntry {
    pub name: Vec<u8>,
    pub flags: u16,
    pub method: u16,
    pub data: Vec<u8>,
    pub crc32: Option<u32>,
    pub dos_date: u16,
    pub dos_time: u16,
    /// Size reported through a ZIP64 extra field instead of the real one.
    pub zip64_size: Option<u64>,
    /// Offset written to the central directory instead of the real one.
    pub lfh_offset: Option<u32>,
    /// Compressed size recorded in the headers instead of the real one.
    pub compressed_size: Option<u32>,
}

impl RawEntry {
    pub fn stored(name: &str, data: &[u8]) -> Self {
        Self::raw(name.as_bytes(), data)
    }

    pub fn raw(name: &[u8], data: &[u8]) -> Self {
        Self {
            name: name.to_vec(),
            flags: 0,
            method: 0,
            data: data.to_vec(),
            crc32: None,
            // 2011-07-04 09:30:58
            dos_date: (31 << 9) | (7 << 5) | 4,
            dos_time: (9 << 11) | (30 << 5) | 29,
            zip64_size: None,
            lfh_offset: None,
            compressed_size: None,
        }
    }

    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn method(mut self, method: u16) -> Self {
        self.method = method;
        self
    }

    pub fn crc32(mut self, crc32: u32) -> Self {
        self.crc32 = Some(crc32);
        self
    }

    pub fn dos(mut self, date: u16, time: u16) -> Self {
        self.dos_date = date;
        self.dos_time = time;
        self
    }

    pub fn zip64_size(mut self, size: u64) -> Self {
        self.zip64_size = Some(size);
        self
    }

    pub fn lfh_offset(mut self, offset: u32) -> Self {
        self.lfh_offset = Some(offset);
        self
    }

    pub fn compressed_size(mut self, size: u32) -> Self {
        self.compressed_size = Some(size);
        self
    }
}

/// A laid-out archive and where its records landed.
pub struct BuiltZip {
    pub bytes: Vec<u8>,
    pub cd_offset: usize,
    /// Offset of each central directory header.
    pub cdfh_offsets: Vec<usize>,
}

fn put16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Lay out `entries`, announcing `announced` entries in the end record
/// (defaults to the real count), followed by `comment`.
pub fn build_zip_with(entries: &[RawEntry], comment: &[u8], announced: Option<u16>) -> BuiltZip {
    let mut bytes = Vec::new();
    let mut offsets = Vec::new();

    for e in entries {
        offsets.push(bytes.len() as u32);
        let crc = e.crc32.unwrap_or_else(|| crc32fast::hash(&e.data));
        bytes.extend_from_slice(b"PK\x03\x04");
        put16(&mut bytes, 20);
        put16(&mut bytes, e.flags);
        put16(&mut bytes, e.method);
        put16(&mut bytes, e.dos_time);
        put16(&mut bytes, e.dos_date);
        put32(&mut bytes, crc);
        put32(&mut bytes, e.compressed_size.unwrap_or(e.data.len() as u32));
        put32(&mut bytes, e.data.len() as u32);
        put16(&mut bytes, e.name.len() as u16);
        put16(&mut bytes, 0);
        bytes.extend_from_slice(&e.name);
        bytes.extend_from_slice(&e.data);
    }

    let cd_offset = bytes.len();
    let mut cdfh_offsets = Vec::new();
    for (e, offset) in entries.iter().zip(&offsets) {
        cdfh_offsets.push(bytes.len());
        let crc = e.crc32.unwrap_or_else(|| crc32fast::hash(&e.data));
        let mut extra = Vec::new();
        let size = match e.zip64_size {
            Some(big) => {
                put16(&mut extra, 0x0001);
                put16(&mut extra, 16);
                extra.extend_from_slice(&big.to_le_bytes());
                extra.extend_from_slice(&big.to_le_bytes());
                0xFFFF_FFFF
            }
            None => e.data.len() as u32,
        };

        bytes.extend_from_slice(b"PK\x01\x02");
        put16(&mut bytes, 20);
        put16(&mut bytes, 20);
        put16(&mut bytes, e.flags);
        put16(&mut bytes, e.method);
        put16(&mut bytes, e.dos_time);
        put16(&mut bytes, e.dos_date);
        put32(&mut bytes, crc);
        put32(&mut bytes, e.compressed_size.unwrap_or(size));
        put32(&mut bytes, size);
        put16(&mut bytes, e.name.len() as u16);
        put16(&mut bytes, extra.len() as u16);
        put16(&mut bytes, 0);
        put16(&mut bytes, 0);
        put16(&mut bytes, 0);
        put32(&mut bytes, 0);
        put32(&mut bytes, e.lfh_offset.unwrap_or(*offset));
        bytes.extend_from_slice(&e.name);
        bytes.extend_from_slice(&extra);
    }
    let cd_size = bytes.len() - cd_offset;

    let count = announced.unwrap_or(entries.len() as u16);
    bytes.extend_from_slice(b"PK\x05\x06");
    put16(&mut bytes, 0);
    put16(&mut bytes, 0);
    put16(&mut bytes, count);
    put16(&mut bytes, count);
    put32(&mut bytes, cd_size as u32);
    put32(&mut bytes, cd_offset as u32);
    put16(&mut bytes, comment.len() as u16);
    bytes.extend_from_slice(comment);

    BuiltZip {
        bytes,
        cd_offset,
        cdfh_offsets,
    }
}

/// Lay out `entries` with an archive comment.
pub fn build_zip(entries: &[RawEntry], comment: &[u8]) -> Vec<u8> {
    build_zip_with(entries, comment, None).bytes
}
