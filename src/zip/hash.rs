//! Case-insensitive quick hash for entry names.
//!
//! A CRC-32 variant (polynomial 0x04C11DB7, MSB first) fed with the low
//! byte of each lowercased character. Equal hashes only mean "maybe equal";
//! callers confirm with a full case-insensitive comparison.

const POLY: u32 = 0x04C1_1DB7;

/// Hash `name` so that names differing only in case collide.
pub fn quick_hash(name: &str) -> u32 {
    let mut crc: u32 = 0;
    for c in name.chars() {
        let folded = fold_char(c) as u32 & 0xFF;
        let mut bits = (crc ^ (folded << 24)) & 0xFF00_0000;
        for _ in 0..8 {
            if bits & 0x8000_0000 != 0 {
                bits = (bits << 1) ^ POLY;
            } else {
                bits <<= 1;
            }
        }
        crc = (crc << 8) ^ bits;
    }
    crc
}

/// Simple per-character lowercase, no locale rules.
pub fn fold_char(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Case-insensitive equality using the same folding as [`quick_hash`].
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars().map(fold_char).eq(b.chars().map(fold_char))
}
