//! Reading archives: index construction, lookup, decoding and extraction.

mod common;

use std::io::Cursor;
use std::time::SystemTime;

use chrono::{DateTime, Local, TimeZone, Timelike};

use common::{RawEntry, build_zip, build_zip_with};
use zipdex::zip::FLAG_UTF8;
use zipdex::{StreamReader, ZipArchive, ZipError};

fn open(bytes: Vec<u8>) -> ZipArchive<StreamReader<Cursor<Vec<u8>>>> {
    let archive = ZipArchive::from_bytes(bytes);
    assert!(archive.is_open());
    archive
}

// ============================================================================
// Index and lookup
// ============================================================================

#[test]
fn lookup_ignores_case() {
    let archive = open(build_zip(&[RawEntry::stored("Report.TXT", b"quarterly")], b""));

    assert_eq!(archive.len(), 1);
    assert_eq!(archive.file_name(0), Some("Report.TXT"));
    assert_eq!(archive.find_index("report.txt"), Some(0));
    assert_eq!(archive.find_index("REPORT.TXT"), Some(0));
    assert_eq!(archive.find_index("nomatch"), None);
    assert_eq!(archive.get_data_by_name("report.txt").unwrap(), b"quarterly");
}

#[test]
fn lowest_index_wins_for_duplicates() {
    let archive = open(build_zip(
        &[
            RawEntry::stored("other", b"0"),
            RawEntry::stored("Dup.txt", b"first"),
            RawEntry::stored("DUP.TXT", b"second"),
        ],
        b"",
    ));

    assert_eq!(archive.len(), 3);
    assert_eq!(archive.find_index("dup.txt"), Some(1));
    assert_eq!(archive.get_data_by_name("dup.txt").unwrap(), b"first");
    assert_eq!(archive.get_data(2).unwrap(), b"second");
}

#[test]
fn names_decode_by_encoding_flag() {
    let archive = open(build_zip(
        &[
            RawEntry::raw(b"\x81ber.txt", b"cp437"),
            RawEntry::raw("\u{00FC}ber.txt".as_bytes(), b"utf8").flags(FLAG_UTF8),
        ],
        b"",
    ));

    assert_eq!(archive.file_name(0), Some("\u{00FC}ber.txt"));
    assert_eq!(archive.file_name(1), Some("\u{00FC}ber.txt"));
    assert_eq!(archive.find_index("\u{00DC}BER.TXT"), Some(0));
    assert_eq!(archive.get_data(1).unwrap(), b"utf8");
}

#[test]
fn entry_order_is_central_directory_order() {
    let names = ["c.txt", "a.txt", "b/", "b/x.txt"];
    let entries: Vec<RawEntry> = names.iter().map(|n| RawEntry::stored(n, b"")).collect();
    let archive = open(build_zip(&entries, b""));

    let listed: Vec<&str> = archive.entries().map(|e| e.name.as_str()).collect();
    assert_eq!(listed, names);
    assert!(archive.entry(2).unwrap().info.is_directory());
    assert!(archive.entry(4).is_none());
}

#[test]
fn damaged_central_directory_keeps_earlier_entries() {
    let mut built = build_zip_with(
        &[
            RawEntry::stored("one", b"1"),
            RawEntry::stored("two", b"2"),
            RawEntry::stored("three", b"3"),
        ],
        b"",
        None,
    );
    built.bytes[built.cdfh_offsets[1]] = b'X';

    let archive = open(built.bytes);
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.get_data_by_name("one").unwrap(), b"1");
    assert_eq!(archive.find_index("two"), None);
}

#[test]
fn announced_count_beyond_directory_is_not_trusted() {
    let built = build_zip_with(
        &[RawEntry::stored("a", b"A"), RawEntry::stored("b", b"B")],
        b"",
        Some(500),
    );
    let archive = open(built.bytes);
    assert_eq!(archive.len(), 2);
    assert_eq!(archive.get_data(1).unwrap(), b"B");
}

// ============================================================================
// Decoding
// ============================================================================

#[test]
fn repeated_reads_return_identical_bytes() {
    let archive = open(build_zip(&[RawEntry::stored("x.bin", &[7u8; 4096])], b""));
    let first = archive.get_data(0).unwrap();
    let second = archive.get_data(0).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4096);
}

#[test]
fn empty_entry_decodes_to_nothing() {
    let archive = open(build_zip(&[RawEntry::stored("empty", b"")], b""));
    assert_eq!(archive.get_data(0).unwrap(), b"");
}

#[test]
fn crc_mismatch_is_reported_and_handle_survives() {
    let archive = open(build_zip(
        &[
            RawEntry::stored("bad", b"payload").crc32(0xDEAD_BEEF),
            RawEntry::stored("good", b"fine"),
        ],
        b"",
    ));

    let err = archive.get_data(0).unwrap_err();
    assert!(matches!(
        err,
        ZipError::CrcMismatch {
            expected: 0xDEAD_BEEF,
            ..
        }
    ));
    assert!(err.is_corruption());

    assert_eq!(archive.get_data(1).unwrap(), b"fine");
    assert_eq!(archive.find_index("bad"), Some(0));
}

#[test]
fn oversized_entry_overflows_instead_of_allocating() {
    let archive = open(build_zip(
        &[RawEntry::stored("huge", b"").zip64_size(u64::MAX)],
        b"",
    ));

    assert_eq!(archive.entry(0).unwrap().info.uncompressed_size, u64::MAX);
    assert!(matches!(
        archive.get_data(0),
        Err(ZipError::Overflow(u64::MAX))
    ));
}

#[test]
fn inflated_compressed_size_is_corruption() {
    let archive = open(build_zip(
        &[
            RawEntry::stored("bloated", b"xxxx")
                .method(8)
                .compressed_size(0xFFFF_FFFE),
            RawEntry::stored("kept", b"here"),
        ],
        b"",
    ));

    assert_eq!(archive.entry(0).unwrap().info.compressed_size, 0xFFFF_FFFE);
    assert!(archive.get_data(0).unwrap_err().is_corruption());
    assert_eq!(archive.get_data(1).unwrap(), b"here");
}

#[test]
fn unreadable_header_offset_is_corruption() {
    let archive = open(build_zip(
        &[
            RawEntry::stored("lost", b"gone").lfh_offset(0xFFFF_FF00),
            RawEntry::stored("kept", b"here"),
        ],
        b"",
    ));

    assert!(archive.entry(0).unwrap().locator.is_none());
    assert!(archive.get_data(0).unwrap_err().is_corruption());
    assert_eq!(archive.get_data(1).unwrap(), b"here");
}

#[test]
fn encrypted_and_unknown_methods_are_unsupported() {
    let archive = open(build_zip(
        &[
            RawEntry::stored("secret", b"xxxx").flags(0x0001),
            RawEntry::stored("bzip", b"xxxx").method(12),
        ],
        b"",
    ));

    assert!(archive.entry(0).unwrap().info.is_encrypted());
    assert!(matches!(archive.get_data(0), Err(ZipError::Unsupported(_))));
    assert!(matches!(archive.get_data(1), Err(ZipError::Unsupported(_))));
}

#[test]
fn missing_entries_are_reported() {
    let archive = open(build_zip(&[RawEntry::stored("a", b"A")], b""));

    let err = archive.get_data(3).unwrap_err();
    assert!(matches!(err, ZipError::IndexOutOfRange { index: 3, count: 1 }));
    assert!(err.is_not_found());
    assert!(matches!(
        archive.get_data_by_name("b"),
        Err(ZipError::NotFound(_))
    ));
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn archive_comment() {
    let archive = open(build_zip(&[RawEntry::stored("a", b"A")], b"built nightly"));
    assert_eq!(archive.comment_len(), 13);
    assert_eq!(archive.comment().unwrap(), b"built nightly");

    let bare = open(build_zip(&[RawEntry::stored("a", b"A")], b""));
    assert_eq!(bare.comment_len(), 0);
    assert!(matches!(bare.comment(), Err(ZipError::NotFound(_))));
}

#[test]
fn file_times_are_local_wall_clock() {
    let archive = open(build_zip(
        &[
            RawEntry::stored("dated", b""),
            RawEntry::stored("garbage", b"").dos(0, 0),
        ],
        b"",
    ));

    let expected = SystemTime::from(
        Local
            .with_ymd_and_hms(2011, 7, 4, 9, 30, 58)
            .single()
            .unwrap(),
    );
    assert_eq!(archive.file_time(0), Some(expected));
    assert_eq!(archive.file_time_by_name("DATED"), Some(expected));
    let wall = DateTime::<Local>::from(archive.file_time(0).unwrap());
    assert_eq!((wall.hour(), wall.minute(), wall.second()), (9, 30, 58));
    assert_eq!(archive.file_time(1), None);
    assert_eq!(archive.file_time(9), None);
    assert_eq!(archive.file_time_by_name("absent"), None);
}

// ============================================================================
// Opening and closing
// ============================================================================

#[test]
fn trailing_bytes_after_end_record_are_tolerated() {
    let mut bytes = build_zip(&[RawEntry::stored("a.txt", b"still here")], b"");
    bytes.extend_from_slice(&[0u8; 16]);

    let archive = open(bytes);
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.get_data_by_name("a.txt").unwrap(), b"still here");
}

#[test]
fn failed_opens_give_closed_handles() {
    let dir = tempfile::tempdir().unwrap();

    let missing = ZipArchive::open(dir.path().join("absent.zip"));
    assert!(!missing.is_open());
    assert!(missing.is_empty());

    let junk = dir.path().join("junk.zip");
    std::fs::write(&junk, vec![0x55u8; 4000]).unwrap();
    assert!(!ZipArchive::open(&junk).is_open());
    assert!(matches!(ZipArchive::try_open(&junk), Err(ZipError::Open(_))));
}

#[test]
fn close_releases_the_archive() {
    let mut archive = open(build_zip(&[RawEntry::stored("a", b"A")], b""));
    archive.close();

    assert!(!archive.is_open());
    assert_eq!(archive.len(), 0);
    assert_eq!(archive.find_index("a"), None);
    assert!(matches!(archive.get_data(0), Err(ZipError::Closed)));
}

#[test]
fn opens_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.zip");
    std::fs::write(&path, build_zip(&[RawEntry::stored("f.txt", b"on disk")], b"")).unwrap();

    let archive = ZipArchive::try_open(&path).unwrap();
    assert_eq!(archive.get_data_by_name("F.TXT").unwrap(), b"on disk");
}

// ============================================================================
// Extraction
// ============================================================================

#[test]
fn extract_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let archive = open(build_zip(&[RawEntry::stored("dir/file.bin", b"bits")], b""));

    let written = archive.extract_to("DIR/FILE.BIN", dir.path(), None).unwrap();
    assert_eq!(written, dir.path().join("DIR").join("FILE.BIN"));
    assert_eq!(std::fs::read(&written).unwrap(), b"bits");
}

#[test]
fn extract_with_override_name() {
    let dir = tempfile::tempdir().unwrap();
    let archive = open(build_zip(&[RawEntry::stored("dir/file.bin", b"bits")], b""));

    let written = archive
        .extract_to("dir/file.bin", dir.path(), Some("renamed.bin"))
        .unwrap();
    assert_eq!(written, dir.path().join("renamed.bin"));
    assert_eq!(std::fs::read(written).unwrap(), b"bits");
}

#[test]
fn extract_missing_entry_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let archive = open(build_zip(&[RawEntry::stored("a", b"A")], b""));

    assert!(matches!(
        archive.extract_to("b", dir.path(), None),
        Err(ZipError::NotFound(_))
    ));
    assert!(!dir.path().join("b").exists());
}
