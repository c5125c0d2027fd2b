//! In-memory index of archive entries.
//!
//! Built once per archive by a single central directory walk. Index `i`
//! names the same entry for the lifetime of the archive handle.

use super::hash::{eq_ignore_case, quick_hash};
use super::structures::EntryInfo;

/// Position the reader can jump to without searching the central directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    /// Offset of the entry's local file header.
    pub lfh_offset: u64,
}

/// One indexed entry.
#[derive(Debug, Clone)]
pub struct EntryRecord {
    /// Decoded file name.
    pub name: String,
    /// [`quick_hash`] of `name`.
    pub name_hash: u32,
    pub info: EntryInfo,
    /// `None` when the recorded header offset cannot be used.
    pub locator: Option<Locator>,
}

impl EntryRecord {
    pub fn new(info: EntryInfo, locator: Option<Locator>) -> Self {
        let name = info.name_encoding().decode(&info.raw_name);
        let name_hash = quick_hash(&name);
        Self {
            name,
            name_hash,
            info,
            locator,
        }
    }
}

/// Ordered entry records with hash-filtered name lookup.
#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    records: Vec<EntryRecord>,
}

impl ArchiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EntryRecord> {
        self.records.get(index)
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut EntryRecord> {
        self.records.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EntryRecord> {
        self.records.iter()
    }

    /// Lowest index whose name equals `name` ignoring case.
    pub fn find_index(&self, name: &str) -> Option<usize> {
        let hash = quick_hash(name);
        self.records
            .iter()
            .position(|r| r.name_hash == hash && eq_ignore_case(&r.name, name))
    }
}

impl FromIterator<EntryRecord> for ArchiveIndex {
    fn from_iter<I: IntoIterator<Item = EntryRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
