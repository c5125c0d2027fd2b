//! Building new archives from files on disk.
//!
//! Files are queued with their names in the archive, then written in one
//! pass by [`ZipCreator::save_as`] through the streaming writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Result, ZipError};

use super::writer::ZipWriter;

/// A file queued for the next [`ZipCreator::save_as`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub source: PathBuf,
    pub name_in_archive: String,
}

/// Collects files and writes them out as a new archive.
///
/// Entries keep insertion order and are not deduplicated; adding the same
/// file twice stores it twice.
///
/// ```no_run
/// use zipdex::ZipCreator;
///
/// let mut creator = ZipCreator::new();
/// creator.add_file("/var/log/app.log", None)?;              // stored as "app.log"
/// creator.add_file_from_dir("/proj/src/main.rs", "/proj")?; // stored as "src/main.rs"
/// creator.save_as("bundle.zip")?;
/// # Ok::<(), zipdex::ZipError>(())
/// ```
#[derive(Debug, Default)]
pub struct ZipCreator {
    pending: Vec<PendingEntry>,
}

impl ZipCreator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> &[PendingEntry] {
        &self.pending
    }

    /// Queue `source` under `name_in_archive`.
    ///
    /// Without a name, an absolute source is stored under its base name
    /// only and a relative source under its own path.
    pub fn add_file(
        &mut self,
        source: impl AsRef<Path>,
        name_in_archive: Option<&str>,
    ) -> Result<()> {
        let source = source.as_ref();
        if !source.exists() {
            return Err(ZipError::Precondition(format!(
                "source file does not exist: {}",
                source.display()
            )));
        }

        let name = match name_in_archive {
            Some(name) => name.to_string(),
            None => {
                let path = source.to_string_lossy();
                if is_absolute(&path) {
                    base_name(&path).to_string()
                } else {
                    path.into_owned()
                }
            }
        };

        self.pending.push(PendingEntry {
            source: source.to_path_buf(),
            name_in_archive: to_archive_separators(&name),
        });
        Ok(())
    }

    /// Queue `source` under its path relative to `base_dir`.
    pub fn add_file_from_dir(
        &mut self,
        source: impl AsRef<Path>,
        base_dir: impl AsRef<Path>,
    ) -> Result<()> {
        let source = source.as_ref();
        let path = source.to_string_lossy();
        let base = base_dir.as_ref().to_string_lossy();

        let rest = path.strip_prefix(&*base).ok_or_else(|| {
            ZipError::Precondition(format!("{} is not inside {}", path, base))
        })?;
        let name = rest.strip_prefix(is_separator).unwrap_or(rest);

        self.add_file(source, Some(name))
    }

    /// Write every queued file into a new archive at `dest`.
    ///
    /// The queue is drained once the destination is created; if it cannot
    /// be created the queue is kept for another attempt. The first failing
    /// entry stops the run; entries written before it stay in the archive,
    /// which is finalized and closed either way. A failure while closing
    /// fails the save even when every entry went in.
    pub fn save_as(&mut self, dest: impl AsRef<Path>) -> Result<()> {
        if self.pending.is_empty() {
            return Err(ZipError::Precondition("no files to save".to_string()));
        }

        let dest = dest.as_ref();
        let file = File::create(dest)?;
        let pending = std::mem::take(&mut self.pending);
        let mut writer = ZipWriter::new(BufWriter::new(file));

        let mut result = Ok(());
        for entry in &pending {
            if let Err(e) = write_pending(&mut writer, entry) {
                log::warn!(
                    "aborting {} at {}: {}",
                    dest.display(),
                    entry.source.display(),
                    e
                );
                result = Err(e);
                break;
            }
        }

        let closed = writer.finish().and_then(|buf| {
            let file = buf
                .into_inner()
                .map_err(|e| ZipError::Io(e.into_error()))?;
            file.sync_all()?;
            Ok(())
        });

        result.and(closed)
    }
}

fn write_pending<W: Write>(writer: &mut ZipWriter<W>, entry: &PendingEntry) -> Result<()> {
    let data = std::fs::read(&entry.source)?;
    let modified = std::fs::metadata(&entry.source)
        .and_then(|m| m.modified())
        .unwrap_or_else(|_| SystemTime::now());
    writer.write_entry(&entry.name_in_archive, &data, modified)
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Absolute, drive-rooted (`C:\`, `C:/`) or UNC paths.
fn is_absolute(path: &str) -> bool {
    if Path::new(path).is_absolute() || path.starts_with(is_separator) {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && is_separator(bytes[2] as char)
}

fn base_name(path: &str) -> &str {
    path.rsplit(is_separator).next().unwrap_or(path)
}

fn to_archive_separators(name: &str) -> String {
    if MAIN_SEPARATOR == '/' {
        name.to_string()
    } else {
        name.replace(MAIN_SEPARATOR, "/")
    }
}
