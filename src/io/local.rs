use super::ReadAt;
use crate::error::Result;
use std::fs::File;
use std::path::{Path, PathBuf};

/// An archive file on the local filesystem.
///
/// Reads are positional, so a shared reference is enough to read anywhere.
pub struct LocalFileReader {
    file: File,
    path: PathBuf,
    size: u64,
}

impl LocalFileReader {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_file(File::open(path)?, path)
    }

    /// Wrap a file that is already open. `path` is kept for diagnostics.
    pub fn from_file(file: File, path: impl Into<PathBuf>) -> Result<Self> {
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.into(),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReadAt for LocalFileReader {
    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        use std::os::unix::fs::FileExt;
        Ok(self.file.read_at(buf, offset)?)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        // seek_read moves the OS cursor; nothing here depends on it
        use std::os::windows::fs::FileExt;
        Ok(self.file.seek_read(buf, offset)?)
    }

    #[cfg(not(any(unix, windows)))]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset))?;
        Ok(file.read(buf)?)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
