//! Random-access byte sources an archive can be opened from.

mod http;
mod local;
mod stream;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;
pub use stream::StreamReader;

use crate::error::Result;

/// Positional reads from an archive source.
///
/// Takes `&self` so one source can serve every read of an archive handle.
pub trait ReadAt {
    /// Read into `buf` starting at byte `offset`.
    ///
    /// May return fewer bytes than requested; `0` means end of data.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Total length in bytes.
    fn size(&self) -> u64;

    /// Read until `buf` is full or the source is exhausted.
    ///
    /// Returns the number of bytes actually read.
    fn read_full_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

impl<R: ReadAt + ?Sized> ReadAt for &R {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

impl<R: ReadAt + ?Sized> ReadAt for Box<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}
