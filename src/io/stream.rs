use super::ReadAt;
use crate::error::Result;
use std::cell::RefCell;
use std::io::{Read, Seek, SeekFrom};

/// Random access over any seekable stream.
///
/// Each read seeks first, so the stream's own cursor position is not
/// meaningful to other users while it is wrapped here.
pub struct StreamReader<S> {
    stream: RefCell<S>,
    size: u64,
}

impl<S: Read + Seek> StreamReader<S> {
    pub fn new(mut stream: S) -> Result<Self> {
        let size = stream.seek(SeekFrom::End(0))?;
        Ok(Self {
            stream: RefCell::new(stream),
            size,
        })
    }

    /// Give the stream back.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}

impl<S: Read + Seek> ReadAt for StreamReader<S> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut stream = self.stream.borrow_mut();
        stream.seek(SeekFrom::Start(offset))?;
        Ok(stream.read(buf)?)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn wraps_cursor() {
        let reader = StreamReader::new(Cursor::new(b"PK\x05\x06rest".to_vec())).unwrap();
        assert_eq!(reader.size(), 8);

        let mut buf = [0u8; 4];
        assert_eq!(reader.read_full_at(4, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"rest");

        // reads past the end come back empty
        assert_eq!(reader.read_at(100, &mut buf).unwrap(), 0);
    }
}
