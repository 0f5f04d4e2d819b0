//! Byte-oriented input cursors consumed by the decompressor.

use crate::error::Lz77Error;

/// A seekable byte stream.
///
/// End of stream is reported as `Ok(None)` from [`ByteSource::read_byte`]; only genuine read failures are errors.
#[cfg_attr(any(test, feature = "mockall"), mockall::automock)]
pub trait ByteSource {
    /// Reads the next byte, or `None` at end of stream.
    fn read_byte(&mut self) -> Result<Option<u8>, Lz77Error>;
    /// Current absolute offset of the cursor.
    fn stream_position(&mut self) -> Result<usize, Lz77Error>;
    /// Total length of the stream.
    fn stream_len(&mut self) -> Result<usize, Lz77Error>;
    /// Moves the cursor to an absolute offset.
    fn seek_to(&mut self, offset: usize) -> Result<(), Lz77Error>;
}

/// A [`ByteSource`] over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl ByteSource for SliceSource<'_> {
    fn read_byte(&mut self) -> Result<Option<u8>, Lz77Error> {
        let byte = self.data.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    fn stream_position(&mut self) -> Result<usize, Lz77Error> {
        Ok(self.pos)
    }

    fn stream_len(&mut self) -> Result<usize, Lz77Error> {
        Ok(self.data.len())
    }

    fn seek_to(&mut self, offset: usize) -> Result<(), Lz77Error> {
        // seeking past the end is allowed; reads there hit end of stream.
        self.pos = offset;
        Ok(())
    }
}

#[cfg(any(test, feature = "std"))]
pub use io::IoSource;

#[cfg(any(test, feature = "std"))]
mod io {
    use std::{
        io::{ErrorKind, Read, Seek, SeekFrom},
        string::ToString,
    };

    use super::ByteSource;
    use crate::error::Lz77Error;

    /// A [`ByteSource`] over any `Read + Seek` stream, e.g. a `std::fs::File`.
    ///
    /// Reads are issued one byte at a time; wrap unbuffered handles in a `BufReader`.
    #[derive(Debug)]
    pub struct IoSource<R> {
        inner: R,
    }

    impl<R: Read + Seek> IoSource<R> {
        pub fn new(inner: R) -> Self {
            Self { inner }
        }

        pub fn into_inner(self) -> R {
            self.inner
        }
    }

    fn read_error(err: std::io::Error) -> Lz77Error {
        Lz77Error::Read(err.to_string())
    }

    impl<R: Read + Seek> ByteSource for IoSource<R> {
        fn read_byte(&mut self) -> Result<Option<u8>, Lz77Error> {
            let mut byte = [0u8; 1];
            loop {
                match self.inner.read(&mut byte) {
                    Ok(0) => return Ok(None),
                    Ok(_) => return Ok(Some(byte[0])),
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => return Err(read_error(err)),
                }
            }
        }

        fn stream_position(&mut self) -> Result<usize, Lz77Error> {
            let pos = self.inner.stream_position().map_err(read_error)?;
            usize::try_from(pos).map_err(|_| Lz77Error::Read("stream position out of range".to_string()))
        }

        fn stream_len(&mut self) -> Result<usize, Lz77Error> {
            let pos = self.inner.stream_position().map_err(read_error)?;
            let len = self.inner.seek(SeekFrom::End(0)).map_err(read_error)?;
            self.inner.seek(SeekFrom::Start(pos)).map_err(read_error)?;
            usize::try_from(len).map_err(|_| Lz77Error::Read("stream length out of range".to_string()))
        }

        fn seek_to(&mut self, offset: usize) -> Result<(), Lz77Error> {
            self.inner.seek(SeekFrom::Start(offset as u64)).map_err(read_error)?;
            Ok(())
        }
    }

}
