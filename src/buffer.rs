use std::io::{self, BufReader, Read, Seek, SeekFrom};

use thiserror::Error;

macro_rules! impl_read {
    ($fn_name:ident, $typ:ty) => {
        pub fn $fn_name(&mut self) -> Result<$typ, FontReaderError> {
            let mut buf = [0u8; size_of::<$typ>()];

            self.inner.read_exact(&mut buf)?;

            Ok(<$typ>::from_be_bytes(buf))
        }
    };
}

macro_rules! impl_read_array {
    ($fn_name:ident, $typ:ty) => {
        /// Reads `count` consecutive big-endian values
        pub fn $fn_name(&mut self, count: usize) -> Result<Vec<$typ>, FontReaderError> {
            let mut buf = vec![0u8; count * size_of::<$typ>()];

            self.inner.read_exact(&mut buf)?;

            Ok(buf
                .chunks_exact(size_of::<$typ>())
                .map(|chunk| <$typ>::from_be_bytes([chunk[0], chunk[1]]))
                .collect())
        }
    };
}

/// Represents the possible errors that can occur when using `FontReader`.
#[derive(Error, Debug)]
pub enum FontReaderError {
    /// An error occurred during a read operation on the underlying buffer.
    /// This variant transparently wraps `std::io::Error`.
    #[error(transparent)]
    ReadError(#[from] io::Error),

    /// An error occurred during a seek operation on the underlying buffer.
    #[error("Failed to seek, error context: {0}")]
    FailedToSeek(io::Error),
}

/// Big-endian reader over a font source.
///
/// Every multi-byte value in a font file is stored big-endian, so the
/// reader only exposes big-endian reads.
pub struct FontReader<B: Read + Seek> {
    inner: BufReader<B>,
}

impl<B> FontReader<B>
where
    B: Read + Seek,
{
    /// Returns a new reader from anything which implements read and seek,
    /// a `File` being the obvious one, a `Cursor` over bytes pulled from
    /// a PDF font stream being the other.
    pub fn from_buffer(buffer: B) -> Self {
        Self {
            inner: BufReader::new(buffer),
        }
    }

    /// Seeks to a specific place in the buffer
    /// from the start of the source
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use vero_cmap::buffer::FontReader;
    ///
    /// let data = vec![0, 0, 0, 10, 0, 0, 0, 20];
    /// let mut reader = FontReader::from_buffer(Cursor::new(data));
    ///
    /// reader.seek_to(4).unwrap();
    /// assert_eq!(reader.read_u32().unwrap(), 20);
    /// ```
    pub fn seek_to(&mut self, pos: u64) -> Result<(), FontReaderError> {
        self.inner
            .seek(SeekFrom::Start(pos))
            .map_err(FontReaderError::FailedToSeek)?;

        Ok(())
    }

    /// Skips n bytes from the CURRENT cursor position
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use vero_cmap::buffer::FontReader;
    ///
    /// let data = vec![0, 0, 0, 10, 0, 0, 0, 20];
    /// let mut reader = FontReader::from_buffer(Cursor::new(data));
    ///
    /// assert_eq!(reader.read_u32().unwrap(), 10);
    /// reader.skip(4).unwrap();
    /// assert!(reader.read_u32().is_err());
    /// ```
    pub fn skip(&mut self, n: i64) -> Result<(), FontReaderError> {
        self.inner
            .seek_relative(n)
            .map_err(FontReaderError::FailedToSeek)?;

        Ok(())
    }

    /// Returns the current cursor position from the start of the source
    pub fn position(&mut self) -> Result<u64, FontReaderError> {
        self.inner
            .stream_position()
            .map_err(FontReaderError::FailedToSeek)
    }

    /// Fills `buf` completely from the current position
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), FontReaderError> {
        self.inner.read_exact(buf)?;

        Ok(())
    }

    /// Reads at most `len` bytes, stopping early at the end of the source
    pub fn read_up_to(&mut self, len: usize) -> Result<Vec<u8>, FontReaderError> {
        let mut buf = Vec::with_capacity(len);

        (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;

        Ok(buf)
    }

    impl_read!(read_u32, u32);
    impl_read!(read_i16, i16);
    impl_read!(read_u16, u16);

    impl_read_array!(read_u16_array, u16);
    impl_read_array!(read_i16_array, i16);
}
