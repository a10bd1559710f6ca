//! Sequential byte source over a plain or gzip-compressed stream.
//!
//! The decoder core never seeks: everything above this module is expressed
//! in terms of "read exactly N bytes or report short/EOF", which is the one
//! primitive this type provides.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use log::debug;

use super::error::{Result, SdtsError};

/// A seekless, sequential byte reader.
///
/// Opened from a path (gzip chosen by a `.gz` suffix) or wrapped around any
/// [`Read`] implementation, which is how the tests drive the decoder with
/// in-memory streams.
pub struct ByteSource {
    inner: Box<dyn Read>,
}

impl ByteSource {
    /// Open a file, transparently decompressing it if the path ends in `.gz`
    /// (case-insensitive).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let gzipped = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);
        debug!(
            "Byte source opened: {} (gzip: {})",
            path.display(),
            gzipped
        );
        let inner: Box<dyn Read> = if gzipped {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Self { inner })
    }

    /// Wrap an arbitrary reader.
    pub fn from_reader(reader: impl Read + 'static) -> Self {
        Self {
            inner: Box::new(reader),
        }
    }

    /// Fill `buf` completely.
    ///
    /// Returns `Ok(false)` on a clean end of file (no bytes available at
    /// all), `Ok(true)` when the buffer was filled, and a
    /// [`SdtsError::TruncatedRecord`] when the stream ends mid-buffer.
    pub fn read_exact_or_eof(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    if filled == 0 {
                        return Ok(false);
                    }
                    return Err(SdtsError::TruncatedRecord {
                        expected: buf.len(),
                        found: filled,
                    });
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    /// Fill as much of `buf` as the stream still holds.
    ///
    /// Returns the number of bytes read; anything short of `buf.len()`
    /// means the stream ended. Used by the leaderless continuation loop,
    /// where a short final block is end of file rather than corruption.
    pub fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Fill `buf` completely; end of file at any point is an error.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.read_exact_or_eof(buf)? {
            Ok(())
        } else {
            Err(SdtsError::TruncatedRecord {
                expected: buf.len(),
                found: 0,
            })
        }
    }

    /// Read a single byte; `None` at end of file.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        if self.read_exact_or_eof(&mut byte)? {
            Ok(Some(byte[0]))
        } else {
            Ok(None)
        }
    }
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSource").finish_non_exhaustive()
    }
}
