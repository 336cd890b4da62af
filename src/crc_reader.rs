//! Helper module to compute a CRC32 checksum while reading
//!
//! The validate-at-EOF idea comes from zip-rs:
//! <https://github.com/mvdnes/zip-rs/commit/b3c836d9c32efa120cdd5366280f940d3c3b985c>

use std::io;
use std::io::prelude::*;

use crc32fast::Hasher;

/// Reader that accumulates the CRC32 of everything read through it,
/// and optionally validates an expected checksum when it reaches EOF.
///
/// Extraction uses the tracking flavor (it reports the checksum it
/// saw); [`Archive::reader`] uses the validating one.
///
/// [`Archive::reader`]: ../read/struct.Archive.html#method.reader
pub struct Crc32Reader<R> {
    inner: R,
    hasher: Hasher,
    expected_checksum: Option<u32>,
}

impl<R> Crc32Reader<R> {
    /// A reader that only tracks the running checksum.
    pub fn new(inner: R) -> Crc32Reader<R> {
        Crc32Reader {
            inner,
            hasher: Hasher::new(),
            expected_checksum: None,
        }
    }

    /// A reader that fails the read reaching EOF unless the data
    /// checksums to `expected`.
    pub fn with_expected(inner: R, expected: u32) -> Crc32Reader<R> {
        Crc32Reader {
            expected_checksum: Some(expected),
            ..Crc32Reader::new(inner)
        }
    }

    /// The CRC32 of the bytes read so far.
    pub fn crc32(&self) -> u32 {
        self.hasher.clone().finalize()
    }
}

impl<R: Read> Read for Crc32Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        if count == 0 && !buf.is_empty() {
            // EOF: settle up with the expectation, if we carry one.
            return match self.expected_checksum {
                Some(expected) if expected != self.crc32() => Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Invalid checksum",
                )),
                _ => Ok(0),
            };
        }
        self.hasher.update(&buf[..count]);
        Ok(count)
    }
}
