//! The streaming compression pipeline: chunked store and DEFLATE
//! writers, the chunked drain used by extraction, and the CRC32
//! bookkeeping shared by all of them.
//!
//! Every loop here polls the cancel flag before touching the next
//! chunk, and the CRC is always computed over the *uncompressed*
//! bytes — that's the value the ZIP format wants in its headers.

use std::io::{self, Read, Write};

use crc32fast::Hasher;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::progress::Progress;
use crate::result::*;

/// How many bytes we move per chunk. Chunks are also the granularity
/// of progress updates and cancellation checks.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Fails with [`ZipError::Cancelled`] if the caller flipped the flag.
pub(crate) fn check_cancelled(progress: Option<&Progress>) -> ZipResult<()> {
    match progress {
        Some(p) if p.is_cancelled() => Err(ZipError::Cancelled),
        _ => Ok(()),
    }
}

fn bump(progress: Option<&Progress>, units: usize) {
    if let Some(p) = progress {
        p.add_completed(units as i64);
    }
}

/// A writer that counts the bytes passing through it.
/// Wrapped around the archive file underneath a [`DeflateEncoder`],
/// it tells us the compressed size the encoder won't.
#[derive(Debug)]
pub(crate) struct CountWriter<W> {
    writer: W,
    count: u64,
}

impl<W> CountWriter<W> {
    pub fn new(writer: W) -> Self {
        CountWriter { writer, count: 0 }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<W: Write> Write for CountWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let bytes_written = self.writer.write(buf)?;
        self.count += bytes_written as u64;
        Ok(bytes_written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Pulls one chunk from the provider, after the cancellation check.
///
/// A provider that dries up before `size` is reached is an I/O error;
/// we promised the headers that many bytes.
fn next_chunk<F>(
    provider: &mut F,
    position: u64,
    size: u64,
    progress: Option<&Progress>,
) -> ZipResult<Vec<u8>>
where
    F: FnMut(u64, usize) -> ZipResult<Vec<u8>>,
{
    check_cancelled(progress)?;
    let want = CHUNK_SIZE.min((size - position) as usize);
    let chunk = provider(position, want)?;
    if chunk.is_empty() {
        return Err(ZipError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "provider ran out of data",
        )));
    }
    Ok(chunk)
}

/// Streams `size` uncompressed bytes from `provider` to `w` unchanged.
///
/// Returns (bytes written, CRC32 of the data).
pub(crate) fn store_stream<W, F>(
    w: &mut W,
    size: u64,
    progress: Option<&Progress>,
    provider: &mut F,
) -> ZipResult<(u64, u32)>
where
    W: Write,
    F: FnMut(u64, usize) -> ZipResult<Vec<u8>>,
{
    let mut hasher = Hasher::new();
    let mut position = 0u64;
    while position < size {
        let chunk = next_chunk(provider, position, size, progress)?;
        hasher.update(&chunk);
        w.write_all(&chunk)?;
        position += chunk.len() as u64;
        bump(progress, chunk.len());
    }
    Ok((position, hasher.finalize()))
}

/// Streams `size` uncompressed bytes from `provider` through a zlib
/// deflate stream at the default level (6) into `w`.
///
/// Returns (compressed bytes written, CRC32 of the *uncompressed* data).
pub(crate) fn deflate_stream<W, F>(
    w: &mut W,
    size: u64,
    progress: Option<&Progress>,
    provider: &mut F,
) -> ZipResult<(u64, u32)>
where
    W: Write,
    F: FnMut(u64, usize) -> ZipResult<Vec<u8>>,
{
    let mut encoder = DeflateEncoder::new(CountWriter::new(w), Compression::default());
    let mut hasher = Hasher::new();
    let mut position = 0u64;
    while position < size {
        let chunk = next_chunk(provider, position, size, progress)?;
        hasher.update(&chunk);
        encoder.write_all(&chunk).map_err(ZipError::from_zlib)?;
        position += chunk.len() as u64;
        bump(progress, chunk.len());
    }
    let counter = encoder.finish().map_err(ZipError::from_zlib)?;
    Ok((counter.count(), hasher.finalize()))
}

/// Reads `reader` dry in chunks, feeding each chunk to `consumer`.
///
/// This is the downstream half of extraction: `reader` is either the
/// raw stored payload or an inflate stream over it, so read errors are
/// mapped onto the gzip error kinds.
///
/// Returns (bytes drained, CRC32 of the data).
pub(crate) fn drain<R, F>(
    reader: &mut R,
    progress: Option<&Progress>,
    consumer: &mut F,
) -> ZipResult<(u64, u32)>
where
    R: Read,
    F: FnMut(&[u8]) -> ZipResult<()>,
{
    let mut hasher = Hasher::new();
    let mut drained = 0u64;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        check_cancelled(progress)?;
        let n = reader.read(&mut buf).map_err(ZipError::from_zlib)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        consumer(&buf[..n])?;
        drained += n as u64;
        bump(progress, n);
    }
    Ok((drained, hasher.finalize()))
}
