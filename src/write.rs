//! Tools for mutating a ZIP archive: appending and removing entries.
//!
//! Appends go through a two-pass local header: because newly written
//! entries don't use data descriptors, the header's CRC and compressed
//! size must be known at header-write time, so we emit a zeroed header,
//! stream the payload, then rewind and rewrite it. The existing central
//! directory is snapshotted up front and re-appended past the new
//! entry, which also gives cancellation a cheap rollback path.
//!
//! Removal rebuilds the archive into a sibling temp file, copying every
//! surviving entry's local region byte-for-byte, then atomically
//! replaces the original. In-place shifting would mean moving every
//! surviving region toward the head of the file; the copy-through is
//! O(archive) in I/O but leaves the original untouched until the final
//! rename.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use chrono::{NaiveDateTime, Utc};
use log::*;
use tempfile::NamedTempFile;

use crate::arch::usize;
use crate::progress::Progress;
use crate::read::{AccessMode, Archive, CompressionMethod, Entry, EntryType};
use crate::result::*;
use crate::spec::{self, CentralDirectoryEntry, EndOfCentralDirectory, LocalFileHeader};
use crate::stream::{self, CHUNK_SIZE};

/// Per-entry settings for [`Archive::add_entry`]
///
/// ```
/// use rezip::{CompressionMethod, EntryOptions};
///
/// let options = EntryOptions::default()
///     .compression_method(CompressionMethod::Deflate)
///     .unix_permissions(0o600);
/// ```
///
/// [`Archive::add_entry`]: ../read/struct.Archive.html#method.add_entry
#[derive(Debug, Clone)]
pub struct EntryOptions {
    pub(crate) compression_method: CompressionMethod,
    pub(crate) last_modified: NaiveDateTime,
    pub(crate) permissions: Option<u16>,
}

impl Default for EntryOptions {
    /// Store, modified now, default permissions
    /// (0o644 for files and symlinks, 0o755 for directories).
    fn default() -> Self {
        EntryOptions {
            compression_method: CompressionMethod::Store,
            last_modified: Utc::now().naive_utc(),
            permissions: None,
        }
    }
}

impl EntryOptions {
    /// Sets the compression method for the new entry.
    ///
    /// Only files are ever compressed; directories and symlinks are
    /// always stored.
    pub fn compression_method(mut self, method: CompressionMethod) -> Self {
        self.compression_method = method;
        self
    }

    /// Sets the modification time (UTC) stamped into the entry.
    pub fn last_modified(mut self, when: NaiveDateTime) -> Self {
        self.last_modified = when;
        self
    }

    /// Sets the POSIX permissions packed into the entry's external
    /// file attributes.
    pub fn unix_permissions(mut self, mode: u16) -> Self {
        self.permissions = Some(mode & 0o777);
        self
    }
}

impl Archive {
    /// Appends one entry to the archive.
    ///
    /// `provider` feeds the entry's content: it is called with a
    /// position and a wanted byte count, one chunk at a time, until
    /// `uncompressed_size` bytes have been consumed. For a directory
    /// it's called exactly once with `(0, 0)`; for a symlink, once for
    /// the link target bytes.
    ///
    /// A cancellation observed mid-stream rolls the file back to its
    /// pre-call bytes before [`ZipError::Cancelled`] surfaces. Other
    /// streaming failures propagate as-is, without rollback.
    ///
    /// [`ZipError::Cancelled`]: ../result/enum.ZipError.html#variant.Cancelled
    pub fn add_entry<F>(
        &mut self,
        path: &str,
        kind: EntryType,
        uncompressed_size: u64,
        options: &EntryOptions,
        progress: Option<&Progress>,
        mut provider: F,
    ) -> ZipResult<()>
    where
        F: FnMut(u64, usize) -> ZipResult<Vec<u8>>,
    {
        if self.mode == AccessMode::Read {
            return Err(ZipError::FileNotAccessible(self.path.clone()));
        }
        if self.eocd.entries == u16::MAX {
            return Err(ZipError::Unknown(
                "too many entries for a classic archive".into(),
            ));
        }
        let requested = match options.compression_method {
            CompressionMethod::Unsupported(v) => return Err(ZipError::InvalidArchiveLevel(v)),
            method => method,
        };
        // Only file payloads compress; a deflated symlink target would
        // be unreadable next to its verbatim sizes.
        let method = match kind {
            EntryType::File => requested,
            _ => CompressionMethod::Store,
        };

        let mut name = path.to_owned();
        match kind {
            EntryType::Directory => {
                if !name.ends_with('/') {
                    name.push('/');
                }
            }
            _ => {
                while name.ends_with('/') {
                    name.pop();
                }
            }
        }
        if name.len() > u16::MAX as usize {
            return Err(ZipError::Unknown("entry path too long".into()));
        }

        if let Some(p) = progress {
            p.set_total(match kind {
                EntryType::Directory => 1,
                _ => uncompressed_size as i64,
            });
        }

        // Snapshot what the new entry displaces: the central directory
        // moves past it, and the EOCD gets rewritten.
        let eocd_snapshot = self.eocd.clone();
        let start = self.eocd.central_directory_offset as u64;
        self.file.seek(SeekFrom::Start(start))?;
        let mut preserved_directory = vec![0u8; usize(self.eocd.central_directory_size)?];
        self.file.read_exact(&mut preserved_directory)?;

        // Provisional local header: CRC and compressed size are
        // unknown until the payload has streamed.
        let (dos_time, dos_date) = spec::encode_msdos(&options.last_modified);
        let mut local = LocalFileHeader {
            minimum_extract_version: spec::VERSION_NEEDED_TO_EXTRACT,
            flags: spec::FLAG_UTF8_ENCODING,
            compression_method: method.as_u16(),
            last_modified_time: dos_time,
            last_modified_date: dos_date,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: uncompressed_size as u32,
            path: name.clone().into_bytes(),
            extra_field: Vec::new(),
        };
        self.file.seek(SeekFrom::Start(start))?;
        local.write(&mut self.file)?;

        let streamed = self.stream_body(kind, method, uncompressed_size, progress, &mut provider);
        let (written, compressed, crc32) = match streamed {
            Ok(counts) => counts,
            Err(ZipError::Cancelled) => {
                self.rollback(start, &preserved_directory, &eocd_snapshot)?;
                return Err(ZipError::Cancelled);
            }
            Err(other) => return Err(other),
        };

        let directory_start = self.file.stream_position()?;
        if exceeds_classic_limits(directory_start, written) {
            self.rollback(start, &preserved_directory, &eocd_snapshot)?;
            return Err(ZipError::InvalidStartOfCentralDirectoryOffset(
                directory_start,
            ));
        }

        // Second pass: the header gets its real CRC and sizes.
        local.crc32 = crc32;
        local.compressed_size = compressed as u32;
        local.uncompressed_size = written as u32;
        self.file.seek(SeekFrom::Start(start))?;
        local.write(&mut self.file)?;

        // The old directory slides past the new entry,
        // followed by the new entry's own record.
        self.file.seek(SeekFrom::Start(directory_start))?;
        self.file.write_all(&preserved_directory)?;

        let permissions = options
            .permissions
            .unwrap_or_else(|| spec::default_permissions(kind));
        let central = CentralDirectoryEntry {
            source_version: (spec::CREATOR_UNIX << 8) | spec::VERSION_NEEDED_TO_EXTRACT,
            minimum_extract_version: spec::VERSION_NEEDED_TO_EXTRACT,
            flags: spec::FLAG_UTF8_ENCODING,
            compression_method: method.as_u16(),
            last_modified_time: dos_time,
            last_modified_date: dos_date,
            crc32,
            compressed_size: compressed as u32,
            uncompressed_size: written as u32,
            disk_number: 0,
            internal_file_attributes: 0,
            external_file_attributes: spec::external_attributes(kind, permissions),
            header_offset: start as u32,
            path: name.into_bytes(),
            extra_field: Vec::new(),
            file_comment: Vec::new(),
        };
        central.write(&mut self.file)?;

        let mut eocd = self.eocd.clone();
        eocd.entries += 1;
        eocd.entries_on_this_disk += 1;
        eocd.central_directory_size += central.size_in_file() as u32;
        eocd.central_directory_offset = directory_start as u32;
        eocd.write(&mut self.file)?;
        self.file.flush()?;
        self.eocd = eocd;

        debug!(
            "Added {} ({:?}, {} -> {} bytes)",
            spec::decode_path(&central.path, central.flags),
            kind,
            written,
            compressed
        );
        Ok(())
    }

    /// Streams the entry body per its type.
    /// Returns (uncompressed bytes, compressed bytes, CRC32).
    fn stream_body<F>(
        &mut self,
        kind: EntryType,
        method: CompressionMethod,
        uncompressed_size: u64,
        progress: Option<&Progress>,
        provider: &mut F,
    ) -> ZipResult<(u64, u64, u32)>
    where
        F: FnMut(u64, usize) -> ZipResult<Vec<u8>>,
    {
        match kind {
            EntryType::File => {
                if method == CompressionMethod::Deflate {
                    let (compressed, crc32) =
                        stream::deflate_stream(&mut self.file, uncompressed_size, progress, provider)?;
                    Ok((uncompressed_size, compressed, crc32))
                } else {
                    let (written, crc32) =
                        stream::store_stream(&mut self.file, uncompressed_size, progress, provider)?;
                    Ok((written, written, crc32))
                }
            }
            EntryType::Directory => {
                stream::check_cancelled(progress)?;
                // Nothing to write, but the provider gets to finalize.
                provider(0, 0)?;
                if let Some(p) = progress {
                    p.complete();
                }
                Ok((0, 0, 0))
            }
            EntryType::Symlink => {
                stream::check_cancelled(progress)?;
                let target = provider(0, uncompressed_size as usize)?;
                self.file.write_all(&target)?;
                if let Some(p) = progress {
                    p.add_completed(target.len() as i64);
                }
                let crc32 = crc32fast::hash(&target);
                Ok((target.len() as u64, target.len() as u64, crc32))
            }
        }
    }

    /// Restores the archive to its pre-append bytes: truncate away the
    /// partial entry, then lay the old central directory and EOCD back
    /// down where they were.
    fn rollback(
        &mut self,
        position: u64,
        preserved_directory: &[u8],
        eocd: &EndOfCentralDirectory,
    ) -> ZipResult<()> {
        warn!(
            "Rolling {} back to its pre-append state",
            self.path.display()
        );
        self.file.set_len(position)?;
        self.file.seek(SeekFrom::Start(position))?;
        self.file.write_all(preserved_directory)?;
        eocd.write(&mut self.file)?;
        self.file.flush()?;
        self.eocd = eocd.clone();
        Ok(())
    }

    /// Removes one entry from the archive.
    ///
    /// The archive is rebuilt without the entry into a temp file next
    /// to it, which then atomically replaces the original. Cancellation
    /// abandons the temp file and leaves the original untouched.
    pub fn remove(&mut self, entry: &Entry, progress: Option<&Progress>) -> ZipResult<()> {
        if self.mode == AccessMode::Read {
            return Err(ZipError::FileNotAccessible(self.path.clone()));
        }

        let removed_offset = entry.header_offset();
        let removed_local_size = entry.local_size();
        if let Some(p) = progress {
            p.set_total(self.total_units_for_removal(entry));
        }

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut staging = NamedTempFile::new_in(parent)?;

        let entries: Vec<Entry> = self.entries()?.collect::<ZipResult<_>>()?;
        let removed = entries
            .iter()
            .find(|e| e.header_offset() == removed_offset)
            .ok_or_else(|| {
                ZipError::Unknown(format!("no entry at offset {removed_offset} to remove"))
            })?;
        let removed_central_size = removed.central.size_in_file();

        let mut directory = Vec::new();
        for survivor in entries.iter().filter(|e| e.header_offset() != removed_offset) {
            self.file.seek(SeekFrom::Start(survivor.header_offset()))?;
            copy_region(
                &mut self.file,
                staging.as_file_mut(),
                survivor.local_size(),
                progress,
            )?;

            let mut central = survivor.central.clone();
            if survivor.header_offset() > removed_offset {
                central.header_offset -= removed_local_size as u32;
            }
            central.write(&mut directory)?;
        }

        let directory_start = staging.as_file_mut().stream_position()?;
        staging.as_file_mut().write_all(&directory)?;

        let mut eocd = self.eocd.clone();
        eocd.entries -= 1;
        eocd.entries_on_this_disk -= 1;
        eocd.central_directory_size -= removed_central_size as u32;
        eocd.central_directory_offset = directory_start as u32;
        eocd.write(staging.as_file_mut())?;
        staging.as_file_mut().flush()?;

        // The rename is the commit point; the old handle dies with the
        // displaced file.
        let file = staging
            .persist(&self.path)
            .map_err(|err| ZipError::Io(err.error))?;
        self.file = file;
        self.eocd = eocd;

        debug!("Removed {} from {}", entry.path(), self.path.display());
        Ok(())
    }

    /// How many progress units removing `entry` takes: every byte of
    /// the archive's entry regions except the removed one.
    pub fn total_units_for_removal(&self, entry: &Entry) -> i64 {
        (self.eocd.central_directory_offset as u64).saturating_sub(entry.local_size()) as i64
    }
}

/// The classic format runs out of bits at 4 GiB: the start of the
/// central directory and every size field are 32-bit on the wire, so
/// an entry whose placement would cross that line must be refused
/// (and rolled back) rather than silently truncated.
fn exceeds_classic_limits(directory_start: u64, uncompressed_size: u64) -> bool {
    directory_start > u32::MAX as u64 || uncompressed_size > u32::MAX as u64
}

/// Copies `length` bytes from the current position of `source` to
/// `sink`, chunk by cancellable chunk.
fn copy_region<R: Read, W: Write>(
    source: &mut R,
    sink: &mut W,
    length: u64,
    progress: Option<&Progress>,
) -> ZipResult<()> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut remaining = length;
    while remaining > 0 {
        stream::check_cancelled(progress)?;
        let n = CHUNK_SIZE.min(remaining as usize);
        source.read_exact(&mut buf[..n])?;
        sink.write_all(&buf[..n])?;
        remaining -= n as u64;
        if let Some(p) = progress {
            p.add_completed(n as i64);
        }
    }
    Ok(())
}
