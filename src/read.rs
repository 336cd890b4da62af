//! Tools for opening and reading a ZIP archive.
//!
//! To start, bind an [`Archive`] to a file with [`Archive::open`].
//! The same handle also accepts mutations — see the [`write`] module
//! for appending and removing entries.
//!
//! The central directory is the source of truth: iteration walks it
//! lazily, fetching each entry's local file header (and trailing data
//! descriptor, when bit 3 says there is one) on demand.
//!
//! [`Archive`]: struct.Archive.html
//! [`Archive::open`]: struct.Archive.html#method.open
//! [`write`]: ../write/index.html

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use flate2::read::DeflateDecoder;
use log::*;

use crate::arch::usize;
use crate::crc_reader::Crc32Reader;
use crate::progress::Progress;
use crate::result::*;
use crate::spec::{
    self, CentralDirectoryEntry, DataDescriptor, EndOfCentralDirectory, LocalFileHeader, System,
};
use crate::stream;

/// The compression method used to store a file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompressionMethod {
    /// The file is uncompressed
    Store,
    /// The file is [DEFLATE](https://en.wikipedia.org/wiki/DEFLATE)d.
    /// This is the most common format used by ZIP archives.
    Deflate,
    /// The file is compressed with a yet-unsupported format.
    /// (The u16 indicates the internal format code.)
    Unsupported(u16),
}

/// What kind of filesystem object an entry represents
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
    Symlink,
}

/// How an [`Archive`] is bound to its backing file
///
/// [`Archive`]: struct.Archive.html
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessMode {
    /// Create a new, empty archive. The file must not already exist.
    Create,
    /// Read an existing archive. Mutating operations are refused.
    Read,
    /// Read and mutate an existing archive.
    Update,
}

/// A file, directory, or symlink in the archive
///
/// Entries are value records: they embed owned copies of their on-disk
/// header bytes and carry no reference back to the archive, so they
/// can outlive an iteration pass. Their offsets are only meaningful
/// with the originating archive, though.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub(crate) central: CentralDirectoryEntry,
    pub(crate) local: LocalFileHeader,
    pub(crate) descriptor: Option<DataDescriptor>,
}

impl Entry {
    /// The entry's path, decoded per its flags:
    /// UTF-8 if bit 11 is set, CP437 otherwise.
    ///
    /// An undecodable path comes back as the empty string.
    pub fn path(&self) -> String {
        spec::decode_path(&self.central.path, self.central.flags)
    }

    /// Whether this entry is a file, directory, or symlink,
    /// judged from its creator OS, external attributes, and name.
    pub fn entry_type(&self) -> EntryType {
        spec::entry_type_from(
            System::from_source_version(self.central.source_version),
            self.central.external_file_attributes,
            &self.path(),
        )
    }

    pub fn is_file(&self) -> bool {
        self.entry_type() == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type() == EntryType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.entry_type() == EntryType::Symlink
    }

    /// Uncompressed size of the entry in bytes
    pub fn uncompressed_size(&self) -> u64 {
        self.central.uncompressed_size as u64
    }

    /// Compressed size of the entry in bytes
    pub fn compressed_size(&self) -> u64 {
        self.central.compressed_size as u64
    }

    /// The CRC-32 of the decompressed entry
    pub fn crc32(&self) -> u32 {
        self.central.crc32
    }

    pub fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::from_u16(self.central.compression_method)
    }

    /// The date and time the entry was last modified,
    /// at MS-DOS's two-second resolution
    pub fn last_modified(&self) -> NaiveDateTime {
        spec::parse_msdos(
            self.central.last_modified_time,
            self.central.last_modified_date,
        )
    }

    /// Unix mode bits, if the entry was archived by a Unix-ish OS.
    ///
    /// This library does _not_ try to convert DOS permission bits into
    /// roughly-equivalent Unix mode bits, or do other cross-OS
    /// handwaving.
    pub fn unix_mode(&self) -> Option<u16> {
        match System::from_source_version(self.central.source_version) {
            System::Unix => Some((self.central.external_file_attributes >> 16) as u16),
            _ => None,
        }
    }

    /// The entry's comment bytes from the central directory, if any.
    pub fn comment(&self) -> &[u8] {
        &self.central.file_comment
    }

    /// The offset of the entry's local file header in the archive
    pub fn header_offset(&self) -> u64 {
        self.central.header_offset as u64
    }

    /// How many progress units extracting this entry takes:
    /// its uncompressed size, or one unit for a directory.
    pub fn total_unit_count(&self) -> i64 {
        match self.entry_type() {
            EntryType::Directory => 1,
            _ => self.uncompressed_size() as i64,
        }
    }

    /// The on-disk length of the payload:
    /// the compressed size, unless the entry is stored.
    pub(crate) fn payload_size(&self) -> u64 {
        payload_size_of(&self.central)
    }

    /// Where the payload starts in the archive.
    pub(crate) fn data_offset(&self) -> u64 {
        self.header_offset() + self.local.size_in_file()
    }

    /// The total length of the entry's local region: local header,
    /// name and extra field, payload, and data descriptor if present.
    pub(crate) fn local_size(&self) -> u64 {
        self.local.size_in_file()
            + self.payload_size()
            + self.descriptor.map(|d| d.size_in_file()).unwrap_or(0)
    }
}

fn payload_size_of(central: &CentralDirectoryEntry) -> u64 {
    if central.compression_method != 0 {
        central.compressed_size as u64
    } else {
        central.uncompressed_size as u64
    }
}

/// A ZIP archive bound to a backing file
///
/// The archive exclusively owns its file handle and keeps the End of
/// central directory record mirrored in memory. It is single-threaded
/// and non-reentrant: callers must serialize access to one handle.
#[derive(Debug)]
pub struct Archive {
    pub(crate) file: File,
    pub(crate) path: PathBuf,
    pub(crate) mode: AccessMode,
    pub(crate) eocd: EndOfCentralDirectory,
}

impl Archive {
    /// Binds an archive to the file at `path`.
    ///
    /// - [`AccessMode::Create`] initializes a new archive holding
    ///   nothing but an empty End of central directory record.
    ///   A pre-existing file fails with
    ///   [`ZipError::FileNotAccessible`].
    /// - [`AccessMode::Read`] and [`AccessMode::Update`] open an
    ///   existing archive; a missing file fails with
    ///   [`ZipError::FileNotFound`], and a file without a locatable
    ///   End of central directory record with
    ///   [`ZipError::InvalidFormat`].
    ///
    /// [`AccessMode::Create`]: enum.AccessMode.html#variant.Create
    /// [`AccessMode::Read`]: enum.AccessMode.html#variant.Read
    /// [`AccessMode::Update`]: enum.AccessMode.html#variant.Update
    /// [`ZipError::FileNotAccessible`]: ../result/enum.ZipError.html#variant.FileNotAccessible
    /// [`ZipError::FileNotFound`]: ../result/enum.ZipError.html#variant.FileNotFound
    /// [`ZipError::InvalidFormat`]: ../result/enum.ZipError.html#variant.InvalidFormat
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> ZipResult<Self> {
        let path = path.as_ref().to_owned();
        let mut file = match mode {
            AccessMode::Create => OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&path),
            AccessMode::Read => File::open(&path),
            AccessMode::Update => OpenOptions::new().read(true).write(true).open(&path),
        }
        .map_err(|err| open_error(err, &path))?;

        let eocd = match mode {
            AccessMode::Create => {
                let eocd = EndOfCentralDirectory::empty();
                eocd.write(&mut file)?;
                eocd
            }
            _ => locate_eocd(&mut file)?,
        };

        debug!("Opened {} in {:?} mode: {:?}", path.display(), mode, eocd);
        Ok(Archive {
            file,
            path,
            mode,
            eocd,
        })
    }

    /// The path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// The archive's comment bytes, trailing the End of central
    /// directory record. Preserved across mutations.
    pub fn comment(&self) -> &[u8] {
        &self.eocd.file_comment
    }

    /// The number of entries in the central directory.
    pub fn len(&self) -> usize {
        self.eocd.entries as usize
    }

    pub fn is_empty(&self) -> bool {
        self.eocd.entries == 0
    }

    /// Iterates over the archive's entries in central directory order.
    ///
    /// Entries this library can't read — ZIP64 and encrypted ones —
    /// are skipped (with a log warning) rather than failing the scan.
    pub fn entries(&mut self) -> ZipResult<Entries<'_>> {
        self.file
            .seek(SeekFrom::Start(self.eocd.central_directory_offset as u64))?;
        let mut directory = vec![0u8; usize(self.eocd.central_directory_size)?];
        self.file
            .read_exact(&mut directory)
            .map_err(|_| ZipError::InvalidFormat("Truncated central directory"))?;

        let remaining = self.eocd.entries;
        Ok(Entries {
            archive: self,
            directory,
            cursor: 0,
            remaining,
        })
    }

    /// Looks an entry up by its exact path.
    ///
    /// The format permits duplicate paths; the first match wins.
    pub fn entry(&mut self, path: &str) -> ZipResult<Option<Entry>> {
        for entry in self.entries()? {
            let entry = entry?;
            if entry.path() == path {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Streams an entry's decompressed content to `consumer`,
    /// one chunk at a time.
    ///
    /// Returns the CRC-32 of the content. Directories produce no
    /// chunks. A compression method other than store or DEFLATE fails
    /// with [`ZipError::InvalidArchiveLevel`].
    ///
    /// [`ZipError::InvalidArchiveLevel`]: ../result/enum.ZipError.html#variant.InvalidArchiveLevel
    pub fn extract<F>(
        &mut self,
        entry: &Entry,
        progress: Option<&Progress>,
        mut consumer: F,
    ) -> ZipResult<u32>
    where
        F: FnMut(&[u8]) -> ZipResult<()>,
    {
        if let Some(p) = progress {
            p.set_total(entry.total_unit_count());
        }
        debug!("Extracting {}", entry.path());

        if entry.is_dir() {
            stream::check_cancelled(progress)?;
            if let Some(p) = progress {
                p.complete();
            }
            return Ok(0);
        }

        let mut reader = self.payload_reader(entry)?;
        let (_, crc32) = stream::drain(&mut reader, progress, &mut consumer)?;
        Ok(crc32)
    }

    /// Extracts an entry to `destination` on the filesystem.
    ///
    /// Files and symlinks are created anew (an existing destination
    /// fails with [`ZipError::FileNotAccessible`]); missing parent
    /// directories are created. Unix permission bits and modification
    /// times are applied where the entry carries them.
    ///
    /// Returns the CRC-32 of the extracted content.
    ///
    /// [`ZipError::FileNotAccessible`]: ../result/enum.ZipError.html#variant.FileNotAccessible
    pub fn extract_to_path<P: AsRef<Path>>(
        &mut self,
        entry: &Entry,
        destination: P,
        progress: Option<&Progress>,
    ) -> ZipResult<u32> {
        let destination = destination.as_ref();
        match entry.entry_type() {
            EntryType::File => {
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(destination)
                    .map_err(|err| open_error(err, destination))?;
                let crc32 = self.extract(entry, progress, |chunk| {
                    out.write_all(chunk)?;
                    Ok(())
                })?;

                #[cfg(unix)]
                if let Some(mode) = entry.unix_mode() {
                    use std::os::unix::fs::PermissionsExt;
                    out.set_permissions(fs::Permissions::from_mode((mode & 0o7777) as u32))?;
                }
                let timestamp = entry.last_modified().and_utc().timestamp();
                if timestamp >= 0 {
                    out.set_modified(
                        std::time::UNIX_EPOCH + std::time::Duration::from_secs(timestamp as u64),
                    )?;
                }
                Ok(crc32)
            }
            EntryType::Directory => {
                fs::create_dir_all(destination)?;
                let crc32 = self.extract(entry, progress, |_| Ok(()))?;
                #[cfg(unix)]
                if let Some(mode) = entry.unix_mode() {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(
                        destination,
                        fs::Permissions::from_mode((mode & 0o7777) as u32),
                    )?;
                }
                Ok(crc32)
            }
            EntryType::Symlink => self.extract_symlink(entry, destination, progress),
        }
    }

    #[cfg(unix)]
    fn extract_symlink(
        &mut self,
        entry: &Entry,
        destination: &Path,
        progress: Option<&Progress>,
    ) -> ZipResult<u32> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let mut target = Vec::new();
        let crc32 = self.extract(entry, progress, |chunk| {
            target.extend_from_slice(chunk);
            Ok(())
        })?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        std::os::unix::fs::symlink(OsStr::from_bytes(&target), destination)
            .map_err(|err| open_error(err, destination))?;
        Ok(crc32)
    }

    #[cfg(not(unix))]
    fn extract_symlink(
        &mut self,
        _entry: &Entry,
        _destination: &Path,
        _progress: Option<&Progress>,
    ) -> ZipResult<u32> {
        Err(ZipError::Unknown(
            "symbolic links are unsupported on this platform".into(),
        ))
    }

    /// Returns a reader over the entry's decompressed content
    /// that validates the recorded CRC-32 when it reaches EOF.
    pub fn reader(&mut self, entry: &Entry) -> ZipResult<Box<dyn Read + Send + '_>> {
        let crc32 = entry.crc32();
        match entry.compression_method() {
            CompressionMethod::Store => {
                let payload = self.raw_payload(entry)?;
                Ok(Box::new(Crc32Reader::with_expected(payload, crc32)))
            }
            CompressionMethod::Deflate => {
                let payload = self.raw_payload(entry)?;
                Ok(Box::new(Crc32Reader::with_expected(
                    DeflateDecoder::new(payload),
                    crc32,
                )))
            }
            CompressionMethod::Unsupported(v) => Err(ZipError::InvalidArchiveLevel(v)),
        }
    }

    /// Seeks to the entry's payload and bounds a reader to it.
    fn raw_payload(&mut self, entry: &Entry) -> ZipResult<io::Take<&mut File>> {
        self.file.seek(SeekFrom::Start(entry.data_offset()))?;
        Ok((&mut self.file).take(entry.payload_size()))
    }

    /// A decompressing reader over the entry's payload.
    fn payload_reader(&mut self, entry: &Entry) -> ZipResult<Box<dyn Read + Send + '_>> {
        match entry.compression_method() {
            CompressionMethod::Store => {
                let payload = self.raw_payload(entry)?;
                Ok(Box::new(payload))
            }
            CompressionMethod::Deflate => {
                let payload = self.raw_payload(entry)?;
                Ok(Box::new(DeflateDecoder::new(payload)))
            }
            CompressionMethod::Unsupported(v) => Err(ZipError::InvalidArchiveLevel(v)),
        }
    }

    /// Assembles an [`Entry`] from its central directory record by
    /// fetching the local file header (and data descriptor, if bit 3
    /// promises one) it points at.
    fn materialize(&mut self, central: CentralDirectoryEntry) -> ZipResult<Entry> {
        self.file.seek(SeekFrom::Start(central.header_offset as u64))?;
        let local = LocalFileHeader::read_from(&mut self.file)?;
        trace!("{:?}", local);

        if local.path != central.path {
            warn!(
                "Local file header name doesn't match its central directory record at offset {}",
                central.header_offset
            );
        }

        let descriptor = if local.flags & spec::FLAG_DATA_DESCRIPTOR != 0 {
            let descriptor_offset =
                central.header_offset as u64 + local.size_in_file() + payload_size_of(&central);
            self.file.seek(SeekFrom::Start(descriptor_offset))?;
            let descriptor = DataDescriptor::read_from(&mut self.file)?;
            if descriptor.crc32 != central.crc32
                || descriptor.compressed_size != central.compressed_size
                || descriptor.uncompressed_size != central.uncompressed_size
            {
                warn!(
                    "Data descriptor at offset {descriptor_offset} disagrees with its central directory record"
                );
            }
            Some(descriptor)
        } else {
            None
        };

        Ok(Entry {
            central,
            local,
            descriptor,
        })
    }
}

/// Lazily iterates the central directory, materializing one [`Entry`]
/// per supported record.
///
/// Holds a snapshot of the directory bytes, so the borrow on the
/// archive is only used to fetch local headers as entries come up.
pub struct Entries<'a> {
    archive: &'a mut Archive,
    directory: Vec<u8>,
    cursor: usize,
    remaining: u16,
}

impl Entries<'_> {
    fn next_entry(&mut self) -> ZipResult<Option<Entry>> {
        let mut slice = &self.directory[self.cursor..];
        let before = slice.len();
        let central = CentralDirectoryEntry::parse_and_consume(&mut slice)?;
        self.cursor += before - slice.len();
        trace!("{:?}", central);

        if central.minimum_extract_version >= spec::VERSION_NEEDED_ZIP64 {
            warn!(
                "Skipping entry at offset {}: needs version {} (ZIP64 or later) to extract",
                central.header_offset, central.minimum_extract_version
            );
            return Ok(None);
        }
        if spec::is_encrypted(central.flags) {
            warn!("Skipping encrypted entry at offset {}", central.header_offset);
            return Ok(None);
        }

        self.archive.materialize(central).map(Some)
    }
}

impl Iterator for Entries<'_> {
    type Item = ZipResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            self.remaining -= 1;
            match self.next_entry() {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(err) => {
                    // A mangled record poisons the rest of the walk.
                    self.remaining = 0;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

/// Maps open-style I/O errors onto the filesystem-precondition kinds.
fn open_error(err: io::Error, path: &Path) -> ZipError {
    match err.kind() {
        io::ErrorKind::NotFound => ZipError::FileNotFound(path.to_owned()),
        io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied => {
            ZipError::FileNotAccessible(path.to_owned())
        }
        _ => ZipError::Io(err),
    }
}

/// Finds and decodes the End of central directory record by searching
/// backward through the file's tail.
///
/// One bounded read covers the whole search window (the record plus a
/// maximal comment); the signature scan itself runs in memory.
fn locate_eocd(file: &mut File) -> ZipResult<EndOfCentralDirectory> {
    let file_size = file.seek(SeekFrom::End(0))?;
    if file_size < EndOfCentralDirectory::SIZE as u64 {
        return Err(ZipError::InvalidFormat(
            "Too small for an End Of Central Directory Record",
        ));
    }

    let window = file_size.min(spec::EOCDR_SEARCH_WINDOW);
    file.seek(SeekFrom::Start(file_size - window))?;
    let mut tail = vec![0u8; usize(window)?];
    file.read_exact(&mut tail)?;

    let posit = spec::find_eocdr(&tail)?;
    let eocd = EndOfCentralDirectory::parse(&tail[posit..])?;
    trace!("{:?}", eocd);

    if eocd.disk_number != eocd.disk_with_central_directory
        || eocd.entries != eocd.entries_on_this_disk
    {
        return Err(ZipError::InvalidFormat(
            "No support for multi-disk archives",
        ));
    }

    Ok(eocd)
}
