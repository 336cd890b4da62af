//! Code specific to the ZIP file format specification.
//!
//! We try to keep the nitty gritty here,
//! and higher-level stuff in the [`read`] and [`write`] modules.
//! (This pattern, like several others, was inspired by the Zip crate.)
//!
//! Since this library rewrites archives as well as reading them,
//! each record knows how to encode itself back into the exact
//! little-endian wire layout it was parsed from.
//!
//! Most comments quote the ZIP spec, [`APPNOTE.TXT`].
//!
//! [_Zip Files: History, Explanation and Implementation_]
//! is also a fantastic resource and a great read.
//!
//! [`read`]: ../read/index.html
//! [`write`]: ../write/index.html
//! [`APPNOTE.TXT`]: https://pkware.cachefly.net/webdocs/APPNOTE/APPNOTE-6.3.6.TXT
//! [_Zip Files: History, Explanation and Implementation_]: https://www.hanshq.net/zip.html

use std::io::{self, Read, Write};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use codepage_437::*;
use memchr::memmem;

use crate::arch::usize;
use crate::read::{CompressionMethod, EntryType};
use crate::result::*;

// Magic numbers denoting various sections of a ZIP archive

/// End of central directory magic number
pub(crate) const EOCDR_MAGIC: [u8; 4] = [b'P', b'K', 5, 6];
/// Central directory magic number
pub(crate) const CENTRAL_DIRECTORY_MAGIC: [u8; 4] = [b'P', b'K', 1, 2];
/// Local file header magic number
pub(crate) const LOCAL_FILE_HEADER_MAGIC: [u8; 4] = [b'P', b'K', 3, 4];
/// Data descriptor magic number (optional; descriptors may omit it)
pub(crate) const DATA_DESCRIPTOR_MAGIC: [u8; 4] = [b'P', b'K', 7, 8];

/// How far from the end of the file we search for the
/// End of central directory record: the 22-byte record,
/// a maximal 65535-byte comment, and some slack.
pub const EOCDR_SEARCH_WINDOW: u64 = 66_000;

/// The version we stamp into headers we write: 2.0,
/// i.e., DEFLATE and directory support, nothing fancier.
pub(crate) const VERSION_NEEDED_TO_EXTRACT: u16 = 20;

/// Entries needing 4.5 or later are ZIP64 (or worse), which we skip.
pub(crate) const VERSION_NEEDED_ZIP64: u16 = 45;

/// "Version made by" high byte for Unix creators.
pub(crate) const CREATOR_UNIX: u16 = 3;
/// "Version made by" high byte for OS X (Darwin) creators.
pub(crate) const CREATOR_DARWIN: u16 = 19;

// General purpose bit flags

/// Bit 0: the file is encrypted.
pub(crate) const FLAG_ENCRYPTED: u16 = 1;
/// Bit 3: CRC and sizes live in a data descriptor after the payload.
pub(crate) const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// Bit 11: the file name and comment are UTF-8.
pub(crate) const FLAG_UTF8_ENCODING: u16 = 1 << 11;

/// Default POSIX permissions for files and symlinks we write.
pub const DEFAULT_FILE_PERMISSIONS: u16 = 0o644;
/// Default POSIX permissions for directories we write.
pub const DEFAULT_DIRECTORY_PERMISSIONS: u16 = 0o755;

// Unix file type constants, as found in the upper half of
// external file attributes written by Unix-ish archivers.
pub(crate) const S_IFMT: u32 = 0o170000;
pub(crate) const S_IFLNK: u32 = 0o120000;
pub(crate) const S_IFREG: u32 = 0o100000;
pub(crate) const S_IFDIR: u32 = 0o040000;

impl CompressionMethod {
    pub(crate) fn from_u16(u: u16) -> Self {
        match u {
            0 => CompressionMethod::Store,
            8 => CompressionMethod::Deflate,
            v => CompressionMethod::Unsupported(v),
        }
    }

    pub(crate) fn as_u16(self) -> u16 {
        match self {
            CompressionMethod::Store => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unsupported(v) => v,
        }
    }
}

/// The OS a file in the archive was compressed with.
/// Used to decode additional metadata like permissions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum System {
    Dos,
    Unix,
    Unknown,
}

impl System {
    pub(crate) fn from_source_version(source_version: u16) -> Self {
        // 4.4.2.1 The upper byte indicates the compatibility of the file
        // attribute information.  If the external file attributes
        // are compatible with MS-DOS and can be read by PKZIP for
        // DOS version 2.04g then this value will be zero.
        //
        // 4.4.2.2 The current mappings are:
        //
        //  0 - MS-DOS and OS/2 (FAT / VFAT / FAT32 file systems)
        //  3 - UNIX                     19 - OS X (Darwin)
        //  ... and a dozen others we treat as unknown.
        //
        // Darwin stores Unix attributes, so it gets the Unix treatment.
        match source_version >> 8 {
            0 => System::Dos,
            v if v == CREATOR_UNIX || v == CREATOR_DARWIN => System::Unix,
            _ => System::Unknown,
        }
    }
}

// Slice cursors, one per integer width.
// Unlike a plain split_at(), these fail with `InvalidFormat`
// when a record runs out of bytes mid-field.

/// Reads a little-endian u32 from the front of the provided slice, shrinking it.
fn read_u32(input: &mut &[u8]) -> ZipResult<u32> {
    if input.len() < 4 {
        return Err(ZipError::InvalidFormat("Truncated record"));
    }
    let (int_bytes, rest) = input.split_at(4);
    *input = rest;
    Ok(u32::from_le_bytes(
        int_bytes.try_into().expect("four bytes for u32"),
    ))
}

/// Reads a little-endian u16 from the front of the provided slice, shrinking it.
fn read_u16(input: &mut &[u8]) -> ZipResult<u16> {
    if input.len() < 2 {
        return Err(ZipError::InvalidFormat("Truncated record"));
    }
    let (int_bytes, rest) = input.split_at(2);
    *input = rest;
    Ok(u16::from_le_bytes(
        int_bytes.try_into().expect("two bytes for u16"),
    ))
}

/// Takes an owned copy of the next `count` bytes, shrinking the slice.
fn take_bytes(input: &mut &[u8], count: usize) -> ZipResult<Vec<u8>> {
    if input.len() < count {
        return Err(ZipError::InvalidFormat("Truncated record"));
    }
    let (taken, rest) = input.split_at(count);
    *input = rest;
    Ok(taken.to_vec())
}

/// Data from the End of central directory record
///
/// Found at the back of the ZIP archive and provides offsets for finding
/// its central directory, along with lots of stuff that stopped being relevant
/// when we stopped breaking ZIP archives onto multiple floppies.
#[derive(Debug, Clone)]
pub(crate) struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_central_directory: u16,
    pub entries_on_this_disk: u16,
    pub entries: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub file_comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    /// Size of the record, sans comment.
    pub const SIZE: usize = 22;

    /// The record a freshly created, empty archive gets.
    pub fn empty() -> Self {
        Self {
            disk_number: 0,
            disk_with_central_directory: 0,
            entries_on_this_disk: 0,
            entries: 0,
            central_directory_size: 0,
            central_directory_offset: 0,
            file_comment: Vec::new(),
        }
    }

    pub fn parse(mut eocdr: &[u8]) -> ZipResult<Self> {
        // 4.3.16  End of central directory record:
        //
        // end of central dir signature    4 bytes  (0x06054b50)
        // number of this disk             2 bytes
        // number of the disk with the
        // start of the central directory  2 bytes
        // total number of entries in
        // the central dir on this disk    2 bytes
        // total number of entries in
        // the central dir                 2 bytes
        // size of the central directory   4 bytes
        // offset of start of central
        // directory with respect to
        // the starting disk number        4 bytes
        // zipfile comment length          2 bytes
        if read_u32(&mut eocdr)?.to_le_bytes() != EOCDR_MAGIC {
            return Err(ZipError::InvalidFormat(
                "Invalid End Of Central Directory Record",
            ));
        }
        let disk_number = read_u16(&mut eocdr)?;
        let disk_with_central_directory = read_u16(&mut eocdr)?;
        let entries_on_this_disk = read_u16(&mut eocdr)?;
        let entries = read_u16(&mut eocdr)?;
        let central_directory_size = read_u32(&mut eocdr)?;
        let central_directory_offset = read_u32(&mut eocdr)?;
        let comment_length = read_u16(&mut eocdr)?;
        let file_comment = take_bytes(&mut eocdr, usize(comment_length)?)?;

        Ok(Self {
            disk_number,
            disk_with_central_directory,
            entries_on_this_disk,
            entries,
            central_directory_size,
            central_directory_offset,
            file_comment,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&EOCDR_MAGIC)?;
        w.write_all(&self.disk_number.to_le_bytes())?;
        w.write_all(&self.disk_with_central_directory.to_le_bytes())?;
        w.write_all(&self.entries_on_this_disk.to_le_bytes())?;
        w.write_all(&self.entries.to_le_bytes())?;
        w.write_all(&self.central_directory_size.to_le_bytes())?;
        w.write_all(&self.central_directory_offset.to_le_bytes())?;
        w.write_all(&(self.file_comment.len() as u16).to_le_bytes())?;
        w.write_all(&self.file_comment)?;
        Ok(())
    }
}

/// Searches backward through `tail` (the last [`EOCDR_SEARCH_WINDOW`]
/// bytes of the file, or all of it if smaller) to find the
/// End of central directory record.
///
/// It should be right at the end of the file,
/// but its variable-length comment means we can't jump to a known offset.
pub(crate) fn find_eocdr(tail: &[u8]) -> ZipResult<usize> {
    memmem::rfind(tail, &EOCDR_MAGIC).ok_or(ZipError::InvalidFormat(
        "Couldn't find End Of Central Directory Record",
    ))
}

/// Data from a central directory entry
///
/// Each of these records contains information about a file, directory,
/// or symlink stored in the ZIP archive, and is the authoritative copy
/// of the entry's sizes, CRC, and local header offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CentralDirectoryEntry {
    pub source_version: u16,
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_number: u16,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    pub header_offset: u32,
    pub path: Vec<u8>,
    pub extra_field: Vec<u8>,
    pub file_comment: Vec<u8>,
}

impl CentralDirectoryEntry {
    /// Size of the record, sans name, extra field, and comment.
    pub const FIXED_SIZE: usize = 46;

    pub fn parse_and_consume(entry: &mut &[u8]) -> ZipResult<Self> {
        // 4.3.12  Central directory structure:
        //
        //   central file header signature   4 bytes  (0x02014b50)
        //   version made by                 2 bytes
        //   version needed to extract       2 bytes
        //   general purpose bit flag        2 bytes
        //   compression method              2 bytes
        //   last mod file time              2 bytes
        //   last mod file date              2 bytes
        //   crc-32                          4 bytes
        //   compressed size                 4 bytes
        //   uncompressed size               4 bytes
        //   file name length                2 bytes
        //   extra field length              2 bytes
        //   file comment length             2 bytes
        //   disk number start               2 bytes
        //   internal file attributes        2 bytes
        //   external file attributes        4 bytes
        //   relative offset of local header 4 bytes
        //
        //   file name (variable size)
        //   extra field (variable size)
        //   file comment (variable size)
        if read_u32(entry)?.to_le_bytes() != CENTRAL_DIRECTORY_MAGIC {
            return Err(ZipError::InvalidFormat("Invalid central directory entry"));
        }
        let source_version = read_u16(entry)?;
        let minimum_extract_version = read_u16(entry)?;
        let flags = read_u16(entry)?;
        let compression_method = read_u16(entry)?;
        let last_modified_time = read_u16(entry)?;
        let last_modified_date = read_u16(entry)?;
        let crc32 = read_u32(entry)?;
        let compressed_size = read_u32(entry)?;
        let uncompressed_size = read_u32(entry)?;
        let path_length = usize(read_u16(entry)?)?;
        let extra_field_length = usize(read_u16(entry)?)?;
        let file_comment_length = usize(read_u16(entry)?)?;
        let disk_number = read_u16(entry)?;
        let internal_file_attributes = read_u16(entry)?;
        let external_file_attributes = read_u32(entry)?;
        let header_offset = read_u32(entry)?;
        let path = take_bytes(entry, path_length)?;
        let extra_field = take_bytes(entry, extra_field_length)?;
        let file_comment = take_bytes(entry, file_comment_length)?;

        Ok(Self {
            source_version,
            minimum_extract_version,
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_number,
            internal_file_attributes,
            external_file_attributes,
            header_offset,
            path,
            extra_field,
            file_comment,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&CENTRAL_DIRECTORY_MAGIC)?;
        w.write_all(&self.source_version.to_le_bytes())?;
        w.write_all(&self.minimum_extract_version.to_le_bytes())?;
        w.write_all(&self.flags.to_le_bytes())?;
        w.write_all(&self.compression_method.to_le_bytes())?;
        w.write_all(&self.last_modified_time.to_le_bytes())?;
        w.write_all(&self.last_modified_date.to_le_bytes())?;
        w.write_all(&self.crc32.to_le_bytes())?;
        w.write_all(&self.compressed_size.to_le_bytes())?;
        w.write_all(&self.uncompressed_size.to_le_bytes())?;
        w.write_all(&(self.path.len() as u16).to_le_bytes())?;
        w.write_all(&(self.extra_field.len() as u16).to_le_bytes())?;
        w.write_all(&(self.file_comment.len() as u16).to_le_bytes())?;
        w.write_all(&self.disk_number.to_le_bytes())?;
        w.write_all(&self.internal_file_attributes.to_le_bytes())?;
        w.write_all(&self.external_file_attributes.to_le_bytes())?;
        w.write_all(&self.header_offset.to_le_bytes())?;
        w.write_all(&self.path)?;
        w.write_all(&self.extra_field)?;
        w.write_all(&self.file_comment)?;
        Ok(())
    }

    /// The record's total on-disk length, tails included.
    pub fn size_in_file(&self) -> u64 {
        (Self::FIXED_SIZE + self.path.len() + self.extra_field.len() + self.file_comment.len())
            as u64
    }
}

/// Data from a local file header
///
/// Each entry's payload is preceded by this header.
/// It mirrors a subset of the central directory record;
/// when bit 3 of the flags is set, its CRC and sizes are zero
/// and the real values follow the payload in a data descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LocalFileHeader {
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub path: Vec<u8>,
    pub extra_field: Vec<u8>,
}

impl LocalFileHeader {
    /// Size of the record, sans name and extra field.
    pub const FIXED_SIZE: usize = 30;

    /// Reads a header from the current position of `r`,
    /// fetching the variable tails after decoding the fixed prefix.
    pub fn read_from<R: Read>(r: &mut R) -> ZipResult<Self> {
        // 4.3.7  Local file header:
        //
        // local file header signature     4 bytes  (0x04034b50)
        // version needed to extract       2 bytes
        // general purpose bit flag        2 bytes
        // compression method              2 bytes
        // last mod file time              2 bytes
        // last mod file date              2 bytes
        // crc-32                          4 bytes
        // compressed size                 4 bytes
        // uncompressed size               4 bytes
        // file name length                2 bytes
        // extra field length              2 bytes
        //
        // file name (variable size)
        // extra field (variable size)
        let mut fixed = [0u8; Self::FIXED_SIZE];
        r.read_exact(&mut fixed)
            .map_err(|_| ZipError::InvalidFormat("Truncated local file header"))?;
        let mut header = &fixed[..];

        if read_u32(&mut header)?.to_le_bytes() != LOCAL_FILE_HEADER_MAGIC {
            return Err(ZipError::InvalidFormat("Invalid local file header"));
        }
        let minimum_extract_version = read_u16(&mut header)?;
        let flags = read_u16(&mut header)?;
        let compression_method = read_u16(&mut header)?;
        let last_modified_time = read_u16(&mut header)?;
        let last_modified_date = read_u16(&mut header)?;
        let crc32 = read_u32(&mut header)?;
        let compressed_size = read_u32(&mut header)?;
        let uncompressed_size = read_u32(&mut header)?;
        let path_length = usize(read_u16(&mut header)?)?;
        let extra_field_length = usize(read_u16(&mut header)?)?;

        let mut path = vec![0u8; path_length];
        r.read_exact(&mut path)
            .map_err(|_| ZipError::InvalidFormat("Truncated local file header"))?;
        let mut extra_field = vec![0u8; extra_field_length];
        r.read_exact(&mut extra_field)
            .map_err(|_| ZipError::InvalidFormat("Truncated local file header"))?;

        Ok(Self {
            minimum_extract_version,
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            path,
            extra_field,
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&LOCAL_FILE_HEADER_MAGIC)?;
        w.write_all(&self.minimum_extract_version.to_le_bytes())?;
        w.write_all(&self.flags.to_le_bytes())?;
        w.write_all(&self.compression_method.to_le_bytes())?;
        w.write_all(&self.last_modified_time.to_le_bytes())?;
        w.write_all(&self.last_modified_date.to_le_bytes())?;
        w.write_all(&self.crc32.to_le_bytes())?;
        w.write_all(&self.compressed_size.to_le_bytes())?;
        w.write_all(&self.uncompressed_size.to_le_bytes())?;
        w.write_all(&(self.path.len() as u16).to_le_bytes())?;
        w.write_all(&(self.extra_field.len() as u16).to_le_bytes())?;
        w.write_all(&self.path)?;
        w.write_all(&self.extra_field)?;
        Ok(())
    }

    /// The record's total on-disk length, tails included.
    pub fn size_in_file(&self) -> u64 {
        (Self::FIXED_SIZE + self.path.len() + self.extra_field.len()) as u64
    }
}

/// Data from a data descriptor
///
/// When bit 3 of the flags is set, this trails the payload and carries
/// the CRC and sizes the local file header couldn't know up front.
/// The signature is optional; 4.3.9.3 says implementations SHOULD write
/// it, but we have to cope either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub has_signature: bool,
}

impl DataDescriptor {
    /// Reads a descriptor from the current position of `r`,
    /// autodetecting the optional signature prefix.
    pub fn read_from<R: Read>(r: &mut R) -> ZipResult<Self> {
        // 4.3.9  Data descriptor:
        //
        // crc-32                          4 bytes
        // compressed size                 4 bytes
        // uncompressed size               4 bytes
        //
        // 4.3.9.3 Although not originally assigned a signature, the
        // value 0x08074b50 has commonly been adopted as a signature.
        let mut buf = [0u8; 16];
        r.read_exact(&mut buf)
            .map_err(|_| ZipError::InvalidFormat("Truncated data descriptor"))?;

        let has_signature = buf[..4] == DATA_DESCRIPTOR_MAGIC;
        let mut fields = if has_signature { &buf[4..] } else { &buf[..12] };

        let crc32 = read_u32(&mut fields)?;
        let compressed_size = read_u32(&mut fields)?;
        let uncompressed_size = read_u32(&mut fields)?;

        Ok(Self {
            crc32,
            compressed_size,
            uncompressed_size,
            has_signature,
        })
    }

    /// The record's total on-disk length: 16 with the signature, 12 without.
    pub fn size_in_file(&self) -> u64 {
        if self.has_signature {
            16
        } else {
            12
        }
    }
}

/// Extracts the "is this text UTF-8?" bit from the 16-bit flags field.
///
/// If false, text is assumed to be CP437.
pub(crate) fn is_utf8(flags: u16) -> bool {
    // Bit 11: Language encoding flag (EFS).  If this bit is set,
    //         the filename and comment fields for this file
    //         MUST be encoded using UTF-8. (see APPENDIX D)
    flags & FLAG_UTF8_ENCODING != 0
}

/// Extracts the "is this file encrypted?" bit from the 16-bit flags field.
pub(crate) fn is_encrypted(flags: u16) -> bool {
    // Bit 0: If set, indicates that the file is encrypted
    flags & FLAG_ENCRYPTED != 0
}

/// Decodes file name bytes per the entry's flags:
/// UTF-8 when bit 11 is set, CP437 ("dos Latin US") otherwise.
///
/// An undecodable name yields an empty string rather than an error,
/// so one mangled entry can't poison a whole directory scan.
pub(crate) fn decode_path(bytes: &[u8], flags: u16) -> String {
    if is_utf8(flags) {
        std::str::from_utf8(bytes).map(str::to_owned).unwrap_or_default()
    } else {
        // Every byte is defined in CP437, so this can't fail.
        let cow: std::borrow::Cow<str> = std::borrow::Cow::borrow_from_cp437(bytes, &CP437_CONTROL);
        cow.into_owned()
    }
}

/// Unpacks an MS-DOS date/time pair into a wall-clock time.
///
/// Nonsense fields (a zeroed date is month zero, day zero) fall back
/// to the DOS epoch, 1980-01-01.
pub(crate) fn parse_msdos(time: u16, date: u16) -> NaiveDateTime {
    let seconds = (0b0000_0000_0001_1111 & time) as u32 * 2; // MSDOS uses 2-second precision
    let minutes = (0b0000_0111_1110_0000 & time) as u32 >> 5;
    let hours = (0b1111_1000_0000_0000 & time) as u32 >> 11;

    let days = (0b0000_0000_0001_1111 & date) as u32;
    let months = (0b0000_0001_1110_0000 & date) as u32 >> 5;
    // MSDOS uses years since 1980; Always interpreted as a positive value
    let years = ((0b1111_1110_0000_0000 & date) >> 9) as i32 + 1980;

    NaiveDate::from_ymd_opt(years, months, days)
        .and_then(|d| d.and_hms_opt(hours, minutes, seconds))
        .unwrap_or_else(dos_epoch)
}

/// Packs a wall-clock time (UTC) into the MS-DOS date/time pair,
/// returned as (time, date).
///
/// DOS years span [1980, 2107], but we clamp to 2099 to sidestep
/// decoders that still treat the field as two-digit-year-shaped.
pub(crate) fn encode_msdos(when: &NaiveDateTime) -> (u16, u16) {
    let year = when.year().clamp(1980, 2099);
    let date = (when.day() as u16) | ((when.month() as u16) << 5) | (((year - 1980) as u16) << 9);
    let time =
        ((when.second() / 2) as u16) | ((when.minute() as u16) << 5) | ((when.hour() as u16) << 11);
    (time, date)
}

fn dos_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1980, 1, 1)
        .expect("1980-01-01 is a valid date")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
}

/// Derives an entry's type from its creator system,
/// external file attributes, and name.
///
/// Unix-ish creators store POSIX mode bits in the attributes' upper
/// half; DOS creators get the directory-attribute-or-trailing-slash
/// treatment; for anything else the trailing slash is all we have.
pub(crate) fn entry_type_from(
    system: System,
    external_file_attributes: u32,
    path: &str,
) -> EntryType {
    match system {
        System::Unix => match (external_file_attributes >> 16) & S_IFMT {
            S_IFDIR => EntryType::Directory,
            S_IFLNK => EntryType::Symlink,
            _ => EntryType::File,
        },
        System::Dos => {
            if path.ends_with('/') || (external_file_attributes >> 4) == 0x01 {
                EntryType::Directory
            } else {
                EntryType::File
            }
        }
        System::Unknown => {
            if path.ends_with('/') {
                EntryType::Directory
            } else {
                EntryType::File
            }
        }
    }
}

/// Packs a type and POSIX permissions into external file attributes
/// the way Unix archivers do: the mode word in the upper 16 bits.
pub(crate) fn external_attributes(kind: EntryType, permissions: u16) -> u32 {
    let type_mode = match kind {
        EntryType::File => S_IFREG,
        EntryType::Directory => S_IFDIR,
        EntryType::Symlink => S_IFLNK,
    };
    ((type_mode | permissions as u32) & 0xFFFF) << 16
}

/// The default permissions an entry of the given type gets
/// when the caller doesn't supply any.
pub(crate) fn default_permissions(kind: EntryType) -> u16 {
    match kind {
        EntryType::Directory => DEFAULT_DIRECTORY_PERMISSIONS,
        _ => DEFAULT_FILE_PERMISSIONS,
    }
}
