//! rezip creates, reads, and rewrites classic ZIP archives —
//! store and DEFLATE, no ZIP64, no encryption — through one
//! file-backed handle:
//!
//! ```no_run
//! use rezip::{AccessMode, Archive, CompressionMethod, EntryOptions, EntryType};
//!
//! let mut archive = Archive::open("backup.zip", AccessMode::Create)?;
//!
//! // Content arrives through a chunked provider...
//! let data = b"hello there";
//! let options = EntryOptions::default().compression_method(CompressionMethod::Deflate);
//! archive.add_entry(
//!     "hello.txt",
//!     EntryType::File,
//!     data.len() as u64,
//!     &options,
//!     None,
//!     |position, want| {
//!         let start = position as usize;
//!         Ok(data[start..start + want].to_vec())
//!     },
//! )?;
//!
//! // ...and leaves through a chunked consumer.
//! for entry in archive.entries()? {
//!     let entry = entry?;
//!     println!("{} ({} bytes)", entry.path(), entry.uncompressed_size());
//! }
//!
//! let entry = archive.entry("hello.txt")?.expect("just added it");
//! let mut contents = Vec::new();
//! let crc32 = archive.extract(&entry, None, |chunk| {
//!     contents.extend_from_slice(chunk);
//!     Ok(())
//! })?;
//! println!("{contents:x?} checksums to {crc32:08x}");
//!
//! // Entries can also be dropped again; the archive is rebuilt
//! // next to itself and atomically swapped into place.
//! archive.remove(&entry, None)?;
//! # Ok::<(), rezip::ZipError>(())
//! ```
//!
//! Zip is an interesting archive format: unlike compressed tarballs
//! often seen in Linux land (`*.tar.gz`, `*.tar.zst`, ...),
//! each file in a Zip archive is compressed independently,
//! with a central directory telling us where to find each file.
//! That directory is what makes cheap mutation possible: appending an
//! entry only has to slide the directory past the new payload and
//! patch the trailer, and removing one is a single copy-through pass
//! that drops the entry's region and shifts the survivors' offsets.
//!
//! The archive is bound to one backing file in one of three access
//! modes (create, read, update), owns that handle exclusively, and is
//! deliberately single-threaded: every operation runs synchronously on
//! the calling thread, with progress reporting and cooperative
//! cancellation hooks for callers that need them.

pub mod progress;
pub mod read;
pub mod result;
pub mod write;

pub use progress::Progress;
pub use read::{AccessMode, Archive, CompressionMethod, Entries, Entry, EntryType};
pub use result::{ZipError, ZipResult};
pub use write::EntryOptions;

pub use spec::{DEFAULT_DIRECTORY_PERMISSIONS, DEFAULT_FILE_PERMISSIONS, EOCDR_SEARCH_WINDOW};
pub use stream::CHUNK_SIZE;

mod arch;
mod crc_reader;
mod spec;
mod stream;
