//! Error types and the related `Result<T>`

use std::path::PathBuf;

use thiserror::Error;

pub type ZipResult<T> = Result<T, ZipError>;

// zlib return codes, kept so callers can match on the exact failure
// the compression library reported.
pub const Z_STREAM_ERROR: i32 = -2;
pub const Z_DATA_ERROR: i32 = -3;
pub const Z_MEM_ERROR: i32 = -4;
pub const Z_BUF_ERROR: i32 = -5;
pub const Z_VERSION_ERROR: i32 = -6;

#[derive(Debug, Error)]
pub enum ZipError {
    /// A cooperative cancellation was observed between chunks.
    ///
    /// Cancelled writes roll the archive back to its pre-call bytes
    /// before this error surfaces.
    #[error("Operation cancelled")]
    Cancelled,

    /// No file exists at the given path.
    #[error("No file found at {}", .0.display())]
    FileNotFound(PathBuf),

    /// The file exists but can't be opened with the required
    /// permissions, or a creation target is already present.
    #[error("File at {} is not accessible", .0.display())]
    FileNotAccessible(PathBuf),

    /// The archive contained invalid data per the spec:
    /// a missing End Of Central Directory Record, a signature mismatch,
    /// or a truncated record.
    #[error("Invalid Zip archive: {0}")]
    InvalidFormat(&'static str),

    /// An entry's compression method is neither store (0) nor
    /// DEFLATE (8).
    #[error("Unsupported compression method {0}")]
    InvalidArchiveLevel(u16),

    /// A write would push the start of the central directory past
    /// 4 GiB, which only ZIP64 archives can express.
    #[error("Start of central directory ({0:#x}) exceeds 4 GiB")]
    InvalidStartOfCentralDirectoryOffset(u64),

    /// The zlib stream state was inconsistent (Z_STREAM_ERROR).
    #[error("Compression stream state inconsistent (zlib code {code})")]
    GzipStream { code: i32 },

    /// The compressed data was corrupt (Z_DATA_ERROR).
    #[error("Compressed data corrupt (zlib code {code})")]
    GzipData { code: i32 },

    /// The compression library ran out of memory (Z_MEM_ERROR).
    #[error("Compression ran out of memory (zlib code {code})")]
    GzipMemory { code: i32 },

    /// No progress was possible with the provided buffers (Z_BUF_ERROR).
    #[error("Compression buffer exhausted (zlib code {code})")]
    GzipBuffer { code: i32 },

    /// The zlib library version is incompatible (Z_VERSION_ERROR).
    #[error("Incompatible compression library version (zlib code {code})")]
    GzipVersion { code: i32 },

    /// An error from underlying I/O
    #[error("I/O Error")]
    Io(#[from] std::io::Error),

    /// Catch-all for failures that fit no other kind.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ZipError {
    /// Maps an I/O error surfaced by the zlib layer onto the closed
    /// set of gzip error kinds, mirroring its return codes.
    pub(crate) fn from_zlib(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::InvalidInput => ZipError::GzipStream {
                code: Z_STREAM_ERROR,
            },
            ErrorKind::InvalidData => ZipError::GzipData { code: Z_DATA_ERROR },
            ErrorKind::OutOfMemory => ZipError::GzipMemory { code: Z_MEM_ERROR },
            ErrorKind::UnexpectedEof | ErrorKind::WriteZero => {
                ZipError::GzipBuffer { code: Z_BUF_ERROR }
            }
            ErrorKind::Unsupported => ZipError::GzipVersion {
                code: Z_VERSION_ERROR,
            },
            _ => ZipError::Io(err),
        }
    }
}
