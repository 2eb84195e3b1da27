//! Error and Result types for generation persistence.

use std::io;
use thiserror::Error;

/// A convenience `Result` type for wscache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for loading and saving generations.
///
/// Lookups never fail: a missing key is a normal outcome and is reported
/// through the return value of `get`/`has`, not through this type.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid magic bytes in a snapshot file.
    #[error("Invalid magic bytes in {file}: expected {expected:?}, got {actual:?}")]
    InvalidMagic {
        /// File name inside the snapshot directory.
        file: String,
        /// Magic bytes the file should start with.
        expected: [u8; 4],
        /// Magic bytes actually read.
        actual: [u8; 4],
    },

    /// Unsupported snapshot format version.
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u16),

    /// File checksum does not match the stored value.
    #[error("Checksum mismatch in {file}: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// File name inside the snapshot directory.
        file: String,
        /// Checksum stored in the file footer.
        expected: u64,
        /// Checksum computed over the file contents.
        actual: u64,
    },

    /// The snapshot was written by a generation larger than the requested one.
    #[error("Snapshot too large: it holds {actual} bytes, requested {expected} bytes")]
    CapacityMismatch {
        /// Capacity requested by the caller.
        expected: usize,
        /// Capacity recorded in the snapshot metadata.
        actual: usize,
    },

    /// A snapshot file ended before all of its declared contents were read.
    #[error("Truncated snapshot: {0}")]
    Truncated(String),

    /// Snapshot metadata is internally inconsistent.
    #[error("Invalid snapshot metadata: {0}")]
    InvalidMetadata(String),
}

impl Error {
    /// Returns true if the error means there is no snapshot at the given path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }

    /// Returns true if the snapshot exists but was saved by a larger generation.
    pub fn is_capacity_mismatch(&self) -> bool {
        matches!(self, Error::CapacityMismatch { .. })
    }
}
