//! Error kinds raised by the core (spec §7).

use std::io;

/// An error produced by a `cfs-core` operation.
///
/// All public operations propagate errors to the caller; nothing is retried
/// inside the core, and partial mutations on error are not rolled back.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Block size/count violates the multiples-of-4096 or minimum constraints,
    /// or a path/name was empty where one was required.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// A file or directory with the given name already exists in the parent.
    #[error("`{0}` already exists")]
    AlreadyExists(String),

    /// A path segment could not be resolved to a directory.
    #[error("path not found: {0}")]
    NotFound(String),

    /// The parent directory resolved, but it holds no file of that name.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// `deleteDirectory` was invoked on a directory that still has children.
    #[error("directory not empty: {0}")]
    NotEmpty(String),

    /// The allocator could not satisfy a block request.
    #[error("no space left in container (requested {requested} block(s), {free} free)")]
    NoSpace {
        /// Number of blocks requested.
        requested: usize,
        /// Number of blocks actually free at the time of the request.
        free: usize,
    },

    /// A ranged read's `start`/`start+count` fell outside `[0, fullDataLength]`.
    #[error("range [{start}, {end}) out of bounds for length {len}")]
    OutOfRange {
        /// Requested start offset.
        start: u64,
        /// Requested end offset (exclusive).
        end: u64,
        /// Length of the data the range was taken against.
        len: u64,
    },

    /// An on-disk block carried an unknown signature, or a packed list was
    /// not a multiple of the element width.
    #[error("malformed on-disk structure: {0}")]
    Malformed(String),

    /// The underlying file returned fewer bytes than requested on a read.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Bytes requested.
        expected: usize,
        /// Bytes actually read.
        actual: usize,
    },

    /// The underlying file wrote fewer bytes than requested.
    #[error("short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        /// Bytes requested.
        expected: usize,
        /// Bytes actually written.
        actual: usize,
    },

    /// Underlying I/O failure not otherwise classified above.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
