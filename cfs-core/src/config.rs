//! Named constants the on-disk format depends on (spec §3, §4.5.1).

/// Bytes reserved for the header block's fixed fields plus bitmap start
/// (the bitmap itself begins at this offset).
pub const HEADER_RESERVED_SIZE: u64 = 1024;

/// Bytes reserved for a data block's header (signature/parent/child/length).
pub const DATA_BLOCK_HEADER_SIZE: u64 = 64;

/// Bytes reserved for a metadata block's header.
pub const METADATA_BLOCK_HEADER_SIZE: u64 = 512;

/// Minimum allowed block size, and the modulus block size must respect.
pub const MIN_BLOCK_SIZE: u64 = 4096;

/// Minimum allowed block count, and the modulus block count must respect.
pub const MIN_BLOCK_COUNT: u64 = 4096;

/// Number of blocks the container file is truncated to on creation, as an
/// initial reservation (spec §4.5.1: `blockSize * 256`).
pub const INITIAL_RESERVED_BLOCKS: u64 = 256;

/// Width in bytes of a packed child/offset entry.
pub const OFFSET_WIDTH: u64 = 8;

/// Sentinel used throughout for "no link".
pub const NO_LINK: i64 = -1;
