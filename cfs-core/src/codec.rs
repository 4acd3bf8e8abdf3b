//! Fixed-width, little-endian byte codec (spec §4.1).
//!
//! All integer fields on disk are little-endian regardless of host
//! endianness; signed 8-byte offsets are used throughout, with `-1` meaning
//! "no link" (see [`crate::config::NO_LINK`]).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};

/// Seeks to absolute byte offset `position` and reads exactly `count` bytes.
///
/// Fails with [`Error::ShortRead`] if fewer bytes are available.
pub fn read_at(file: &mut File, position: u64, count: usize) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(position))?;
    let mut buf = vec![0u8; count];
    let mut read = 0;
    while read < count {
        let n = file.read(&mut buf[read..])?;
        if n == 0 {
            return Err(Error::ShortRead {
                expected: count,
                actual: read,
            });
        }
        read += n;
    }
    Ok(buf)
}

/// Seeks to absolute byte offset `position` and writes `bytes`. No-op on
/// empty input.
pub fn write_at(file: &mut File, position: u64, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    file.seek(SeekFrom::Start(position))?;
    file.write_all(bytes)?;
    Ok(())
}

/// Trims trailing NUL bytes, used for name and timestamp fields.
pub fn trim_trailing_nuls(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Encodes `s` into exactly `width` bytes: UTF-8 bytes followed by NUL
/// padding. The caller is responsible for ensuring `s` fits in `width`
/// bytes.
pub fn pack_fixed_str(s: &str, width: usize) -> Vec<u8> {
    let mut buf = vec![0u8; width];
    let bytes = s.as_bytes();
    buf[..bytes.len()].copy_from_slice(bytes);
    buf
}

/// Decodes a fixed-width NUL-padded field back into a `String`, trimming
/// trailing NULs first.
pub fn unpack_fixed_str(bytes: &[u8]) -> Result<String> {
    String::from_utf8(trim_trailing_nuls(bytes).to_vec())
        .map_err(|e| Error::Malformed(format!("non-UTF-8 fixed-width field: {e}")))
}

/// Packs a list of signed 8-byte offsets, little-endian.
pub fn pack_offsets(offsets: &[i64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(offsets.len() * 8);
    for off in offsets {
        buf.extend_from_slice(&off.to_le_bytes());
    }
    buf
}

/// Unpacks a byte slice into a list of signed 8-byte offsets.
///
/// Fails with [`Error::Malformed`] if `bytes.len()` is not a multiple of 8.
pub fn unpack_offsets(bytes: &[u8]) -> Result<Vec<i64>> {
    if bytes.len() % 8 != 0 {
        return Err(Error::Malformed(format!(
            "offset list length {} is not a multiple of 8",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
        .collect())
}
