//! The header block: exactly block 0 (spec §3 "Header block").

use chrono::{DateTime, Utc};

use crate::block::{Kind, SIGNATURE_HEADER};
use crate::codec;
use crate::config::HEADER_RESERVED_SIZE;
use crate::error::{Error, Result};
use crate::timestamp;

/// On-disk format version this crate writes and expects.
pub const VERSION: u32 = 1;

const NAME_OFFSET: usize = 16;
const NAME_WIDTH: usize = 256;
const BLOCK_SIZE_OFFSET: usize = 288;
const BLOCK_COUNT_OFFSET: usize = 296;
const CREATED_OFFSET: usize = 304;

/// The decoded fixed-size fields of the header block (everything before the
/// bitmap, which the [`crate::bitmap::Allocator`] owns and persists
/// separately at the same disk offset).
#[derive(Debug, Clone)]
pub struct Header {
    pub version: u32,
    pub name: String,
    pub block_size: u32,
    pub block_count: u32,
    pub created: DateTime<Utc>,
}

impl Header {
    /// Builds a fresh header for a container being created.
    pub fn new(name: &str, block_size: u32, block_count: u32) -> Self {
        Self {
            version: VERSION,
            name: name.to_owned(),
            block_size,
            block_count,
            created: timestamp::now(),
        }
    }

    /// Encodes the fixed header fields into a buffer of exactly
    /// [`crate::config::HEADER_RESERVED_SIZE`] bytes. The bitmap is not
    /// included; callers persist it separately at the same base offset.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_RESERVED_SIZE as usize];
        buf[0..4].copy_from_slice(&SIGNATURE_HEADER);
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        let packed_name = codec::pack_fixed_str(&self.name, NAME_WIDTH);
        buf[NAME_OFFSET..NAME_OFFSET + NAME_WIDTH].copy_from_slice(&packed_name);
        buf[BLOCK_SIZE_OFFSET..BLOCK_SIZE_OFFSET + 4].copy_from_slice(&self.block_size.to_le_bytes());
        buf[BLOCK_COUNT_OFFSET..BLOCK_COUNT_OFFSET + 4]
            .copy_from_slice(&self.block_count.to_le_bytes());
        let created = timestamp::encode(self.created);
        buf[CREATED_OFFSET..CREATED_OFFSET + created.len()].copy_from_slice(&created);
        buf
    }

    /// Decodes the fixed header fields from a buffer of at least
    /// [`crate::config::HEADER_RESERVED_SIZE`] bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_RESERVED_SIZE as usize {
            return Err(Error::Malformed(format!(
                "header buffer too short: {} bytes",
                buf.len()
            )));
        }
        let sig = &buf[0..4];
        if Kind::from_signature(sig)? != Kind::Header {
            return Err(Error::Malformed("not a header block".into()));
        }
        let version = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let name = codec::unpack_fixed_str(&buf[NAME_OFFSET..NAME_OFFSET + NAME_WIDTH])?;
        let block_size =
            u32::from_le_bytes(buf[BLOCK_SIZE_OFFSET..BLOCK_SIZE_OFFSET + 4].try_into().unwrap());
        let block_count = u32::from_le_bytes(
            buf[BLOCK_COUNT_OFFSET..BLOCK_COUNT_OFFSET + 4]
                .try_into()
                .unwrap(),
        );
        let created = timestamp::decode(&buf[CREATED_OFFSET..CREATED_OFFSET + 32])?;
        Ok(Self {
            version,
            name,
            block_size,
            block_count,
            created,
        })
    }

    /// Reads just the `block_size` field (offset 288), the way
    /// `Container::open` bootstraps itself before it knows how big a block
    /// is (spec §4.5.2).
    pub fn peek_block_size(buf: &[u8]) -> Result<u32> {
        if buf.len() < BLOCK_SIZE_OFFSET + 4 {
            return Err(Error::Malformed("header prefix too short".into()));
        }
        Ok(u32::from_le_bytes(
            buf[BLOCK_SIZE_OFFSET..BLOCK_SIZE_OFFSET + 4].try_into().unwrap(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let h = Header::new("my-container", 4096, 4096);
        let encoded = h.encode();
        assert_eq!(encoded.len(), HEADER_RESERVED_SIZE as usize);
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(decoded.version, VERSION);
        assert_eq!(decoded.name, "my-container");
        assert_eq!(decoded.block_size, 4096);
        assert_eq!(decoded.block_count, 4096);
    }

    #[test]
    fn peek_block_size_matches_full_decode() {
        let h = Header::new("x", 8192, 16384);
        let encoded = h.encode();
        assert_eq!(Header::peek_block_size(&encoded).unwrap(), 8192);
    }
}
