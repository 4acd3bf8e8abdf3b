//! Block kinds and the dispatch used by `enumerateBlock` (spec §3, §9
//! "Polymorphism of blocks").

pub mod data;
pub mod header;
pub mod meta;

use crate::codec;
use crate::error::{Error, Result};

/// Header block signature: exactly block 0.
pub const SIGNATURE_HEADER: [u8; 4] = [0x01, 0x01, 0x01, 0x01];
/// Metadata block signature: one per file or directory.
pub const SIGNATURE_METADATA: [u8; 4] = [0x0F, 0x0F, 0x0F, 0x0F];
/// Data block signature: overflow payload.
pub const SIGNATURE_DATA: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// The three block kinds, tagged by their 4-byte on-disk signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Header,
    Metadata,
    Data,
}

impl Kind {
    /// Classifies a 4-byte signature read from the first 4 bytes of a block.
    pub fn from_signature(sig: &[u8]) -> Result<Self> {
        match sig {
            s if s == SIGNATURE_HEADER => Ok(Kind::Header),
            s if s == SIGNATURE_METADATA => Ok(Kind::Metadata),
            s if s == SIGNATURE_DATA => Ok(Kind::Data),
            other => Err(Error::Malformed(format!(
                "unknown block signature {other:02x?}"
            ))),
        }
    }
}

/// Decoded description of a block, used by the `enumerateBlock` inspection
/// utility (spec §6).
#[derive(Debug)]
pub enum BlockDescription {
    Header {
        version: u32,
        name: String,
        block_size: u32,
        block_count: u32,
    },
    Metadata {
        parent: i64,
        child_data_block: i64,
        full_data_length: u32,
        local_data_length: u32,
        is_directory: bool,
        is_file: bool,
        name: String,
    },
    Data {
        parent: i64,
        child_block: i64,
        data_length: u32,
    },
}

/// Reads the 4-byte signature at the start of the block at `position` and
/// classifies it, without decoding the rest of the block.
pub fn peek_kind(file: &mut std::fs::File, position: u64) -> Result<Kind> {
    let sig = codec::read_at(file, position, 4)?;
    Kind::from_signature(&sig)
}
