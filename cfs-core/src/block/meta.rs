//! Metadata blocks: one per file or directory (spec §3 "Metadata block",
//! §4.4).

use std::fs::File;

use chrono::{DateTime, Utc};

use crate::block::data;
use crate::block::{Kind, SIGNATURE_METADATA};
use crate::codec;
use crate::config::{METADATA_BLOCK_HEADER_SIZE, NO_LINK};
use crate::error::{Error, Result};
use crate::timestamp;

const PARENT_OFFSET: usize = 4;
const CHILD_DATA_BLOCK_OFFSET: usize = 12;
const FULL_LENGTH_OFFSET: usize = 20;
const LOCAL_LENGTH_OFFSET: usize = 28;
const IS_DIRECTORY_OFFSET: usize = 32;
const IS_FILE_OFFSET: usize = 36;
const NAME_OFFSET: usize = 40;
const NAME_WIDTH: usize = 256;
const CREATED_OFFSET: usize = 296;
const LAST_UPDATE_OFFSET: usize = 328;

/// Maximum length of a name, in UTF-8 bytes (spec invariant 4).
pub const MAX_NAME_LEN: usize = 256;

/// A decoded metadata block: either a file or a directory (never both,
/// spec invariant 3).
#[derive(Debug, Clone)]
pub struct MetaBlock {
    pub parent: i64,
    pub child_data_block: i64,
    pub full_data_length: u32,
    pub local_data_length: u32,
    pub is_directory: bool,
    pub is_file: bool,
    pub name: String,
    pub created: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    /// Local payload: file bytes (for a file) or a packed offset array (for
    /// a directory), `local_data_length` bytes of it meaningful.
    pub payload: Vec<u8>,
}

/// Usable local payload capacity of a metadata block of the given block
/// size.
pub fn capacity(block_size: u64) -> u64 {
    block_size - METADATA_BLOCK_HEADER_SIZE
}

impl MetaBlock {
    /// Builds a new root directory node (parent=0, name=".", childDataBlock=-1).
    pub fn new_root() -> Self {
        let now = timestamp::now();
        Self {
            parent: 0,
            child_data_block: NO_LINK,
            full_data_length: 0,
            local_data_length: 0,
            is_directory: true,
            is_file: false,
            name: ".".to_owned(),
            created: now,
            last_update: now,
            payload: Vec::new(),
        }
    }

    /// Builds a new, empty directory node.
    pub fn new_directory(parent: u64, name: &str) -> Self {
        let now = timestamp::now();
        Self {
            parent: parent as i64,
            child_data_block: NO_LINK,
            full_data_length: 0,
            local_data_length: 0,
            is_directory: true,
            is_file: false,
            name: name.to_owned(),
            created: now,
            last_update: now,
            payload: Vec::new(),
        }
    }

    /// Builds a new file node. `local_payload` is the (already-truncated)
    /// portion of the file's bytes that fits in this block; `child_data_block`
    /// links the overflow chain, if any.
    pub fn new_file(
        parent: u64,
        name: &str,
        full_data_length: u32,
        local_payload: Vec<u8>,
        child_data_block: i64,
    ) -> Self {
        let now = timestamp::now();
        Self {
            parent: parent as i64,
            child_data_block,
            full_data_length,
            local_data_length: local_payload.len() as u32,
            is_directory: false,
            is_file: true,
            name: name.to_owned(),
            created: now,
            last_update: now,
            payload: local_payload,
        }
    }

    /// Encodes this block into a buffer of exactly `block_size` bytes.
    pub fn encode(&self, block_size: u64) -> Vec<u8> {
        let mut buf = vec![0u8; block_size as usize];
        buf[0..4].copy_from_slice(&SIGNATURE_METADATA);
        buf[PARENT_OFFSET..PARENT_OFFSET + 8].copy_from_slice(&self.parent.to_le_bytes());
        buf[CHILD_DATA_BLOCK_OFFSET..CHILD_DATA_BLOCK_OFFSET + 8]
            .copy_from_slice(&self.child_data_block.to_le_bytes());
        buf[FULL_LENGTH_OFFSET..FULL_LENGTH_OFFSET + 4]
            .copy_from_slice(&self.full_data_length.to_le_bytes());
        buf[LOCAL_LENGTH_OFFSET..LOCAL_LENGTH_OFFSET + 4]
            .copy_from_slice(&self.local_data_length.to_le_bytes());
        buf[IS_DIRECTORY_OFFSET..IS_DIRECTORY_OFFSET + 4]
            .copy_from_slice(&(self.is_directory as u32).to_le_bytes());
        buf[IS_FILE_OFFSET..IS_FILE_OFFSET + 4].copy_from_slice(&(self.is_file as u32).to_le_bytes());
        let packed_name = codec::pack_fixed_str(&self.name, NAME_WIDTH);
        buf[NAME_OFFSET..NAME_OFFSET + NAME_WIDTH].copy_from_slice(&packed_name);
        let created = timestamp::encode(self.created);
        buf[CREATED_OFFSET..CREATED_OFFSET + created.len()].copy_from_slice(&created);
        let last_update = timestamp::encode(self.last_update);
        buf[LAST_UPDATE_OFFSET..LAST_UPDATE_OFFSET + last_update.len()]
            .copy_from_slice(&last_update);
        let header = METADATA_BLOCK_HEADER_SIZE as usize;
        let len = self.local_data_length as usize;
        buf[header..header + len].copy_from_slice(&self.payload[..len]);
        buf
    }

    /// Decodes a metadata block from a buffer of at least `block_size` bytes.
    pub fn decode(buf: &[u8], block_size: u64) -> Result<Self> {
        if Kind::from_signature(&buf[0..4])? != Kind::Metadata {
            return Err(Error::Malformed("not a metadata block".into()));
        }
        let parent = i64::from_le_bytes(buf[PARENT_OFFSET..PARENT_OFFSET + 8].try_into().unwrap());
        let child_data_block = i64::from_le_bytes(
            buf[CHILD_DATA_BLOCK_OFFSET..CHILD_DATA_BLOCK_OFFSET + 8]
                .try_into()
                .unwrap(),
        );
        let full_data_length = u32::from_le_bytes(
            buf[FULL_LENGTH_OFFSET..FULL_LENGTH_OFFSET + 4].try_into().unwrap(),
        );
        let local_data_length = u32::from_le_bytes(
            buf[LOCAL_LENGTH_OFFSET..LOCAL_LENGTH_OFFSET + 4]
                .try_into()
                .unwrap(),
        );
        let is_directory = u32::from_le_bytes(
            buf[IS_DIRECTORY_OFFSET..IS_DIRECTORY_OFFSET + 4]
                .try_into()
                .unwrap(),
        ) != 0;
        let is_file = u32::from_le_bytes(
            buf[IS_FILE_OFFSET..IS_FILE_OFFSET + 4].try_into().unwrap(),
        ) != 0;
        if is_directory == is_file {
            return Err(Error::Malformed(
                "metadata block must be exactly one of file/directory".into(),
            ));
        }
        let name = codec::unpack_fixed_str(&buf[NAME_OFFSET..NAME_OFFSET + NAME_WIDTH])?;
        let created = timestamp::decode(&buf[CREATED_OFFSET..CREATED_OFFSET + 32])?;
        let last_update = timestamp::decode(&buf[LAST_UPDATE_OFFSET..LAST_UPDATE_OFFSET + 32])?;
        let header = METADATA_BLOCK_HEADER_SIZE as usize;
        let payload = buf[header..block_size as usize].to_vec();
        Ok(Self {
            parent,
            child_data_block,
            full_data_length,
            local_data_length,
            is_directory,
            is_file,
            name,
            created,
            last_update,
            payload,
        })
    }

    /// Reads a metadata block from disk at `position`.
    pub fn read_from(file: &mut File, position: u64, block_size: u64) -> Result<Self> {
        let buf = codec::read_at(file, position, block_size as usize)?;
        Self::decode(&buf, block_size)
    }

    /// Writes this metadata block to disk at `position`.
    pub fn write_to(&self, file: &mut File, position: u64, block_size: u64) -> Result<()> {
        codec::write_at(file, position, &self.encode(block_size))
    }

    /// Concatenates local payload with the overflow data-block chain.
    /// Requires `is_file`.
    pub fn file_data(&self, file: &mut File, block_size: u64) -> Result<Vec<u8>> {
        if !self.is_file {
            return Err(Error::Malformed("fileData() called on a non-file node".into()));
        }
        let mut out = self.payload[..self.local_data_length as usize].to_vec();
        out.extend(data::read_all(file, self.child_data_block, block_size)?);
        Ok(out)
    }

    /// Decodes the packed child-metadata-offset list, including any
    /// chained overflow. Requires `is_directory`.
    pub fn child_offsets(&self, file: &mut File, block_size: u64) -> Result<Vec<i64>> {
        if !self.is_directory {
            return Err(Error::Malformed(
                "childOffsets() called on a non-directory node".into(),
            ));
        }
        let mut bytes = self.payload[..self.local_data_length as usize].to_vec();
        bytes.extend(data::read_all(file, self.child_data_block, block_size)?);
        codec::unpack_offsets(&bytes)
    }

    /// Chain length of the overflow data blocks, via `childDataBlock`.
    pub fn data_block_count(&self, file: &mut File, block_size: u64) -> Result<usize> {
        data::chain_len(file, self.child_data_block, block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempfile;

    #[test]
    fn directory_roundtrip() {
        let meta = MetaBlock::new_directory(4096, "docs");
        let encoded = meta.encode(4096);
        assert_eq!(encoded.len(), 4096);
        let decoded = MetaBlock::decode(&encoded, 4096).unwrap();
        assert_eq!(decoded.name, "docs");
        assert!(decoded.is_directory);
        assert!(!decoded.is_file);
        assert_eq!(decoded.parent, 4096);
    }

    #[test]
    fn file_data_concatenates_local_and_chain() {
        let mut file = tempfile().unwrap();
        let block_size = 4096u64;
        let local_cap = capacity(block_size) as usize;
        let mut local = vec![0u8; local_cap];
        local[..4].copy_from_slice(b"abcd");
        let overflow = vec![99u8; 10];
        let chain_positions = vec![block_size * 5];
        data::write_chain(&mut file, &chain_positions, block_size, &overflow, block_size).unwrap();
        let meta = MetaBlock {
            parent: 0,
            child_data_block: chain_positions[0] as i64,
            full_data_length: 14,
            local_data_length: 4,
            is_directory: false,
            is_file: true,
            name: "f".into(),
            created: timestamp::now(),
            last_update: timestamp::now(),
            payload: local,
        };
        let got = meta.file_data(&mut file, block_size).unwrap();
        assert_eq!(got.len(), 14);
        assert_eq!(&got[..4], b"abcd");
        assert_eq!(&got[4..], &overflow[..]);
    }

    #[test]
    fn child_offsets_rejects_file_node() {
        let meta = MetaBlock::new_file(4096, "f", 0, Vec::new(), NO_LINK);
        let mut file = tempfile().unwrap();
        assert!(meta.child_offsets(&mut file, 4096).is_err());
    }
}
