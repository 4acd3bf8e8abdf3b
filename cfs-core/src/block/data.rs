//! Data blocks: overflow payload for files and for directory child lists
//! (spec §3 "Data block", §4.3 "Data-block chain").

use std::fs::File;

use crate::block::{Kind, SIGNATURE_DATA};
use crate::codec;
use crate::config::{DATA_BLOCK_HEADER_SIZE, NO_LINK};
use crate::error::{Error, Result};

const PARENT_OFFSET: usize = 4;
const CHILD_OFFSET: usize = 12;
const LENGTH_OFFSET: usize = 20;

/// A single decoded data block.
#[derive(Debug, Clone)]
pub struct DataBlock {
    /// Previous block in the chain: the owning metadata block for the first
    /// data block, or the previous data block otherwise.
    pub parent: i64,
    /// Next data block in the chain, or [`NO_LINK`].
    pub child: i64,
    /// Number of valid bytes in `payload` (the rest of the block capacity is
    /// unused).
    pub data_length: u32,
    /// Payload bytes, exactly `capacity(block_size)` long on disk; only the
    /// first `data_length` bytes are meaningful.
    pub payload: Vec<u8>,
}

/// Usable payload capacity of a data block of the given block size.
pub fn capacity(block_size: u64) -> u64 {
    block_size - DATA_BLOCK_HEADER_SIZE
}

impl DataBlock {
    /// Encodes this block into a buffer of exactly `block_size` bytes.
    pub fn encode(&self, block_size: u64) -> Vec<u8> {
        let mut buf = vec![0u8; block_size as usize];
        buf[0..4].copy_from_slice(&SIGNATURE_DATA);
        buf[PARENT_OFFSET..PARENT_OFFSET + 8].copy_from_slice(&self.parent.to_le_bytes());
        buf[CHILD_OFFSET..CHILD_OFFSET + 8].copy_from_slice(&self.child.to_le_bytes());
        buf[LENGTH_OFFSET..LENGTH_OFFSET + 4].copy_from_slice(&self.data_length.to_le_bytes());
        let header = DATA_BLOCK_HEADER_SIZE as usize;
        let len = self.data_length as usize;
        buf[header..header + len].copy_from_slice(&self.payload[..len]);
        buf
    }

    /// Decodes a data block from a buffer of at least `block_size` bytes.
    pub fn decode(buf: &[u8], block_size: u64) -> Result<Self> {
        if Kind::from_signature(&buf[0..4])? != Kind::Data {
            return Err(Error::Malformed("not a data block".into()));
        }
        let parent = i64::from_le_bytes(buf[PARENT_OFFSET..PARENT_OFFSET + 8].try_into().unwrap());
        let child = i64::from_le_bytes(buf[CHILD_OFFSET..CHILD_OFFSET + 8].try_into().unwrap());
        let data_length =
            u32::from_le_bytes(buf[LENGTH_OFFSET..LENGTH_OFFSET + 4].try_into().unwrap());
        let header = DATA_BLOCK_HEADER_SIZE as usize;
        let payload = buf[header..block_size as usize].to_vec();
        Ok(Self {
            parent,
            child,
            data_length,
            payload,
        })
    }

    fn read_from(file: &mut File, position: u64, block_size: u64) -> Result<Self> {
        let buf = codec::read_at(file, position, block_size as usize)?;
        Self::decode(&buf, block_size)
    }
}

/// Walks the chain starting at `head` (a byte offset, or [`NO_LINK`] for an
/// empty chain), concatenating `payload[0..dataLength]` from each block.
///
/// A zero-length block, or `child == NO_LINK`, ends the chain — even if
/// `child` happens to be non-negative on a zero-length block, per spec
/// §4.3.
pub fn read_all(file: &mut File, head: i64, block_size: u64) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut next = head;
    while next != NO_LINK {
        let block = DataBlock::read_from(file, next as u64, block_size)?;
        if block.data_length == 0 {
            break;
        }
        out.extend_from_slice(&block.payload[..block.data_length as usize]);
        next = block.child;
    }
    Ok(out)
}

/// Counts the number of blocks in the chain starting at `head`.
pub fn chain_len(file: &mut File, head: i64, block_size: u64) -> Result<usize> {
    let mut count = 0;
    let mut next = head;
    while next != NO_LINK {
        let block = DataBlock::read_from(file, next as u64, block_size)?;
        count += 1;
        if block.data_length == 0 {
            break;
        }
        next = block.child;
    }
    Ok(count)
}

/// Collects every block's byte offset in the chain starting at `head`, for
/// callers that need to free or zero-fill the whole chain regardless of
/// `dataLength` (deletion, and directory child-list overflow churn).
pub fn chain_offsets(file: &mut File, head: i64, block_size: u64) -> Result<Vec<u64>> {
    let mut out = Vec::new();
    let mut next = head;
    while next != NO_LINK {
        out.push(next as u64);
        let block = DataBlock::read_from(file, next as u64, block_size)?;
        next = block.child;
    }
    Ok(out)
}

/// Writes `payload` across the pre-allocated `positions`, linking block `k`'s
/// parent to `positions[k-1]` (or `owner` for `k == 0`) and its child to
/// `positions[k+1]` (or [`NO_LINK`] for the last block). Each block carries
/// up to `capacity(block_size)` bytes.
///
/// The caller must have allocated exactly as many positions as
/// `ceil(payload.len() / capacity(block_size))` calls for; this function
/// does not allocate or free blocks itself.
pub fn write_chain(
    file: &mut File,
    positions: &[u64],
    owner: u64,
    payload: &[u8],
    block_size: u64,
) -> Result<()> {
    let cap = capacity(block_size) as usize;
    let mut offset = 0;
    for (k, &pos) in positions.iter().enumerate() {
        let parent = if k == 0 {
            owner as i64
        } else {
            positions[k - 1] as i64
        };
        let child = if k + 1 < positions.len() {
            positions[k + 1] as i64
        } else {
            NO_LINK
        };
        let end = (offset + cap).min(payload.len());
        let mut chunk = vec![0u8; cap];
        let written = end - offset;
        chunk[..written].copy_from_slice(&payload[offset..end]);
        let block = DataBlock {
            parent,
            child,
            data_length: written as u32,
            payload: chunk,
        };
        codec::write_at(file, pos, &block.encode(block_size))?;
        offset = end;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempfile;

    #[test]
    fn encode_decode_roundtrip() {
        let block = DataBlock {
            parent: 4096,
            child: NO_LINK,
            data_length: 5,
            payload: {
                let mut p = vec![0u8; capacity(4096) as usize];
                p[..5].copy_from_slice(b"hello");
                p
            },
        };
        let encoded = block.encode(4096);
        assert_eq!(encoded.len(), 4096);
        let decoded = DataBlock::decode(&encoded, 4096).unwrap();
        assert_eq!(decoded.parent, 4096);
        assert_eq!(decoded.child, NO_LINK);
        assert_eq!(decoded.data_length, 5);
        assert_eq!(&decoded.payload[..5], b"hello");
    }

    #[test]
    fn chain_write_and_read_all() {
        let mut file = tempfile().unwrap();
        let block_size = 4096u64;
        let cap = capacity(block_size) as usize;
        let payload: Vec<u8> = (0..(cap * 2 + 17)).map(|i| (i % 251) as u8).collect();
        let positions = vec![block_size, block_size * 2, block_size * 3];
        write_chain(&mut file, &positions, 0, &payload, block_size).unwrap();
        let read_back = read_all(&mut file, positions[0] as i64, block_size).unwrap();
        assert_eq!(read_back, payload);
        assert_eq!(chain_len(&mut file, positions[0] as i64, block_size).unwrap(), 3);
    }

    #[test]
    fn empty_chain_reads_as_empty() {
        let mut file = tempfile().unwrap();
        assert_eq!(read_all(&mut file, NO_LINK, 4096).unwrap(), Vec::<u8>::new());
    }
}
