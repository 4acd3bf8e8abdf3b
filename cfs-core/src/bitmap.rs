//! The free-block bitmap allocator (spec §4.2).
//!
//! Bit `i` of the bitmap is `1` when block `i` is free, `0` when used. The
//! in-memory bitmap and the on-disk copy at [`crate::config::HEADER_RESERVED_SIZE`]
//! are kept synchronized: every `mark_used`/`mark_free` persists the whole
//! bitmap slice before returning.

use std::fs::File;

use crate::codec;
use crate::config::HEADER_RESERVED_SIZE;
use crate::error::{Error, Result};

/// Owns the in-memory free-block bitmap and keeps it mirrored to disk.
pub struct Allocator {
    bits: Vec<u8>,
    block_count: u64,
    block_size: u64,
}

impl Allocator {
    /// Number of bytes the bitmap occupies on disk, `ceil(block_count / 8)`.
    pub fn bitmap_len(block_count: u64) -> u64 {
        (block_count + 7) / 8
    }

    /// Builds an allocator from an already-decoded bitmap (used by
    /// `Container::open`).
    pub fn from_bits(bits: Vec<u8>, block_count: u64, block_size: u64) -> Self {
        Self {
            bits,
            block_count,
            block_size,
        }
    }

    /// Builds a fresh allocator for `block_count` blocks with `used` blocks
    /// (indices `0..used`) marked USED and the rest FREE, mirroring the
    /// initial reservation `createContainer` performs for blocks 0 and 1.
    pub fn new_reserving(block_count: u64, block_size: u64, used: u64) -> Self {
        let len = Self::bitmap_len(block_count) as usize;
        let mut bits = vec![0xffu8; len];
        for i in 0..used {
            Self::clear_bit(&mut bits, i);
        }
        // Bits beyond block_count (padding in the final byte) are left as 1
        // (free) but are never addressed by index, so they are harmless.
        Self {
            bits,
            block_count,
            block_size,
        }
    }

    fn bit(bits: &[u8], index: u64) -> bool {
        let byte = (index / 8) as usize;
        let shift = (index % 8) as u32;
        bits[byte] & (1 << shift) != 0
    }

    fn set_bit(bits: &mut [u8], index: u64) {
        let byte = (index / 8) as usize;
        let shift = (index % 8) as u32;
        bits[byte] |= 1 << shift;
    }

    fn clear_bit(bits: &mut [u8], index: u64) {
        let byte = (index / 8) as usize;
        let shift = (index % 8) as u32;
        bits[byte] &= !(1 << shift);
    }

    /// Raw bitmap bytes, as persisted on disk.
    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    fn persist(&self, file: &mut File) -> Result<()> {
        codec::write_at(file, HEADER_RESERVED_SIZE, &self.bits)?;
        log::debug!("bitmap persisted ({} bytes)", self.bits.len());
        Ok(())
    }

    /// Marks block `index` USED and persists the bitmap.
    pub fn mark_used(&mut self, file: &mut File, index: u64) -> Result<()> {
        Self::clear_bit(&mut self.bits, index);
        self.persist(file)
    }

    /// Marks block `index` FREE and persists the bitmap.
    pub fn mark_free(&mut self, file: &mut File, index: u64) -> Result<()> {
        Self::set_bit(&mut self.bits, index);
        self.persist(file)
    }

    /// Number of blocks currently marked FREE.
    pub fn count_free(&self) -> u64 {
        (0..self.block_count)
            .filter(|&i| Self::bit(&self.bits, i))
            .count() as u64
    }

    /// First-fit scan from index 0, collecting the first `n` free block
    /// indices. Marks all of them USED (persisting once for the whole batch)
    /// before returning their *byte offsets* in ascending scan order.
    ///
    /// Atomic with respect to success: if fewer than `n` blocks are free, no
    /// blocks are marked and [`Error::NoSpace`] is returned.
    pub fn allocate(&mut self, file: &mut File, n: usize) -> Result<Vec<u64>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut indices = Vec::with_capacity(n);
        for i in 0..self.block_count {
            if Self::bit(&self.bits, i) {
                indices.push(i);
                if indices.len() == n {
                    break;
                }
            }
        }
        if indices.len() < n {
            return Err(Error::NoSpace {
                requested: n,
                free: indices.len(),
            });
        }
        for &i in &indices {
            Self::clear_bit(&mut self.bits, i);
        }
        self.persist(file)?;
        log::debug!("allocated {} block(s): {:?}", n, indices);
        Ok(indices.into_iter().map(|i| i * self.block_size).collect())
    }

    /// Frees the blocks at the given byte offsets (converted to indices via
    /// `offset / block_size`, per the documented contract — not `/ 8` as the
    /// reference implementation mistakenly does).
    pub fn free(&mut self, file: &mut File, positions: &[u64]) -> Result<()> {
        if positions.is_empty() {
            return Ok(());
        }
        for &pos in positions {
            let index = pos / self.block_size;
            Self::set_bit(&mut self.bits, index);
        }
        self.persist(file)?;
        log::debug!("freed {} block(s): {:?}", positions.len(), positions);
        Ok(())
    }
}
