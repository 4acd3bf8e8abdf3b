//! The `Container` type: file handle, header, allocator, and the path
//! resolution / CRUD operations built on top of the block primitives
//! (spec §4.5).

use std::fs::{File, OpenOptions};
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::bitmap::Allocator;
use crate::block::data;
use crate::block::header::Header;
use crate::block::meta::MetaBlock;
use crate::block::{BlockDescription, Kind};
use crate::codec;
use crate::config::{HEADER_RESERVED_SIZE, INITIAL_RESERVED_BLOCKS, MIN_BLOCK_COUNT, MIN_BLOCK_SIZE, NO_LINK};
use crate::error::{Error, Result};

/// Byte offset of the root directory's metadata block (block index 1).
fn root_position(block_size: u64) -> u64 {
    block_size
}

/// `stats()`'s return shape (spec §6).
#[derive(Debug, Clone)]
pub struct Stats {
    pub version: u32,
    pub name: String,
    pub block_size: u64,
    pub block_count: u64,
    pub free_blocks: u64,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub created: DateTime<Utc>,
}

/// An open container: file handle, header, and allocator, plus all
/// directory/file operations.
pub struct Container {
    file: File,
    header: Header,
    allocator: Allocator,
    logging: bool,
}

/// Splits a path into non-empty, non-`.` segments. `""`, `"/"`, and `"."`
/// all denote the root (spec §4.5.3). There is no support for `..`.
fn parse_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".").collect()
}

/// The corrected `FileExists` comparison (spec §9 open question 4): trimmed,
/// case-insensitive, rather than the reference's self-comparison bug.
fn name_matches(candidate: &str, requested: &str) -> bool {
    candidate.trim().eq_ignore_ascii_case(requested.trim())
}

impl Container {
    /// Block size in bytes.
    pub fn block_size(&self) -> u64 {
        self.header.block_size as u64
    }

    /// Total number of blocks.
    pub fn block_count(&self) -> u64 {
        self.header.block_count as u64
    }

    fn trace(&self, msg: impl FnOnce() -> String) {
        if self.logging {
            log::debug!("{}", msg());
        }
    }

    // ---- 4.5.1 Create ------------------------------------------------

    /// Creates a new container file. Fails if `filename` already exists or
    /// the block size/count parameters are invalid (spec §4.5.1).
    pub fn create(
        filename: impl AsRef<Path>,
        container_name: &str,
        block_size: u32,
        block_count: u32,
        logging: bool,
    ) -> Result<Self> {
        let bs = block_size as u64;
        let bc = block_count as u64;
        if bs < MIN_BLOCK_SIZE || bs % MIN_BLOCK_SIZE != 0 {
            return Err(Error::InvalidParam(format!(
                "block size {bs} must be >= {MIN_BLOCK_SIZE} and a multiple of {MIN_BLOCK_SIZE}"
            )));
        }
        if bc < MIN_BLOCK_COUNT || bc % MIN_BLOCK_COUNT != 0 {
            return Err(Error::InvalidParam(format!(
                "block count {bc} must be >= {MIN_BLOCK_COUNT} and a multiple of {MIN_BLOCK_COUNT}"
            )));
        }
        if bs < bc / 4 {
            return Err(Error::InvalidParam(format!(
                "block size {bs} too small for a block count of {bc} (bitmap would not fit)"
            )));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(filename)?;
        file.set_len(bs * INITIAL_RESERVED_BLOCKS)?;

        let header = Header::new(container_name, block_size, block_count);
        codec::write_at(&mut file, 0, &header.encode())?;

        let mut allocator = Allocator::new_reserving(bc, bs, 2);
        allocator.mark_used(&mut file, 0)?; // idempotent, but persists + documents intent
        allocator.mark_used(&mut file, 1)?;

        let root = MetaBlock::new_root();
        root.write_to(&mut file, root_position(bs), bs)?;

        if logging {
            log::debug!(
                "created container `{container_name}` ({block_count} blocks x {block_size} bytes)"
            );
        }

        Ok(Self {
            file,
            header,
            allocator,
            logging,
        })
    }

    // ---- 4.5.2 Open ----------------------------------------------------

    /// Opens an existing container file (spec §4.5.2).
    pub fn open(filename: impl AsRef<Path>, logging: bool) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(filename)?;
        let header_buf = codec::read_at(&mut file, 0, HEADER_RESERVED_SIZE as usize)?;
        let header = Header::decode(&header_buf)?;
        let bc = header.block_count as u64;
        let bs = header.block_size as u64;
        let bitmap_len = Allocator::bitmap_len(bc);
        let bits = codec::read_at(&mut file, HEADER_RESERVED_SIZE, bitmap_len as usize)?;
        let allocator = Allocator::from_bits(bits, bc, bs);
        if logging {
            log::debug!("opened container `{}` ({} blocks free)", header.name, allocator.count_free());
        }
        Ok(Self {
            file,
            header,
            allocator,
            logging,
        })
    }

    // ---- stats -----------------------------------------------------

    /// Returns filesystem-wide statistics (spec §6).
    pub fn stats(&self) -> Stats {
        let free_blocks = self.allocator.count_free();
        Stats {
            version: self.header.version,
            name: self.header.name.clone(),
            block_size: self.block_size(),
            block_count: self.block_count(),
            free_blocks,
            total_bytes: self.block_size() * self.block_count(),
            free_bytes: free_blocks * self.block_size(),
            created: self.header.created,
        }
    }

    // ---- 4.5.3 Path resolution --------------------------------------

    /// Resolves `path` to its directory metadata and block offset. The
    /// resolver never descends into file nodes.
    pub fn find_directory(&mut self, path: &str) -> Result<(MetaBlock, u64)> {
        let bs = self.block_size();
        let mut pos = root_position(bs);
        let mut meta = MetaBlock::read_from(&mut self.file, pos, bs)?;
        for seg in parse_path(path) {
            let offsets = meta.child_offsets(&mut self.file, bs)?;
            let mut found = None;
            for off in offsets {
                let off = off as u64;
                let child = MetaBlock::read_from(&mut self.file, off, bs)?;
                if child.name == seg {
                    found = Some((off, child));
                    break;
                }
            }
            match found {
                Some((off, child)) if child.is_directory => {
                    pos = off;
                    meta = child;
                }
                _ => return Err(Error::NotFound(path.to_owned())),
            }
        }
        Ok((meta, pos))
    }

    /// Resolves `(parentPath, name)` to the matching file's metadata and
    /// block offset (spec §4.5.3).
    pub fn find_file(&mut self, parent_path: &str, name: &str) -> Result<(MetaBlock, u64)> {
        let bs = self.block_size();
        let (parent_meta, _parent_pos) = self.find_directory(parent_path)?;
        let offsets = parent_meta.child_offsets(&mut self.file, bs)?;
        for off in offsets {
            let off = off as u64;
            let child = MetaBlock::read_from(&mut self.file, off, bs)?;
            if child.is_file && name_matches(&child.name, name) {
                return Ok((child, off));
            }
        }
        Err(Error::FileNotFound(name.to_owned()))
    }

    // ---- 4.5.4 Read file ----------------------------------------------

    /// Reads a whole file's bytes.
    pub fn read_file(&mut self, path: &str, name: &str) -> Result<Vec<u8>> {
        let bs = self.block_size();
        let (meta, _pos) = self.find_file(path, name)?;
        meta.file_data(&mut self.file, bs)
    }

    /// Reads `count` bytes starting at `start` from a file (spec §4.5.4
    /// ranged read).
    pub fn read_file_range(&mut self, path: &str, name: &str, start: u64, count: u64) -> Result<Vec<u8>> {
        let bs = self.block_size();
        let (meta, _pos) = self.find_file(path, name)?;
        let len = meta.full_data_length as u64;
        let end = start.checked_add(count).ok_or(Error::OutOfRange { start, end: u64::MAX, len })?;
        if start > len || end > len {
            return Err(Error::OutOfRange { start, end, len });
        }
        let data = meta.file_data(&mut self.file, bs)?;
        Ok(data[start as usize..end as usize].to_vec())
    }

    // ---- 4.5.5 Write file ----------------------------------------------

    /// Creates a new file with the given bytes (spec §4.5.5).
    pub fn write_file(&mut self, path: &str, name: &str, data: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidParam("file name must not be empty".into()));
        }
        if name.len() > crate::block::meta::MAX_NAME_LEN {
            return Err(Error::InvalidParam(format!(
                "file name `{name}` exceeds {} bytes",
                crate::block::meta::MAX_NAME_LEN
            )));
        }
        let bs = self.block_size();
        let (_parent_meta, parent_pos) = self.find_directory(path)?;
        if self.find_file(path, name).is_ok() {
            return Err(Error::AlreadyExists(name.to_owned()));
        }

        let meta_cap = crate::block::meta::capacity(bs) as usize;
        let data_cap = crate::block::data::capacity(bs) as usize;
        let overflow_len = data.len().saturating_sub(meta_cap);
        let overflow_blocks = if overflow_len == 0 {
            0
        } else {
            (overflow_len + data_cap - 1) / data_cap
        };

        let positions = self.allocator.allocate(&mut self.file, overflow_blocks + 1)?;
        let meta_pos = positions[0];
        let data_positions = &positions[1..];

        let local_len = data.len().min(meta_cap);
        let local_payload = data[..local_len].to_vec();
        let remainder = &data[local_len..];
        let child_data_block = if overflow_blocks > 0 {
            data_positions[0] as i64
        } else {
            NO_LINK
        };

        if overflow_blocks > 0 {
            data::write_chain(&mut self.file, data_positions, meta_pos, remainder, bs)?;
        }

        let meta = MetaBlock::new_file(parent_pos, name, data.len() as u32, local_payload, child_data_block);
        meta.write_to(&mut self.file, meta_pos, bs)?;

        self.append_child(parent_pos, meta_pos as i64)?;

        self.trace(|| format!("wrote file `{name}` ({} bytes) at {path}", data.len()));
        Ok(())
    }

    // ---- 4.5.6 Delete file ----------------------------------------------

    /// Deletes a file (spec §4.5.6).
    pub fn delete_file(&mut self, path: &str, name: &str) -> Result<()> {
        let bs = self.block_size();
        let (meta, meta_pos) = self.find_file(path, name)?;
        let data_offsets = data::chain_offsets(&mut self.file, meta.child_data_block, bs)?;

        let zero = vec![0u8; bs as usize];
        for &off in &data_offsets {
            codec::write_at(&mut self.file, off, &zero)?;
        }
        codec::write_at(&mut self.file, meta_pos, &zero)?;

        let mut freed = data_offsets;
        freed.push(meta_pos);
        self.allocator.free(&mut self.file, &freed)?;

        self.remove_child(meta.parent as u64, meta_pos as i64)?;
        self.trace(|| format!("deleted file `{name}` at {path}"));
        Ok(())
    }

    // ---- 4.5.7 Read directory --------------------------------------

    /// Enumerates a directory's immediate children (spec §4.5.7).
    pub fn read_directory(&mut self, path: &str) -> Result<(Vec<(String, u64)>, Vec<String>, u64)> {
        let bs = self.block_size();
        let (meta, pos) = self.find_directory(path)?;
        let offsets = meta.child_offsets(&mut self.file, bs)?;
        let mut files = Vec::new();
        let mut directories = Vec::new();
        for off in offsets {
            let child = MetaBlock::read_from(&mut self.file, off as u64, bs)?;
            if child.is_directory {
                directories.push(child.name);
            } else {
                files.push((child.name, child.full_data_length as u64));
            }
        }
        Ok((files, directories, pos))
    }

    // ---- 4.5.8 Append/remove child offset -----------------------------

    /// Appends `child_offset` to the directory at `parent_pos`'s child list.
    fn append_child(&mut self, parent_pos: u64, child_offset: i64) -> Result<()> {
        let bs = self.block_size();
        let mut meta = MetaBlock::read_from(&mut self.file, parent_pos, bs)?;
        let mut offsets = meta.child_offsets(&mut self.file, bs)?;
        offsets.push(child_offset);
        self.rewrite_child_list(parent_pos, &mut meta, offsets)
    }

    /// Removes `child_offset` from the directory at `parent_pos`'s child list.
    fn remove_child(&mut self, parent_pos: u64, child_offset: i64) -> Result<()> {
        let bs = self.block_size();
        let mut meta = MetaBlock::read_from(&mut self.file, parent_pos, bs)?;
        let mut offsets = meta.child_offsets(&mut self.file, bs)?;
        offsets.retain(|&o| o != child_offset);
        self.rewrite_child_list(parent_pos, &mut meta, offsets)
    }

    /// Rewrites a directory's child-list payload, growing or shrinking the
    /// overflow chain as needed. Frees the prior overflow chain before
    /// allocating a new one, fixing the leak the reference implementation
    /// has (spec §9 open question 5) instead of replicating it.
    fn rewrite_child_list(&mut self, parent_pos: u64, meta: &mut MetaBlock, list: Vec<i64>) -> Result<()> {
        let bs = self.block_size();
        let meta_cap = crate::block::meta::capacity(bs) as usize;
        let data_cap = crate::block::data::capacity(bs) as usize;

        let old_overflow = data::chain_offsets(&mut self.file, meta.child_data_block, bs)?;
        if !old_overflow.is_empty() {
            self.allocator.free(&mut self.file, &old_overflow)?;
        }

        let local_count = (meta_cap / 8).min(list.len());
        let (local, remainder) = list.split_at(local_count);
        let remainder_bytes = remainder.len() * 8;
        let overflow_blocks = (remainder_bytes + data_cap - 1) / data_cap.max(1);

        let child_data_block = if overflow_blocks > 0 {
            let positions = self.allocator.allocate(&mut self.file, overflow_blocks)?;
            let remainder_bytes = codec::pack_offsets(remainder);
            data::write_chain(&mut self.file, &positions, parent_pos, &remainder_bytes, bs)?;
            positions[0] as i64
        } else {
            NO_LINK
        };

        meta.payload = codec::pack_offsets(local);
        meta.local_data_length = meta.payload.len() as u32;
        meta.child_data_block = child_data_block;
        meta.last_update = crate::timestamp::now();
        meta.write_to(&mut self.file, parent_pos, bs)
    }

    // ---- 4.5.9 Write directory --------------------------------------

    /// Creates a new, empty directory (spec §4.5.9).
    pub fn write_directory(&mut self, full_path: &str) -> Result<()> {
        let segments = parse_path(full_path);
        let (name, parent_segments) = segments
            .split_last()
            .ok_or_else(|| Error::InvalidParam("directory path must not be empty".into()))?;
        if name.len() > crate::block::meta::MAX_NAME_LEN {
            return Err(Error::InvalidParam(format!(
                "directory name `{name}` exceeds {} bytes",
                crate::block::meta::MAX_NAME_LEN
            )));
        }
        let bs = self.block_size();
        let parent_path = parent_segments.join("/");
        let (parent_meta, parent_pos) = self.find_directory(&parent_path)?;

        let offsets = parent_meta.child_offsets(&mut self.file, bs)?;
        for off in &offsets {
            let child = MetaBlock::read_from(&mut self.file, *off as u64, bs)?;
            if child.name == *name {
                return Err(Error::AlreadyExists((*name).to_owned()));
            }
        }

        let positions = self.allocator.allocate(&mut self.file, 1)?;
        let dir_pos = positions[0];
        let dir = MetaBlock::new_directory(parent_pos, name);
        dir.write_to(&mut self.file, dir_pos, bs)?;

        self.append_child(parent_pos, dir_pos as i64)?;
        self.trace(|| format!("created directory {full_path}"));
        Ok(())
    }

    // ---- 4.5.10 Delete directory --------------------------------------

    /// Deletes an empty directory (spec §4.5.10). Fails with
    /// [`Error::NotEmpty`] if the directory has any child.
    pub fn delete_directory(&mut self, path: &str) -> Result<()> {
        let bs = self.block_size();
        let (meta, pos) = self.find_directory(path)?;
        let offsets = meta.child_offsets(&mut self.file, bs)?;
        if !offsets.is_empty() {
            return Err(Error::NotEmpty(path.to_owned()));
        }

        let overflow = data::chain_offsets(&mut self.file, meta.child_data_block, bs)?;
        let zero = vec![0u8; bs as usize];
        for &off in &overflow {
            codec::write_at(&mut self.file, off, &zero)?;
        }
        codec::write_at(&mut self.file, pos, &zero)?;

        let mut freed = overflow;
        freed.push(pos);
        self.allocator.free(&mut self.file, &freed)?;

        self.remove_child(meta.parent as u64, pos as i64)?;
        self.trace(|| format!("deleted directory {path}"));
        Ok(())
    }

    // ---- inspection utilities ------------------------------------------

    /// Reads the raw bytes of the block at `position` (spec §6).
    pub fn read_raw_block(&mut self, position: u64) -> Result<Vec<u8>> {
        codec::read_at(&mut self.file, position, self.block_size() as usize)
    }

    /// Decodes and describes the block at `position`, dispatching on its
    /// signature (spec §6, §9 "Polymorphism of blocks").
    pub fn enumerate_block(&mut self, position: u64) -> Result<BlockDescription> {
        let bs = self.block_size();
        let kind = crate::block::peek_kind(&mut self.file, position)?;
        let raw = self.read_raw_block(position)?;
        match kind {
            Kind::Header => {
                let header = Header::decode(&raw)?;
                Ok(BlockDescription::Header {
                    version: header.version,
                    name: header.name,
                    block_size: header.block_size,
                    block_count: header.block_count,
                })
            }
            Kind::Metadata => {
                let meta = MetaBlock::decode(&raw, bs)?;
                Ok(BlockDescription::Metadata {
                    parent: meta.parent,
                    child_data_block: meta.child_data_block,
                    full_data_length: meta.full_data_length,
                    local_data_length: meta.local_data_length,
                    is_directory: meta.is_directory,
                    is_file: meta.is_file,
                    name: meta.name,
                })
            }
            Kind::Data => {
                let block = crate::block::data::DataBlock::decode(&raw, bs)?;
                Ok(BlockDescription::Data {
                    parent: block.parent,
                    child_block: block.child,
                    data_length: block.data_length,
                })
            }
        }
    }
}
