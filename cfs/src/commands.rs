//! One function per CLI subcommand, each a thin translation between stdin,
//! stdout, and `cfs-core`'s `Container` API. No on-disk format knowledge
//! lives here.

use std::io::{self, Read, Write};
use std::path::Path;

use cfs_core::{Container, Result};

fn parse_params(params: &str) -> Result<(u32, u32)> {
    let (bs, bc) = params.split_once(',').ok_or_else(|| {
        cfs_core::Error::InvalidParam(format!("`--params` must be `blockSize,blockCount`, got `{params}`"))
    })?;
    let parse_one = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|e| cfs_core::Error::InvalidParam(format!("invalid number `{s}`: {e}")))
    };
    Ok((parse_one(bs)?, parse_one(bc)?))
}

fn parse_range(range: &str) -> Result<(u64, u64)> {
    let (start, count) = range.split_once(',').ok_or_else(|| {
        cfs_core::Error::InvalidParam(format!("`--range` must be `start,count`, got `{range}`"))
    })?;
    let parse_one = |s: &str| {
        s.trim()
            .parse::<u64>()
            .map_err(|e| cfs_core::Error::InvalidParam(format!("invalid number `{s}`: {e}")))
    };
    Ok((parse_one(start)?, parse_one(count)?))
}

pub fn create(path: &Path, params: &str, name: Option<&str>, debug: bool) -> Result<()> {
    let (block_size, block_count) = parse_params(params)?;
    let name = name
        .map(str::to_owned)
        .unwrap_or_else(|| path.file_stem().and_then(|s| s.to_str()).unwrap_or("container").to_owned());
    let c = Container::create(path, &name, block_size, block_count, debug)?;
    let stats = c.stats();
    println!(
        "created `{}` ({} blocks x {} bytes, {} free)",
        stats.name, stats.block_count, stats.block_size, stats.free_blocks
    );
    Ok(())
}

pub fn stats(path: &Path, debug: bool) -> Result<()> {
    let c = Container::open(path, debug)?;
    let s = c.stats();
    println!("name:        {}", s.name);
    println!("version:     {}", s.version);
    println!("block size:  {} bytes", s.block_size);
    println!("block count: {}", s.block_count);
    println!("free blocks: {} ({} bytes)", s.free_blocks, s.free_bytes);
    println!("total bytes: {}", s.total_bytes);
    println!("created:     {}", s.created);
    Ok(())
}

pub fn read(path: &Path, dir: &str, file: &str, range: Option<&str>, debug: bool) -> Result<()> {
    let mut c = Container::open(path, debug)?;
    let data = match range {
        Some(r) => {
            let (start, count) = parse_range(r)?;
            c.read_file_range(dir, file, start, count)?
        }
        None => c.read_file(dir, file)?,
    };
    io::stdout().write_all(&data)?;
    Ok(())
}

pub fn write(path: &Path, dir: &str, file: &str, debug: bool) -> Result<()> {
    let mut c = Container::open(path, debug)?;
    let mut data = Vec::new();
    io::stdin().read_to_end(&mut data)?;
    c.write_file(dir, file, &data)
}

pub fn delete(path: &Path, dir: &str, file: &str, debug: bool) -> Result<()> {
    let mut c = Container::open(path, debug)?;
    c.delete_file(dir, file)
}

pub fn dir(path: &Path, dir: &str, debug: bool) -> Result<()> {
    let mut c = Container::open(path, debug)?;
    let (files, dirs, _pos) = c.read_directory(dir)?;
    for name in &dirs {
        println!("{name}/");
    }
    for (name, size) in &files {
        println!("{name}\t{size}");
    }
    Ok(())
}

pub fn mkdir(path: &Path, dir: &str, debug: bool) -> Result<()> {
    let mut c = Container::open(path, debug)?;
    c.write_directory(dir)
}

pub fn rmdir(path: &Path, dir: &str, debug: bool) -> Result<()> {
    let mut c = Container::open(path, debug)?;
    c.delete_directory(dir)
}
