//! End-to-end `Container` scenarios (spec §8), driven through the public API
//! against real, tempfile-backed container files. Unit tests inside
//! `src/container.rs` cover more surgical behavior; these exercise the
//! documented scenarios as a user of the crate would.

use cfs_core::{Container, Error};
use tempfile::NamedTempFile;

fn scratch_path() -> std::path::PathBuf {
    let f = NamedTempFile::new().unwrap();
    let path = f.path().to_path_buf();
    drop(f);
    std::fs::remove_file(&path).ok();
    path
}

/// Scenario 1: a freshly created container reserves exactly two blocks and
/// the root directory is empty.
#[test]
fn scenario_create_is_empty() {
    let path = scratch_path();
    let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
    assert_eq!(c.stats().free_blocks, 4094);
    let (files, dirs, _) = c.read_directory("/").unwrap();
    assert!(files.is_empty());
    assert!(dirs.is_empty());
    std::fs::remove_file(&path).ok();
}

/// Scenario 2: a file that fits entirely in its metadata block costs exactly
/// one block.
#[test]
fn scenario_small_file_costs_one_block() {
    let path = scratch_path();
    let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
    let before = c.stats().free_blocks;
    c.write_file("/", "hello.txt", b"Hello, world!").unwrap();
    assert_eq!(c.read_file("/", "hello.txt").unwrap(), b"Hello, world!");
    assert_eq!(c.stats().free_blocks, before - 1);
    std::fs::remove_file(&path).ok();
}

/// Scenario 3: a 10,000-byte payload at blockSize=4096 overflows into
/// exactly two data blocks (metadata capacity 3584, data capacity 4032:
/// ceil((10000-3584)/4032) = 2), for three blocks total.
#[test]
fn scenario_overflowing_file_uses_expected_block_count() {
    let path = scratch_path();
    let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
    let before = c.stats().free_blocks;
    let payload = vec![b'x'; 10_000];
    c.write_file("/", "big.bin", &payload).unwrap();
    assert_eq!(c.stats().free_blocks, before - 3);
    assert_eq!(c.read_file("/", "big.bin").unwrap(), payload);
    std::fs::remove_file(&path).ok();
}

/// Scenario 4: nested directory creation and a single-file listing.
#[test]
fn scenario_nested_directories() {
    let path = scratch_path();
    let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
    c.write_directory("/a").unwrap();
    c.write_directory("/a/b").unwrap();
    c.write_file("/a/b", "x.bin", &[0u8]).unwrap();
    let (files, dirs, _) = c.read_directory("/a/b").unwrap();
    assert_eq!(files, vec![("x.bin".to_owned(), 1)]);
    assert!(dirs.is_empty());
    std::fs::remove_file(&path).ok();
}

/// Scenario 5: `deleteDirectory` on a non-empty directory fails with
/// `NotEmpty`; once drained, deleting it restores the pre-mkdir free count.
#[test]
fn scenario_delete_requires_empty_and_restores_free_blocks() {
    let path = scratch_path();
    let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
    let before = c.stats().free_blocks;
    c.write_directory("/a").unwrap();
    c.write_file("/a", "f", b"x").unwrap();
    assert!(matches!(c.delete_directory("/a"), Err(Error::NotEmpty(_))));
    c.delete_file("/a", "f").unwrap();
    c.delete_directory("/a").unwrap();
    assert_eq!(c.stats().free_blocks, before);
    std::fs::remove_file(&path).ok();
}

/// Scenario 6: filling the container with one-block files until `NoSpace`,
/// then deleting them all, restores the original free-block count. The
/// number of files created before exhaustion equals the initial free count,
/// since each file here consumes exactly one block.
#[test]
fn scenario_fill_to_no_space_then_drain() {
    let path = scratch_path();
    let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
    let initial_free = c.stats().free_blocks;

    let mut created = 0u64;
    loop {
        let name = format!("f_{created}");
        match c.write_file("/", &name, b"x") {
            Ok(()) => created += 1,
            Err(Error::NoSpace { .. }) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created, initial_free);
    assert_eq!(c.stats().free_blocks, 0);

    for i in 0..created {
        c.delete_file("/", &format!("f_{i}")).unwrap();
    }
    assert_eq!(c.stats().free_blocks, initial_free);
    std::fs::remove_file(&path).ok();
}

/// Ranged-read law: for all `0 <= s <= s+c <= len(B)`,
/// `readFile(p, n, s, c) == B[s..s+c]`.
#[test]
fn scenario_ranged_read_law() {
    let path = scratch_path();
    let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
    let payload: Vec<u8> = (0..9000u32).map(|i| (i % 256) as u8).collect();
    c.write_file("/", "r.bin", &payload).unwrap();

    for &(start, count) in &[(0u64, 0u64), (0, 9000), (100, 200), (8999, 1), (9000, 0)] {
        let got = c.read_file_range("/", "r.bin", start, count).unwrap();
        assert_eq!(got, payload[start as usize..(start + count) as usize]);
    }
    assert!(matches!(
        c.read_file_range("/", "r.bin", 9000, 1),
        Err(Error::OutOfRange { .. })
    ));
    std::fs::remove_file(&path).ok();
}

/// Bitmap persistence: reopening a container reproduces the just-closed
/// container's free-block count exactly, including after overflowing
/// writes and directory churn.
#[test]
fn scenario_reopen_preserves_free_blocks() {
    let path = scratch_path();
    {
        let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
        c.write_directory("/a").unwrap();
        c.write_file("/a", "big.bin", &vec![7u8; 12_000]).unwrap();
        c.write_file("/", "small", b"hi").unwrap();
    }
    let expected = Container::open(&path, false).unwrap().stats().free_blocks;
    let reopened = Container::open(&path, false).unwrap();
    assert_eq!(reopened.stats().free_blocks, expected);
    std::fs::remove_file(&path).ok();
}

/// Deleting then rewriting a file of equal length restores the free-block
/// count (invariant: no leaked blocks on a delete/recreate cycle).
#[test]
fn scenario_delete_then_rewrite_same_length_restores_free_blocks() {
    let path = scratch_path();
    let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
    c.write_file("/", "f", &vec![1u8; 9000]).unwrap();
    let before = c.stats().free_blocks;
    c.delete_file("/", "f").unwrap();
    c.write_file("/", "f", &vec![2u8; 9000]).unwrap();
    assert_eq!(c.stats().free_blocks, before);
    std::fs::remove_file(&path).ok();
}

/// A directory child list that overflows into its own data-block chain
/// round-trips through repeated appends and removals without leaking
/// blocks (spec §4.5.8, §9 open question 5: free-then-allocate rather than
/// leaking the prior overflow chain).
#[test]
fn scenario_large_directory_child_list_overflow() {
    let path = scratch_path();
    let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
    let before = c.stats().free_blocks;

    let names: Vec<String> = (0..600).map(|i| format!("n{i}")).collect();
    for name in &names {
        c.write_file("/", name, b"x").unwrap();
    }
    let (files, _, _) = c.read_directory("/").unwrap();
    assert_eq!(files.len(), names.len());

    for name in &names {
        c.delete_file("/", name).unwrap();
    }
    assert_eq!(c.stats().free_blocks, before);
    std::fs::remove_file(&path).ok();
}

/// Path parsing treats `""`, `"/"`, and `"."` as the root, and ignores
/// internal `.` segments.
#[test]
fn scenario_path_parsing_root_aliases() {
    let path = scratch_path();
    let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
    c.write_directory("/a").unwrap();
    for root in ["", "/", "."] {
        let (_, dirs, _) = c.read_directory(root).unwrap();
        assert_eq!(dirs, vec!["a".to_owned()]);
    }
    c.write_file("/a/./", "f", b"x").unwrap();
    assert_eq!(c.read_file("a", "f").unwrap(), b"x");
    std::fs::remove_file(&path).ok();
}

/// `createContainer` rejects block sizes/counts that violate the
/// multiples-of-4096 or minimum constraints (spec §4.5.1, §7 `InvalidParam`).
#[test]
fn scenario_create_rejects_invalid_params() {
    let path = scratch_path();
    assert!(matches!(
        Container::create(&path, "c", 2048, 4096, false),
        Err(Error::InvalidParam(_))
    ));
    assert!(matches!(
        Container::create(&path, "c", 4096, 2048, false),
        Err(Error::InvalidParam(_))
    ));
    assert!(matches!(
        Container::create(&path, "c", 4100, 4096, false),
        Err(Error::InvalidParam(_))
    ));
}

/// Writing a file under a name that already exists, or a directory whose
/// name already exists in its parent, fails with `AlreadyExists`.
#[test]
fn scenario_duplicate_names_rejected() {
    let path = scratch_path();
    let mut c = Container::create(&path, "c", 4096, 4096, false).unwrap();
    c.write_file("/", "f", b"x").unwrap();
    assert!(matches!(
        c.write_file("/", "f", b"y"),
        Err(Error::AlreadyExists(_))
    ));
    c.write_directory("/d").unwrap();
    assert!(matches!(
        c.write_directory("/d"),
        Err(Error::AlreadyExists(_))
    ));
    std::fs::remove_file(&path).ok();
}
