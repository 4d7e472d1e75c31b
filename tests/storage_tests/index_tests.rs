//! Tests for Index
//!
//! These tests verify:
//! - Empty / out-of-range / full conditions
//! - Reading specific and last entries
//! - Preallocation while open, shrink-to-used on close
//! - Recovery of entries after reopen and after unclean shutdown

use std::fs;
use std::path::PathBuf;

use commitlog::storage::{Index, IndexEntry, ENTRY_WIDTH};
use commitlog::LogError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_index() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("0.indx");
    (temp_dir, path)
}

const CAPACITY: u64 = 1024;

// =============================================================================
// Empty Index Tests
// =============================================================================

#[test]
fn test_new_index_is_empty() {
    let (_temp, path) = setup_temp_index();
    let index = Index::open(&path, CAPACITY).unwrap();

    assert!(index.is_empty());
    assert_eq!(index.size(), 0);
    assert_eq!(index.capacity(), CAPACITY);
    assert!(matches!(index.read_last(), Err(LogError::IndexEmpty)));
    assert!(matches!(index.read(0), Err(LogError::IndexEmpty)));
}

#[test]
fn test_file_preallocated_while_open() {
    let (_temp, path) = setup_temp_index();
    let _index = Index::open(&path, CAPACITY).unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len(), CAPACITY);
}

// =============================================================================
// Write / Read Tests
// =============================================================================

#[test]
fn test_write_and_read_entries() {
    let (_temp, path) = setup_temp_index();
    let index = Index::open(&path, CAPACITY).unwrap();

    let entries = [(0u32, 0u64), (1, 10), (2, 25)];
    for (offset, position) in entries {
        index.write(offset, position).unwrap();
    }

    for (offset, position) in entries {
        let entry = index.read(offset).unwrap();
        assert_eq!(entry, IndexEntry { relative_offset: offset, position });
    }

    assert_eq!(index.len(), 3);
    assert_eq!(index.size(), 3 * ENTRY_WIDTH);
    assert_eq!(index.read_last().unwrap().position, 25);
}

#[test]
fn test_read_beyond_used_is_out_of_range() {
    let (_temp, path) = setup_temp_index();
    let index = Index::open(&path, CAPACITY).unwrap();
    index.write(0, 0).unwrap();

    let result = index.read(1);

    assert!(matches!(result, Err(LogError::IndexOutOfRange { relative_offset: 1 })));
}

#[test]
fn test_write_when_full() {
    let (_temp, path) = setup_temp_index();
    let index = Index::open(&path, ENTRY_WIDTH * 3).unwrap();

    for i in 0..3u32 {
        index.write(i, i as u64 * 100).unwrap();
    }
    let result = index.write(3, 300);

    assert!(matches!(result, Err(LogError::IndexFull { capacity }) if capacity == ENTRY_WIDTH * 3));
    assert_eq!(index.len(), 3);
}

#[test]
fn test_capacity_not_multiple_of_entry_width() {
    let (_temp, path) = setup_temp_index();
    let index = Index::open(&path, ENTRY_WIDTH * 2 + 5).unwrap();

    index.write(0, 0).unwrap();
    index.write(1, 1).unwrap();

    assert!(matches!(index.write(2, 2), Err(LogError::IndexFull { .. })));
}

// =============================================================================
// Close / Reopen Tests
// =============================================================================

#[test]
fn test_close_truncates_to_used_size() {
    let (_temp, path) = setup_temp_index();
    let index = Index::open(&path, CAPACITY).unwrap();
    index.write(0, 0).unwrap();
    index.write(1, 19).unwrap();

    index.close().unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len(), 2 * ENTRY_WIDTH);
    assert!(matches!(index.read(0), Err(LogError::Closed(_))));
    // Closing twice is a no-op
    index.close().unwrap();
}

#[test]
fn test_reopen_recovers_entries() {
    let (_temp, path) = setup_temp_index();
    {
        let index = Index::open(&path, CAPACITY).unwrap();
        index.write(0, 0).unwrap();
        index.write(1, 19).unwrap();
        index.close().unwrap();
    }

    let index = Index::open(&path, CAPACITY).unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len(), CAPACITY);
    assert_eq!(index.len(), 2);
    assert_eq!(index.read_last().unwrap(), IndexEntry { relative_offset: 1, position: 19 });

    // Appending continues after the recovered entries
    index.write(2, 38).unwrap();
    assert_eq!(index.read(2).unwrap().position, 38);
}

#[test]
fn test_reopen_after_unclean_shutdown_trims_preallocated_tail() {
    let (_temp, path) = setup_temp_index();
    {
        let index = Index::open(&path, ENTRY_WIDTH * 10).unwrap();
        index.write(0, 0).unwrap();
        index.write(1, 19).unwrap();
        // Dropped without close: file stays at full capacity
    }
    assert_eq!(fs::metadata(&path).unwrap().len(), ENTRY_WIDTH * 10);

    let index = Index::open(&path, ENTRY_WIDTH * 10).unwrap();

    assert_eq!(index.len(), 2);
    assert_eq!(index.read_last().unwrap().relative_offset, 1);
}

#[test]
fn test_reopen_with_smaller_capacity_fails() {
    let (_temp, path) = setup_temp_index();
    {
        let index = Index::open(&path, CAPACITY).unwrap();
        for i in 0..4u32 {
            index.write(i, i as u64).unwrap();
        }
        index.close().unwrap();
    }

    let result = Index::open(&path, ENTRY_WIDTH * 2);

    assert!(matches!(result, Err(LogError::Config(_))));
}
