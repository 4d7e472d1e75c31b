//! Tests for Segment
//!
//! These tests verify:
//! - Offset assignment relative to the base offset
//! - Maxed detection by index and by store budget
//! - Recovery of next offset on reopen (clean and unclean)
//! - Index entries past a truncated store are dropped on reopen
//! - Failed appends do not advance the next offset
//! - Removal of backing files

use std::path::Path;

use commitlog::config::SegmentConfig;
use commitlog::storage::{Segment, ENTRY_WIDTH, LEN_WIDTH};
use commitlog::{LogError, Record};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

const BASE: u64 = 16;

/// Encoded "hello world" record: value len (8) + value (11) + offset (8)
const RECORD_LEN: u64 = 8 + 11 + 8;

fn hello() -> Record {
    Record::new("hello world")
}

fn config(max_store_bytes: u64, max_index_bytes: u64) -> SegmentConfig {
    SegmentConfig {
        max_store_bytes,
        max_index_bytes,
        initial_offset: 0,
    }
}

fn truncate_file(path: &Path, len: u64) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(len).unwrap();
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// Append / Read Tests
// =============================================================================

#[test]
fn test_new_segment_starts_at_base() {
    let temp = TempDir::new().unwrap();
    let segment = Segment::open(temp.path(), BASE, config(1024, ENTRY_WIDTH * 3)).unwrap();

    assert_eq!(segment.base_offset(), BASE);
    assert_eq!(segment.next_offset(), BASE);
    assert!(segment.is_empty());
    assert!(!segment.is_maxed());
    assert_eq!(file_names(temp.path()), vec!["16.indx", "16.store"]);
}

#[test]
fn test_append_and_read() {
    let temp = TempDir::new().unwrap();
    let mut segment = Segment::open(temp.path(), BASE, config(1024, ENTRY_WIDTH * 3)).unwrap();

    for i in 0..3 {
        let offset = segment.append(hello()).unwrap();
        assert_eq!(offset, BASE + i);

        let record = segment.read(offset).unwrap();
        assert_eq!(record.value, b"hello world");
        assert_eq!(record.offset, offset);
    }

    assert_eq!(segment.next_offset(), BASE + 3);
    assert!(segment.contains(BASE + 2));
    assert!(!segment.contains(BASE + 3));
}

#[test]
fn test_caller_offset_is_overwritten() {
    let temp = TempDir::new().unwrap();
    let mut segment = Segment::open(temp.path(), BASE, config(1024, 1024)).unwrap();

    let offset = segment
        .append(Record {
            value: b"x".to_vec(),
            offset: 9999,
        })
        .unwrap();

    assert_eq!(offset, BASE);
    assert_eq!(segment.read(BASE).unwrap().offset, BASE);
}

#[test]
fn test_read_outside_range() {
    let temp = TempDir::new().unwrap();
    let mut segment = Segment::open(temp.path(), BASE, config(1024, 1024)).unwrap();

    assert!(matches!(segment.read(BASE), Err(LogError::OffsetOutOfRange { offset: BASE })));

    segment.append(hello()).unwrap();

    assert!(matches!(segment.read(BASE - 1), Err(LogError::OffsetOutOfRange { offset: 15 })));
    assert!(matches!(segment.read(BASE + 1), Err(LogError::OffsetOutOfRange { offset: 17 })));
}

// =============================================================================
// Maxed Tests
// =============================================================================

#[test]
fn test_maxed_by_index() {
    let temp = TempDir::new().unwrap();
    let mut segment = Segment::open(temp.path(), BASE, config(1024, ENTRY_WIDTH * 3)).unwrap();

    segment.append(hello()).unwrap();
    segment.append(hello()).unwrap();
    assert!(!segment.is_maxed());

    segment.append(hello()).unwrap();
    assert!(segment.is_maxed());
}

#[test]
fn test_maxed_by_store() {
    let temp = TempDir::new().unwrap();
    let frame = LEN_WIDTH + RECORD_LEN;
    let mut segment = Segment::open(temp.path(), BASE, config(frame * 3, 1024)).unwrap();

    segment.append(hello()).unwrap();
    segment.append(hello()).unwrap();
    assert!(!segment.is_maxed());

    segment.append(hello()).unwrap();
    assert!(segment.is_maxed());
    assert_eq!(segment.store().size(), frame * 3);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_failed_index_write_does_not_advance() {
    let temp = TempDir::new().unwrap();
    let mut segment = Segment::open(temp.path(), BASE, config(1024, ENTRY_WIDTH * 3)).unwrap();
    for _ in 0..3 {
        segment.append(hello()).unwrap();
    }

    let result = segment.append(hello());

    assert!(matches!(result, Err(LogError::IndexFull { .. })));
    assert_eq!(segment.next_offset(), BASE + 3);
    assert!(matches!(segment.read(BASE + 3), Err(LogError::OffsetOutOfRange { .. })));
    // Earlier records are untouched
    assert_eq!(segment.read(BASE + 2).unwrap().offset, BASE + 2);
}

#[test]
fn test_oversized_record_rejected_before_write() {
    let temp = TempDir::new().unwrap();
    let mut segment = Segment::open(temp.path(), BASE, config(1024, 1024)).unwrap();

    let huge = Record::new(vec![0u8; commitlog::record::MAX_RECORD_BYTES as usize]);
    let result = segment.append(huge);

    assert!(matches!(result, Err(LogError::Serialization(_))));
    assert_eq!(segment.next_offset(), BASE);
    assert_eq!(segment.store().size(), 0);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_reopen_recovers_next_offset() {
    let temp = TempDir::new().unwrap();
    let cfg = config(1024, ENTRY_WIDTH * 3);
    {
        let mut segment = Segment::open(temp.path(), BASE, cfg).unwrap();
        for _ in 0..3 {
            segment.append(hello()).unwrap();
        }
        segment.close().unwrap();
    }

    let segment = Segment::open(temp.path(), BASE, cfg).unwrap();

    assert_eq!(segment.next_offset(), BASE + 3);
    assert!(segment.is_maxed());
    for offset in BASE..BASE + 3 {
        assert_eq!(segment.read(offset).unwrap().offset, offset);
    }
}

#[test]
fn test_reopen_after_unclean_shutdown() {
    let temp = TempDir::new().unwrap();
    let cfg = config(1024, 1024);
    {
        let mut segment = Segment::open(temp.path(), BASE, cfg).unwrap();
        segment.append(hello()).unwrap();
        segment.append(hello()).unwrap();
        // Dropped without close
    }

    let mut segment = Segment::open(temp.path(), BASE, cfg).unwrap();

    assert_eq!(segment.next_offset(), BASE + 2);
    assert_eq!(segment.append(hello()).unwrap(), BASE + 2);
}

#[test]
fn test_reopen_unclean_empty_segment() {
    let temp = TempDir::new().unwrap();
    let cfg = config(1024, 1024);
    {
        // Preallocated index of zeros, nothing in the store
        let _segment = Segment::open(temp.path(), BASE, cfg).unwrap();
    }

    let segment = Segment::open(temp.path(), BASE, cfg).unwrap();

    assert!(segment.is_empty());
    assert_eq!(segment.next_offset(), BASE);
}

#[test]
fn test_reopen_drops_entries_past_truncated_store() {
    let temp = TempDir::new().unwrap();
    let cfg = config(1024, 1024);
    let frame = LEN_WIDTH + RECORD_LEN;
    {
        let mut segment = Segment::open(temp.path(), BASE, cfg).unwrap();
        for _ in 0..3 {
            segment.append(hello()).unwrap();
        }
        // Dropped without close
    }
    // Only the first frame reached the store
    truncate_file(&temp.path().join("16.store"), frame);

    let mut segment = Segment::open(temp.path(), BASE, cfg).unwrap();

    assert_eq!(segment.next_offset(), BASE + 1);
    assert_eq!(segment.index().len(), 1);
    assert!(matches!(segment.read(BASE + 1), Err(LogError::OffsetOutOfRange { .. })));

    let offset = segment.append(Record::new("new")).unwrap();
    assert_eq!(offset, BASE + 1);
    let record = segment.read(BASE + 1).unwrap();
    assert_eq!(record.value, b"new");
    assert_eq!(record.offset, BASE + 1);
    assert!(matches!(segment.read(BASE + 2), Err(LogError::OffsetOutOfRange { .. })));
    assert_eq!(segment.read(BASE).unwrap().value, b"hello world");
}

#[test]
fn test_reopen_discards_partial_trailing_frame() {
    let temp = TempDir::new().unwrap();
    let cfg = config(1024, 1024);
    let frame = LEN_WIDTH + RECORD_LEN;
    {
        let mut segment = Segment::open(temp.path(), BASE, cfg).unwrap();
        segment.append(hello()).unwrap();
        segment.append(hello()).unwrap();
    }
    // Second frame's prefix survived, its payload did not
    truncate_file(&temp.path().join("16.store"), frame + LEN_WIDTH + 4);

    let mut segment = Segment::open(temp.path(), BASE, cfg).unwrap();

    assert_eq!(segment.next_offset(), BASE + 1);
    assert_eq!(segment.store().size(), frame);

    let offset = segment.append(hello()).unwrap();
    assert_eq!(offset, BASE + 1);
    assert_eq!(segment.index().read_last().unwrap().position, frame);
    assert_eq!(segment.read(BASE + 1).unwrap().offset, BASE + 1);
}

// =============================================================================
// Remove Tests
// =============================================================================

#[test]
fn test_remove_deletes_files() {
    let temp = TempDir::new().unwrap();
    let mut segment = Segment::open(temp.path(), BASE, config(1024, 1024)).unwrap();
    segment.append(hello()).unwrap();

    segment.remove().unwrap();

    assert!(file_names(temp.path()).is_empty());
}
