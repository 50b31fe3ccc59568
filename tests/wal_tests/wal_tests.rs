//! Tests for the Write-Ahead Log
//!
//! These tests verify:
//! - Entry serialization and checksum validation
//! - Writer LSN numbering, batching and truncation
//! - Reader iteration over clean and damaged logs
//! - Recovery: torn tails and corrupt entries are cut off whole
//! - Verify reports the same stats without touching the file
//! - A failed write or sync leaves the log as it was

use std::io::{Read, Seek, SeekFrom, Write};

use persistbridge::config::WalSyncStrategy;
use persistbridge::error::EngineError;
use persistbridge::tree::{DiskTree, FileTree, MemoryTree, OpenFlags};
use persistbridge::wal::{Operation, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use tempfile::TempDir;

#[path = "../common/failing_tree.rs"]
mod failing_tree;

use failing_tree::FailingTree;

const WAL: &str = "/wal.log";

// =============================================================================
// Helper Functions
// =============================================================================

fn put(key: &str, value: &str) -> Operation {
    Operation::Put {
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

/// Write `count` single-put entries through a WalWriter
fn write_entries_via_writer(tree: &dyn FileTree, count: usize) {
    let mut writer = WalWriter::open(tree, WAL, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(put(&format!("key{}", i), &format!("value{}", i)))
            .unwrap();
    }
}

/// Append raw bytes to the log (for crafting corruption)
fn append_raw(tree: &dyn FileTree, bytes: &[u8]) {
    let mut file = tree.open(WAL, OpenFlags::create()).unwrap();
    file.seek(SeekFrom::End(0)).unwrap();
    file.write_all(bytes).unwrap();
}

fn wal_bytes(tree: &dyn FileTree) -> Vec<u8> {
    let mut file = tree.open(WAL, OpenFlags::read_only()).unwrap();
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).unwrap();
    buf
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_serialize_deserialize_put() {
    let entry = WalEntry::new(7, vec![put("k", "v")]);
    let bytes = entry.serialize().unwrap();

    let (decoded, consumed) = WalEntry::deserialize(&bytes).unwrap();
    assert_eq!(decoded, entry);
    assert_eq!(consumed, bytes.len());
}

#[test]
fn test_serialize_deserialize_batch() {
    let entry = WalEntry::new(
        1,
        vec![put("a", "1"), Operation::Delete { key: b"b".to_vec() }, put("c", "")],
    );
    let (decoded, _) = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded.operations.len(), 3);
    assert_eq!(decoded.operations[1].key(), b"b");
}

#[test]
fn test_header_layout() {
    let entry = WalEntry::new(42, vec![put("k", "v")]);
    let bytes = entry.serialize().unwrap();

    assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), 42);
    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
    assert_eq!(bytes.len(), HEADER_SIZE + len);
    let crc = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    assert_eq!(crc, WalEntry::compute_crc(&bytes[HEADER_SIZE..]));
}

#[test]
fn test_crc_corruption_detected() {
    let mut bytes = WalEntry::new(1, vec![put("k", "v")]).serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    assert!(WalEntry::deserialize(&bytes).is_err());
}

#[test]
fn test_truncated_entry() {
    let bytes = WalEntry::new(1, vec![put("key", "value")]).serialize().unwrap();

    assert!(WalEntry::deserialize(&bytes[..bytes.len() - 1]).is_err());
    assert!(WalEntry::deserialize(&bytes[..HEADER_SIZE - 1]).is_err());
    assert!(WalEntry::deserialize(&[]).is_err());
}

#[test]
fn test_header_lsn_mismatch_detected() {
    let mut bytes = WalEntry::new(5, vec![put("k", "v")]).serialize().unwrap();
    bytes[0..8].copy_from_slice(&6u64.to_le_bytes());

    assert!(WalEntry::deserialize(&bytes).is_err());
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_lsn_sequential() {
    let tree = MemoryTree::new();
    let mut writer = WalWriter::open(&tree, WAL, WalSyncStrategy::EveryWrite).unwrap();

    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(writer.append(put("a", "1")).unwrap(), 1);
    assert_eq!(writer.append(put("b", "2")).unwrap(), 2);
    assert_eq!(writer.append_batch(vec![put("c", "3"), put("d", "4")]).unwrap(), 3);
    assert_eq!(writer.current_lsn(), 4);
}

#[test]
fn test_open_at_continues_numbering_and_appends() {
    let tree = MemoryTree::new();
    write_entries_via_writer(&tree, 2);

    let mut writer = WalWriter::open_at(&tree, WAL, WalSyncStrategy::EveryWrite, 3).unwrap();
    assert_eq!(writer.append(put("x", "y")).unwrap(), 3);

    let lsns: Vec<u64> = WalReader::open(&tree, WAL)
        .unwrap()
        .entries()
        .map(|entry| entry.unwrap().lsn)
        .collect();
    assert_eq!(lsns, vec![1, 2, 3]);
}

#[test]
fn test_sync_every_n_entries() {
    let tree = MemoryTree::new();
    let mut writer =
        WalWriter::open(&tree, WAL, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();
    for i in 0..5 {
        writer.append(put(&i.to_string(), "v")).unwrap();
    }
    writer.sync().unwrap();

    assert_eq!(WalReader::open(&tree, WAL).unwrap().entries().count(), 5);
}

#[test]
fn test_truncate_clears_file_keeps_numbering() {
    let tree = MemoryTree::new();
    let mut writer = WalWriter::open(&tree, WAL, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();
    writer.append(put("b", "2")).unwrap();

    writer.truncate().unwrap();
    assert!(wal_bytes(&tree).is_empty());

    assert_eq!(writer.append(put("c", "3")).unwrap(), 3);
    let entries: Vec<WalEntry> = WalReader::open(&tree, WAL)
        .unwrap()
        .entries()
        .map(Result::unwrap)
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operations, vec![put("c", "3")]);
}

#[test]
fn test_large_entry() {
    let tree = MemoryTree::new();
    let value = "x".repeat(256 * 1024);
    let mut writer = WalWriter::open(&tree, WAL, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("big", &value)).unwrap();

    let entry = WalReader::open(&tree, WAL).unwrap().next_entry().unwrap().unwrap();
    assert_eq!(entry.operations, vec![put("big", &value)]);
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_read_empty_file() {
    let tree = MemoryTree::new();
    append_raw(&tree, b"");

    let mut reader = WalReader::open(&tree, WAL).unwrap();
    assert!(reader.is_empty());
    assert!(reader.next_entry().unwrap().is_none());
}

#[test]
fn test_read_multiple_entries() {
    let tree = MemoryTree::new();
    write_entries_via_writer(&tree, 3);

    let mut reader = WalReader::open(&tree, WAL).unwrap();
    for i in 0..3u64 {
        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.lsn, i + 1);
    }
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.position(), reader.len());
}

#[test]
fn test_iterator_stops_after_partial_data() {
    let tree = MemoryTree::new();
    write_entries_via_writer(&tree, 2);
    let torn = WalEntry::new(3, vec![put("k", "v")]).serialize().unwrap();
    append_raw(&tree, &torn[..torn.len() / 2]);

    let results: Vec<_> = WalReader::open(&tree, WAL).unwrap().entries().collect();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(results[2].is_err());
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_clean_wal() {
    let tree = MemoryTree::new();
    write_entries_via_writer(&tree, 4);

    let (entries, result) = WalRecovery::recover(&tree, WAL).unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(result.entries_recovered, 4);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 4);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_partial_header_at_tail() {
    let tree = MemoryTree::new();
    write_entries_via_writer(&tree, 2);
    let clean_len = wal_bytes(&tree).len();
    append_raw(&tree, &[1, 2, 3]);

    let (entries, result) = WalRecovery::recover(&tree, WAL).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(result.entries_corrupted, 1);
    assert!(result.was_truncated);
    assert_eq!(wal_bytes(&tree).len(), clean_len);
}

#[test]
fn test_recover_drops_torn_batch_whole() {
    let tree = MemoryTree::new();
    write_entries_via_writer(&tree, 1);
    let batch = WalEntry::new(2, vec![put("a", "1"), put("b", "2"), put("c", "3")])
        .serialize()
        .unwrap();
    append_raw(&tree, &batch[..batch.len() - 3]);

    let (entries, result) = WalRecovery::recover(&tree, WAL).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(result.last_lsn, 1);
    assert!(result.was_truncated);
}

#[test]
fn test_recover_corruption_cuts_everything_after() {
    let tree = MemoryTree::new();
    write_entries_via_writer(&tree, 1);
    let mut damaged = WalEntry::new(2, vec![put("k", "v")]).serialize().unwrap();
    let last = damaged.len() - 1;
    damaged[last] ^= 0x55;
    append_raw(&tree, &damaged);
    append_raw(&tree, &WalEntry::new(3, vec![put("z", "z")]).serialize().unwrap());

    let (entries, result) = WalRecovery::recover(&tree, WAL).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(result.entries_corrupted, 1);

    // a second pass finds a clean log
    let again = WalRecovery::verify(&tree, WAL).unwrap();
    assert_eq!(again.entries_recovered, 1);
    assert_eq!(again.entries_corrupted, 0);
}

#[test]
fn test_verify_does_not_modify() {
    let tree = MemoryTree::new();
    write_entries_via_writer(&tree, 2);
    append_raw(&tree, &[0xAA; 5]);
    let before = wal_bytes(&tree);

    let result = WalRecovery::verify(&tree, WAL).unwrap();
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert!(!result.was_truncated);
    assert_eq!(wal_bytes(&tree), before);
}

#[test]
fn test_recover_on_disk_tree() {
    let temp_dir = TempDir::new().unwrap();
    let tree = DiskTree::open(temp_dir.path()).unwrap();
    write_entries_via_writer(&tree, 3);
    append_raw(&tree, &[9; 7]);

    let (entries, result) = WalRecovery::recover(&tree, WAL).unwrap();
    assert_eq!(entries.len(), 3);
    assert!(result.was_truncated);

    let host_len = std::fs::metadata(temp_dir.path().join("wal.log")).unwrap().len();
    assert_eq!(host_len, wal_bytes(&tree).len() as u64);
}

// =============================================================================
// Failure Tests
// =============================================================================

fn read_ops(tree: &dyn FileTree) -> Vec<(u64, Vec<Operation>)> {
    WalReader::open(tree, WAL)
        .unwrap()
        .entries()
        .map(|entry| {
            let entry = entry.unwrap();
            (entry.lsn, entry.operations)
        })
        .collect()
}

#[test]
fn test_failed_write_rolls_back_torn_bytes() {
    let tree = FailingTree::new();
    let mut writer = WalWriter::open(&tree, WAL, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();
    let clean = wal_bytes(&tree);

    tree.fail_next_write();
    let err = writer.append(put("b", "2")).unwrap_err();
    assert!(matches!(err, EngineError::WalWrite(_)));
    assert_eq!(wal_bytes(&tree), clean);
    assert!(!writer.is_poisoned());

    // the failed entry's LSN is reused
    assert_eq!(writer.append(put("c", "3")).unwrap(), 2);
    assert_eq!(
        read_ops(&tree),
        vec![(1, vec![put("a", "1")]), (2, vec![put("c", "3")])]
    );

    let result = WalRecovery::verify(&tree, WAL).unwrap();
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 0);
}

#[test]
fn test_failed_sync_rolls_back_entry() {
    let tree = FailingTree::new();
    let mut writer = WalWriter::open(&tree, WAL, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();
    let clean = wal_bytes(&tree);

    tree.fail_next_sync();
    let err = writer.append(put("b", "2")).unwrap_err();
    assert!(matches!(err, EngineError::WalWrite(_)));
    assert_eq!(wal_bytes(&tree), clean);
    assert_eq!(writer.current_lsn(), 2);

    writer.append(put("c", "3")).unwrap();
    assert_eq!(
        read_ops(&tree),
        vec![(1, vec![put("a", "1")]), (2, vec![put("c", "3")])]
    );
}

#[test]
fn test_failed_rollback_refuses_further_appends() {
    let tree = FailingTree::new();
    let mut writer = WalWriter::open(&tree, WAL, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();

    tree.fail_truncates(true);
    tree.fail_next_write();
    assert!(writer.append(put("b", "2")).is_err());
    assert!(writer.is_poisoned());

    let torn = wal_bytes(&tree);
    let err = writer.append(put("c", "3")).unwrap_err();
    assert!(matches!(err, EngineError::WalWrite(_)));
    assert_eq!(wal_bytes(&tree), torn);

    // recovery still finds the entry written before the failure
    tree.fail_truncates(false);
    let (entries, result) = WalRecovery::recover(&tree, WAL).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(result.was_truncated);
}
