//! Tests for Engine
//!
//! These tests verify:
//! - Basic get/put/delete operations
//! - Atomic multi-operation writes
//! - Range snapshots
//! - Crash recovery from the WAL
//! - Failed log writes are neither visible nor replayed
//! - Concurrent access patterns
//! - Engine lifecycle (open/close)

use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;
use std::thread;

use persistbridge::config::{Config, WalSyncStrategy};
use persistbridge::engine::Engine;
use persistbridge::error::EngineError;
use persistbridge::tree::{DiskTree, FileDescriptor, FileTree, MemoryTree, NodeKind, OpenFlags};
use persistbridge::wal::{Operation, WalEntry};
use tempfile::TempDir;

#[path = "../common/failing_tree.rs"]
mod failing_tree;

use failing_tree::FailingTree;

const DIR: &str = "/Data/db";

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config() -> Config {
    Config::builder()
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build()
}

fn setup_temp_engine() -> (TempDir, DiskTree, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let tree = DiskTree::open(temp_dir.path()).unwrap();
    let engine = Engine::open(&tree, DIR, test_config()).unwrap();
    (temp_dir, tree, engine)
}

fn setup_memory_engine() -> (MemoryTree, Engine) {
    let tree = MemoryTree::new();
    let engine = Engine::open(&tree, DIR, test_config()).unwrap();
    (tree, engine)
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_engine_open_creates_directories() {
    let (temp, tree, _engine) = setup_temp_engine();

    assert_eq!(tree.lookup(DIR).unwrap(), NodeKind::Directory);
    assert_eq!(tree.lookup("/Data/db/wal.log").unwrap(), NodeKind::File);
    assert!(temp.path().join("Data").join("db").join("wal.log").exists());
}

#[test]
fn test_engine_put_get() {
    let (_temp, _tree, engine) = setup_temp_engine();

    engine.put(b"hello", b"world").unwrap();

    assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
    assert!(engine.has(b"hello").unwrap());
}

#[test]
fn test_engine_get_nonexistent_key() {
    let (_tree, engine) = setup_memory_engine();

    assert_eq!(engine.get(b"nonexistent").unwrap(), None);
    assert!(!engine.has(b"nonexistent").unwrap());
}

#[test]
fn test_engine_delete() {
    let (_tree, engine) = setup_memory_engine();

    engine.put(b"key", b"value").unwrap();
    engine.delete(b"key").unwrap();
    engine.delete(b"never-there").unwrap();

    assert_eq!(engine.get(b"key").unwrap(), None);
    assert_eq!(engine.entry_count(), 0);
}

#[test]
fn test_engine_write_applies_all_operations() {
    let (_tree, engine) = setup_memory_engine();
    engine.put(b"old", b"x").unwrap();
    let lsn_before = engine.current_lsn();

    engine
        .write(vec![
            Operation::Put { key: b"a".to_vec(), value: b"1".to_vec() },
            Operation::Put { key: b"b".to_vec(), value: b"2".to_vec() },
            Operation::Delete { key: b"old".to_vec() },
        ])
        .unwrap();

    // one WAL entry for the whole batch
    assert_eq!(engine.current_lsn(), lsn_before + 1);
    assert_eq!(engine.entry_count(), 2);
    assert_eq!(engine.get(b"old").unwrap(), None);
}

#[test]
fn test_engine_empty_write_is_noop() {
    let (_tree, engine) = setup_memory_engine();
    let lsn = engine.current_lsn();

    engine.write(Vec::new()).unwrap();

    assert_eq!(engine.current_lsn(), lsn);
}

#[test]
fn test_engine_snapshot_range() {
    let (_tree, engine) = setup_memory_engine();
    for key in ["a", "b", "c", "d"] {
        engine.put(key.as_bytes(), b"v").unwrap();
    }

    let snapshot = engine.snapshot(Some(&b"b"[..]), Some(&b"d"[..])).unwrap();
    let keys: Vec<Vec<u8>> = snapshot.into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"b".to_vec(), b"c".to_vec()]);

    // snapshots are copies
    let snapshot = engine.snapshot(None, None).unwrap();
    engine.put(b"e", b"v").unwrap();
    assert_eq!(snapshot.len(), 4);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_engine_recovery_after_reopen() {
    let (temp, tree, engine) = setup_temp_engine();
    engine.put(b"k1", b"v1").unwrap();
    engine.put(b"k2", b"v2").unwrap();
    engine.delete(b"k1").unwrap();
    drop(engine);

    // fresh tree over the same host directory
    let tree2 = DiskTree::open(temp.path()).unwrap();
    let engine = Engine::open(&tree2, DIR, test_config()).unwrap();

    assert_eq!(engine.get(b"k1").unwrap(), None);
    assert_eq!(engine.get(b"k2").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(engine.current_lsn(), 4);
    drop(tree);
}

#[test]
fn test_engine_recovery_discards_torn_batch() {
    let (tree, engine) = setup_memory_engine();
    engine.put(b"kept", b"1").unwrap();
    drop(engine);

    // simulate a crash in the middle of writing a batch record
    let torn = WalEntry::new(
        2,
        vec![
            Operation::Put { key: b"x".to_vec(), value: b"1".to_vec() },
            Operation::Put { key: b"y".to_vec(), value: b"2".to_vec() },
        ],
    )
    .serialize()
    .unwrap();
    let mut wal = tree.open("/Data/db/wal.log", OpenFlags::read_write()).unwrap();
    wal.seek(SeekFrom::End(0)).unwrap();
    wal.write_all(&torn[..torn.len() - 4]).unwrap();
    drop(wal);

    let engine = Engine::open(&tree, DIR, test_config()).unwrap();
    assert_eq!(engine.get(b"kept").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"x").unwrap(), None);
    assert_eq!(engine.get(b"y").unwrap(), None);

    // numbering continues after the last intact record
    assert_eq!(engine.current_lsn(), 2);
    engine.put(b"after", b"crash").unwrap();
    drop(engine);

    let engine = Engine::open(&tree, DIR, test_config()).unwrap();
    assert_eq!(engine.get(b"after").unwrap(), Some(b"crash".to_vec()));
}

#[test]
fn test_engine_log_keeps_every_overwrite() {
    let (tree, engine) = setup_memory_engine();
    for i in 0..50u32 {
        engine.put(b"counter", &i.to_be_bytes()).unwrap();
    }
    assert_eq!(engine.entry_count(), 1);
    drop(engine);

    // no checkpointing: all fifty records are still in the log
    let wal_len = tree.open("/Data/db/wal.log", OpenFlags::read_only()).unwrap().size().unwrap();
    let record_len = WalEntry::new(
        1,
        vec![Operation::Put { key: b"counter".to_vec(), value: 0u32.to_be_bytes().to_vec() }],
    )
    .serialize()
    .unwrap()
    .len() as u64;
    assert_eq!(wal_len, record_len * 50);

    let engine = Engine::open(&tree, DIR, test_config()).unwrap();
    assert_eq!(engine.get(b"counter").unwrap(), Some(49u32.to_be_bytes().to_vec()));
    assert_eq!(engine.current_lsn(), 51);
}

// =============================================================================
// Backend Failure Tests
// =============================================================================

#[test]
fn test_engine_failed_write_is_not_replayed() {
    let tree = FailingTree::new();
    let engine = Engine::open(&tree, DIR, test_config()).unwrap();
    engine.put(b"a", b"1").unwrap();

    tree.fail_next_write();
    let err = engine.put(b"b", b"2").unwrap_err();
    assert!(matches!(err, EngineError::WalWrite(_)));
    assert_eq!(engine.get(b"b").unwrap(), None);

    // later acknowledged writes survive the reopen
    engine.put(b"c", b"3").unwrap();
    engine.close().unwrap();
    drop(engine);

    let engine = Engine::open(&tree, DIR, test_config()).unwrap();
    assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(engine.get(b"b").unwrap(), None);
    assert_eq!(engine.get(b"c").unwrap(), Some(b"3".to_vec()));
    assert_eq!(engine.current_lsn(), 3);
}

#[test]
fn test_engine_failed_sync_is_not_replayed() {
    let tree = FailingTree::new();
    let engine = Engine::open(&tree, DIR, test_config()).unwrap();
    engine.put(b"a", b"1").unwrap();

    tree.fail_next_sync();
    assert!(engine.put(b"x", b"lost").is_err());
    assert_eq!(engine.get(b"x").unwrap(), None);
    drop(engine);

    let engine = Engine::open(&tree, DIR, test_config()).unwrap();
    assert_eq!(engine.get(b"x").unwrap(), None);
    assert_eq!(engine.entry_count(), 1);
}

#[test]
fn test_engine_failed_batch_leaves_no_operation() {
    let tree = FailingTree::new();
    let engine = Engine::open(&tree, DIR, test_config()).unwrap();

    tree.fail_next_write();
    let batch = vec![
        Operation::Put { key: b"p".to_vec(), value: b"1".to_vec() },
        Operation::Put { key: b"q".to_vec(), value: b"2".to_vec() },
    ];
    assert!(engine.write(batch).is_err());
    assert!(engine.snapshot(None, None).unwrap().is_empty());
    drop(engine);

    let engine = Engine::open(&tree, DIR, test_config()).unwrap();
    assert_eq!(engine.entry_count(), 0);
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_engine_close_rejects_operations() {
    let (_tree, engine) = setup_memory_engine();
    engine.put(b"k", b"v").unwrap();

    engine.close().unwrap();

    assert!(engine.is_closed());
    assert!(matches!(engine.get(b"k"), Err(EngineError::Closed)));
    assert!(matches!(engine.put(b"k", b"v"), Err(EngineError::Closed)));
    assert!(matches!(engine.snapshot(None, None), Err(EngineError::Closed)));
    assert!(matches!(engine.close(), Err(EngineError::Closed)));
}

#[test]
fn test_engine_open_on_file_fails() {
    let tree = MemoryTree::new();
    tree.ensure_dir("/Data").unwrap();
    tree.open("/Data/db", OpenFlags::create()).unwrap();

    assert!(Engine::open(&tree, DIR, test_config()).is_err());
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_engine_concurrent_writers() {
    let tree = MemoryTree::new();
    let engine = Arc::new(Engine::open(&tree, DIR, Config::default()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..50 {
                    let key = format!("t{}-{}", t, i);
                    engine.put(key.as_bytes(), b"v").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.entry_count(), 200);
    assert_eq!(engine.current_lsn(), 201);
}
