//! FIFO behaviour of the overflow queue across the memory/disk split.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use grpby_error::Result;
use grpby_spool::{OverflowQueue, PathResolver, SpillConfig};
use grpby_types::{Row, Value};
use proptest::prelude::*;

fn queue_in(dir: &Path, threshold: usize) -> OverflowQueue {
    OverflowQueue::new(SpillConfig {
        directory: dir.to_string_lossy().into_owned(),
        threshold,
        ..SpillConfig::default()
    })
}

fn row(i: u32) -> Row {
    vec![
        Value::Integer(i64::from(i)),
        if i % 3 == 0 {
            Value::Null
        } else {
            Value::Number(f64::from(i) / 4.0)
        },
        Value::Text(format!("payload-{i}")),
        Value::Binary(i.to_le_bytes().to_vec()),
    ]
}

#[test]
fn large_group_keeps_memory_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let mut q = queue_in(dir.path(), 5000);
    for i in 0..12_000 {
        q.push(row(i)).unwrap();
        assert!(q.in_memory() <= 5000);
    }
    assert_eq!(q.on_disk(), 7000);
    assert_eq!(q.stats().peak_in_memory, 5000);
    assert_eq!(q.stats().rows_spilled, 7000);
    assert_eq!(q.stats().files_created, 1);
    for i in 0..12_000 {
        assert_eq!(q.pop().unwrap(), Some(row(i)), "row {i}");
    }
    assert_eq!(q.pop().unwrap(), None);
}

#[test]
fn file_is_recreated_after_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let mut q = queue_in(dir.path(), 2);
    for i in 0..4 {
        q.push(row(i)).unwrap();
    }
    let first = q.spill_path().unwrap().to_path_buf();
    while q.pop().unwrap().is_some() {}
    q.teardown();
    assert!(!first.exists());

    for i in 10..14 {
        q.push(row(i)).unwrap();
    }
    assert!(q.spill_path().is_some());
    for i in 10..14 {
        assert_eq!(q.pop().unwrap(), Some(row(i)));
    }
    assert_eq!(q.stats().files_created, 2);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

struct FixedResolver(PathBuf);

impl PathResolver for FixedResolver {
    fn resolve(&self, _configured: &str) -> Result<PathBuf> {
        Ok(self.0.clone())
    }
}

#[test]
fn custom_resolver_picks_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = SpillConfig {
        directory: "ignored".to_owned(),
        threshold: 1,
        ..SpillConfig::default()
    };
    let mut q = OverflowQueue::with_resolver(config, Arc::new(FixedResolver(dir.path().into())));
    q.push(row(1)).unwrap();
    q.push(row(2)).unwrap();
    assert_eq!(q.spill_path().unwrap().parent(), Some(dir.path()));
}

#[derive(Debug, Clone)]
enum Op {
    Push,
    Pop,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![3 => Just(Op::Push), 2 => Just(Op::Pop)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any interleaving of pushes and pops behaves like a plain FIFO, and
    /// memory never exceeds the threshold between operations.
    #[test]
    fn behaves_like_a_fifo(threshold in 0usize..8, ops in prop::collection::vec(op(), 0..200)) {
        let dir = tempfile::tempdir().unwrap();
        let mut q = queue_in(dir.path(), threshold);
        let mut model = std::collections::VecDeque::new();
        let mut next = 0u32;
        for op in ops {
            match op {
                Op::Push => {
                    q.push(row(next)).unwrap();
                    model.push_back(row(next));
                    next += 1;
                }
                Op::Pop => {
                    prop_assert_eq!(q.pop().unwrap(), model.pop_front());
                }
            }
            prop_assert!(q.in_memory() <= threshold);
            prop_assert_eq!(q.len(), model.len());
        }
        while let Some(expected) = model.pop_front() {
            prop_assert_eq!(q.pop().unwrap(), Some(expected));
        }
        prop_assert!(q.is_empty());
    }
}
