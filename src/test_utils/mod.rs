//! Helpers for building trees and batches in tests and benchmarks.

#[cfg(feature = "full")]
mod temp_merk;

use std::ops::Range;

use byteorder::{BigEndian, WriteBytesExt};
use rand::prelude::*;

#[cfg(feature = "full")]
pub use temp_merk::TempMerk;

use crate::tree::{Batch, BatchEntry, Link, NoopCommit, Op, PanicSource, Tree, Walker};

/// Asserts the AVL balance, key ordering and hash consistency of every
/// in-memory node of `tree`.
pub fn assert_tree_invariants(tree: &Tree) {
    assert!(tree.balance_factor().abs() < 2);

    for &left in &[true, false] {
        let link = match tree.link(left) {
            None => continue,
            Some(link) => link,
        };

        if left {
            assert!(link.key() < tree.key());
        } else {
            assert!(link.key() > tree.key());
        }

        if let Some(child) = link.tree() {
            assert_eq!(link.key(), child.key());
            assert_eq!(link.child_heights(), child.child_heights());
            if let Link::Stored { hash, .. } = link {
                assert_eq!(*hash, child.hash());
            }
            assert_tree_invariants(child);
        }
    }
}

/// Applies a batch to a tree held entirely in memory, then commits it
/// without writing or pruning.
pub fn apply_memonly_unchecked(tree: Tree, batch: &Batch) -> Tree {
    let walker = Walker::<PanicSource>::new(tree, PanicSource {});
    let (maybe_tree, _) =
        Walker::apply_to(Some(walker), batch, PanicSource {}).expect("apply failed");
    let mut tree = maybe_tree.expect("expected tree");
    tree.commit(&mut NoopCommit {}).expect("commit failed");
    tree
}

pub fn apply_memonly(tree: Tree, batch: &Batch) -> Tree {
    let tree = apply_memonly_unchecked(tree, batch);
    assert_tree_invariants(&tree);
    tree
}

/// Builds a committed in-memory tree from a batch of puts.
pub fn build_memonly(batch: &Batch) -> Tree {
    let (maybe_tree, _) =
        Walker::<PanicSource>::apply_to(None, batch, PanicSource {}).expect("apply failed");
    let mut tree = maybe_tree.expect("expected tree");
    tree.commit(&mut NoopCommit {}).expect("commit failed");
    assert_tree_invariants(&tree);
    tree
}

/// Returns the 12-byte key for `n`: its big-endian encoding, followed by four
/// zero bytes. Keys sort in the same order as their numbers.
pub fn seq_key(n: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(12);
    key.write_u64::<BigEndian>(n)
        .expect("writing to key failed");
    key.extend_from_slice(&[0; 4]);
    key
}

pub fn put_entry(n: u64) -> BatchEntry {
    (seq_key(n), Op::Put(vec![123; 60]))
}

pub fn del_entry(n: u64) -> BatchEntry {
    (seq_key(n), Op::Delete)
}

pub fn make_batch_seq(range: Range<u64>) -> Vec<BatchEntry> {
    range.map(put_entry).collect()
}

/// Makes a sorted batch of `size` puts with random keys, reproducible from
/// `seed`.
pub fn make_batch_rand(size: u64, seed: u64) -> Vec<BatchEntry> {
    let mut rng: SmallRng = SeedableRng::seed_from_u64(seed);
    let mut batch: Vec<BatchEntry> = (0..size).map(|_| put_entry(rng.gen())).collect();
    batch.sort_by(|a, b| a.0.cmp(&b.0));
    batch.dedup_by(|a, b| a.0 == b.0);
    batch
}

/// Builds an in-memory tree with keys `seq_key(0)..seq_key(node_count)`,
/// applied in batches of up to 10,000.
pub fn make_tree_seq(node_count: u64) -> Tree {
    let batch_size = 10_000;

    let mut tree = build_memonly(&make_batch_seq(0..node_count.min(batch_size)));
    let mut start = batch_size;
    while start < node_count {
        let end = (start + batch_size).min(node_count);
        tree = apply_memonly(tree, &make_batch_seq(start..end));
        start = end;
    }

    tree
}

/// Builds an in-memory tree from `node_count / batch_size` random batches.
pub fn make_tree_rand(node_count: u64, batch_size: u64, initial_seed: u64) -> Tree {
    assert!(node_count >= batch_size);
    assert_eq!(node_count % batch_size, 0);

    let mut tree = build_memonly(&make_batch_rand(batch_size, initial_seed));
    let batch_count = node_count / batch_size;
    for i in 1..batch_count {
        let batch = make_batch_rand(batch_size, initial_seed + i);
        tree = apply_memonly(tree, &batch);
    }

    tree
}
