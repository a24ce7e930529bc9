#![allow(dead_code)]

use merk_avl::tree::Tree;
use merk_avl::{Batch, BatchEntry, MemStore, Merk, Op};

pub use merk_avl::test_utils::{apply_memonly, assert_tree_invariants};

/// Makes a batch which puts `value` under each of the given string keys.
/// Keys must already be sorted.
pub fn put_batch(keys: &[&str], value: &str) -> Vec<BatchEntry> {
    keys.iter()
        .map(|key| (key.as_bytes().to_vec(), Op::Put(value.as_bytes().to_vec())))
        .collect()
}

pub fn delete_batch(keys: &[&str]) -> Vec<BatchEntry> {
    keys.iter()
        .map(|key| (key.as_bytes().to_vec(), Op::Delete))
        .collect()
}

pub fn to_keys(keys: &[&str]) -> Vec<Vec<u8>> {
    keys.iter().map(|key| key.as_bytes().to_vec()).collect()
}

pub fn open_mem() -> (Merk<MemStore>, MemStore) {
    let store = MemStore::new();
    let merk = Merk::open(store.clone()).expect("open failed");
    (merk, store)
}

pub fn apply(merk: &mut Merk<MemStore>, batch: &Batch) -> Vec<Vec<u8>> {
    let deleted = merk.apply(batch).expect("apply failed");
    if let Some(tree) = merk.tree() {
        assert_tree_invariants(tree);
    }
    deleted
}

/// Returns the key of the child on the given side, if it is in memory.
pub fn child_key(tree: &Tree, left: bool) -> Option<&[u8]> {
    tree.child(left).map(Tree::key)
}
