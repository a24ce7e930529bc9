//! The key/value store contract the tree is persisted through, and the
//! layout of records inside it.

pub mod mem;
#[cfg(feature = "full")]
pub mod rocks;

pub use mem::MemStore;
#[cfg(feature = "full")]
pub use rocks::RocksStore;

use crate::error::Result;
use crate::tree::Hash;

/// Key of the record holding the hash of the current root node. Absent for an
/// empty tree.
pub const ROOT_KEY: &[u8] = b".root";

/// Prefix of node records, which are keyed by `NODE_PREFIX || node_hash`.
pub const NODE_PREFIX: &[u8] = b"n";

/// Prefix of root key records, keyed by `ROOT_KEY_PREFIX || root_hash`. Node
/// records don't contain their own key, so every committed root also stores
/// its key here.
pub const ROOT_KEY_PREFIX: &[u8] = b"r";

/// Returns the store key of the node record with the given hash.
pub fn node_key(hash: &Hash) -> Vec<u8> {
    prefixed(NODE_PREFIX, hash)
}

/// Returns the store key of the root key record for the given root hash.
pub fn root_key_key(hash: &Hash) -> Vec<u8> {
    prefixed(ROOT_KEY_PREFIX, hash)
}

fn prefixed(prefix: &[u8], hash: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + hash.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(hash);
    key
}

/// A set of writes to be committed atomically through
/// `Store::commit_write_batch`.
pub trait WriteBatch {
    fn put(&mut self, key: &[u8], value: &[u8]);

    fn delete(&mut self, key: &[u8]);

    /// Discards the batch without writing anything. Dropping an uncommitted
    /// batch has the same effect.
    fn cancel(self)
    where
        Self: Sized,
    {
    }
}

/// A durable key/value store.
pub trait Store: Send + Sync {
    type Batch: WriteBatch;

    /// Gets the value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    fn delete(&self, key: &[u8]) -> Result<()>;

    fn new_write_batch(&self) -> Self::Batch;

    /// Applies every write in the batch, atomically.
    fn commit_write_batch(&self, batch: Self::Batch) -> Result<()>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_keys() {
        let hash = [7; 32];
        let key = node_key(&hash);
        assert_eq!(key.len(), 33);
        assert_eq!(key[0], b'n');
        assert_eq!(&key[1..], &hash);

        let key = root_key_key(&hash);
        assert_eq!(key[0], b'r');
        assert_eq!(&key[1..], &hash);
        assert_ne!(ROOT_KEY, &node_key(&hash)[..]);
    }
}
