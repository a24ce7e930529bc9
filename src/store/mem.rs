use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Store, WriteBatch};
use crate::error::{Error, Result};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-memory `Store`. Clones share the same underlying map, so a store can
/// be handed to a `Merk` and inspected (or reopened) from elsewhere.
#[derive(Clone, Default)]
pub struct MemStore {
    map: Arc<RwLock<Map>>,
}

impl MemStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of records in the store.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Returns a copy of every record whose key starts with `prefix`.
    pub fn entries_with_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .read()?
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<Map>> {
        self.map
            .read()
            .map_err(|_| Error::Storage("MemStore lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<Map>> {
        self.map
            .write()
            .map_err(|_| Error::Storage("MemStore lock poisoned".into()))
    }
}

/// Write batch for `MemStore`. `None` values are deletions.
#[derive(Default)]
pub struct MemBatch {
    ops: Vec<(Vec<u8>, Option<Vec<u8>>)>,
}

impl WriteBatch for MemBatch {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push((key.to_vec(), Some(value.to_vec())));
    }

    fn delete(&mut self, key: &[u8]) {
        self.ops.push((key.to_vec(), None));
    }
}

impl Store for MemStore {
    type Batch = MemBatch;

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.write()?.remove(key);
        Ok(())
    }

    fn new_write_batch(&self) -> MemBatch {
        MemBatch::default()
    }

    fn commit_write_batch(&self, batch: MemBatch) -> Result<()> {
        let mut map = self.write()?;
        for (key, maybe_value) in batch.ops {
            match maybe_value {
                Some(value) => map.insert(key, value),
                None => map.remove(&key),
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn get_put_delete() {
        let store = MemStore::new();
        assert_eq!(store.get(b"a").expect("get failed"), None);

        store.put(b"a", b"1").expect("put failed");
        assert_eq!(store.get(b"a").expect("get failed"), Some(b"1".to_vec()));

        store.delete(b"a").expect("delete failed");
        assert_eq!(store.get(b"a").expect("get failed"), None);
        assert!(store.is_empty().expect("is_empty failed"));
    }

    #[test]
    fn write_batch() {
        let store = MemStore::new();
        store.put(b"b", b"old").expect("put failed");

        let mut batch = store.new_write_batch();
        batch.put(b"a", b"1");
        batch.delete(b"b");
        batch.put(b"c", b"3");
        assert_eq!(store.get(b"a").expect("get failed"), None);

        store.commit_write_batch(batch).expect("commit failed");
        assert_eq!(store.get(b"a").expect("get failed"), Some(b"1".to_vec()));
        assert_eq!(store.get(b"b").expect("get failed"), None);
        assert_eq!(store.len().expect("len failed"), 2);
    }

    #[test]
    fn cancel_batch() {
        let store = MemStore::new();
        let mut batch = store.new_write_batch();
        batch.put(b"a", b"1");
        batch.cancel();
        assert!(store.is_empty().expect("is_empty failed"));
    }

    #[test]
    fn clones_share_data() {
        let store = MemStore::new();
        let other = store.clone();
        store.put(b"x", b"y").expect("put failed");
        assert_eq!(other.get(b"x").expect("get failed"), Some(b"y".to_vec()));
    }

    #[test]
    fn prefix_entries() {
        let store = MemStore::new();
        store.put(b"na", b"1").expect("put failed");
        store.put(b"nb", b"2").expect("put failed");
        store.put(b"ra", b"3").expect("put failed");
        let entries = store.entries_with_prefix(b"n").expect("scan failed");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], (b"nb".to_vec(), b"2".to_vec()));
    }
}
