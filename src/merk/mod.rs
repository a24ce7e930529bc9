mod options;

use log::{debug, trace, warn};

pub use options::MerkOptions;

use crate::error::{Error, Result};
use crate::proofs::encode_into;
use crate::store::{node_key, root_key_key, Store, WriteBatch, ROOT_KEY};
use crate::tree::{
    Batch, Commit, Fetch, Hash, Link, Op, RefWalker, Tree, Walker, HASH_LENGTH, NULL_HASH,
};

/// A handle to a Merkle key/value store persisted through a `Store`.
pub struct Merk<S: Store> {
    tree: Option<Tree>,
    store: S,
    options: MerkOptions,
    pending: bool,
}

impl<S: Store> Merk<S> {
    /// Opens a tree persisted in `store`, using the default options. If the
    /// store has no root pointer, the tree starts out empty.
    pub fn open(store: S) -> Result<Self> {
        Merk::open_opt(store, MerkOptions::default())
    }

    /// Opens a tree persisted in `store` with the given options.
    pub fn open_opt(store: S, options: MerkOptions) -> Result<Self> {
        let tree = load_root(&store)?;
        debug!(
            "opened merk with root {}",
            hex::encode(tree.as_ref().map_or(NULL_HASH, Tree::hash))
        );

        Ok(Merk {
            tree,
            store,
            options,
            pending: false,
        })
    }

    /// Gets the value for the given key, or `None` if the key is not in the
    /// tree. Pruned nodes along the path are read from the store but not kept
    /// in memory.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match &self.tree {
            None => Ok(None),
            Some(tree) => tree.get_value(key, &self.source()),
        }
    }

    /// Returns the root hash of the tree (a digest for the entire store which
    /// proofs can be checked against). If the tree is empty, returns the null
    /// hash (zero-filled).
    pub fn root_hash(&self) -> Hash {
        self.tree.as_ref().map_or(NULL_HASH, Tree::hash)
    }

    /// Applies a batch of operations (puts and deletes) to the tree, and
    /// returns the deleted keys in ascending order.
    ///
    /// This will fail if the keys in `batch` are not sorted and unique, or if
    /// a key or value is too long to be encoded. This check creates some
    /// overhead, so if you are sure your batch is valid you can use
    /// `apply_unchecked` instead.
    ///
    /// # Example
    /// ```
    /// # use merk_avl::{Merk, Op, store::MemStore};
    /// let mut merk = Merk::open(MemStore::new()).unwrap();
    /// merk.apply(&[(vec![4, 5, 6], Op::Put(vec![0]))]).unwrap();
    ///
    /// let batch = &[
    ///     (vec![1, 2, 3], Op::Put(vec![4, 5, 6])), // puts value [4,5,6] to key [1,2,3]
    ///     (vec![4, 5, 6], Op::Delete),             // deletes key [4,5,6]
    /// ];
    /// let deleted = merk.apply(batch).unwrap();
    /// assert_eq!(deleted, vec![vec![4, 5, 6]]);
    /// ```
    pub fn apply(&mut self, batch: &Batch) -> Result<Vec<Vec<u8>>> {
        // ensure keys in batch are sorted and unique
        let mut maybe_prev_key: Option<&[u8]> = None;
        for (key, op) in batch.iter() {
            if let Some(prev_key) = maybe_prev_key {
                if prev_key > key.as_slice() {
                    return Err(Error::BatchKey("Keys in batch must be sorted".into()));
                } else if prev_key == key.as_slice() {
                    return Err(Error::BatchKey("Keys in batch must be unique".into()));
                }
            }
            maybe_prev_key = Some(key);

            check_length(key.len(), "Key")?;
            if let Op::Put(value) = op {
                check_length(value.len(), "Value")?;
            }
        }

        self.apply_unchecked(batch)
    }

    /// Applies a batch of operations (puts and deletes) to the tree.
    ///
    /// The keys in `batch` must be sorted and unique, and keys and values must
    /// fit a 32-bit length. Violating this does not cause undefined behavior
    /// but leaves the tree in an unspecified (possibly invalid) shape. For a
    /// checked version of this method, see `apply`.
    ///
    /// Deleting a key which does not exist fails with `Error::Invariant` and
    /// leaves the tree untouched. If the batch fails later on (a storage or
    /// decode error), the handle goes back to the last committed tree.
    pub fn apply_unchecked(&mut self, batch: &Batch) -> Result<Vec<Vec<u8>>> {
        for (key, op) in batch.iter() {
            if let Op::Delete = op {
                if self.get(key)?.is_none() {
                    return Err(Error::Invariant(format!(
                        "Tried to delete non-existent key {}",
                        hex::encode(key)
                    )));
                }
            }
        }

        let source = MerkSource { store: &self.store };
        let maybe_walker = self.tree.take().map(|tree| Walker::new(tree, source.clone()));

        let result =
            Walker::apply_to_par(maybe_walker, batch, source, self.options.parallel_threshold);

        let (maybe_tree, deleted_keys) = match result {
            Ok(res) => res,
            Err(err) => {
                warn!("Failed to apply batch, reloading last committed root: {}", err);
                match load_root(&self.store) {
                    Ok(tree) => self.tree = tree,
                    Err(load_err) => warn!("Failed to reload root: {}", load_err),
                }
                self.pending = false;
                return Err(err);
            }
        };

        self.tree = maybe_tree;
        self.pending = true;

        let mut deleted_keys: Vec<Vec<u8>> = deleted_keys.into_iter().collect();
        deleted_keys.sort();
        debug!(
            "applied batch of {} ops, deleted {} keys",
            batch.len(),
            deleted_keys.len()
        );

        if self.options.auto_commit {
            self.commit()?;
        }

        Ok(deleted_keys)
    }

    /// Creates a Merkle proof for the list of queried keys. For each key in the
    /// query, if the key is found in the store then the value will be proven to
    /// be in the tree. For each key in the query that does not exist in the
    /// tree, its absence will be proven by including boundary keys.
    ///
    /// The proof returned is in an encoded format which can be verified with
    /// `merk_avl::verify`.
    ///
    /// This will fail if the keys in `query` are not sorted and unique. This
    /// check adds some overhead, so if you are sure your batch is sorted and
    /// unique you can use `prove_unchecked` for a small performance gain.
    pub fn prove(&mut self, query: &[Vec<u8>]) -> Result<Vec<u8>> {
        // ensure keys in query are sorted and unique
        for pair in query.windows(2) {
            if pair[0] > pair[1] {
                return Err(Error::QueryKey("Keys in query must be sorted".into()));
            } else if pair[0] == pair[1] {
                return Err(Error::QueryKey("Keys in query must be unique".into()));
            }
        }

        self.prove_unchecked(query)
    }

    /// Like `prove`, but the keys in `query` must already be sorted and
    /// unique.
    ///
    /// Nodes loaded from the store while building the proof stay in memory
    /// until a commit which rewrites their parent prunes them.
    pub fn prove_unchecked(&mut self, query: &[Vec<u8>]) -> Result<Vec<u8>> {
        let source = MerkSource { store: &self.store };
        let tree = match &mut self.tree {
            None => return Err(Error::Proof("Cannot create proof for empty tree".into())),
            Some(tree) => tree,
        };

        let mut ref_walker = RefWalker::new(tree, source);
        let (proof, _) = ref_walker.create_proof(query)?;

        let mut bytes = Vec::with_capacity(128);
        encode_into(proof.iter(), &mut bytes)?;
        Ok(bytes)
    }

    /// Writes all pending changes to the store in a single write batch, along
    /// with the root pointer. Nodes deeper than `levels_to_keep` below the
    /// root are pruned from memory afterwards.
    pub fn commit(&mut self) -> Result<()> {
        let mut batch = self.store.new_write_batch();

        if let Some(tree) = &mut self.tree {
            let mut committer = MerkCommitter::new(tree.height(), self.options.levels_to_keep);
            tree.commit(&mut committer)?;

            let root_hash = tree.hash();
            let written = committer.batch.len();
            for (key, value) in committer.batch {
                batch.put(&key, &value);
            }

            // update pointer to root node
            batch.put(&root_key_key(&root_hash), tree.key());
            batch.put(ROOT_KEY, &root_hash);

            debug!(
                "committing {} nodes, root {}, keeping {} levels",
                written,
                hex::encode(root_hash),
                self.options.levels_to_keep
            );
        } else {
            // empty tree, delete pointer to root
            batch.delete(ROOT_KEY);
            debug!("committing empty tree");
        }

        self.store.commit_write_batch(batch)?;
        self.pending = false;
        Ok(())
    }

    /// Durably checkpoints the current tree and returns its root hash, which
    /// can later be passed to `revert`.
    ///
    /// Every node currently in memory is written again along with the root
    /// pointer. Fails if there are uncommitted changes.
    pub fn snapshot(&mut self) -> Result<Hash> {
        if self.pending {
            return Err(Error::Invariant(
                "Cannot snapshot tree with uncommitted changes".into(),
            ));
        }

        let mut batch = self.store.new_write_batch();

        let root_hash = match &self.tree {
            None => {
                batch.delete(ROOT_KEY);
                NULL_HASH
            }
            Some(tree) => {
                let mut committer =
                    MerkCommitter::new(tree.height(), self.options.levels_to_keep);
                tree.commit_snapshot(&mut committer)?;

                let root_hash = tree.hash();
                for (key, value) in committer.batch {
                    batch.put(&key, &value);
                }
                batch.put(&root_key_key(&root_hash), tree.key());
                batch.put(ROOT_KEY, &root_hash);
                root_hash
            }
        };

        self.store.commit_write_batch(batch)?;
        debug!("took snapshot {}", hex::encode(root_hash));
        Ok(root_hash)
    }

    /// Replaces the tree with the version whose root hash is `hash`, and
    /// makes it the persisted root. `NULL_HASH` reverts to an empty tree.
    /// Uncommitted changes are discarded.
    pub fn revert(&mut self, hash: Hash) -> Result<()> {
        let mut batch = self.store.new_write_batch();

        let tree = if hash == NULL_HASH {
            batch.delete(ROOT_KEY);
            None
        } else {
            let tree = load_tree(&self.store, &hash)?;
            batch.put(ROOT_KEY, &hash);
            Some(tree)
        };

        self.store.commit_write_batch(batch)?;
        self.tree = tree;
        self.pending = false;
        debug!("reverted to {}", hex::encode(hash));
        Ok(())
    }

    /// Returns the in-memory root node, if the tree is not empty.
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the handle and returns its store. Uncommitted changes are
    /// dropped.
    pub fn into_store(self) -> S {
        self.store
    }

    fn source(&self) -> MerkSource<S> {
        MerkSource { store: &self.store }
    }
}

#[cfg(feature = "full")]
impl Merk<crate::store::RocksStore> {
    /// Closes the store and deletes all data from disk.
    pub fn destroy(self) -> Result<()> {
        self.store.destroy()
    }
}

/// Fetches pruned nodes from a `Store` by their hash.
pub struct MerkSource<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> Clone for MerkSource<'a, S> {
    fn clone(&self) -> Self {
        MerkSource { store: self.store }
    }
}

impl<'a, S: Store> Fetch for MerkSource<'a, S> {
    fn fetch(&self, link: &Link) -> Result<Tree> {
        trace!("fetching node {}", hex::encode(link.key()));
        get_node(self.store, &link.hash(), link.key().to_vec())
    }
}

/// Collects encoded node records during a commit, and decides which nodes
/// get pruned.
struct MerkCommitter {
    batch: Vec<(Vec<u8>, Vec<u8>)>,
    height: u8,
    levels: u8,
}

impl MerkCommitter {
    fn new(height: u8, levels: u8) -> Self {
        MerkCommitter {
            batch: Vec::with_capacity(10000),
            height,
            levels,
        }
    }
}

impl Commit for MerkCommitter {
    fn write(&mut self, tree: &Tree) -> Result<()> {
        let bytes = tree.encode()?;
        self.batch.push((node_key(&tree.hash()), bytes));
        Ok(())
    }

    fn prune(&self, tree: &Tree) -> (bool, bool) {
        // keep N top levels of tree
        let prune = self.height.saturating_sub(tree.height()) >= self.levels;
        (prune, prune)
    }
}

fn check_length(len: usize, what: &str) -> Result<()> {
    if len > u32::MAX as usize {
        return Err(Error::Length(format!(
            "{} length {} exceeds u32::MAX",
            what, len
        )));
    }
    Ok(())
}

/// Reads and decodes the node record with the given hash.
fn get_node<S: Store>(store: &S, hash: &Hash, key: Vec<u8>) -> Result<Tree> {
    let bytes = store.get(&node_key(hash))?.ok_or_else(|| {
        Error::NodeNotFound(format!(
            "Node {} (key {}) is missing from the store",
            hex::encode(hash),
            hex::encode(&key)
        ))
    })?;

    let tree = Tree::decode(key, &bytes)?;
    if tree.hash() != *hash {
        return Err(Error::Decode(format!(
            "Node record {} hashes to {}",
            hex::encode(hash),
            hex::encode(tree.hash())
        )));
    }
    Ok(tree)
}

/// Loads the root node of the tree whose root hash is `hash`.
fn load_tree<S: Store>(store: &S, hash: &Hash) -> Result<Tree> {
    let key = store.get(&root_key_key(hash))?.ok_or_else(|| {
        Error::NodeNotFound(format!("No root with hash {}", hex::encode(hash)))
    })?;

    get_node(store, hash, key)
}

/// Loads the root named by the root pointer, if any.
fn load_root<S: Store>(store: &S) -> Result<Option<Tree>> {
    let bytes = match store.get(ROOT_KEY)? {
        None => return Ok(None),
        Some(bytes) => bytes,
    };

    if bytes.len() != HASH_LENGTH {
        return Err(Error::Decode(format!(
            "Root pointer has length {}, expected {}",
            bytes.len(),
            HASH_LENGTH
        )));
    }
    let mut hash = NULL_HASH;
    hash.copy_from_slice(&bytes);

    Ok(Some(load_tree(store, &hash)?))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemStore;
    use crate::test_utils::*;

    fn open_mem() -> Merk<MemStore> {
        Merk::open(MemStore::new()).expect("open failed")
    }

    #[test]
    fn simple_insert_apply() {
        let batch_size = 20;

        let mut merk = open_mem();
        let batch = make_batch_seq(0..batch_size);
        merk.apply(&batch).expect("apply failed");

        assert_tree_invariants(merk.tree().expect("expected tree"));
        assert_eq!(merk.get(&seq_key(7)).expect("get failed"), Some(vec![123; 60]));
    }

    #[test]
    fn insert_uncached() {
        let batch_size = 20;

        let mut merk = open_mem();
        let batch = make_batch_seq(0..batch_size);
        merk.apply(&batch).expect("apply failed");
        assert_tree_invariants(merk.tree().expect("expected tree"));

        let batch = make_batch_seq(batch_size..(batch_size * 2));
        merk.apply(&batch).expect("apply failed");
        assert_tree_invariants(merk.tree().expect("expected tree"));

        for i in 0..(batch_size * 2) {
            assert!(merk.get(&seq_key(i)).expect("get failed").is_some());
        }
    }

    #[test]
    fn insert_rand() {
        let tree_size = 40;
        let batch_size = 4;

        let mut merk = open_mem();
        for i in 0..(tree_size / batch_size) {
            let batch = make_batch_rand(batch_size, i);
            merk.apply(&batch).expect("apply failed");
        }
        assert_tree_invariants(merk.tree().expect("expected tree"));
    }

    #[test]
    fn unsorted_batch() {
        let mut merk = open_mem();
        let batch = vec![put_entry(2), put_entry(1)];
        assert!(matches!(merk.apply(&batch), Err(Error::BatchKey(_))));

        let batch = vec![put_entry(1), put_entry(1)];
        assert!(matches!(merk.apply(&batch), Err(Error::BatchKey(_))));
    }

    #[test]
    fn unsorted_query() {
        let mut merk = open_mem();
        merk.apply(&make_batch_seq(0..10)).expect("apply failed");
        assert!(matches!(
            merk.prove(&[seq_key(2), seq_key(1)]),
            Err(Error::QueryKey(_))
        ));
        assert!(matches!(
            merk.prove(&[seq_key(1), seq_key(1)]),
            Err(Error::QueryKey(_))
        ));
    }

    #[test]
    fn prove_empty_tree() {
        let mut merk = open_mem();
        assert!(merk.prove(&[vec![1]]).is_err());
    }

    #[test]
    fn get_empty() {
        let merk = open_mem();
        assert_eq!(merk.get(b"foo").expect("get failed"), None);
        assert_eq!(merk.root_hash(), NULL_HASH);
    }

    #[test]
    fn failed_delete_leaves_tree() {
        let mut merk = open_mem();
        merk.apply(&make_batch_seq(0..10)).expect("apply failed");
        let root_hash = merk.root_hash();

        let batch = vec![put_entry(3), del_entry(100)];
        assert!(merk.apply(&batch).is_err());
        assert_eq!(merk.root_hash(), root_hash);
        assert!(merk.get(&seq_key(3)).expect("get failed").is_some());
    }

    #[test]
    fn failed_delete_keeps_uncommitted_changes() {
        let options = MerkOptions {
            auto_commit: false,
            ..Default::default()
        };
        let mut merk = Merk::open_opt(MemStore::new(), options).expect("open failed");
        merk.apply(&make_batch_seq(0..10)).expect("apply failed");
        let root_hash = merk.root_hash();

        let batch = vec![put_entry(20), del_entry(100)];
        assert!(matches!(merk.apply(&batch), Err(Error::Invariant(_))));

        assert_eq!(merk.root_hash(), root_hash);
        for i in 0..10 {
            assert!(merk.get(&seq_key(i)).expect("get failed").is_some());
        }
        assert_eq!(merk.get(&seq_key(20)).expect("get failed"), None);

        merk.commit().expect("commit failed");
        let merk = Merk::open(merk.into_store()).expect("reopen failed");
        assert_eq!(merk.root_hash(), root_hash);
    }

    #[test]
    fn corrupted_child_record_is_rejected() {
        let store = MemStore::new();
        let mut merk = Merk::open(store.clone()).expect("open failed");
        merk.apply(&make_batch_seq(0..100)).expect("apply failed");
        drop(merk);

        let merk = Merk::open(store.clone()).expect("reopen failed");
        let link = merk
            .tree()
            .expect("expected tree")
            .link(true)
            .expect("expected link");
        assert!(link.is_pruned());
        let child_key = link.key().to_vec();
        let record_key = node_key(&link.hash());

        // flip a byte of the right grandchild's hash inside the child record
        let mut bytes = store
            .get(&record_key)
            .expect("get failed")
            .expect("expected record");
        let i = bytes.len() - 3;
        bytes[i] ^= 1;
        store.put(&record_key, &bytes).expect("put failed");

        assert!(matches!(merk.get(&child_key), Err(Error::Decode(_))));
    }

    #[test]
    fn manual_commit() {
        let store = MemStore::new();
        let options = MerkOptions {
            auto_commit: false,
            ..Default::default()
        };
        let mut merk = Merk::open_opt(store.clone(), options).expect("open failed");
        merk.apply(&make_batch_seq(0..10)).expect("apply failed");
        assert!(store.get(ROOT_KEY).expect("get failed").is_none());
        assert!(matches!(merk.snapshot(), Err(Error::Invariant(_))));

        merk.commit().expect("commit failed");
        let root = store.get(ROOT_KEY).expect("get failed").expect("expected root");
        assert_eq!(root, merk.root_hash().to_vec());
        assert_eq!(merk.snapshot().expect("snapshot failed"), merk.root_hash());
    }

    #[test]
    fn reopen() {
        let store = MemStore::new();
        let mut merk = Merk::open(store.clone()).expect("open failed");
        merk.apply(&make_batch_seq(0..100)).expect("apply failed");
        let root_hash = merk.root_hash();
        drop(merk);

        let merk = Merk::open(store).expect("reopen failed");
        assert_eq!(merk.root_hash(), root_hash);
        let tree = merk.tree().expect("expected tree");
        assert!(tree.link(true).expect("expected link").is_pruned());
        assert_eq!(merk.get(&seq_key(42)).expect("get failed"), Some(vec![123; 60]));
        assert_eq!(merk.get(&seq_key(100)).expect("get failed"), None);
    }

    #[test]
    fn delete_all() {
        let mut merk = open_mem();
        merk.apply(&make_batch_seq(0..10)).expect("apply failed");

        let batch: Vec<_> = (0..10).map(del_entry).collect();
        let deleted = merk.apply(&batch).expect("apply failed");
        assert_eq!(deleted, (0..10).map(seq_key).collect::<Vec<_>>());
        assert!(merk.tree().is_none());
        assert_eq!(merk.root_hash(), NULL_HASH);
        assert!(merk.store().get(ROOT_KEY).expect("get failed").is_none());
    }

    #[test]
    fn missing_node_is_reported() {
        let store = MemStore::new();
        let mut merk = Merk::open(store.clone()).expect("open failed");
        merk.apply(&make_batch_seq(0..100)).expect("apply failed");

        for (key, _) in store.entries_with_prefix(b"n").expect("scan failed") {
            store.delete(&key).expect("delete failed");
        }
        let root_key = merk.tree().expect("expected tree").key().to_vec();
        let other_key = if root_key == seq_key(0) { seq_key(99) } else { seq_key(0) };
        assert!(matches!(merk.get(&other_key), Err(Error::NodeNotFound(_))));
    }

    #[test]
    fn put_value_update() {
        let mut merk = open_mem();
        merk.apply(&[(vec![1], Op::Put(vec![1]))]).expect("apply failed");
        let first = merk.root_hash();
        merk.apply(&[(vec![1], Op::Put(vec![2]))]).expect("apply failed");
        assert_ne!(merk.root_hash(), first);
        assert_eq!(merk.get(&[1]).expect("get failed"), Some(vec![2]));
    }
}
