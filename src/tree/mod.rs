mod commit;
mod debug;
mod encoding;
mod hash;
mod iter;
mod kv;
mod link;
mod ops;
mod walk;

use std::cmp::max;

pub use commit::{Commit, NoopCommit};
pub use hash::{kv_hash, node_hash, Hash, Hasher, HASH_LENGTH, NULL_HASH};
pub use iter::Iter;
pub use kv::KV;
pub use link::Link;
pub use ops::{Batch, BatchEntry, Op, PanicSource};
pub use walk::{Fetch, RefWalker, Walker};

use crate::error::{Error, Result};

/// The fields of the `Tree` type, stored on the heap.
struct TreeInner {
    left: Option<Link>,
    right: Option<Link>,
    kv: KV,
}

/// A binary AVL tree data structure, with Merkle hashes.
///
/// Trees' inner fields are stored on the heap so that nodes can recursively
/// link to each other, and so we can detach nodes from their parents, then
/// reattach without allocating or freeing heap memory.
pub struct Tree {
    inner: Box<TreeInner>,
}

impl Tree {
    /// Creates a new `Tree` with the given key and value, and no children.
    ///
    /// Hashes the key/value pair and initializes the `kv_hash` field.
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Tree {
            inner: Box::new(TreeInner {
                kv: KV::new(key, value),
                left: None,
                right: None,
            }),
        }
    }

    /// Creates a `Tree` by supplying all the raw struct fields (mainly useful
    /// for decoding). The `kv_hash` and `Link`s are not checked for
    /// correctness.
    pub fn from_fields(
        key: Vec<u8>,
        value: Vec<u8>,
        kv_hash: Hash,
        left: Option<Link>,
        right: Option<Link>,
    ) -> Self {
        Tree {
            inner: Box::new(TreeInner {
                kv: KV::from_fields(key, value, kv_hash),
                left,
                right,
            }),
        }
    }

    /// Returns the root node's key as a slice.
    #[inline]
    pub fn key(&self) -> &[u8] {
        self.inner.kv.key()
    }

    /// Consumes the tree and returns its root node's key, without having to
    /// clone or allocate.
    #[inline]
    pub fn take_key(self) -> Vec<u8> {
        self.inner.kv.take_key()
    }

    /// Returns the root node's value as a slice.
    #[inline]
    pub fn value(&self) -> &[u8] {
        self.inner.kv.value()
    }

    /// Returns the hash of the root node's key/value pair.
    #[inline]
    pub fn kv_hash(&self) -> &Hash {
        self.inner.kv.hash()
    }

    /// Returns a reference to the root node's `Link` on the given side, if
    /// any. If there is no child, returns `None`.
    #[inline]
    pub fn link(&self, left: bool) -> Option<&Link> {
        if left {
            self.inner.left.as_ref()
        } else {
            self.inner.right.as_ref()
        }
    }

    /// Returns a mutable reference to the root node's `Link` on the given
    /// side, if any. If there is no child, returns `None`.
    #[inline]
    pub fn link_mut(&mut self, left: bool) -> Option<&mut Link> {
        self.slot_mut(left).as_mut()
    }

    /// Returns a reference to the root node's child on the given side, if any.
    /// If there is no child, or the child is pruned, returns `None`.
    #[inline]
    pub fn child(&self, left: bool) -> Option<&Self> {
        self.link(left).and_then(Link::tree)
    }

    /// Returns a mutable reference to the root node's child on the given side,
    /// if any. If there is no child, or the child is pruned, returns `None`.
    #[inline]
    pub fn child_mut(&mut self, left: bool) -> Option<&mut Self> {
        self.slot_mut(left).as_mut().and_then(Link::tree_mut)
    }

    /// Returns the hash of the root node's child on the given side, or
    /// `NULL_HASH` if there is none.
    #[inline]
    pub fn child_hash(&self, left: bool) -> Hash {
        self.link(left).map_or(NULL_HASH, Link::hash)
    }

    /// Computes and returns the hash of the root node.
    #[inline]
    pub fn hash(&self) -> Hash {
        node_hash(
            self.inner.kv.hash(),
            &self.child_hash(true),
            &self.child_hash(false),
        )
    }

    /// Returns the number of pending writes for the child on the given side,
    /// if any. If there is no child, returns 0.
    #[inline]
    pub fn child_pending_writes(&self, left: bool) -> usize {
        self.link(left).map_or(0, Link::pending_writes)
    }

    /// Returns the height of the child on the given side, if any. If there is
    /// no child, returns 0.
    #[inline]
    pub fn child_height(&self, left: bool) -> u8 {
        self.link(left).map_or(0, Link::height)
    }

    #[inline]
    pub fn child_heights(&self) -> (u8, u8) {
        (self.child_height(true), self.child_height(false))
    }

    /// Returns the height of the tree (the number of levels). For example, a
    /// single node has height 1, a node with a single descendant has height 2,
    /// etc.
    #[inline]
    pub fn height(&self) -> u8 {
        1 + max(self.child_height(true), self.child_height(false))
    }

    /// Returns the balance factor of the root node. This is the difference
    /// between the height of the right child (if any) and the height of the
    /// left child (if any). For example, a balance factor of 2 means the right
    /// subtree is 2 levels taller than the left subtree.
    #[inline]
    pub fn balance_factor(&self) -> i8 {
        let left_height = self.child_height(true) as i8;
        let right_height = self.child_height(false) as i8;
        right_height - left_height
    }

    /// Attaches the child (if any) to the root node on the given side as a
    /// fresh `Link::Modified`. Creates a `Link` of variant `Link::Modified`
    /// which contains the child.
    ///
    /// Fails if there is already a child attached to this side, or if the
    /// child has the same key as the root node.
    pub fn attach(mut self, left: bool, maybe_child: Option<Self>) -> Result<Self> {
        if maybe_child.is_none() {
            return Ok(self);
        }

        if self.link(left).is_some() {
            return Err(Error::Invariant(format!(
                "Tried to attach to {} tree slot, but it is already Some",
                side_to_str(left)
            )));
        }

        if let Some(child) = &maybe_child {
            if child.key() == self.key() {
                return Err(Error::Invariant(format!(
                    "Tried to attach tree with key {} as a child of itself",
                    hex::encode(child.key())
                )));
            }
        }

        let slot = self.slot_mut(left);
        *slot = Link::maybe_from_modified_tree(maybe_child);

        Ok(self)
    }

    /// Detaches the child on the given side (if any) from the root node, and
    /// returns it. The slot is left empty.
    ///
    /// A `Link::Pruned` child is not in memory and can only be detached
    /// through a `Walker`, which fetches it; here it is an error.
    pub fn detach(&mut self, left: bool) -> Result<Option<Self>> {
        match self.link(left) {
            None => return Ok(None),
            Some(Link::Pruned { key, .. }) => {
                return Err(Error::Invariant(format!(
                    "Cannot detach pruned {} child {} without a fetch source",
                    side_to_str(left),
                    hex::encode(key)
                )))
            }
            Some(_) => {}
        }

        Ok(match self.slot_mut(left).take() {
            Some(Link::Modified { tree, .. }) | Some(Link::Stored { tree, .. }) => Some(tree),
            _ => None,
        })
    }

    /// Detaches the child on the given side from the root node, and returns
    /// it. Fails if there is no child on this side.
    pub fn detach_expect(&mut self, left: bool) -> Result<Self> {
        match self.detach(left)? {
            Some(child) => Ok(child),
            None => Err(Error::Invariant(format!(
                "Expected tree to have {} child, but got None",
                side_to_str(left)
            ))),
        }
    }

    /// Detaches the child on the given side, passes it into `f`, and attaches
    /// the return value of `f` in its place.
    ///
    /// Like `Walker::walk`, but only for in-memory children.
    pub fn walk<F>(mut self, left: bool, f: F) -> Result<Self>
    where
        F: FnOnce(Option<Self>) -> Result<Option<Self>>,
    {
        let maybe_child = self.detach(left)?;
        let new_child = f(maybe_child)?;
        self.attach(left, new_child)
    }

    /// Returns a mutable reference to the child slot for the given side.
    #[inline]
    pub(crate) fn slot_mut(&mut self, left: bool) -> &mut Option<Link> {
        if left {
            &mut self.inner.left
        } else {
            &mut self.inner.right
        }
    }

    /// Replaces the root node's value with the given value and returns the
    /// modified `Tree`.
    #[inline]
    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.inner.kv = self.inner.kv.with_value(value);
        self
    }

    /// Looks up the value stored under `key` in this subtree. Pruned nodes
    /// are fetched from `source` but not retained.
    pub fn get_value<S: Fetch>(&self, key: &[u8], source: &S) -> Result<Option<Vec<u8>>> {
        use std::cmp::Ordering::*;

        let left = match key.cmp(self.key()) {
            Equal => return Ok(Some(self.value().to_vec())),
            Less => true,
            Greater => false,
        };

        match self.link(left) {
            None => Ok(None),
            Some(link) => match link.tree() {
                Some(child) => child.get_value(key, source),
                None => source.fetch(link)?.get_value(key, source),
            },
        }
    }

    /// Fetches the child on the given side using the given data source, and
    /// places it in the child slot (upgrading a pruned link to a stored link).
    /// Does nothing if the child is already in memory or absent.
    pub fn load<S: Fetch>(&mut self, left: bool, source: &S) -> Result<()> {
        let link = match self.link(left) {
            Some(link) if link.is_pruned() => link,
            _ => return Ok(()),
        };
        let tree = source.fetch(link)?;
        let hash = link.hash();
        let child_heights = link.child_heights();

        *self.slot_mut(left) = Some(Link::Stored {
            hash,
            child_heights,
            tree,
        });

        Ok(())
    }

    /// Called to finalize modifications to a tree, recompute its hashes, and
    /// write the updated nodes to a backing store.
    ///
    /// Traverses through the tree, computing hashes for all modified links and
    /// replacing them with `Link::Stored` variants, writes out all changes to
    /// the given `Commit` object's `write` method, and calls its `prune`
    /// method to test whether or not to keep or prune nodes from memory.
    pub fn commit<C: Commit>(&mut self, c: &mut C) -> Result<()> {
        for &left in &[true, false] {
            if !self.link(left).map_or(false, Link::is_modified) {
                continue;
            }

            if let Some(Link::Modified {
                mut tree,
                child_heights,
                ..
            }) = self.slot_mut(left).take()
            {
                tree.commit(c)?;
                *self.slot_mut(left) = Some(Link::Stored {
                    hash: tree.hash(),
                    child_heights,
                    tree,
                });
            }
        }

        c.write(self)?;

        let (prune_left, prune_right) = c.prune(self);
        if prune_left {
            self.prune_child(true)?;
        }
        if prune_right {
            self.prune_child(false)?;
        }

        Ok(())
    }

    /// Writes every in-memory node of an already committed tree through `c`,
    /// without pruning. Fails if any link is still `Link::Modified`.
    pub fn commit_snapshot<C: Commit>(&self, c: &mut C) -> Result<()> {
        for &left in &[true, false] {
            match self.link(left) {
                Some(Link::Modified { tree, .. }) => {
                    return Err(Error::Invariant(format!(
                        "Cannot snapshot tree with modified node {}",
                        hex::encode(tree.key())
                    )))
                }
                Some(Link::Stored { tree, .. }) => tree.commit_snapshot(c)?,
                _ => {}
            }
        }

        c.write(self)
    }

    /// Replaces the child link on the given side with a `Link::Pruned`,
    /// dropping the in-memory subtree.
    fn prune_child(&mut self, left: bool) -> Result<()> {
        if let Some(link) = self.slot_mut(left).take() {
            *self.slot_mut(left) = Some(link.into_pruned()?);
        }
        Ok(())
    }
}

pub fn side_to_str(left: bool) -> &'static str {
    if left {
        "left"
    } else {
        "right"
    }
}

#[cfg(test)]
mod test {
    use super::commit::NoopCommit;
    use super::*;

    #[test]
    fn build_tree() {
        let tree = Tree::new(vec![1], vec![101]);
        assert_eq!(tree.key(), &[1]);
        assert!(tree.child(true).is_none());
        assert!(tree.child(false).is_none());

        let tree = tree.attach(true, None).expect("attach failed");
        assert!(tree.child(true).is_none());
        assert!(tree.child(false).is_none());

        let tree = tree
            .attach(true, Some(Tree::new(vec![2], vec![102])))
            .expect("attach failed");
        assert_eq!(tree.key(), &[1]);
        assert_eq!(tree.child(true).expect("expected child").key(), &[2]);
        assert!(tree.child(false).is_none());

        let tree = Tree::new(vec![3], vec![103])
            .attach(false, Some(tree))
            .expect("attach failed");
        assert_eq!(tree.key(), &[3]);
        assert_eq!(tree.child(false).expect("expected child").key(), &[1]);
        assert!(tree.child(true).is_none());
    }

    #[test]
    fn attach_existing() {
        let res = Tree::new(vec![0], vec![1])
            .attach(true, Some(Tree::new(vec![2], vec![3])))
            .expect("attach failed")
            .attach(true, Some(Tree::new(vec![4], vec![5])));
        assert!(matches!(res, Err(Error::Invariant(_))));
    }

    #[test]
    fn attach_same_key() {
        let res = Tree::new(vec![0], vec![1]).attach(true, Some(Tree::new(vec![0], vec![2])));
        assert!(matches!(res, Err(Error::Invariant(_))));
    }

    #[test]
    fn modify() {
        let tree = Tree::new(vec![0], vec![1])
            .attach(true, Some(Tree::new(vec![2], vec![3])))
            .expect("attach failed")
            .attach(false, Some(Tree::new(vec![4], vec![5])))
            .expect("attach failed");

        let tree = tree
            .walk(true, |left_opt| {
                assert_eq!(left_opt.as_ref().expect("expected child").key(), &[2]);
                Ok(None)
            })
            .expect("walk failed");
        assert!(tree.child(true).is_none());
        assert!(tree.child(false).is_some());

        let tree = tree
            .walk(true, |left_opt| {
                assert!(left_opt.is_none());
                Ok(Some(Tree::new(vec![2], vec![3])))
            })
            .expect("walk failed");
        assert_eq!(tree.link(true).expect("expected link").key(), &[2]);

        let tree = tree
            .walk(false, |right_opt| {
                Ok(right_opt.map(|t| t.with_value(vec![123])))
            })
            .expect("walk failed");
        assert_eq!(tree.child(false).expect("expected child").value(), &[123]);
    }

    #[test]
    fn child_and_link() {
        let mut tree = Tree::new(vec![0], vec![1])
            .attach(true, Some(Tree::new(vec![2], vec![3])))
            .expect("attach failed");
        assert!(tree.link(true).expect("expected link").is_modified());
        assert!(tree.child(true).is_some());
        assert!(tree.link(false).is_none());
        assert!(tree.child(false).is_none());

        tree.commit(&mut NoopCommit {}).expect("commit failed");
        assert!(tree.link(true).expect("expected link").is_stored());
        assert!(tree.child(true).is_some());

        tree.prune_child(true).expect("prune failed");
        assert!(tree.link(true).expect("expected link").is_pruned());
        assert!(tree.child(true).is_none());
        assert!(tree.detach(true).is_err());
    }

    #[test]
    fn child_hash() {
        let mut tree = Tree::new(vec![0], vec![1])
            .attach(true, Some(Tree::new(vec![2], vec![3])))
            .expect("attach failed");
        let modified_hash = tree.child_hash(true);
        tree.commit(&mut NoopCommit {}).expect("commit failed");
        assert_eq!(tree.child_hash(true), modified_hash);
        assert_eq!(
            tree.child_hash(true),
            node_hash(&kv_hash(&[2], &[3]), &NULL_HASH, &NULL_HASH)
        );
        assert_eq!(tree.child_hash(false), NULL_HASH);
    }

    #[test]
    fn hash() {
        let tree = Tree::new(vec![0], vec![1]);
        assert_eq!(
            tree.hash(),
            node_hash(&kv_hash(&[0], &[1]), &NULL_HASH, &NULL_HASH)
        );
    }

    #[test]
    fn child_pending_writes() {
        let tree = Tree::new(vec![0], vec![1]);
        assert_eq!(tree.child_pending_writes(true), 0);
        assert_eq!(tree.child_pending_writes(false), 0);

        let tree = tree
            .attach(true, Some(Tree::new(vec![2], vec![3])))
            .expect("attach failed");
        assert_eq!(tree.child_pending_writes(true), 1);
        assert_eq!(tree.child_pending_writes(false), 0);
    }

    #[test]
    fn height_and_balance() {
        let tree = Tree::new(vec![0], vec![1]);
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.child_height(true), 0);
        assert_eq!(tree.child_height(false), 0);
        assert_eq!(tree.balance_factor(), 0);

        let tree = tree
            .attach(true, Some(Tree::new(vec![2], vec![3])))
            .expect("attach failed");
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.child_height(true), 1);
        assert_eq!(tree.child_height(false), 0);
        assert_eq!(tree.balance_factor(), -1);

        let mut tree = tree;
        let maybe_child = tree.detach(true).expect("detach failed");
        let tree = tree.attach(false, maybe_child).expect("attach failed");
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.balance_factor(), 1);
    }

    #[test]
    fn commit() {
        let mut tree = Tree::new(vec![0], vec![1])
            .attach(false, Some(Tree::new(vec![2], vec![3])))
            .expect("attach failed");
        tree.commit(&mut NoopCommit {}).expect("commit failed");

        assert!(tree.link(false).expect("expected link").is_stored());
    }

    #[test]
    fn commit_snapshot_rejects_modified() {
        let tree = Tree::new(vec![0], vec![1])
            .attach(false, Some(Tree::new(vec![2], vec![3])))
            .expect("attach failed");
        assert!(matches!(
            tree.commit_snapshot(&mut NoopCommit {}),
            Err(Error::Invariant(_))
        ));
    }
}
