use std::collections::LinkedList;
use std::fmt;

use super::{side_to_str, Fetch, Link, Tree, Walker};
use crate::error::{Error, Result};
use Op::*;

/// An operation to be applied to a key in the store.
pub enum Op {
    Put(Vec<u8>),
    Delete,
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Put(value) => write!(f, "Put({})", hex::encode(value)),
            Delete => write!(f, "Delete"),
        }
    }
}

/// A single `(key, operation)` pair.
pub type BatchEntry = (Vec<u8>, Op);

/// A mapping of keys and operations. Keys should be sorted and unique.
pub type Batch = [BatchEntry];

/// A source of data which refuses every fetch. Useful when the tree is always
/// kept entirely in memory; reaching a pruned node is then a bug and is
/// reported as an invariant violation.
#[derive(Clone)]
pub struct PanicSource {}

impl Fetch for PanicSource {
    fn fetch(&self, link: &Link) -> Result<Tree> {
        Err(Error::Invariant(format!(
            "'fetch' should not have been called (key {})",
            hex::encode(link.key())
        )))
    }
}

impl<S> Walker<S>
where
    S: Fetch + Sized + Send + Clone,
{
    /// Applies a batch of operations, possibly creating a new tree if
    /// `maybe_tree` is `None`. This is similar to `Walker<S>::apply`, but does
    /// not require a non-empty tree. Returns the new root and the keys which
    /// were deleted.
    ///
    /// Keys in batch must be sorted and unique.
    pub fn apply_to(
        maybe_tree: Option<Self>,
        batch: &Batch,
        source: S,
    ) -> Result<(Option<Tree>, LinkedList<Vec<u8>>)> {
        Self::apply_to_par(maybe_tree, batch, source, usize::MAX)
    }

    /// Like `apply_to`, but applies the left and right sub-batches of a node
    /// on separate rayon tasks whenever both are non-empty and the batch
    /// being split has at least `threshold` entries.
    pub fn apply_to_par(
        maybe_tree: Option<Self>,
        batch: &Batch,
        source: S,
        threshold: usize,
    ) -> Result<(Option<Tree>, LinkedList<Vec<u8>>)> {
        let (maybe_walker, deleted_keys) = if batch.is_empty() {
            (maybe_tree, LinkedList::default())
        } else {
            match maybe_tree {
                None => {
                    return Ok((
                        Self::build(batch, source, threshold)?,
                        LinkedList::default(),
                    ))
                }
                Some(tree) => tree.apply(batch, threshold)?,
            }
        };

        let maybe_tree = maybe_walker.map(|walker| walker.into_inner());
        Ok((maybe_tree, deleted_keys))
    }

    /// Builds a `Tree` from a batch of operations. The middle entry becomes
    /// the root, then the sub-batches are built on either side.
    ///
    /// Keys in batch must be sorted and unique.
    fn build(batch: &Batch, source: S, threshold: usize) -> Result<Option<Tree>> {
        if batch.is_empty() {
            return Ok(None);
        }

        let mid_index = batch.len() / 2;
        let (mid_key, mid_op) = &batch[mid_index];
        let mid_value = match mid_op {
            Delete => {
                return Err(Error::Invariant(format!(
                    "Tried to delete non-existent key {}",
                    hex::encode(mid_key)
                )))
            }
            Put(value) => value,
        };

        let mid_tree = Tree::new(mid_key.to_vec(), mid_value.to_vec());
        let mid_walker = Walker::new(mid_tree, source);
        Ok(mid_walker
            .recurse(batch, mid_index, true, threshold)?
            .0 // use walker, ignore deleted_keys since it should be empty
            .map(|w| w.into_inner()))
    }

    /// Applies a batch of operations to an existing tree. This is similar to
    /// `Walker<S>::apply_to`, but requires a populated tree.
    ///
    /// Keys in batch must be sorted and unique.
    fn apply(self, batch: &Batch, threshold: usize) -> Result<(Option<Self>, LinkedList<Vec<u8>>)> {
        // binary search to see if this node's key is in the batch, and to split
        // into left and right batches
        let search = batch.binary_search_by(|(key, _op)| key.as_slice().cmp(self.tree().key()));
        let tree = if let Ok(index) = search {
            // a key matches this node's key, apply op to this node
            match &batch[index].1 {
                Put(value) => self.with_value(value.to_vec()),
                Delete => {
                    let source = self.clone_source();
                    let wrap = |maybe_tree: Option<Tree>| {
                        maybe_tree.map(|tree| Self::new(tree, source.clone()))
                    };
                    let key = self.tree().key().to_vec();
                    let maybe_tree = self.remove()?;

                    let (maybe_tree, mut deleted_keys) =
                        Self::apply_to_par(maybe_tree, &batch[..index], source.clone(), threshold)?;
                    let maybe_walker = wrap(maybe_tree);

                    let (maybe_tree, mut deleted_keys_right) = Self::apply_to_par(
                        maybe_walker,
                        &batch[index + 1..],
                        source.clone(),
                        threshold,
                    )?;
                    let maybe_walker = wrap(maybe_tree);

                    deleted_keys.append(&mut deleted_keys_right);
                    deleted_keys.push_back(key);

                    return Ok((maybe_walker, deleted_keys));
                }
            }
        } else {
            self
        };

        let (mid, exclusive) = match search {
            Ok(index) => (index, true),
            Err(index) => (index, false),
        };

        tree.recurse(batch, mid, exclusive, threshold)
    }

    /// Recursively applies operations to the tree's children (if there are any
    /// operations for them), then rebalances.
    fn recurse(
        self,
        batch: &Batch,
        mid: usize,
        exclusive: bool,
        threshold: usize,
    ) -> Result<(Option<Self>, LinkedList<Vec<u8>>)> {
        let left_batch = &batch[..mid];
        let right_batch = if exclusive {
            &batch[mid + 1..]
        } else {
            &batch[mid..]
        };

        if !left_batch.is_empty() && !right_batch.is_empty() && batch.len() >= threshold {
            return self.recurse_par(left_batch, right_batch, threshold);
        }

        let mut deleted_keys = LinkedList::default();

        let tree = if !left_batch.is_empty() {
            let source = self.clone_source();
            self.walk(true, |maybe_left| {
                let (maybe_left, mut deleted_keys_left) =
                    Self::apply_to_par(maybe_left, left_batch, source, threshold)?;
                deleted_keys.append(&mut deleted_keys_left);
                Ok(maybe_left)
            })?
        } else {
            self
        };

        let tree = if !right_batch.is_empty() {
            let source = tree.clone_source();
            tree.walk(false, |maybe_right| {
                let (maybe_right, mut deleted_keys_right) =
                    Self::apply_to_par(maybe_right, right_batch, source, threshold)?;
                deleted_keys.append(&mut deleted_keys_right);
                Ok(maybe_right)
            })?
        } else {
            tree
        };

        let tree = tree.maybe_balance()?;

        Ok((Some(tree), deleted_keys))
    }

    /// Like the serial path of `recurse`, but detaches both children first and
    /// applies their sub-batches with `rayon::join`.
    fn recurse_par(
        self,
        left_batch: &Batch,
        right_batch: &Batch,
        threshold: usize,
    ) -> Result<(Option<Self>, LinkedList<Vec<u8>>)> {
        let (tree, maybe_left) = self.detach(true)?;
        let (tree, maybe_right) = tree.detach(false)?;
        let left_source = tree.clone_source();
        let right_source = tree.clone_source();

        let (left_res, right_res) = rayon::join(
            move || Self::apply_to_par(maybe_left, left_batch, left_source, threshold),
            move || Self::apply_to_par(maybe_right, right_batch, right_source, threshold),
        );
        let (maybe_left, mut deleted_keys) = left_res?;
        let (maybe_right, mut deleted_keys_right) = right_res?;
        deleted_keys.append(&mut deleted_keys_right);

        let tree = tree
            .attach(true, maybe_left)?
            .attach(false, maybe_right)?
            .maybe_balance()?;

        Ok((Some(tree), deleted_keys))
    }

    /// Gets the wrapped tree's balance factor.
    #[inline]
    fn balance_factor(&self) -> i8 {
        self.tree().balance_factor()
    }

    /// Checks if the tree is unbalanced and if so, applies AVL tree rotation(s)
    /// to rebalance the tree and its subtrees. Returns the root node of the
    /// balanced tree after applying the rotations.
    fn maybe_balance(self) -> Result<Self> {
        let balance_factor = self.balance_factor();
        if balance_factor.abs() <= 1 {
            return Ok(self);
        }

        let left = balance_factor < 0;

        let child_balance_factor = match self.tree().link(left) {
            Some(link) => link.balance_factor(),
            None => {
                return Err(Error::Invariant(format!(
                    "Unbalanced node {} has no {} child",
                    hex::encode(self.tree().key()),
                    side_to_str(left)
                )))
            }
        };

        // maybe do a double rotation
        let tree = if left == (child_balance_factor > 0) {
            self.walk_expect(left, |child| Ok(Some(child.rotate(!left)?)))?
        } else {
            self
        };

        tree.rotate(left)
    }

    /// Applies an AVL tree rotation, a constant-time operation which only needs
    /// to swap pointers in order to rebalance a tree.
    fn rotate(self, left: bool) -> Result<Self> {
        let (tree, child) = self.detach_expect(left)?;
        let (child, maybe_grandchild) = child.detach(!left)?;

        // attach grandchild to self
        let tree = tree.attach(left, maybe_grandchild)?.maybe_balance()?;

        // attach self to child, return child
        child.attach(!left, Some(tree))?.maybe_balance()
    }

    /// Removes the root node from the tree. Rearranges and rebalances
    /// descendants (if any) in order to maintain a valid tree.
    pub fn remove(self) -> Result<Option<Self>> {
        let tree = self.tree();
        let has_left = tree.link(true).is_some();
        let has_right = tree.link(false).is_some();
        let left = tree.child_height(true) > tree.child_height(false);

        let maybe_tree = if has_left && has_right {
            // two children, promote edge of taller child
            let (tree, tall_child) = self.detach_expect(left)?;
            let (_, short_child) = tree.detach_expect(!left)?;
            Some(tall_child.promote_edge(!left, short_child)?)
        } else if has_left || has_right {
            // single child, promote it
            Some(self.detach_expect(left)?.1)
        } else {
            // no child
            None
        };

        Ok(maybe_tree)
    }

    /// Traverses to find the tree's edge on the given side, removes it, and
    /// reattaches it at the top in order to fill in a gap when removing a root
    /// node from a tree with both left and right children. Attaches `attach` on
    /// the opposite side. Returns the promoted node.
    fn promote_edge(self, left: bool, attach: Self) -> Result<Self> {
        let (edge, maybe_child) = self.remove_edge(left)?;
        edge.attach(!left, maybe_child)?
            .attach(left, Some(attach))?
            .maybe_balance()
    }

    /// Traverses to the tree's edge on the given side and detaches it
    /// (reattaching its child, if any, to its former parent). Return value is
    /// `(edge, maybe_updated_tree)`.
    fn remove_edge(self, left: bool) -> Result<(Self, Option<Self>)> {
        if self.tree().link(left).is_some() {
            // this node is not the edge, recurse
            let (tree, child) = self.detach_expect(left)?;
            let (edge, maybe_child) = child.remove_edge(left)?;
            let tree = tree.attach(left, maybe_child)?.maybe_balance()?;
            Ok((edge, Some(tree)))
        } else {
            // this node is the edge, detach its child if present
            self.detach(!left)
        }
    }
}
