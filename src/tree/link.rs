use std::cmp::max;

use super::hash::Hash;
use super::Tree;
use crate::error::{Error, Result};

/// Represents a reference to a child tree node. Links may or may not contain
/// the child's `Tree` instance (storing its key if not).
///
/// The heights of the referenced node's children are kept on the link so
/// that balance factors can be computed without loading the child.
pub enum Link {
    /// Represents a child tree node which has been pruned from memory, only
    /// retaining its key and hash. The child node can always be fetched from
    /// the backing store by its hash when necessary.
    Pruned {
        hash: Hash,
        child_heights: (u8, u8),
        key: Vec<u8>,
    },

    /// Represents a tree node which has been modified since the `Tree`'s last
    /// commit. The child's hash is not stored since it has not yet been
    /// recomputed. The child's `Tree` instance is stored in the link.
    Modified {
        pending_writes: usize,
        child_heights: (u8, u8),
        tree: Tree,
    },

    /// Represents a tree node which has not been modified, has an up-to-date
    /// hash, and which is being retained in memory.
    Stored {
        hash: Hash,
        child_heights: (u8, u8),
        tree: Tree,
    },
}

impl Link {
    /// Creates a `Link::Modified` from the given `Tree`.
    #[inline]
    pub fn from_modified_tree(tree: Tree) -> Self {
        let pending_writes = 1 + tree.child_pending_writes(true) + tree.child_pending_writes(false);

        Link::Modified {
            pending_writes,
            child_heights: tree.child_heights(),
            tree,
        }
    }

    /// Creates a `Link::Modified` from the given tree, if any. If `None`,
    /// returns `None`.
    pub fn maybe_from_modified_tree(maybe_tree: Option<Tree>) -> Option<Self> {
        maybe_tree.map(Link::from_modified_tree)
    }

    /// Returns `true` if the link is of the `Link::Pruned` variant.
    #[inline]
    pub fn is_pruned(&self) -> bool {
        matches!(self, Link::Pruned { .. })
    }

    /// Returns `true` if the link is of the `Link::Modified` variant.
    #[inline]
    pub fn is_modified(&self) -> bool {
        matches!(self, Link::Modified { .. })
    }

    /// Returns `true` if the link is of the `Link::Stored` variant.
    #[inline]
    pub fn is_stored(&self) -> bool {
        matches!(self, Link::Stored { .. })
    }

    /// Returns the key of the tree referenced by this link, as a slice.
    #[inline]
    pub fn key(&self) -> &[u8] {
        match self {
            Link::Pruned { key, .. } => key.as_slice(),
            Link::Modified { tree, .. } => tree.key(),
            Link::Stored { tree, .. } => tree.key(),
        }
    }

    /// Returns the `Tree` instance of the tree referenced by the link. If the
    /// link is of variant `Link::Pruned`, the returned value will be `None`.
    #[inline]
    pub fn tree(&self) -> Option<&Tree> {
        match self {
            Link::Pruned { .. } => None,
            Link::Modified { tree, .. } => Some(tree),
            Link::Stored { tree, .. } => Some(tree),
        }
    }

    #[inline]
    pub(crate) fn tree_mut(&mut self) -> Option<&mut Tree> {
        match self {
            Link::Pruned { .. } => None,
            Link::Modified { tree, .. } => Some(tree),
            Link::Stored { tree, .. } => Some(tree),
        }
    }

    /// Returns the hash of the tree referenced by the link. For
    /// `Link::Modified` the hash has not been cached yet, so it is computed
    /// from the in-memory subtree.
    pub fn hash(&self) -> Hash {
        match self {
            Link::Modified { tree, .. } => tree.hash(),
            Link::Pruned { hash, .. } => *hash,
            Link::Stored { hash, .. } => *hash,
        }
    }

    /// Returns the number of nodes under this link which have not been written
    /// since the last commit.
    #[inline]
    pub fn pending_writes(&self) -> usize {
        match self {
            Link::Modified { pending_writes, .. } => *pending_writes,
            _ => 0,
        }
    }

    /// Returns the heights of the children of the tree referenced by the link,
    /// as `(left_child_height, right_child_height)`.
    #[inline]
    pub fn child_heights(&self) -> (u8, u8) {
        match self {
            Link::Pruned { child_heights, .. } => *child_heights,
            Link::Modified { child_heights, .. } => *child_heights,
            Link::Stored { child_heights, .. } => *child_heights,
        }
    }

    /// Returns the height of the tree referenced by the link.
    #[inline]
    pub fn height(&self) -> u8 {
        let (left_height, right_height) = self.child_heights();
        1 + max(left_height, right_height)
    }

    /// Returns the balance factor of the tree referenced by the link.
    #[inline]
    pub fn balance_factor(&self) -> i8 {
        let (left_height, right_height) = self.child_heights();
        right_height as i8 - left_height as i8
    }

    /// Consumes the link and converts to variant `Link::Pruned`. Fails if the
    /// link is of variant `Link::Modified` since its hash is not final.
    pub fn into_pruned(self) -> Result<Self> {
        match self {
            Link::Pruned { .. } => Ok(self),
            Link::Modified { tree, .. } => Err(Error::Invariant(format!(
                "Cannot prune modified node {}",
                hex::encode(tree.key())
            ))),
            Link::Stored {
                hash,
                child_heights,
                tree,
            } => Ok(Link::Pruned {
                hash,
                child_heights,
                key: tree.take_key(),
            }),
        }
    }
}
