use super::super::Tree;
use super::Fetch;
use crate::error::Result;

/// Allows read-only traversal of a `Tree`, fetching from the given source when
/// traversing to a pruned node. The fetched nodes are then retained in memory
/// until they (possibly) get pruned on the next commit.
///
/// Only finalized trees may be walked (trees which have had `commit` called
/// since the last update).
pub struct RefWalker<'a, S>
where
    S: Fetch + Sized + Clone,
{
    tree: &'a mut Tree,
    source: S,
}

impl<'a, S> RefWalker<'a, S>
where
    S: Fetch + Sized + Clone,
{
    /// Creates a `RefWalker` with the given tree and source.
    pub fn new(tree: &'a mut Tree, source: S) -> Self {
        RefWalker { tree, source }
    }

    /// Gets an immutable reference to the `Tree` wrapped by this `RefWalker`.
    pub fn tree(&self) -> &Tree {
        self.tree
    }

    /// Traverses to the child on the given side (if any), fetching from the
    /// source if pruned. When fetching, the link is upgraded from
    /// `Link::Pruned` to `Link::Stored`.
    pub fn walk(&mut self, left: bool) -> Result<Option<RefWalker<S>>> {
        if self.tree.link(left).is_none() {
            return Ok(None);
        }

        self.tree.load(left, &self.source)?;

        let source = self.source.clone();
        Ok(self
            .tree
            .child_mut(left)
            .map(|child| RefWalker::new(child, source)))
    }
}
