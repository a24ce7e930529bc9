use super::super::{side_to_str, Link, Tree};
use super::Fetch;
use crate::error::{Error, Result};
use crate::owner::Owner;

/// Allows traversal of a `Tree`, fetching from the given source when traversing
/// to a pruned node, detaching children as they are traversed.
pub struct Walker<S>
where
    S: Fetch + Sized + Clone + Send,
{
    tree: Owner<Tree>,
    source: S,
}

impl<S> Walker<S>
where
    S: Fetch + Sized + Clone + Send,
{
    /// Creates a `Walker` with the given tree and source.
    pub fn new(tree: Tree, source: S) -> Self {
        Walker {
            tree: Owner::new(tree),
            source,
        }
    }

    /// Similar to `Tree#detach`, but yields a `Walker` which fetches from the
    /// same source as `self`. Pruned children are fetched, so their slot is
    /// emptied as well. Returned tuple is `(updated_self,
    /// maybe_child_walker)`.
    pub fn detach(mut self, left: bool) -> Result<(Self, Option<Self>)> {
        let link = match self.tree.link(left) {
            None => return Ok((self, None)),
            Some(link) => link,
        };

        let child = if link.tree().is_some() {
            self.tree.detach_expect(left)?
        } else {
            match self.tree.slot_mut(left).take() {
                Some(link) => self.source.fetch(&link)?,
                None => return Ok((self, None)),
            }
        };

        let child = self.wrap(child);
        Ok((self, Some(child)))
    }

    /// Similar to `Tree#detach_expect`, but yields a `Walker` which fetches
    /// from the same source as `self`. Returned tuple is `(updated_self,
    /// child_walker)`.
    pub fn detach_expect(self, left: bool) -> Result<(Self, Self)> {
        let (walker, maybe_child) = self.detach(left)?;
        match maybe_child {
            Some(child) => Ok((walker, child)),
            None => Err(Error::Invariant(format!(
                "Expected {} child, got None",
                side_to_str(left)
            ))),
        }
    }

    /// Similar to `Tree#walk`, but yields a `Walker` which fetches from the
    /// same source as `self`.
    pub fn walk<F, T>(self, left: bool, f: F) -> Result<Self>
    where
        F: FnOnce(Option<Self>) -> Result<Option<T>>,
        T: Into<Tree>,
    {
        let (walker, maybe_child) = self.detach(left)?;
        let new_child = f(maybe_child)?;
        walker.attach(left, new_child)
    }

    /// Similar to `Tree#walk_expect` but yields a `Walker` which fetches from
    /// the same source as `self`.
    pub fn walk_expect<F, T>(self, left: bool, f: F) -> Result<Self>
    where
        F: FnOnce(Self) -> Result<Option<T>>,
        T: Into<Tree>,
    {
        let (walker, child) = self.detach_expect(left)?;
        let new_child = f(child)?;
        walker.attach(left, new_child)
    }

    /// Returns an immutable reference to the `Tree` wrapped by this walker.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Consumes the `Walker` and returns the `Tree` it wraps.
    pub fn into_inner(self) -> Tree {
        self.tree.into_inner()
    }

    /// Takes a `Tree` and returns a `Walker` which fetches from the same source
    /// as `self`.
    fn wrap(&self, tree: Tree) -> Self {
        Walker::new(tree, self.source.clone())
    }

    /// Returns a clone of this `Walker`'s source.
    pub fn clone_source(&self) -> S {
        self.source.clone()
    }

    /// Similar to `Tree#attach`, but can also take a `Walker` since it
    /// implements `Into<Tree>`.
    pub fn attach<T>(mut self, left: bool, maybe_child: Option<T>) -> Result<Self>
    where
        T: Into<Tree>,
    {
        self.tree = self
            .tree
            .own_result(|t| t.attach(left, maybe_child.map(|c| c.into())))?;
        Ok(self)
    }

    /// Similar to `Tree#with_value`.
    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.tree.own(|t| t.with_value(value));
        self
    }

    /// Returns the key of the child on the given side without detaching or
    /// fetching it.
    pub fn child_key(&self, left: bool) -> Option<&[u8]> {
        self.tree.link(left).map(Link::key)
    }
}

impl<S> From<Walker<S>> for Tree
where
    S: Fetch + Sized + Clone + Send,
{
    fn from(walker: Walker<S>) -> Tree {
        walker.into_inner()
    }
}
