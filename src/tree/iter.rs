use super::Tree;

/// A node on an `Iter`'s stack, along with which of its parts have been
/// visited: `(left child, self, right child)`.
struct StackItem<'a> {
    tree: &'a Tree,
    traversed: (bool, bool, bool),
}

impl<'a> StackItem<'a> {
    /// Sides without an in-memory child start out as traversed.
    fn new(tree: &'a Tree) -> Self {
        StackItem {
            tree,
            traversed: (
                tree.child(true).is_none(),
                false,
                tree.child(false).is_none(),
            ),
        }
    }
}

/// An iterator which yields the key/value pairs of the tree in key order,
/// skipping any subtrees which are pruned (not currently held in memory).
pub struct Iter<'a> {
    stack: Vec<StackItem<'a>>,
}

impl<'a> Iter<'a> {
    pub fn new(tree: &'a Tree) -> Self {
        Iter {
            stack: vec![StackItem::new(tree)],
        }
    }
}

impl Tree {
    /// Creates an iterator over the `(key, value)` pairs of every node held in
    /// memory.
    pub fn iter(&self) -> Iter {
        Iter::new(self)
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let last = self.stack.last_mut()?;
            let tree = last.tree;

            let next_child = if !last.traversed.0 {
                last.traversed.0 = true;
                tree.child(true)
            } else if !last.traversed.1 {
                last.traversed.1 = true;
                return Some((tree.key(), tree.value()));
            } else if !last.traversed.2 {
                last.traversed.2 = true;
                tree.child(false)
            } else {
                self.stack.pop();
                continue;
            };

            if let Some(child) = next_child {
                self.stack.push(StackItem::new(child));
            }
        }
    }
}
