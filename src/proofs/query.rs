use std::collections::LinkedList;

use super::{Node, Op};
use crate::error::Result;
use crate::tree::{Fetch, RefWalker};

impl<'a, S> RefWalker<'a, S>
where
    S: Fetch + Sized + Clone,
{
    /// Creates a `Node::KV` from the key/value pair of the root node.
    pub(crate) fn to_kv_node(&self) -> Node {
        Node::KV(self.tree().key().to_vec(), self.tree().value().to_vec())
    }

    /// Creates a `Node::KVHash` from the hash of the key/value pair of the root
    /// node.
    pub(crate) fn to_kvhash_node(&self) -> Node {
        Node::KVHash(*self.tree().kv_hash())
    }

    /// Generates a proof for the list of queried keys. Returns a tuple
    /// containing the generated proof operators, and a tuple representing if
    /// any keys were queried were less than the left edge or greater than the
    /// right edge, respectively.
    ///
    /// Keys must be sorted and unique.
    pub fn create_proof(&mut self, keys: &[Vec<u8>]) -> Result<(LinkedList<Op>, (bool, bool))> {
        let search = keys.binary_search_by(|key| key.as_slice().cmp(self.tree().key()));

        let (left_keys, right_keys) = match search {
            Ok(index) => (&keys[..index], &keys[index + 1..]),
            Err(index) => (&keys[..index], &keys[index..]),
        };

        let (mut proof, left_absence) = self.create_child_proof(true, left_keys)?;
        let (mut right_proof, right_absence) = self.create_child_proof(false, right_keys)?;

        let (has_left, has_right) = (!proof.is_empty(), !right_proof.is_empty());

        // the node's key/value is revealed when it is queried, or when it is
        // the boundary which proves a neighboring key is absent
        proof.push_back(match search {
            Ok(_) => Op::Push(self.to_kv_node()),
            Err(_) => {
                if left_absence.1 || right_absence.0 {
                    Op::Push(self.to_kv_node())
                } else {
                    Op::Push(self.to_kvhash_node())
                }
            }
        });

        if has_left {
            proof.push_back(Op::Parent);
        }

        if has_right {
            proof.append(&mut right_proof);
            proof.push_back(Op::Child);
        }

        Ok((proof, (left_absence.0, right_absence.1)))
    }

    /// Similar to `create_proof`. Recurses into the child on the given side and
    /// generates a proof for the queried keys. A child with no queried keys is
    /// represented by its hash alone.
    fn create_child_proof(
        &mut self,
        left: bool,
        keys: &[Vec<u8>],
    ) -> Result<(LinkedList<Op>, (bool, bool))> {
        Ok(if !keys.is_empty() {
            if let Some(mut child) = self.walk(left)? {
                child.create_proof(keys)?
            } else {
                (LinkedList::new(), (true, true))
            }
        } else if let Some(link) = self.tree().link(left) {
            let mut proof = LinkedList::new();
            proof.push_back(Op::Push(Node::Hash(link.hash())));
            (proof, (false, false))
        } else {
            (LinkedList::new(), (false, false))
        })
    }
}
