use super::{Decoder, Node, Op};
use crate::error::{Error, Result};
use crate::tree::{kv_hash, node_hash, Hash, NULL_HASH};

/// A binary tree data structure used to represent a select subset of a tree
/// when verifying Merkle proofs.
struct Tree {
    node: Node,
    left: Option<Box<Tree>>,
    right: Option<Box<Tree>>,
}

impl From<Node> for Tree {
    fn from(node: Node) -> Self {
        Tree {
            node,
            left: None,
            right: None,
        }
    }
}

impl Tree {
    /// Returns an immutable reference to the child on the given side, if any.
    fn child(&self, left: bool) -> Option<&Tree> {
        if left {
            self.left.as_deref()
        } else {
            self.right.as_deref()
        }
    }

    /// Returns a mutable reference to the child slot on the given side.
    fn child_mut(&mut self, left: bool) -> &mut Option<Box<Tree>> {
        if left {
            &mut self.left
        } else {
            &mut self.right
        }
    }

    /// Attaches the child to the `Tree`'s given side, replacing it with its
    /// hash. Fails if there is already a child attached to this side, or if
    /// this node is an opaque `Node::Hash` (which commits to its children
    /// already).
    fn attach(&mut self, left: bool, child: Tree) -> Result<()> {
        if let Node::Hash(_) = self.node {
            return Err(proof_err("Tried to attach a child to a hash node"));
        }

        if self.child(left).is_some() {
            return Err(proof_err(format!(
                "Tried to attach to {} child, but it is already Some",
                if left { "left" } else { "right" }
            )));
        }

        let child = child.into_hash();
        *self.child_mut(left) = Some(Box::new(child));
        Ok(())
    }

    /// Gets the already-computed hash for this tree node. Only valid once
    /// `into_hash` has been called.
    #[inline]
    fn hash(&self) -> Hash {
        match self.node {
            Node::Hash(hash) => hash,
            _ => NULL_HASH,
        }
    }

    /// Returns the already-computed hash for this tree node's child on the
    /// given side, if any. If there is no child, returns the null hash
    /// (zero-filled).
    #[inline]
    fn child_hash(&self, left: bool) -> Hash {
        self.child(left).map_or(NULL_HASH, |c| c.hash())
    }

    /// Consumes the tree node, calculates its hash, and returns a `Node::Hash`
    /// variant.
    fn into_hash(self) -> Tree {
        fn to_hash_node(tree: &Tree, kv_hash: Hash) -> Node {
            let hash = node_hash(&kv_hash, &tree.child_hash(true), &tree.child_hash(false));
            Node::Hash(hash)
        }

        match &self.node {
            Node::Hash(_) => self.node,
            Node::KVHash(kv_hash) => to_hash_node(&self, *kv_hash),
            Node::KV(key, value) => {
                let kv_hash = kv_hash(key.as_slice(), value.as_slice());
                to_hash_node(&self, kv_hash)
            }
        }
        .into()
    }
}

fn proof_err<T: Into<String>>(msg: T) -> Error {
    Error::Proof(msg.into())
}

fn try_pop(stack: &mut Vec<Tree>) -> Result<Tree> {
    stack.pop().ok_or_else(|| proof_err("Stack underflow"))
}

/// Verifies the encoded proof with the given query and expected hash.
///
/// Every key in `keys` is checked to either have a key/value pair in the proof,
/// or to have its absence in the tree proven.
///
/// Returns `Err` if the proof is invalid, or a list of proven values associated
/// with `keys`. For example, if `keys` contains keys `A` and `B`, the returned
/// list will contain 2 elements, the value of `A` and the value of `B`. Keys
/// proven to be absent in the tree will have an entry of `None`, keys that have
/// a proven value will have an entry of `Some(value)`.
///
/// Fails with `Error::QueryKey` if `keys` are not sorted and unique. Every
/// other failure is reported as `Error::Proof`.
pub fn verify(bytes: &[u8], keys: &[Vec<u8>], expected_hash: Hash) -> Result<Vec<Option<Vec<u8>>>> {
    for pair in keys.windows(2) {
        if pair[0] > pair[1] {
            return Err(Error::QueryKey("Keys in query must be sorted".into()));
        } else if pair[0] == pair[1] {
            return Err(Error::QueryKey("Keys in query must be unique".into()));
        }
    }

    let mut stack: Vec<Tree> = Vec::with_capacity(32);
    let mut output = Vec::with_capacity(keys.len());

    let mut key_index = 0;
    let mut last_push = None;

    for op in Decoder::new(bytes) {
        let op = op.map_err(|err| proof_err(format!("Failed to decode proof: {}", err)))?;

        match op {
            Op::Parent => {
                let (mut parent, child) = (try_pop(&mut stack)?, try_pop(&mut stack)?);
                parent.attach(true, child)?;
                stack.push(parent);
            }
            Op::Child => {
                let (child, mut parent) = (try_pop(&mut stack)?, try_pop(&mut stack)?);
                parent.attach(false, child)?;
                stack.push(parent);
            }
            Op::Push(node) => {
                if let Node::KV(key, value) = &node {
                    // keys should always be increasing
                    if let Some(Node::KV(last_key, _)) = &last_push {
                        if key <= last_key {
                            return Err(proof_err("Incorrect key ordering"));
                        }
                    }

                    while key_index < keys.len() && *key >= keys[key_index] {
                        if *key == keys[key_index] {
                            // KV for queried key
                            output.push(Some(value.clone()));
                        } else {
                            match &last_push {
                                None | Some(Node::KV(_, _)) => {
                                    // previous push was a boundary (global edge or
                                    // lower key), so this is a valid absence proof
                                    output.push(None);
                                }
                                // proof is incorrect since it skipped queried keys
                                _ => return Err(proof_err("Proof incorrectly formed")),
                            }
                        }

                        key_index += 1;
                    }
                }

                last_push = Some(node.clone());
                stack.push(node.into());
            }
        }
    }

    // absence proofs for right edge
    if key_index < keys.len() {
        if let Some(Node::KV(_, _)) = last_push {
            for _ in 0..(keys.len() - key_index) {
                output.push(None);
            }
        } else {
            return Err(proof_err("Proof incorrectly formed"));
        }
    }

    if stack.len() != 1 {
        return Err(proof_err(
            "Expected proof to result in exactly one stack item",
        ));
    }

    let root = try_pop(&mut stack)?;
    let hash = root.into_hash().hash();
    if hash != expected_hash {
        return Err(proof_err(format!(
            "Proof did not match expected hash\n\tExpected: {}\n\tActual: {}",
            hex::encode(expected_hash),
            hex::encode(hash)
        )));
    }

    Ok(output)
}
