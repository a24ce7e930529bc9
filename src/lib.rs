//! A persistent, authenticated key/value store: an AVL tree whose nodes carry
//! Merkle hashes, so any set of lookups can be proven against a single root
//! hash.

/// Error and result types.
mod error;
/// The core tree data structure.
pub mod tree;
/// Temporary ownership of values behind `&mut`.
pub mod owner;
/// Algorithms for generating and verifying Merkle proofs.
pub mod proofs;
/// The key/value stores the tree can be persisted through.
pub mod store;
/// The top-level store API.
mod merk;
/// Various helpers useful for tests or benchmarks.
pub mod test_utils;

pub use error::{Error, Result};
pub use merk::{Merk, MerkOptions, MerkSource};
pub use proofs::verify;
pub use store::{MemStore, Store, WriteBatch};
#[cfg(feature = "full")]
pub use store::RocksStore;
pub use tree::{Batch, BatchEntry, Hash, Op, PanicSource, HASH_LENGTH, NULL_HASH};
