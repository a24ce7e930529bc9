/// The hash algorithm used for both KV hashes and node hashes.
pub type Hasher = blake3::Hasher;

/// The length of a `Hash` (in bytes).
pub const HASH_LENGTH: usize = 32;

/// A zero-filled `Hash`, used in place of the hash of an absent child.
pub const NULL_HASH: Hash = [0; HASH_LENGTH];

/// A cryptographic hash digest.
pub type Hash = [u8; HASH_LENGTH];

/// Hashes a key/value pair.
///
/// Lengths are written as 32-bit little-endian integers. Callers must reject
/// keys and values which do not fit (see `Merk::apply`).
pub fn kv_hash(key: &[u8], value: &[u8]) -> Hash {
    debug_assert!(key.len() <= u32::MAX as usize);
    debug_assert!(value.len() <= u32::MAX as usize);

    let mut hasher = Hasher::new();
    hasher.update(&[0]);

    hasher.update(&(key.len() as u32).to_le_bytes());
    hasher.update(key);

    hasher.update(&(value.len() as u32).to_le_bytes());
    hasher.update(value);

    *hasher.finalize().as_bytes()
}

/// Hashes a node based on the hash of its key/value pair, the hash of its left
/// child (if any), and the hash of its right child (if any).
pub fn node_hash(kv: &Hash, left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(&[1]);
    hasher.update(kv);
    hasher.update(left);
    hasher.update(right);

    *hasher.finalize().as_bytes()
}
