use crate::encoding::{Entry, Schema};
use crate::error::MerkleError;
use crate::hash::{Digest, Keccak256, MerkleHasher};

/// Computes the leaf for `entry` as `H(H(encode(entry)))`.
///
/// Internal nodes are a single hash over 64 bytes, so a leaf can never be
/// passed off as the preimage of a node, nor a node as a leaf.
pub fn leaf_hash_with<H: MerkleHasher>(
    schema: &Schema,
    entry: &Entry,
) -> Result<Digest, MerkleError> {
    let encoded = schema.encode(entry)?;
    let inner = H::hash(&[encoded.as_slice()]);
    Ok(H::hash(&[inner.as_slice()]))
}

/// [`leaf_hash_with`] using Keccak-256.
pub fn leaf_hash(schema: &Schema, entry: &Entry) -> Result<Digest, MerkleError> {
    leaf_hash_with::<Keccak256>(schema, entry)
}
