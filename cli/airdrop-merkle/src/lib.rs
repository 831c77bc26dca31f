//! Standard Merkle tree commitments for airdrop whitelists.
//!
//! Entries are encoded into fixed 32-byte words per field, hashed twice into
//! leaves, sorted, and combined pairwise with order-independent node hashing.
//! Any holder of an entry can then prove membership against the published
//! root with [`verify`], or prove several entries at once with
//! [`verify_multiproof`].

#![forbid(unsafe_code)]

pub mod encoding;
pub mod error;
pub mod hash;
pub mod leaf;
pub mod multiproof;
pub mod proof;
pub mod report;
pub mod source;
pub mod tree;

pub use encoding::{Address, Entry, FieldType, Schema, Value};
pub use error::MerkleError;
pub use hash::{hash_pair, hex_encode, parse_digest, Digest, Keccak256, MerkleHasher};
pub use leaf::{leaf_hash, leaf_hash_with};
pub use multiproof::{process_multiproof, verify_multiproof, verify_multiproof_with, Multiproof};
pub use proof::{process_proof, verify, verify_with, Proof};
pub use report::write_file_atomic;
pub use tree::MerkleTree;
