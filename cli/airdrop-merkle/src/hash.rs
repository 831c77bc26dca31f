use sha3::{Digest as _, Keccak256 as Keccak};

use crate::error::MerkleError;

/// A 32-byte node or leaf hash.
pub type Digest = [u8; 32];

/// The hash function `H` every leaf and node of a tree is computed with.
pub trait MerkleHasher {
    /// Hashes `parts` as if they were concatenated.
    fn hash(parts: &[&[u8]]) -> Digest;
}

/// Keccak-256, the hash used by on-chain claim verifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Keccak256;

impl MerkleHasher for Keccak256 {
    fn hash(parts: &[&[u8]]) -> Digest {
        let mut hasher = Keccak::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().into()
    }
}

/// Computes an internal node from its two children.
///
/// The children are ordered bytewise before concatenation, so the result does
/// not depend on which one was the left child.
pub fn hash_pair<H: MerkleHasher>(a: &Digest, b: &Digest) -> Digest {
    if a <= b {
        H::hash(&[a.as_slice(), b.as_slice()])
    } else {
        H::hash(&[b.as_slice(), a.as_slice()])
    }
}

/// Compares two digests without short-circuiting on the first differing byte.
pub fn digests_equal(a: &Digest, b: &Digest) -> bool {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Renders bytes as `0x`-prefixed lowercase hex.
pub fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a 32-byte digest from hex, with or without the `0x` prefix.
pub fn parse_digest(s: &str) -> Result<Digest, MerkleError> {
    let trimmed = s.trim();
    let cleaned = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if cleaned.len() != 64 {
        return Err(MerkleError::InvalidEntry(format!(
            "Invalid digest length: expected 64 hex chars, got {}",
            cleaned.len()
        )));
    }
    let mut digest = [0u8; 32];
    hex::decode_to_slice(cleaned, &mut digest)
        .map_err(|e| MerkleError::InvalidEntry(format!("Invalid hex encoding: {}", e)))?;
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_empty() {
        let digest = Keccak256::hash(&[]);
        assert_eq!(
            hex::encode(digest),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak256_parts_match_concatenation() {
        let whole = Keccak256::hash(&[b"airdrop whitelist".as_slice()]);
        let split = Keccak256::hash(&[
            b"airdrop".as_slice(),
            b" ".as_slice(),
            b"whitelist".as_slice(),
        ]);
        assert_eq!(whole, split);
    }

    #[test]
    fn test_hash_pair_is_commutative() {
        let left: Digest = [1u8; 32];
        let right: Digest = [2u8; 32];
        assert_eq!(
            hash_pair::<Keccak256>(&left, &right),
            hash_pair::<Keccak256>(&right, &left)
        );
        assert_eq!(
            hash_pair::<Keccak256>(&left, &right),
            Keccak256::hash(&[left.as_slice(), right.as_slice()])
        );
    }

    #[test]
    fn test_digests_equal() {
        let a: Digest = [7u8; 32];
        let mut b = a;
        assert!(digests_equal(&a, &b));
        b[31] ^= 1;
        assert!(!digests_equal(&a, &b));
    }

    #[test]
    fn test_parse_digest() {
        let digest: Digest = [0xab; 32];
        let encoded = hex_encode(digest);
        assert_eq!(parse_digest(&encoded).unwrap(), digest);
        assert_eq!(parse_digest(&encoded[2..]).unwrap(), digest);
        assert!(parse_digest("0x1234").is_err());
        assert!(parse_digest(&"zz".repeat(32)).is_err());
    }
}
