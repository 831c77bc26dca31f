use tracing::debug;

use crate::encoding::{Entry, Schema};
use crate::error::MerkleError;
use crate::hash::{digests_equal, hash_pair, Digest, Keccak256, MerkleHasher};
use crate::leaf::leaf_hash_with;
use crate::tree::MerkleTree;

/// Inclusion proof for a single leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    /// Sorted position of the proven leaf.
    pub leaf_index: usize,
    /// Sibling hashes from the leaf level up to, excluding, the root.
    pub siblings: Vec<Digest>,
}

impl Proof {
    pub fn len(&self) -> usize {
        self.siblings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty()
    }
}

impl<H: MerkleHasher> MerkleTree<H> {
    /// Generates the proof for the leaf at sorted position `leaf_index`.
    ///
    /// Levels where the node is the promoted last node of an odd-width level
    /// contribute no sibling.
    pub fn prove_index(&self, leaf_index: usize) -> Result<Proof, MerkleError> {
        self.check_index(leaf_index)?;

        let levels = self.levels();
        let mut siblings = Vec::with_capacity(self.depth());
        let mut current_index = leaf_index;

        for level in &levels[..levels.len() - 1] {
            let sibling_index = current_index ^ 1;
            if sibling_index < level.len() {
                siblings.push(level[sibling_index]);
            }
            current_index /= 2;
        }

        debug!(leaf_index, proof_len = siblings.len(), "generated merkle proof");
        Ok(Proof {
            leaf_index,
            siblings,
        })
    }

    /// Generates the proof for `entry`, looking up its sorted position first.
    pub fn prove_entry(&self, entry: &Entry) -> Result<Proof, MerkleError> {
        let index = self.index_of(entry)?;
        self.prove_index(index)
    }

    /// Checks `proof` for `entry` against this tree's root.
    pub fn verify_proof(&self, entry: &Entry, proof: &Proof) -> Result<bool, MerkleError> {
        verify_with::<H>(self.schema(), entry, proof, &self.root())
    }
}

/// Folds `siblings` into `leaf` bottom-up and returns the resulting root.
pub fn process_proof<H: MerkleHasher>(leaf: &Digest, siblings: &[Digest]) -> Digest {
    siblings
        .iter()
        .fold(*leaf, |current, sibling| hash_pair::<H>(&current, sibling))
}

/// Checks that `proof` commits `entry` to `root`.
///
/// A mismatch is `Ok(false)`; only an entry that cannot be encoded under
/// `schema` is an error.
pub fn verify_with<H: MerkleHasher>(
    schema: &Schema,
    entry: &Entry,
    proof: &Proof,
    root: &Digest,
) -> Result<bool, MerkleError> {
    let leaf = leaf_hash_with::<H>(schema, entry)?;
    let computed = process_proof::<H>(&leaf, &proof.siblings);
    Ok(digests_equal(&computed, root))
}

/// [`verify_with`] using Keccak-256.
pub fn verify(
    schema: &Schema,
    entry: &Entry,
    proof: &Proof,
    root: &Digest,
) -> Result<bool, MerkleError> {
    verify_with::<Keccak256>(schema, entry, proof, root)
}
