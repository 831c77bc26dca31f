//! Batched inclusion proofs.
//!
//! A multiproof proves several leaves at once. Sibling hashes that can be
//! recomputed from the proven leaves themselves are left out, and one flag per
//! hashing step records where the second operand comes from: `true` means the
//! next node being reconstructed on the same level, `false` means the next
//! element of `proof`. Steps run level by level, left to right; the last node
//! of an odd-width level is promoted without a step, as in the tree.

use tracing::debug;

use crate::encoding::{Entry, Schema};
use crate::error::MerkleError;
use crate::hash::{digests_equal, hash_pair, Digest, Keccak256, MerkleHasher};
use crate::leaf::leaf_hash_with;
use crate::tree::MerkleTree;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multiproof {
    /// Number of leaves in the tree the proof was generated from.
    pub leaf_count: usize,
    /// Proven sorted leaf positions, strictly increasing.
    pub indices: Vec<usize>,
    /// Siblings not derivable from the proven leaves, in consumption order.
    pub proof: Vec<Digest>,
    pub proof_flags: Vec<bool>,
}

impl<H: MerkleHasher> MerkleTree<H> {
    /// Generates one proof covering every position in `leaf_indices`.
    ///
    /// Repeated indices are proven once.
    pub fn prove_indices(&self, leaf_indices: &[usize]) -> Result<Multiproof, MerkleError> {
        if leaf_indices.is_empty() {
            return Err(MerkleError::EmptyIndexSet);
        }
        let mut indices = leaf_indices.to_vec();
        indices.sort_unstable();
        indices.dedup();
        for &index in &indices {
            self.check_index(index)?;
        }

        let levels = self.levels();
        let mut known = indices.clone();
        let mut proof = Vec::new();
        let mut proof_flags = Vec::new();

        for level in &levels[..levels.len() - 1] {
            let width = level.len();
            let mut next = Vec::with_capacity(known.len());
            let mut i = 0;
            while i < known.len() {
                let position = known[i];
                let sibling = position ^ 1;
                if sibling >= width {
                    i += 1;
                } else if known.get(i + 1) == Some(&sibling) {
                    proof_flags.push(true);
                    i += 2;
                } else {
                    proof_flags.push(false);
                    proof.push(level[sibling]);
                    i += 1;
                }
                next.push(position / 2);
            }
            known = next;
        }

        debug!(
            leaves = indices.len(),
            proof_len = proof.len(),
            steps = proof_flags.len(),
            "generated merkle multiproof"
        );
        Ok(Multiproof {
            leaf_count: self.len(),
            indices,
            proof,
            proof_flags,
        })
    }

    /// Generates a multiproof for `entries`, looking up each sorted position.
    pub fn prove_entries(&self, entries: &[Entry]) -> Result<Multiproof, MerkleError> {
        let indices = entries
            .iter()
            .map(|entry| self.index_of(entry))
            .collect::<Result<Vec<_>, _>>()?;
        self.prove_indices(&indices)
    }

    /// Proven entries of `multiproof`, in the order verification expects them.
    pub fn multiproof_entries(&self, multiproof: &Multiproof) -> Result<Vec<Entry>, MerkleError> {
        multiproof
            .indices
            .iter()
            .map(|&index| {
                self.entry(index)
                    .cloned()
                    .ok_or(MerkleError::IndexOutOfRange {
                        index,
                        len: self.len(),
                    })
            })
            .collect()
    }
}

/// Replays `multiproof` over `leaves` and returns the reconstructed root.
///
/// `leaves[i]` is the leaf at `multiproof.indices[i]`. Returns `None` when the
/// proof is malformed: mismatched lengths, unsorted or out-of-range indices,
/// flags that disagree with the tree shape, or unconsumed proof elements.
pub fn process_multiproof<H: MerkleHasher>(
    leaves: &[Digest],
    multiproof: &Multiproof,
) -> Option<Digest> {
    let width = multiproof.leaf_count;
    if leaves.is_empty() || leaves.len() != multiproof.indices.len() {
        return None;
    }
    if multiproof.indices.windows(2).any(|w| w[0] >= w[1]) {
        return None;
    }
    if multiproof.indices.last().is_some_and(|&last| last >= width) {
        return None;
    }

    let mut frontier: Vec<(usize, Digest)> = multiproof
        .indices
        .iter()
        .copied()
        .zip(leaves.iter().copied())
        .collect();
    let mut flags = multiproof.proof_flags.iter().copied();
    let mut proof = multiproof.proof.iter();
    let mut width = width;

    while width > 1 {
        let mut next = Vec::with_capacity(frontier.len());
        let mut i = 0;
        while i < frontier.len() {
            let (position, hash) = frontier[i];
            let sibling = position ^ 1;
            if sibling >= width {
                next.push((position / 2, hash));
                i += 1;
                continue;
            }

            let paired = frontier.get(i + 1).filter(|(p, _)| *p == sibling);
            let parent = match (flags.next()?, paired) {
                (true, Some((_, other))) => {
                    i += 2;
                    hash_pair::<H>(&hash, other)
                }
                (false, None) => {
                    i += 1;
                    hash_pair::<H>(&hash, proof.next()?)
                }
                _ => return None,
            };
            next.push((position / 2, parent));
        }
        frontier = next;
        width = width.div_ceil(2);
    }

    if flags.next().is_some() || proof.next().is_some() {
        return None;
    }
    match frontier.as_slice() {
        [(0, root)] => Some(*root),
        _ => None,
    }
}

/// Checks that `multiproof` commits every entry of `entries` to `root`.
///
/// `entries[i]` is the claimed entry at `multiproof.indices[i]`.
pub fn verify_multiproof_with<H: MerkleHasher>(
    schema: &Schema,
    entries: &[Entry],
    multiproof: &Multiproof,
    root: &Digest,
) -> Result<bool, MerkleError> {
    let leaves = entries
        .iter()
        .map(|entry| leaf_hash_with::<H>(schema, entry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(process_multiproof::<H>(&leaves, multiproof)
        .is_some_and(|computed| digests_equal(&computed, root)))
}

/// [`verify_multiproof_with`] using Keccak-256.
pub fn verify_multiproof(
    schema: &Schema,
    entries: &[Entry],
    multiproof: &Multiproof,
    root: &Digest,
) -> Result<bool, MerkleError> {
    verify_multiproof_with::<Keccak256>(schema, entries, multiproof, root)
}
