//! Tree construction over a whitelist.
//!
//! Leaves are sorted by digest before the tree is built, so the root only
//! depends on the set of entries. Levels are stored bottom-up: `levels[0]`
//! holds the sorted leaves and the last level holds the root. A level with an
//! odd number of nodes promotes its last node unchanged to the next level;
//! nothing is ever padded or duplicated.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use tracing::debug;

use crate::encoding::{Entry, Schema};
use crate::error::MerkleError;
use crate::hash::{hash_pair, hex_encode, Digest, Keccak256, MerkleHasher};
use crate::leaf::leaf_hash_with;

/// Below this many nodes a level is hashed on the current thread.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 1 << 12;

/// An immutable Merkle tree over a set of typed entries.
#[derive(Clone)]
pub struct MerkleTree<H: MerkleHasher = Keccak256> {
    schema: Schema,
    /// Entries in sorted-leaf order; `entries[i]` hashes to `levels[0][i]`.
    entries: Vec<Entry>,
    levels: Vec<Vec<Digest>>,
    lookup: HashMap<Digest, usize>,
    marker: PhantomData<fn() -> H>,
}

impl MerkleTree {
    /// Builds a Keccak-256 tree from `entries`.
    pub fn build(
        schema: Schema,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Self, MerkleError> {
        Self::build_with_hasher(schema, entries)
    }
}

impl<H: MerkleHasher> MerkleTree<H> {
    /// Builds a tree from `entries` using the hash function `H`.
    ///
    /// Fails with [`MerkleError::EmptyInput`] on no entries, with
    /// [`MerkleError::InvalidEntry`] if an entry does not match `schema`, and
    /// with [`MerkleError::DuplicateLeaf`] if two entries produce the same leaf.
    pub fn build_with_hasher(
        schema: Schema,
        entries: impl IntoIterator<Item = Entry>,
    ) -> Result<Self, MerkleError> {
        let entries: Vec<Entry> = entries.into_iter().collect();
        if entries.is_empty() {
            return Err(MerkleError::EmptyInput);
        }

        let leaves = hash_leaves::<H>(&schema, &entries)?;

        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_unstable_by(|&a, &b| leaves[a].cmp(&leaves[b]).then(a.cmp(&b)));
        for pair in order.windows(2) {
            if leaves[pair[0]] == leaves[pair[1]] {
                return Err(MerkleError::DuplicateLeaf {
                    leaf: hex::encode(leaves[pair[0]]),
                    first: pair[0],
                    second: pair[1],
                });
            }
        }

        let sorted_leaves: Vec<Digest> = order.iter().map(|&i| leaves[i]).collect();
        let mut slots: Vec<Option<Entry>> = entries.into_iter().map(Some).collect();
        let sorted_entries: Vec<Entry> = order
            .iter()
            .filter_map(|&i| slots[i].take())
            .collect();

        let levels = build_levels::<H>(sorted_leaves);
        let lookup = levels[0]
            .iter()
            .enumerate()
            .map(|(index, leaf)| (*leaf, index))
            .collect();

        let tree = Self {
            schema,
            entries: sorted_entries,
            levels,
            lookup,
            marker: PhantomData,
        };
        debug!(
            leaves = tree.len(),
            depth = tree.depth(),
            root = %hex_encode(tree.root()),
            "built merkle tree"
        );
        Ok(tree)
    }

    pub fn root(&self) -> Digest {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or_default()
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a tree cannot be built from zero entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of hashing levels between the leaves and the root.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// All node hashes, leaves first.
    pub fn levels(&self) -> &[Vec<Digest>] {
        &self.levels
    }

    /// Entries with their sorted leaf index.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = (usize, &Entry)> + '_ {
        self.entries.iter().enumerate()
    }

    pub fn entry(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn leaf(&self, index: usize) -> Option<&Digest> {
        self.levels[0].get(index)
    }

    /// Sorted leaf index of `entry`.
    pub fn index_of(&self, entry: &Entry) -> Result<usize, MerkleError> {
        let leaf = leaf_hash_with::<H>(&self.schema, entry)?;
        self.index_of_leaf(&leaf).ok_or(MerkleError::UnknownEntry)
    }

    pub fn index_of_leaf(&self, leaf: &Digest) -> Option<usize> {
        self.lookup.get(leaf).copied()
    }

    pub(crate) fn check_index(&self, index: usize) -> Result<(), MerkleError> {
        if index >= self.len() {
            return Err(MerkleError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Recomputes every leaf and node and checks them against the stored ones.
    pub fn validate(&self) -> Result<(), MerkleError> {
        for (index, entry) in self.entries.iter().enumerate() {
            let leaf = leaf_hash_with::<H>(&self.schema, entry)?;
            if leaf != self.levels[0][index] {
                return Err(MerkleError::CorruptTree { level: 0, index });
            }
            if index > 0 && self.levels[0][index - 1] >= leaf {
                return Err(MerkleError::CorruptTree { level: 0, index });
            }
        }

        for (level, pair) in self.levels.windows(2).enumerate() {
            let expected = next_level::<H>(&pair[0]);
            if expected.len() != pair[1].len() {
                return Err(MerkleError::CorruptTree {
                    level: level + 1,
                    index: expected.len().min(pair[1].len()),
                });
            }
            if let Some(index) = expected.iter().zip(&pair[1]).position(|(a, b)| a != b) {
                return Err(MerkleError::CorruptTree {
                    level: level + 1,
                    index,
                });
            }
        }
        Ok(())
    }

    /// One `level:index:0xhash` line per node, leaves first.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl<H: MerkleHasher> fmt::Display for MerkleTree<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level_num, level) in self.levels.iter().enumerate() {
            for (i, hash) in level.iter().enumerate() {
                writeln!(f, "{}:{}:{}", level_num, i, hex_encode(hash))?;
            }
        }
        Ok(())
    }
}

impl<H: MerkleHasher> fmt::Debug for MerkleTree<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerkleTree")
            .field("root", &hex_encode(self.root()))
            .field("leaves", &self.len())
            .field("depth", &self.depth())
            .finish()
    }
}

fn build_levels<H: MerkleHasher>(leaves: Vec<Digest>) -> Vec<Vec<Digest>> {
    let mut levels = vec![leaves];
    while levels[levels.len() - 1].len() > 1 {
        let next = next_level::<H>(&levels[levels.len() - 1]);
        levels.push(next);
    }
    levels
}

fn combine<H: MerkleHasher>(chunk: &[Digest]) -> Digest {
    match chunk {
        [left, right] => hash_pair::<H>(left, right),
        [lone] => *lone,
        _ => unreachable!("levels are split into chunks of at most two"),
    }
}

#[cfg(feature = "parallel")]
fn next_level<H: MerkleHasher>(level: &[Digest]) -> Vec<Digest> {
    use rayon::prelude::*;

    if level.len() < PARALLEL_THRESHOLD {
        return level.chunks(2).map(combine::<H>).collect();
    }
    level.par_chunks(2).map(combine::<H>).collect()
}

#[cfg(not(feature = "parallel"))]
fn next_level<H: MerkleHasher>(level: &[Digest]) -> Vec<Digest> {
    level.chunks(2).map(combine::<H>).collect()
}

#[cfg(feature = "parallel")]
fn hash_leaves<H: MerkleHasher>(
    schema: &Schema,
    entries: &[Entry],
) -> Result<Vec<Digest>, MerkleError> {
    use rayon::prelude::*;

    if entries.len() < PARALLEL_THRESHOLD {
        return entries
            .iter()
            .map(|entry| leaf_hash_with::<H>(schema, entry))
            .collect();
    }
    entries
        .par_iter()
        .map(|entry| leaf_hash_with::<H>(schema, entry))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn hash_leaves<H: MerkleHasher>(
    schema: &Schema,
    entries: &[Entry],
) -> Result<Vec<Digest>, MerkleError> {
    entries
        .iter()
        .map(|entry| leaf_hash_with::<H>(schema, entry))
        .collect()
}
