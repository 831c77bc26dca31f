//! JSON reports written and read by the command-line tools.
//!
//! Digests are `0x`-prefixed hex strings and entry values use their display
//! form: checksummed addresses and base-10 integers.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encoding::{Entry, Schema};
use crate::error::MerkleError;
use crate::hash::{hex_encode, parse_digest, Digest, MerkleHasher};
use crate::multiproof::Multiproof;
use crate::proof::Proof;
use crate::tree::MerkleTree;

/// Everything needed to check one claim against a published root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReport {
    pub merkle_root: String,
    pub leaf_encoding: Vec<String>,
    pub value: Vec<String>,
    pub leaf_index: usize,
    pub leaf: String,
    pub merkle_proof: Vec<String>,
}

impl ClaimReport {
    pub fn new<H: MerkleHasher>(tree: &MerkleTree<H>, proof: &Proof) -> Result<Self, MerkleError> {
        let entry = tree
            .entry(proof.leaf_index)
            .ok_or(MerkleError::IndexOutOfRange {
                index: proof.leaf_index,
                len: tree.len(),
            })?;
        let leaf = tree
            .leaf(proof.leaf_index)
            .copied()
            .unwrap_or_default();
        Ok(Self {
            merkle_root: hex_encode(tree.root()),
            leaf_encoding: tree.schema().names(),
            value: value_strings(entry),
            leaf_index: proof.leaf_index,
            leaf: hex_encode(leaf),
            merkle_proof: proof.siblings.iter().map(hex_encode).collect(),
        })
    }

    pub fn schema(&self) -> Result<Schema, MerkleError> {
        Schema::parse(self.leaf_encoding.as_slice())
    }

    pub fn entry(&self) -> Result<Entry, MerkleError> {
        self.schema()?.parse_entry(self.value.as_slice())
    }

    pub fn root(&self) -> Result<Digest, MerkleError> {
        parse_digest(&self.merkle_root)
    }

    pub fn proof(&self) -> Result<Proof, MerkleError> {
        Ok(Proof {
            leaf_index: self.leaf_index,
            siblings: parse_digests(&self.merkle_proof)?,
        })
    }
}

/// The full dump of a tree: its root and one claim per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeReport {
    pub merkle_root: String,
    pub leaf_encoding: Vec<String>,
    pub entries: Vec<EntryReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReport {
    pub value: Vec<String>,
    pub leaf_index: usize,
    pub leaf: String,
    pub merkle_proof: Vec<String>,
}

impl TreeReport {
    /// Generates the proof of every entry, in sorted leaf order.
    pub fn new<H: MerkleHasher>(tree: &MerkleTree<H>) -> Result<Self, MerkleError> {
        let entries = tree
            .entries()
            .map(|(index, entry)| {
                let proof = tree.prove_index(index)?;
                Ok(EntryReport {
                    value: value_strings(entry),
                    leaf_index: index,
                    leaf: hex_encode(tree.leaf(index).copied().unwrap_or_default()),
                    merkle_proof: proof.siblings.iter().map(hex_encode).collect(),
                })
            })
            .collect::<Result<Vec<_>, MerkleError>>()?;
        Ok(Self {
            merkle_root: hex_encode(tree.root()),
            leaf_encoding: tree.schema().names(),
            entries,
        })
    }

    pub fn schema(&self) -> Result<Schema, MerkleError> {
        Schema::parse(self.leaf_encoding.as_slice())
    }

    pub fn root(&self) -> Result<Digest, MerkleError> {
        parse_digest(&self.merkle_root)
    }

    /// The claim for the entry at `leaf_index`.
    pub fn claim(&self, leaf_index: usize) -> Option<ClaimReport> {
        let entry = self.entries.iter().find(|e| e.leaf_index == leaf_index)?;
        Some(ClaimReport {
            merkle_root: self.merkle_root.clone(),
            leaf_encoding: self.leaf_encoding.clone(),
            value: entry.value.clone(),
            leaf_index,
            leaf: entry.leaf.clone(),
            merkle_proof: entry.merkle_proof.clone(),
        })
    }
}

/// A multiproof together with the entries it proves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiproofReport {
    pub merkle_root: String,
    pub leaf_encoding: Vec<String>,
    pub leaf_count: usize,
    pub leaf_indices: Vec<usize>,
    pub values: Vec<Vec<String>>,
    pub proof: Vec<String>,
    pub proof_flags: Vec<bool>,
}

impl MultiproofReport {
    pub fn new<H: MerkleHasher>(
        tree: &MerkleTree<H>,
        multiproof: &Multiproof,
    ) -> Result<Self, MerkleError> {
        let values = tree
            .multiproof_entries(multiproof)?
            .iter()
            .map(value_strings)
            .collect();
        Ok(Self {
            merkle_root: hex_encode(tree.root()),
            leaf_encoding: tree.schema().names(),
            leaf_count: multiproof.leaf_count,
            leaf_indices: multiproof.indices.clone(),
            values,
            proof: multiproof.proof.iter().map(hex_encode).collect(),
            proof_flags: multiproof.proof_flags.clone(),
        })
    }

    pub fn schema(&self) -> Result<Schema, MerkleError> {
        Schema::parse(self.leaf_encoding.as_slice())
    }

    pub fn entries(&self) -> Result<Vec<Entry>, MerkleError> {
        let schema = self.schema()?;
        self.values
            .iter()
            .map(|value| schema.parse_entry(value.as_slice()))
            .collect()
    }

    pub fn root(&self) -> Result<Digest, MerkleError> {
        parse_digest(&self.merkle_root)
    }

    pub fn multiproof(&self) -> Result<Multiproof, MerkleError> {
        Ok(Multiproof {
            leaf_count: self.leaf_count,
            indices: self.leaf_indices.clone(),
            proof: parse_digests(&self.proof)?,
            proof_flags: self.proof_flags.clone(),
        })
    }
}

fn value_strings(entry: &Entry) -> Vec<String> {
    entry.values().iter().map(|v| v.to_string()).collect()
}

fn parse_digests(hashes: &[String]) -> Result<Vec<Digest>, MerkleError> {
    hashes.iter().map(|h| parse_digest(h)).collect()
}

/// Writes `contents` to a temp file next to `path`, then renames it into place.
///
/// The temp file is `path` with `.tmp` appended to the full file name.
pub fn write_file_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let mut temp_name = path
        .file_name()
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "output path has no file name")
        })?
        .to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    let mut file = File::create(&temp_path)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    file.sync_all()?;
    std::fs::rename(&temp_path, path)
}
