use thiserror::Error;

/// Errors raised by the tree core.
///
/// A proof that does not match a root is not an error: verification reports
/// it as `Ok(false)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// A field does not conform to its declared type, or the entry has the
    /// wrong arity for the schema.
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    /// Two entries hash to the same leaf.
    #[error("Duplicate leaf 0x{leaf} (entries at input positions {first} and {second})")]
    DuplicateLeaf {
        leaf: String,
        first: usize,
        second: usize,
    },

    #[error("Cannot build a tree from zero entries")]
    EmptyInput,

    #[error("Cannot build a multiproof for an empty index set")]
    EmptyIndexSet,

    #[error("Leaf index {index} is out of range for tree with {len} leaves")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Entry is not part of the tree")]
    UnknownEntry,

    /// A stored node no longer matches the hash recomputed from its children.
    #[error("Tree is corrupt at level {level}, index {index}")]
    CorruptTree { level: usize, index: usize },
}
