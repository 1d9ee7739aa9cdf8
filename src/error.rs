//! Error type shared by the whole crate.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoGapError {
    /// No sequence to align, or a reference file without any record.
    #[error("at least one sequence is required")]
    EmptyInput,
    #[error("there must be the same number of sequences and names ({sequences} sequences, {names} names)")]
    NameCountMismatch { names: usize, sequences: usize },
    /// Rows of a reference alignment do not share a common length.
    #[error("aligned sequence {name} has length {found}, expected {expected}")]
    RaggedAlignment {
        name: String,
        expected: usize,
        found: usize,
    },
    /// The alphabet has no slot for this symbol, not even the unknown one.
    #[error("symbol {0:?} cannot be mapped to the alphabet")]
    UnmappedSymbol(char),
    /// A realigner map without a directory was asked for a label it does not hold.
    #[error("no reference alignment for label {0}")]
    UnknownLabel(String),
    #[error("invalid alphabet: {0}")]
    InvalidAlphabet(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NoGapError>;
