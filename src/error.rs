//! Error types for the search and index subsystem.
//!
//! Structured errors via thiserror. Parse and resolve failures are local by
//! policy (logged and skipped by the callers that hit them); store and index
//! failures propagate so a job can be reported as failed.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for indexing and query operations.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read archive '{path}': {cause}")]
    ArchiveRead { path: PathBuf, cause: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Text index operation failed during {operation}: {cause}")]
    TextIndex { operation: String, cause: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

/// Errors from decoding a single compiled class unit.
///
/// Always local: a malformed class file contributes no symbols and the caller
/// logs and moves on.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unexpected end of class file")]
    UnexpectedEof,

    #[error("invalid classfile magic: 0x{0:08x}")]
    InvalidMagic(u32),

    #[error("invalid constant pool index: {0}")]
    InvalidConstantPoolIndex(u16),

    #[error("invalid constant pool tag: {0}")]
    InvalidConstantPoolTag(u8),

    #[error("constant pool type mismatch at index {index}: expected {expected}, found {found}")]
    ConstantPoolTypeMismatch {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid modified UTF-8 constant")]
    InvalidModifiedUtf8,

    #[error("malformed {0} attribute")]
    MalformedAttribute(&'static str),

    #[error("{0}")]
    Malformed(&'static str),
}

/// Errors from the relational store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Unique-constraint violation. Swallowed per batch by `persist`;
    /// surfaced here for callers that want to distinguish it.
    #[error("unique constraint violated: {0}")]
    Constraint(String),

    /// Connection or transaction failure.
    #[error("database operation failed: {0}")]
    Operational(#[from] rusqlite::Error),

    #[error("database directory unavailable: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Result type alias for parse operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type alias for relational store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<tantivy::TantivyError> for IndexError {
    fn from(e: tantivy::TantivyError) -> Self {
        IndexError::TextIndex {
            operation: "tantivy".to_string(),
            cause: e.to_string(),
        }
    }
}

impl IndexError {
    pub(crate) fn text_index(operation: &str, cause: impl std::fmt::Display) -> Self {
        IndexError::TextIndex {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}
