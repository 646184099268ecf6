//! Persistence: the relational store and the full-text index.
//!
//! Both stores key symbols on the `(fqn, descriptor, internal)` triple. The
//! relational store is authoritative for hydration; the text index is
//! authoritative for ranking.

pub mod database;
pub mod text_index;
pub(crate) mod tokenize;

pub use database::SymbolDatabase;
pub use text_index::TextIndex;
