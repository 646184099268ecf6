//! Search & Index subsystem for compiled JVM artifacts.
//!
//! Walks configured class-output directories and dependency archives, decodes
//! the class files inside them, and keeps two stores in sync: a relational
//! store holding authoritative symbol records and file fingerprints, and a
//! full-text index answering fuzzy/abbreviated symbol queries.

pub mod archive;
pub mod classfile;
pub mod config;
pub mod error;
pub mod extract;
pub mod indexing;
pub mod logging;
pub mod service;
pub mod storage;
pub mod types;

pub use config::Settings;
pub use error::{IndexError, IndexResult, ParseError, StoreError};
pub use extract::{SourceResolver, SymbolExtractor};
pub use service::SearchService;
pub use storage::{SymbolDatabase, TextIndex};
pub use types::{FileCheck, FqnKey, FqnSymbol, SymbolKind};
