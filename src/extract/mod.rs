//! Symbol extraction: parsed class units in, symbol records out.
//!
//! Applies the visibility and blacklist filters, resolves a best-effort
//! source pointer through the external [`SourceResolver`], and emits records
//! in a fixed order: the class first, then public methods in declaration
//! order, then public fields in declaration order.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::archive::{FileObject, file_uri};
use crate::classfile::{Access, ClassFile};
use crate::error::IndexResult;
use crate::types::FqnSymbol;

/// Archive-internal path prefixes that are never indexed.
const BLACKLIST_PREFIXES: &[&str] = &["sun/", "sunw/", "com/sun/"];

/// Compiler-generated name fragments whose symbols are dropped.
const IGNORE_FRAGMENTS: &[&str] = &["$$anonfun$", "$worker$"];

/// Maps a package and simple source filename to a source artifact on disk.
///
/// Implemented by the host; resolution failures are expected and simply leave
/// the emitted records without a source pointer.
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, package: &str, source_name: &str) -> Option<PathBuf>;
}

/// Resolver that never finds a source artifact.
pub struct NoSources;

impl SourceResolver for NoSources {
    fn resolve(&self, _package: &str, _source_name: &str) -> Option<PathBuf> {
        None
    }
}

/// Byte offsets of line starts, built by scanning a source artifact for
/// newlines once per class-file indexing.
///
/// Entry 0 is byte 0; entry `n` is the byte index of the nth `\n`. Only `\n`
/// counts, so `\r\n` sources resolve to the byte before the line's text;
/// consistent on every platform.
#[derive(Debug, Clone)]
pub struct LineOffsets(Vec<u32>);

impl LineOffsets {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut table = vec![0u32];
        table.extend(
            bytes
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(i, _)| i as u32),
        );
        Self(table)
    }

    /// Byte offset for a 1-based line number.
    pub fn offset(&self, line: u32) -> Option<u32> {
        if line == 0 {
            return None;
        }
        self.0.get(line as usize - 1).copied()
    }
}

struct ResolvedSource {
    uri: String,
    offsets: Option<LineOffsets>,
}

/// Turns class files into streams of [`FqnSymbol`] records.
pub struct SymbolExtractor {
    resolver: Arc<dyn SourceResolver>,
}

impl SymbolExtractor {
    pub fn new(resolver: Arc<dyn SourceResolver>) -> Self {
        Self { resolver }
    }

    /// Extract all indexable symbols from one class unit.
    ///
    /// Blacklisted entries and non-public classes yield an empty list; a
    /// malformed classfile is an error the caller logs and treats as "no
    /// symbols".
    pub fn extract(
        &self,
        container: &FileObject,
        entry: &FileObject,
        bytes: &[u8],
    ) -> IndexResult<Vec<FqnSymbol>> {
        if let Some(path) = entry.path_within_archive() {
            if BLACKLIST_PREFIXES.iter().any(|p| path.starts_with(p)) {
                return Ok(Vec::new());
            }
        }

        let class = ClassFile::parse(bytes)?;
        if !class.is_public() {
            return Ok(Vec::new());
        }

        let source = self.resolve_source(&class);
        let source_uri = source.as_ref().map(|s| s.uri.clone());
        let offsets = source.as_ref().and_then(|s| s.offsets.as_ref());
        let offset_for = |line: Option<u32>| line.and_then(|l| offsets.and_then(|t| t.offset(l)));

        let container_uri = container.container_uri();
        let entry_uri = entry.uri();
        let class_fqn = class.fqn();

        let mut symbols = Vec::with_capacity(1 + class.methods.len() + class.fields.len());
        symbols.push(
            FqnSymbol::class(&container_uri, &entry_uri, class_fqn.clone()).with_source(
                source_uri.clone(),
                class.source_line,
                offset_for(class.source_line),
            ),
        );

        for method in class.methods.iter().filter(|m| m.access == Access::Public) {
            symbols.push(
                FqnSymbol::method(
                    &container_uri,
                    &entry_uri,
                    format!("{class_fqn}.{}", method.name),
                    method.descriptor.clone(),
                )
                .with_source(source_uri.clone(), method.line, offset_for(method.line)),
            );
        }

        for field in class.fields.iter().filter(|f| f.access == Access::Public) {
            symbols.push(
                FqnSymbol::field(
                    &container_uri,
                    &entry_uri,
                    format!("{class_fqn}.{}", field.name),
                    class.internal_name.clone(),
                )
                .with_source(source_uri.clone(), None, None),
            );
        }

        symbols.retain(|s| !IGNORE_FRAGMENTS.iter().any(|frag| s.fqn.contains(frag)));
        Ok(symbols)
    }

    fn resolve_source(&self, class: &ClassFile) -> Option<ResolvedSource> {
        let source_name = class.source_name.as_deref()?;
        let path = self.resolver.resolve(&class.package(), source_name)?;
        let offsets = match std::fs::read(&path) {
            Ok(bytes) => Some(LineOffsets::from_bytes(&bytes)),
            Err(e) => {
                debug!("source artifact {} unreadable: {}", path.display(), e);
                None
            }
        };
        Some(ResolvedSource {
            uri: file_uri(&path),
            offsets,
        })
    }
}
