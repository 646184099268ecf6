//! Core data model: symbol records, file fingerprints, and index keys.

use serde::{Deserialize, Serialize};

/// Kind of a symbol record, derived from which optional fields are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Class,
    Method,
    Field,
}

/// One indexed symbol: a class, a public method, or a public field.
///
/// `container` is the URI of the enclosing on-disk file (class file or
/// archive); `entry` is the URI of the specific class file, which may point
/// inside an archive. `descriptor` is present iff the record is a method,
/// `internal` (the field owner's internal name) iff it is a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FqnSymbol {
    pub id: Option<i64>,
    pub container: String,
    pub entry: String,
    pub fqn: String,
    pub descriptor: Option<String>,
    pub internal: Option<String>,
    pub source: Option<String>,
    pub line: Option<u32>,
    pub offset: Option<u32>,
}

impl FqnSymbol {
    pub fn class(container: &str, entry: &str, fqn: impl Into<String>) -> Self {
        Self {
            id: None,
            container: container.to_string(),
            entry: entry.to_string(),
            fqn: fqn.into(),
            descriptor: None,
            internal: None,
            source: None,
            line: None,
            offset: None,
        }
    }

    pub fn method(
        container: &str,
        entry: &str,
        fqn: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        let mut sym = Self::class(container, entry, fqn);
        sym.descriptor = Some(descriptor.into());
        sym
    }

    pub fn field(
        container: &str,
        entry: &str,
        fqn: impl Into<String>,
        owner_internal: impl Into<String>,
    ) -> Self {
        let mut sym = Self::class(container, entry, fqn);
        sym.internal = Some(owner_internal.into());
        sym
    }

    pub fn with_source(mut self, source: Option<String>, line: Option<u32>, offset: Option<u32>) -> Self {
        self.source = source;
        self.line = line;
        self.offset = offset;
        self
    }

    pub fn kind(&self) -> SymbolKind {
        if self.descriptor.is_some() {
            SymbolKind::Method
        } else if self.internal.is_some() {
            SymbolKind::Field
        } else {
            SymbolKind::Class
        }
    }

    /// Simple name: the final dotted segment.
    pub fn simple_name(&self) -> &str {
        self.fqn.rsplit('.').next().unwrap_or(&self.fqn)
    }
}

/// File fingerprint: identifies the state of one on-disk file.
///
/// At most one fingerprint exists per `filename` (an absolute URI) at any
/// instant; `timestamp` is the file's last-modified time in milliseconds at
/// the moment it was indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCheck {
    pub id: Option<i64>,
    pub filename: String,
    pub timestamp: u64,
}

impl FileCheck {
    pub fn new(filename: impl Into<String>, timestamp: u64) -> Self {
        Self {
            id: None,
            filename: filename.into(),
            timestamp,
        }
    }

    /// True when the on-disk timestamp is strictly newer than the stored one.
    pub fn changed_since(&self, disk_timestamp: u64) -> bool {
        self.timestamp < disk_timestamp
    }
}

/// The `(fqn, descriptor, internal)` triple a text-index document is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FqnKey {
    pub fqn: String,
    pub descriptor: Option<String>,
    pub internal: Option<String>,
}

impl FqnKey {
    pub fn of(symbol: &FqnSymbol) -> Self {
        Self {
            fqn: symbol.fqn.clone(),
            descriptor: symbol.descriptor.clone(),
            internal: symbol.internal.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_derived_from_optional_fields() {
        let class = FqnSymbol::class("file:/a", "file:/a", "com.acme.Widget");
        assert_eq!(class.kind(), SymbolKind::Class);

        let method = FqnSymbol::method("file:/a", "file:/a", "com.acme.Widget.render", "()V");
        assert_eq!(method.kind(), SymbolKind::Method);

        let field = FqnSymbol::field("file:/a", "file:/a", "com.acme.Widget.WIDTH", "com/acme/Widget");
        assert_eq!(field.kind(), SymbolKind::Field);
    }

    #[test]
    fn simple_name_is_last_segment() {
        let sym = FqnSymbol::class("file:/a", "file:/a", "com.acme.Widget$Inner");
        assert_eq!(sym.simple_name(), "Widget$Inner");

        let bare = FqnSymbol::class("file:/a", "file:/a", "TopLevel");
        assert_eq!(bare.simple_name(), "TopLevel");
    }

    #[test]
    fn changed_since_is_strict() {
        let check = FileCheck::new("file:/a.class", 1_000);
        assert!(!check.changed_since(1_000));
        assert!(!check.changed_since(999));
        assert!(check.changed_since(1_001));
    }
}
