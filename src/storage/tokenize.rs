//! Tokenization of fully qualified names for the text index.
//!
//! An FQN is broken into package segments, CamelCase splits of the simple
//! name, a leading-letters abbreviation, and a lowercased exact copy. All
//! output is lowercase; queries fold case the same way.

/// Tokens derived from one indexable symbol name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SymbolTokens {
    /// Splits of the symbol's own name, e.g. `rich presentation compiler`.
    pub name_terms: Vec<String>,
    /// Enclosing segments: package parts, plus the class-name splits for
    /// member symbols.
    pub path_terms: Vec<String>,
    /// Leading letters of the CamelCase humps, e.g. `rpc`.
    pub abbrev: String,
    /// Lowercased simple name for exact matching.
    pub name_exact: String,
}

/// Tokens for a class document.
pub(crate) fn class_tokens(fqn: &str) -> SymbolTokens {
    let (package, simple) = split_fqn(fqn);
    let mut name_terms = camel_splits(simple);
    name_terms.push(simple.to_lowercase());
    name_terms.dedup();

    SymbolTokens {
        name_terms,
        path_terms: package.iter().map(|s| s.to_lowercase()).collect(),
        abbrev: abbreviation(simple),
        name_exact: simple.to_lowercase(),
    }
}

/// Tokens for a member document: the member name is the searchable name, the
/// owning class contributes path context.
pub(crate) fn member_tokens(class_fqn: &str, member_name: &str) -> SymbolTokens {
    let (package, simple) = split_fqn(class_fqn);
    let mut path_terms: Vec<String> = package.iter().map(|s| s.to_lowercase()).collect();
    path_terms.extend(camel_splits(simple));
    path_terms.push(simple.to_lowercase());
    path_terms.dedup();

    let mut name_terms = camel_splits(member_name);
    name_terms.push(member_name.to_lowercase());
    name_terms.dedup();

    SymbolTokens {
        name_terms,
        path_terms,
        abbrev: abbreviation(member_name),
        name_exact: member_name.to_lowercase(),
    }
}

fn split_fqn(fqn: &str) -> (Vec<&str>, &str) {
    let mut segments: Vec<&str> = fqn.split('.').collect();
    let simple = segments.pop().unwrap_or(fqn);
    (segments, simple)
}

/// Split an identifier at CamelCase hump boundaries, lowercasing the parts.
///
/// Acronym runs stay together until a lowercase letter follows:
/// `HTTPServer` -> `http`, `server`. `_` and `$` are hard separators.
pub(crate) fn camel_splits(identifier: &str) -> Vec<String> {
    let chars: Vec<char> = identifier.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '$' {
            flush(&mut parts, &mut current);
            continue;
        }
        if !current.is_empty() {
            let prev = chars[i - 1];
            let acronym_end = prev.is_uppercase()
                && c.is_uppercase()
                && chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if ((prev.is_lowercase() || prev.is_numeric()) && c.is_uppercase()) || acronym_end {
                flush(&mut parts, &mut current);
            }
        }
        current.push(c);
    }
    flush(&mut parts, &mut current);
    parts
}

fn flush(parts: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        parts.push(current.to_lowercase());
        current.clear();
    }
}

/// Leading-letters abbreviation of the CamelCase humps.
pub(crate) fn abbreviation(identifier: &str) -> String {
    camel_splits(identifier)
        .iter()
        .filter_map(|part| part.chars().next())
        .collect()
}

/// Split a user query on whitespace and dots into lowercase tokens.
pub(crate) fn query_tokens(query: &str) -> Vec<String> {
    query
        .split(|c: char| c.is_whitespace() || c == '.')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
