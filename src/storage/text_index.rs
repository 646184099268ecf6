//! Tantivy-based full-text index over symbol names.
//!
//! Two document shapes share one schema: *class* documents and *member*
//! documents (public methods only; fields live solely in the relational
//! store). Name material is pre-tokenized into segment, CamelCase, and
//! abbreviation terms; queries match each token as a case-insensitive prefix
//! and rank simple-name hits above package hits, with abbreviation matches at
//! the lowest tier.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tantivy::{
    Index, IndexReader, IndexSettings, IndexWriter, ReloadPolicy, TantivyDocument as Document,
    Term,
    collector::TopDocs,
    directory::MmapDirectory,
    query::{BooleanQuery, BoostQuery, Occur, Query, RegexQuery, TermQuery},
    schema::{
        Field, IndexRecordOption, STORED, STRING, Schema, SchemaBuilder, TextFieldIndexing,
        TextOptions, Value,
    },
    tokenizer::{LowerCaser, TextAnalyzer, WhitespaceTokenizer},
};

use crate::error::{IndexError, IndexResult};
use crate::storage::tokenize::{self, SymbolTokens};
use crate::types::{FileCheck, FqnKey, FqnSymbol, SymbolKind};

const SYMBOL_TOKENIZER: &str = "symbol";

const KIND_CLASS: &str = "class";
const KIND_METHOD: &str = "method";

/// Boost tiers, strongest first: exact simple name, simple-name token,
/// package segment, abbreviation.
const BOOST_NAME_EXACT: f32 = 8.0;
const BOOST_NAME_TERM: f32 = 4.0;
const BOOST_PATH_TERM: f32 = 1.5;
const BOOST_ABBREV: f32 = 0.75;

/// Schema fields for the symbol index.
#[derive(Debug)]
struct SymbolSchema {
    doc_kind: Field,
    fqn: Field,
    descriptor: Field,
    container: Field,
    name_terms: Field,
    path_terms: Field,
    abbrev: Field,
    name_exact: Field,
}

impl SymbolSchema {
    fn build() -> (Schema, SymbolSchema) {
        let mut builder = SchemaBuilder::default();

        let term_options = TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(SYMBOL_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );

        let doc_kind = builder.add_text_field("doc_kind", STRING);
        let fqn = builder.add_text_field("fqn", STRING | STORED);
        let descriptor = builder.add_text_field("descriptor", STRING | STORED);
        let container = builder.add_text_field("container", STRING);
        let name_terms = builder.add_text_field("name_terms", term_options.clone());
        let path_terms = builder.add_text_field("path_terms", term_options.clone());
        let abbrev = builder.add_text_field("abbrev", term_options);
        let name_exact = builder.add_text_field("name_exact", STRING);

        let schema = builder.build();
        (
            schema,
            SymbolSchema {
                doc_kind,
                fqn,
                descriptor,
                container,
                name_terms,
                path_terms,
                abbrev,
                name_exact,
            },
        )
    }
}

/// Full-text index over class and method names.
pub struct TextIndex {
    index: Index,
    reader: IndexReader,
    schema: SymbolSchema,
    index_path: PathBuf,
    writer: Mutex<Option<IndexWriter<Document>>>,
}

impl std::fmt::Debug for TextIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextIndex")
            .field("index_path", &self.index_path)
            .finish()
    }
}

impl TextIndex {
    /// Open or create the index under the given state directory.
    pub fn open(index_path: impl AsRef<Path>) -> IndexResult<Self> {
        let index_path = index_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&index_path)
            .map_err(|e| IndexError::text_index("create_dir", e))?;

        let (schema, symbol_schema) = SymbolSchema::build();
        let existing = index_path.join("meta.json").exists();
        let index = if existing {
            Index::open_in_dir(&index_path)?
        } else {
            let dir = MmapDirectory::open(&index_path)
                .map_err(|e| IndexError::text_index("open", e))?;
            Index::create(dir, schema, IndexSettings::default())?
        };

        let analyzer = TextAnalyzer::builder(WhitespaceTokenizer::default())
            .filter(LowerCaser)
            .build();
        index.tokenizers().register(SYMBOL_TOKENIZER, analyzer);

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        if existing {
            reader.reload()?;
        }

        Ok(Self {
            index,
            reader,
            schema: symbol_schema,
            index_path,
            writer: Mutex::new(None),
        })
    }

    /// Ensure the writer exists so the first parallel update does not pay
    /// for its construction.
    ///
    /// The writer is created lazily and lives for the rest of the process;
    /// updates queue on it until [`TextIndex::commit`].
    pub fn start_batch(&self) -> IndexResult<()> {
        let mut writer_lock = self.writer.lock();
        Self::writer_of(&self.index, &mut writer_lock)?;
        Ok(())
    }

    /// Add documents for one file's symbols, keyed by the fingerprint's
    /// container URI for later removal. Field records are skipped.
    pub fn add(&self, check: &FileCheck, symbols: &[FqnSymbol]) -> IndexResult<()> {
        let mut writer_lock = self.writer.lock();
        let writer = Self::writer_of(&self.index, &mut writer_lock)?;

        for symbol in symbols {
            let doc = match symbol.kind() {
                SymbolKind::Class => self.class_document(check, symbol),
                SymbolKind::Method => self.member_document(check, symbol),
                SymbolKind::Field => continue,
            };
            writer
                .add_document(doc)
                .map_err(|e| IndexError::text_index("add_document", e))?;
        }
        Ok(())
    }

    /// Queue deletion of every document whose container URI is in the set.
    ///
    /// Operations on the shared writer apply in submission order, so a
    /// removal queued before a re-add of the same file behaves correctly
    /// within a single commit.
    pub fn remove(&self, container_uris: &[String]) -> IndexResult<()> {
        let mut writer_lock = self.writer.lock();
        let writer = Self::writer_of(&self.index, &mut writer_lock)?;
        for uri in container_uris {
            writer.delete_term(Term::from_field_text(self.schema.container, uri));
        }
        Ok(())
    }

    /// Flush queued updates to disk and refresh the reader.
    ///
    /// The writer stays open: a bulk refresh and concurrent listener events
    /// share it, each committing at its own boundary.
    pub fn commit(&self) -> IndexResult<()> {
        let mut writer_lock = self.writer.lock();
        if let Some(writer) = writer_lock.as_mut() {
            writer.commit().map_err(IndexError::from)?;
            self.reader.reload()?;
        }
        Ok(())
    }

    fn writer_of<'a>(
        index: &Index,
        slot: &'a mut Option<IndexWriter<Document>>,
    ) -> IndexResult<&'a mut IndexWriter<Document>> {
        if slot.is_none() {
            *slot = Some(index.writer::<Document>(100_000_000)?);
        }
        slot.as_mut()
            .ok_or_else(|| IndexError::text_index("writer", "writer unavailable"))
    }

    /// Ranked class search.
    pub fn search_classes(&self, query: &str, max: usize) -> IndexResult<Vec<FqnKey>> {
        let tokens = tokenize::query_tokens(query);
        if tokens.is_empty() || max == 0 {
            return Ok(Vec::new());
        }
        let query = self.build_query(&tokens, Some(KIND_CLASS))?;
        self.run(query, max)
    }

    /// Ranked search across class and method documents; every query string
    /// must match the document (conjunction).
    pub fn search_classes_methods(&self, queries: &[String], max: usize) -> IndexResult<Vec<FqnKey>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for query in queries {
            let tokens = tokenize::query_tokens(query);
            if tokens.is_empty() {
                continue;
            }
            clauses.push((Occur::Must, self.build_query(&tokens, None)?));
        }
        if clauses.is_empty() || max == 0 {
            return Ok(Vec::new());
        }
        self.run(Box::new(BooleanQuery::new(clauses)), max)
    }

    /// Total number of indexed documents.
    pub fn document_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    fn class_document(&self, check: &FileCheck, symbol: &FqnSymbol) -> Document {
        let tokens = tokenize::class_tokens(&symbol.fqn);
        self.symbol_document(check, symbol, KIND_CLASS, &tokens)
    }

    fn member_document(&self, check: &FileCheck, symbol: &FqnSymbol) -> Document {
        let (class_fqn, member_name) = match symbol.fqn.rsplit_once('.') {
            Some((class_fqn, member_name)) => (class_fqn, member_name),
            None => ("", symbol.fqn.as_str()),
        };
        let tokens = tokenize::member_tokens(class_fqn, member_name);
        self.symbol_document(check, symbol, KIND_METHOD, &tokens)
    }

    fn symbol_document(
        &self,
        check: &FileCheck,
        symbol: &FqnSymbol,
        kind: &str,
        tokens: &SymbolTokens,
    ) -> Document {
        let mut doc = Document::new();
        doc.add_text(self.schema.doc_kind, kind);
        doc.add_text(self.schema.fqn, &symbol.fqn);
        if let Some(descriptor) = &symbol.descriptor {
            doc.add_text(self.schema.descriptor, descriptor);
        }
        doc.add_text(self.schema.container, &check.filename);
        doc.add_text(self.schema.name_terms, tokens.name_terms.join(" "));
        doc.add_text(self.schema.path_terms, tokens.path_terms.join(" "));
        doc.add_text(self.schema.abbrev, &tokens.abbrev);
        doc.add_text(self.schema.name_exact, &tokens.name_exact);
        doc
    }

    /// Assemble the boolean query for one set of tokens: every token must
    /// match some tier, exact simple-name hits add score on top.
    fn build_query(
        &self,
        tokens: &[String],
        kind_filter: Option<&str>,
    ) -> IndexResult<Box<dyn Query>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if let Some(kind) = kind_filter {
            let term = Term::from_field_text(self.schema.doc_kind, kind);
            clauses.push((
                Occur::Must,
                Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
            ));
        }

        for token in tokens {
            clauses.push((Occur::Must, self.token_clause(token)?));

            let exact = TermQuery::new(
                Term::from_field_text(self.schema.name_exact, token),
                IndexRecordOption::Basic,
            );
            clauses.push((
                Occur::Should,
                Box::new(BoostQuery::new(Box::new(exact), BOOST_NAME_EXACT)),
            ));
        }

        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    /// One token matches as a prefix of a simple-name term, a package
    /// segment, or the abbreviation, in descending score tiers.
    fn token_clause(&self, token: &str) -> IndexResult<Box<dyn Query>> {
        let tiers = [
            (self.schema.name_terms, BOOST_NAME_TERM),
            (self.schema.path_terms, BOOST_PATH_TERM),
            (self.schema.abbrev, BOOST_ABBREV),
        ];
        let mut should: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(tiers.len());
        for (field, boost) in tiers {
            let prefix = RegexQuery::from_pattern(&format!("{}.*", regex::escape(token)), field)
                .map_err(|e| IndexError::text_index("prefix_query", e))?;
            should.push((
                Occur::Should,
                Box::new(BoostQuery::new(Box::new(prefix), boost)),
            ));
        }
        Ok(Box::new(BooleanQuery::new(should)))
    }

    fn run(&self, query: Box<dyn Query>, max: usize) -> IndexResult<Vec<FqnKey>> {
        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&*query, &TopDocs::with_limit(max))
            .map_err(IndexError::from)?;

        let mut keys = Vec::with_capacity(top_docs.len());
        for (_score, address) in top_docs {
            let doc: Document = searcher.doc(address).map_err(IndexError::from)?;
            let fqn = doc
                .get_first(self.schema.fqn)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let descriptor = doc
                .get_first(self.schema.descriptor)
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            keys.push(FqnKey {
                fqn,
                descriptor,
                internal: None,
            });
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populated_index() -> (TempDir, TextIndex) {
        let temp = TempDir::new().unwrap();
        let index = TextIndex::open(temp.path().join("index-1.0")).unwrap();
        index.start_batch().unwrap();

        let rpc_check = FileCheck::new("file:/out/RichPresentationCompiler.class", 1);
        index
            .add(
                &rpc_check,
                &[
                    FqnSymbol::class(
                        &rpc_check.filename,
                        &rpc_check.filename,
                        "org.ensime.core.RichPresentationCompiler",
                    ),
                    FqnSymbol::method(
                        &rpc_check.filename,
                        &rpc_check.filename,
                        "org.ensime.core.RichPresentationCompiler.askTypeAt",
                        "()V",
                    ),
                ],
            )
            .unwrap();

        let rt_check = FileCheck::new("file:/deps/rt.jar", 1);
        index
            .add(
                &rt_check,
                &[
                    FqnSymbol::class(&rt_check.filename, &rt_check.filename, "java.lang.String"),
                    FqnSymbol::class(
                        &rt_check.filename,
                        &rt_check.filename,
                        "java.lang.StringBuilder",
                    ),
                    FqnSymbol::class(&rt_check.filename, &rt_check.filename, "java.lang.Runtime"),
                    FqnSymbol::method(
                        &rt_check.filename,
                        &rt_check.filename,
                        "java.lang.Runtime.addShutdownHook",
                        "(Ljava/lang/Thread;)V",
                    ),
                    FqnSymbol::field(
                        &rt_check.filename,
                        &rt_check.filename,
                        "java.awt.Point.x",
                        "java/awt/Point",
                    ),
                ],
            )
            .unwrap();

        index.commit().unwrap();
        (temp, index)
    }

    fn fqns(keys: &[FqnKey]) -> Vec<&str> {
        keys.iter().map(|k| k.fqn.as_str()).collect()
    }

    #[test]
    fn exact_fqn_query_finds_class() {
        let (_temp, index) = populated_index();
        let keys = index.search_classes("java.lang.String", 10).unwrap();
        assert!(keys.len() <= 10);
        assert!(fqns(&keys).contains(&"java.lang.String"));
        // Exact simple-name match outranks the prefix-only sibling.
        assert_eq!(keys[0].fqn, "java.lang.String");
    }

    #[test]
    fn abbreviation_matches_camel_case_initials() {
        let (_temp, index) = populated_index();
        let keys = index.search_classes("RPC", 10).unwrap();
        assert!(fqns(&keys).contains(&"org.ensime.core.RichPresentationCompiler"));
    }

    #[test]
    fn dotted_abbreviation_with_spaces() {
        let (_temp, index) = populated_index();
        let keys = index.search_classes("o e c Rich", 10).unwrap();
        assert_eq!(fqns(&keys), vec!["org.ensime.core.RichPresentationCompiler"]);
    }

    #[test]
    fn method_search_is_a_conjunction() {
        let (_temp, index) = populated_index();
        let keys = index
            .search_classes_methods(&["addShutdownHook".to_string()], 10)
            .unwrap();
        assert!(fqns(&keys).contains(&"java.lang.Runtime.addShutdownHook"));
        assert_eq!(keys[0].descriptor.as_deref(), Some("(Ljava/lang/Thread;)V"));

        let none = index
            .search_classes_methods(&["addShutdownHook".to_string(), "zzz".to_string()], 10)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn fields_are_not_searchable() {
        let (_temp, index) = populated_index();
        let keys = index
            .search_classes_methods(&["java.awt.Point.x".to_string()], 1)
            .unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn class_search_excludes_member_documents() {
        let (_temp, index) = populated_index();
        let keys = index.search_classes("addShutdownHook", 10).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn remove_deletes_by_container() {
        let (_temp, index) = populated_index();
        index
            .remove(&["file:/out/RichPresentationCompiler.class".to_string()])
            .unwrap();
        index.commit().unwrap();

        assert!(index.search_classes("RPC", 10).unwrap().is_empty());
        // The other container is untouched.
        assert!(!index.search_classes("Runtime", 10).unwrap().is_empty());
    }

    #[test]
    fn batched_updates_are_invisible_until_commit() {
        let temp = TempDir::new().unwrap();
        let index = TextIndex::open(temp.path().join("index-1.0")).unwrap();
        index.start_batch().unwrap();

        let check = FileCheck::new("file:/out/A.class", 1);
        index
            .add(&check, &[FqnSymbol::class(&check.filename, &check.filename, "com.acme.Alpha")])
            .unwrap();
        assert!(index.search_classes("Alpha", 10).unwrap().is_empty());

        index.commit().unwrap();
        assert_eq!(index.search_classes("Alpha", 10).unwrap().len(), 1);
        assert_eq!(index.document_count(), 1);
    }

    #[test]
    fn reopen_preserves_documents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index-1.0");
        {
            let index = TextIndex::open(&path).unwrap();
            index.start_batch().unwrap();
            let check = FileCheck::new("file:/out/A.class", 1);
            index
                .add(&check, &[FqnSymbol::class(&check.filename, &check.filename, "com.acme.Alpha")])
                .unwrap();
            index.commit().unwrap();
        }
        let reopened = TextIndex::open(&path).unwrap();
        assert_eq!(reopened.search_classes("Alpha", 10).unwrap().len(), 1);
    }
}
