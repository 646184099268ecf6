//! The search service: the facade the host server talks to.
//!
//! Owns both stores and the worker pool, sequences refreshes, answers
//! queries, and applies single-file change events. Queries never wait for
//! refresh quiescence; they observe whatever is committed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::archive::{self, FileObject, file_uri};
use crate::config::Settings;
use crate::error::IndexResult;
use crate::extract::{SourceResolver, SymbolExtractor};
use crate::indexing::refresh::{self, IndexTarget, RefreshJob, RefreshPlan};
use crate::storage::{SymbolDatabase, TextIndex};
use crate::types::{FileCheck, FqnKey, FqnSymbol};

/// Search and index facade over the relational store and the text index.
///
/// Cheap to clone; clones share the same stores and pool.
#[derive(Clone)]
pub struct SearchService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    settings: Settings,
    db: SymbolDatabase,
    index: TextIndex,
    extractor: SymbolExtractor,
    pool: rayon::ThreadPool,
}

impl SearchService {
    /// Open (or create) the persistent state under the configured cache
    /// directory.
    pub fn new(settings: Settings, resolver: Arc<dyn SourceResolver>) -> IndexResult<Self> {
        let db = SymbolDatabase::open(&settings.database_path())?;
        let index = TextIndex::open(settings.index_path())?;
        let pool = crate::indexing::build_pool(settings.indexing.parallel_threads)?;
        Ok(Self {
            inner: Arc::new(ServiceInner {
                settings,
                db,
                index,
                extractor: SymbolExtractor::new(resolver),
                pool,
            }),
        })
    }

    /// Reconcile the stores with the filesystem.
    ///
    /// Phase 1 (classification) runs synchronously on the calling thread;
    /// deletions and insertions run on the worker pool. The returned handle
    /// resolves with `(deleted, indexed)` counts.
    pub fn refresh(&self) -> RefreshJob {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        match refresh::compute_plan(&self.inner.db, &self.inner.settings) {
            Err(e) => {
                let _ = sender.send(Err(e));
            }
            Ok(plan) => {
                info!(
                    "refresh: {} stale, {} to index",
                    plan.stale.len(),
                    plan.to_index.len()
                );
                let inner = Arc::clone(&self.inner);
                std::thread::spawn(move || {
                    let _ = sender.send(inner.run_refresh(plan));
                });
            }
        }
        RefreshJob::new(receiver)
    }

    /// Ranked class search by free-form query.
    pub fn search_classes(&self, query: &str, max: usize) -> IndexResult<Vec<FqnSymbol>> {
        let keys = self.inner.index.search_classes(query, max)?;
        self.inner.hydrate(keys)
    }

    /// Ranked search across classes and methods. The query splits on
    /// whitespace into terms that must all match.
    pub fn search_classes_fields_methods(
        &self,
        query: &str,
        max: usize,
    ) -> IndexResult<Vec<FqnSymbol>> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_string).collect();
        let keys = self.inner.index.search_classes_methods(&terms, max)?;
        self.inner.hydrate(keys)
    }

    /// Exact lookup by fully qualified name.
    pub fn find_unique(&self, fqn: &str) -> IndexResult<Option<FqnSymbol>> {
        Ok(self.inner.db.find(fqn)?)
    }

    /// A class file appeared. Extraction and persistence run on the pool.
    pub fn on_classfile_added(&self, path: PathBuf) {
        let inner = Arc::clone(&self.inner);
        self.inner.pool.spawn(move || inner.handle_added(&path));
    }

    /// A class file vanished.
    pub fn on_classfile_removed(&self, path: PathBuf) {
        let inner = Arc::clone(&self.inner);
        self.inner.pool.spawn(move || inner.handle_removed(&path));
    }

    /// A class file changed in place: remove, then re-extract.
    pub fn on_classfile_changed(&self, path: PathBuf) {
        let inner = Arc::clone(&self.inner);
        self.inner.pool.spawn(move || inner.handle_changed(&path));
    }

    /// Number of symbol records in the relational store.
    pub fn symbol_count(&self) -> IndexResult<usize> {
        Ok(self.inner.db.symbol_count()?)
    }

    /// Number of fingerprinted files.
    pub fn indexed_file_count(&self) -> IndexResult<usize> {
        Ok(self.inner.db.file_count()?)
    }
}

impl ServiceInner {
    fn run_refresh(&self, plan: RefreshPlan) -> IndexResult<(usize, usize)> {
        let counts = (plan.stale.len(), plan.to_index.len());
        let batch_size = self.settings.indexing.batch_size.max(1);

        self.index.start_batch()?;

        // Every delete job linearizes before every index job; a file that is
        // simultaneously stale and re-indexed would otherwise race the unique
        // constraint.
        self.pool.install(|| {
            plan.stale
                .par_chunks(batch_size)
                .for_each(|chunk| self.delete_batch(chunk));
        });
        self.pool.install(|| {
            plan.to_index.par_iter().for_each(|target| {
                if let Err(e) = self.index_target(target) {
                    warn!("index job failed for {}: {}", target.uri(), e);
                }
            });
        });

        self.index.commit()?;
        Ok(counts)
    }

    fn delete_batch(&self, container_uris: &[String]) {
        if let Err(e) = self.index.remove(container_uris) {
            warn!("text-index delete batch failed: {e}");
        }
        if let Err(e) = self.db.remove_files(container_uris) {
            warn!("database delete batch failed: {e}");
        }
    }

    /// Index one loose class file or one archive. The fingerprint is written
    /// only after the file was read successfully, so an unreadable file is
    /// retried on the next refresh.
    fn index_target(&self, target: &IndexTarget) -> IndexResult<()> {
        match target {
            IndexTarget::ClassFile(path) => {
                let object = FileObject::loose(path.clone());
                let timestamp = object.last_modified()?;
                let bytes = object.read_bytes()?;
                let symbols = self.extract_or_empty(&object, &object, &bytes);
                self.persist_both(FileCheck::new(object.uri(), timestamp), &symbols)
            }
            IndexTarget::Archive(path) => {
                let timestamp = archive::last_modified_millis(path)?;
                let container = FileObject::loose(path.clone());
                let mut symbols = Vec::new();
                archive::walk_class_entries(path, |entry, bytes| {
                    symbols.extend(self.extract_or_empty(&container, &entry, &bytes));
                })?;
                self.persist_both(FileCheck::new(container.uri(), timestamp), &symbols)
            }
        }
    }

    /// A malformed class contributes no symbols but does not fail the file.
    fn extract_or_empty(
        &self,
        container: &FileObject,
        entry: &FileObject,
        bytes: &[u8],
    ) -> Vec<FqnSymbol> {
        match self.extractor.extract(container, entry, bytes) {
            Ok(symbols) => symbols,
            Err(e) => {
                debug!("skipping malformed class {}: {}", entry.uri(), e);
                Vec::new()
            }
        }
    }

    fn persist_both(&self, check: FileCheck, symbols: &[FqnSymbol]) -> IndexResult<()> {
        self.db.persist(&check, symbols)?;
        self.index.add(&check, symbols)?;
        Ok(())
    }

    fn handle_added(&self, path: &Path) {
        if let Err(e) = self.index_classfile(path) {
            warn!("failed to index added classfile {}: {}", path.display(), e);
        }
    }

    fn handle_removed(&self, path: &Path) {
        if let Err(e) = self.remove_classfile(path) {
            warn!("failed to de-index removed classfile {}: {}", path.display(), e);
        }
    }

    fn handle_changed(&self, path: &Path) {
        // Remove-before-insert within the file is the listener's half of the
        // unique-constraint coordination.
        if let Err(e) = self
            .remove_classfile(path)
            .and_then(|_| self.index_classfile(path))
        {
            warn!("failed to re-index changed classfile {}: {}", path.display(), e);
        }
    }

    fn index_classfile(&self, path: &Path) -> IndexResult<()> {
        self.index.start_batch()?;
        let result = self.index_target(&IndexTarget::ClassFile(path.to_path_buf()));
        self.index.commit()?;
        result
    }

    fn remove_classfile(&self, path: &Path) -> IndexResult<()> {
        let uris = vec![file_uri(path)];
        self.index.remove(&uris)?;
        self.db.remove_files(&uris)?;
        self.index.commit()?;
        Ok(())
    }

    fn hydrate(&self, keys: Vec<FqnKey>) -> IndexResult<Vec<FqnSymbol>> {
        let fqns: Vec<String> = keys.into_iter().map(|k| k.fqn).collect();
        Ok(self.db.find_many(&fqns)?)
    }
}
