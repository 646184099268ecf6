//! Refresh planning: reconcile stored fingerprints with the filesystem.
//!
//! Phase 1 of a refresh runs here, synchronously on the calling thread: read
//! every known fingerprint, enumerate the configured bases, and classify each
//! file as stale, fresh, or unchanged. The resulting [`RefreshPlan`] drives
//! the asynchronous delete and index phases.

use std::collections::HashSet;
use std::path::PathBuf;

use crossbeam_channel::Receiver;
use tracing::debug;

use crate::archive::{file_uri, last_modified_millis, uri_to_path, walk_class_files};
use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::storage::SymbolDatabase;

/// One unit of indexing work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTarget {
    /// A loose `.class` file under a module output directory.
    ClassFile(PathBuf),
    /// A dependency archive indexed as a single fingerprinted unit.
    Archive(PathBuf),
}

impl IndexTarget {
    pub fn path(&self) -> &PathBuf {
        match self {
            IndexTarget::ClassFile(path) | IndexTarget::Archive(path) => path,
        }
    }

    pub fn uri(&self) -> String {
        file_uri(self.path())
    }
}

/// The outcome of phase 1: container URIs to delete and targets to index.
///
/// A file that changed on disk appears in both lists; the delete jobs are
/// required to finish before any index job starts.
#[derive(Debug, Default)]
pub struct RefreshPlan {
    pub stale: Vec<String>,
    pub to_index: Vec<IndexTarget>,
}

/// Classify everything the configuration covers against the stored state.
pub fn compute_plan(db: &SymbolDatabase, settings: &Settings) -> IndexResult<RefreshPlan> {
    let configured_archives: HashSet<String> = settings
        .all_archives()
        .iter()
        .map(|p| file_uri(p))
        .collect();

    let mut plan = RefreshPlan::default();

    for check in db.known_files().map_err(IndexError::from)? {
        let Some(path) = uri_to_path(&check.filename) else {
            continue;
        };
        if !path.exists() {
            plan.stale.push(check.filename);
            continue;
        }
        let disk = match last_modified_millis(&path) {
            Ok(millis) => millis,
            Err(_) => {
                // Vanished between the exists check and the stat.
                plan.stale.push(check.filename);
                continue;
            }
        };
        if check.changed_since(disk) {
            plan.stale.push(check.filename);
            continue;
        }
        let is_class_file = path.extension().and_then(|e| e.to_str()) == Some("class");
        if !is_class_file && !configured_archives.contains(&check.filename) {
            plan.stale.push(check.filename);
        }
    }

    for dir in settings.target_dirs() {
        for class_file in walk_class_files(&dir) {
            if let Some(target) = fresh_target(db, IndexTarget::ClassFile(class_file))? {
                plan.to_index.push(target);
            }
        }
    }
    for jar in settings.all_archives() {
        if !jar.exists() {
            debug!("configured archive missing on disk: {}", jar.display());
            continue;
        }
        if let Some(target) = fresh_target(db, IndexTarget::Archive(jar))? {
            plan.to_index.push(target);
        }
    }

    Ok(plan)
}

fn fresh_target(db: &SymbolDatabase, target: IndexTarget) -> IndexResult<Option<IndexTarget>> {
    let disk = match last_modified_millis(target.path()) {
        Ok(millis) => millis,
        Err(e) => {
            debug!("skipping unreadable base {}: {}", target.path().display(), e);
            return Ok(None);
        }
    };
    if db.out_of_date(&target.uri(), disk).map_err(IndexError::from)? {
        Ok(Some(target))
    } else {
        Ok(None)
    }
}

/// Handle to an in-flight refresh.
///
/// Dropping the handle does not stop the scheduled jobs; it only discards the
/// final counts.
#[derive(Debug)]
pub struct RefreshJob {
    receiver: Receiver<IndexResult<(usize, usize)>>,
}

impl RefreshJob {
    pub(crate) fn new(receiver: Receiver<IndexResult<(usize, usize)>>) -> Self {
        Self { receiver }
    }

    /// Block until the refresh completes, returning `(deleted, indexed)`.
    pub fn wait(self) -> IndexResult<(usize, usize)> {
        self.receiver.recv().map_err(|_| IndexError::Config {
            reason: "refresh worker dropped its result channel".to_string(),
        })?
    }
}
