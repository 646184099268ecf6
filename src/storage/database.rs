//! Durable relational store for file fingerprints and symbol records.
//!
//! Two tables: `file_checks` (one fingerprint per on-disk file) and
//! `fqn_symbols` (one row per class/method/field). Every operation runs in
//! its own transaction, so a crash mid-refresh leaves a consistent prefix of
//! inserts committed and never a symbol row without its fingerprint.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::types::{FileCheck, FqnSymbol};

const DB_FILE: &str = "db.sqlite3";

/// Deletions are grouped to keep per-row overhead down.
const DELETE_BATCH: usize = 100;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS file_checks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL UNIQUE,
    timestamp INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS fqn_symbols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    container TEXT NOT NULL,
    entry TEXT NOT NULL,
    fqn TEXT NOT NULL,
    descriptor TEXT,
    internal TEXT,
    source TEXT,
    line INTEGER,
    offset INTEGER
);
CREATE INDEX IF NOT EXISTS idx_fqn_symbols_fqn ON fqn_symbols(fqn);
CREATE INDEX IF NOT EXISTS idx_fqn_symbols_container ON fqn_symbols(container);
CREATE UNIQUE INDEX IF NOT EXISTS idx_fqn_symbols_key
    ON fqn_symbols(fqn, coalesce(descriptor, ''), coalesce(internal, ''));
";

const SYMBOL_COLUMNS: &str = "id, container, entry, fqn, descriptor, internal, source, line, offset";

pub struct SymbolDatabase {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl std::fmt::Debug for SymbolDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolDatabase").field("path", &self.path).finish()
    }
}

impl SymbolDatabase {
    /// Open (or create) the database under the given state directory.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(dir).map_err(StoreError::Io)?;
        let path = dir.join(DB_FILE);
        let conn = Connection::open(&path)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// All stored fingerprints.
    pub fn known_files(&self) -> StoreResult<Vec<FileCheck>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, filename, timestamp FROM file_checks")?;
        let rows = stmt.query_map([], |row| {
            Ok(FileCheck {
                id: Some(row.get(0)?),
                filename: row.get(1)?,
                timestamp: row.get::<_, i64>(2)? as u64,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// True iff no fingerprint exists for `uri` or the stored timestamp is
    /// strictly older than `disk_timestamp`.
    pub fn out_of_date(&self, uri: &str, disk_timestamp: u64) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let stored: Option<i64> = conn
            .query_row(
                "SELECT timestamp FROM file_checks WHERE filename = ?1",
                params![uri],
                |row| row.get(0),
            )
            .optional()?;
        Ok(match stored {
            None => true,
            Some(ts) => (ts as u64) < disk_timestamp,
        })
    }

    /// Insert a fingerprint and its symbols in one transaction.
    ///
    /// A unique-constraint violation rolls the offending batch back, logs at
    /// warn, and reports zero rows; duplicate FQN triples occasionally arise
    /// from malformed inputs and must not abort a refresh. The fingerprint is
    /// rolled back with the batch, so the file is retried next refresh.
    pub fn persist(&self, check: &FileCheck, symbols: &[FqnSymbol]) -> StoreResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let result = (|| -> Result<usize, rusqlite::Error> {
            tx.execute(
                "INSERT INTO file_checks (filename, timestamp) VALUES (?1, ?2)",
                params![check.filename, check.timestamp as i64],
            )?;
            let mut stmt = tx.prepare(
                "INSERT INTO fqn_symbols
                 (container, entry, fqn, descriptor, internal, source, line, offset)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for sym in symbols {
                stmt.execute(params![
                    sym.container,
                    sym.entry,
                    sym.fqn,
                    sym.descriptor,
                    sym.internal,
                    sym.source,
                    sym.line,
                    sym.offset,
                ])?;
            }
            Ok(symbols.len())
        })();

        match result {
            Ok(count) => {
                tx.commit()?;
                debug!("persisted {} with {} symbols", check.filename, count);
                Ok(count)
            }
            Err(e) if is_constraint_violation(&e) => {
                warn!("duplicate symbol batch for {}: {}", check.filename, e);
                Ok(0)
            }
            Err(e) => Err(StoreError::Operational(e)),
        }
    }

    /// Delete every symbol row and fingerprint for the given container URIs.
    ///
    /// Deletions run in batches of at most 100 files, each batch in its own
    /// transaction. Returns the number of fingerprints removed.
    pub fn remove_files(&self, uris: &[String]) -> StoreResult<usize> {
        let mut removed = 0;
        for chunk in uris.chunks(DELETE_BATCH) {
            let mut conn = self.conn.lock();
            let tx = conn.transaction()?;
            let placeholders = vec!["?"; chunk.len()].join(",");
            tx.execute(
                &format!("DELETE FROM fqn_symbols WHERE container IN ({placeholders})"),
                params_from_iter(chunk.iter()),
            )?;
            removed += tx.execute(
                &format!("DELETE FROM file_checks WHERE filename IN ({placeholders})"),
                params_from_iter(chunk.iter()),
            )?;
            tx.commit()?;
        }
        Ok(removed)
    }

    /// Look up a symbol by exact FQN. Overloads collapse to the oldest row.
    pub fn find(&self, fqn: &str) -> StoreResult<Option<FqnSymbol>> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                &format!("SELECT {SYMBOL_COLUMNS} FROM fqn_symbols WHERE fqn = ?1 ORDER BY id LIMIT 1"),
                params![fqn],
                symbol_from_row,
            )
            .optional()?;
        Ok(found)
    }

    /// Look up many FQNs at once, preserving input order and returning at
    /// most one record per FQN; duplicate inputs collapse.
    pub fn find_many(&self, fqns: &[String]) -> StoreResult<Vec<FqnSymbol>> {
        let mut by_fqn: HashMap<String, FqnSymbol> = HashMap::new();
        {
            let conn = self.conn.lock();
            for chunk in fqns.chunks(DELETE_BATCH) {
                let placeholders = vec!["?"; chunk.len()].join(",");
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SYMBOL_COLUMNS} FROM fqn_symbols WHERE fqn IN ({placeholders}) ORDER BY id"
                ))?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), symbol_from_row)?;
                for row in rows {
                    let sym = row?;
                    by_fqn.entry(sym.fqn.clone()).or_insert(sym);
                }
            }
        }

        let mut seen = HashSet::new();
        Ok(fqns
            .iter()
            .filter(|fqn| seen.insert(fqn.as_str()))
            .filter_map(|fqn| by_fqn.remove(fqn))
            .collect())
    }

    pub fn symbol_count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT count(*) FROM fqn_symbols", [], |r| r.get(0))?;
        Ok(count as usize)
    }

    pub fn file_count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT count(*) FROM file_checks", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

fn symbol_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FqnSymbol> {
    Ok(FqnSymbol {
        id: Some(row.get(0)?),
        container: row.get(1)?,
        entry: row.get(2)?,
        fqn: row.get(3)?,
        descriptor: row.get(4)?,
        internal: row.get(5)?,
        source: row.get(6)?,
        line: row.get(7)?,
        offset: row.get(8)?,
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
