//! Configuration for the search and index subsystem.
//!
//! Layered settings: defaults, then a TOML file, then environment variables.
//! Environment variables use the `CLASSDEX_` prefix with double underscores
//! separating nested levels, e.g. `CLASSDEX_INDEXING__PARALLEL_THREADS=8`.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Persisted-state layout version. Bumping it abandons the old directories.
const STATE_VERSION: &str = "1.0";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Writable directory holding the text index and database directories.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Platform standard library archive, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_lib: Option<PathBuf>,

    /// Modules whose compiled output is indexed, keyed by module name.
    #[serde(default)]
    pub modules: HashMap<String, ModuleConfig>,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ModuleConfig {
    /// Class-output directories, walked recursively for `.class` files.
    #[serde(default)]
    pub target_dirs: Vec<PathBuf>,

    #[serde(default)]
    pub test_target_dirs: Vec<PathBuf>,

    /// Compile-time dependency archives.
    #[serde(default)]
    pub compile_jars: Vec<PathBuf>,

    #[serde(default)]
    pub test_jars: Vec<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Size of the dedicated worker pool.
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Files per delete batch during refresh.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level filter, e.g. "warn".
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".classdex")
}
fn default_parallel_threads() -> usize {
    num_cpus::get()
}
fn default_batch_size() -> usize {
    100
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            modules: HashMap::new(),
            java_lib: None,
            indexing: IndexingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from defaults, `classdex.toml` in the working
    /// directory, and `CLASSDEX_`-prefixed environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from("classdex.toml")
    }

    /// Load configuration from a specific TOML file.
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(
                Env::prefixed("CLASSDEX_")
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
    }

    /// Save the current configuration as pretty TOML.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, rendered)
    }

    /// Directory holding the full-text index segment files.
    pub fn index_path(&self) -> PathBuf {
        self.cache_dir.join(format!("index-{STATE_VERSION}"))
    }

    /// Directory holding the relational database files.
    pub fn database_path(&self) -> PathBuf {
        self.cache_dir.join(format!("sql-{STATE_VERSION}"))
    }

    /// All class-output directories across modules.
    pub fn target_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for module in self.modules.values() {
            dirs.extend(module.target_dirs.iter().cloned());
            dirs.extend(module.test_target_dirs.iter().cloned());
        }
        dirs
    }

    /// All dependency archives across modules, deduplicated, plus the
    /// platform library when configured.
    pub fn all_archives(&self) -> Vec<PathBuf> {
        let mut seen = std::collections::HashSet::new();
        let mut jars = Vec::new();
        let module_jars = self
            .modules
            .values()
            .flat_map(|m| m.compile_jars.iter().chain(m.test_jars.iter()));
        for jar in module_jars.chain(self.java_lib.iter()) {
            if seen.insert(jar.clone()) {
                jars.push(jar.clone());
            }
        }
        jars
    }
}
