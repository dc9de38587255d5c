//! Configuration for the explain tool.
//!
//! Defines the YAML-serializable configuration that selects the man page
//! store and the limits applied to every explained command line. Missing
//! sections fall back to their defaults.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! store:
//!   directory: /usr/share/shell-explain/manpages
//!   bundle: /usr/share/shell-explain/manpages.json.gz
//!   sqlite: /var/lib/shell-explain/manpages.db
//!   prefix: mp_
//! limits:
//!   max_command_length: 1000
//!   max_nesting_depth: 32
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loader::DatabaseBuilder;

/// Where man pages are read from.
///
/// When `sqlite` is set it takes precedence; otherwise `directory` and
/// `bundle` form a fallback chain in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of `*.json` page files.
    pub directory: Option<PathBuf>,
    /// Bundle file, optionally gzipped.
    pub bundle: Option<PathBuf>,
    /// SQLite database file.
    pub sqlite: Option<PathBuf>,
    /// Table name prefix inside the SQLite database.
    pub prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: None,
            bundle: None,
            sqlite: None,
            prefix: "mp_".to_string(),
        }
    }
}

impl StoreConfig {
    /// Returns a builder over the file-based sources, in fallback order.
    pub fn database_builder(&self) -> DatabaseBuilder {
        let mut builder = DatabaseBuilder::new();
        if let Some(dir) = &self.directory {
            builder = builder.from_dir(dir);
        }
        if let Some(bundle) = &self.bundle {
            builder = builder.from_bundle(bundle);
        }
        builder
    }
}

/// Limits applied to every explained command line.
///
/// # Examples
///
/// ```
/// # use shell_explain_db::LimitsConfig;
/// let limits = LimitsConfig::default();
/// assert_eq!(limits.max_command_length, 1000);
/// assert_eq!(limits.max_nesting_depth, 32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Longer command lines are truncated.
    pub max_command_length: usize,
    /// Bound on group, substitution, and nested-command depth.
    pub max_nesting_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_command_length: 1000,
            max_nesting_depth: 32,
        }
    }
}

/// Top-level configuration.
///
/// # Examples
///
/// ```no_run
/// use shell_explain_db::ExplainConfig;
///
/// let config = ExplainConfig::load("explain.yml").unwrap();
/// let db = config.store.database_builder().build().unwrap();
/// println!("{} pages", db.len());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    pub store: StoreConfig,
    pub limits: LimitsConfig,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            store: StoreConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl ExplainConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::DatabaseError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::DatabaseError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}
