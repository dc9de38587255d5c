//! In-memory man page database and tool configuration.
//!
//! This crate loads [`ManPage`](shell_explain_core::ManPage)s from a
//! directory of JSON files or from a (gzipped) bundle, indexes them by name,
//! section, and alias, and serves them through
//! [`ManPageLookup`](shell_explain_core::ManPageLookup).
//!
//! # Quick start
//!
//! ```no_run
//! use shell_explain_db::{ExplainConfig, ManPageDatabase};
//!
//! // Load pages from a directory
//! let db = ManPageDatabase::from_dir("manpages/").unwrap();
//! if let Some(page) = db.find("ls") {
//!     println!("ls documents {} options", page.options.len());
//! }
//!
//! // Or from whatever the configuration names
//! let config = ExplainConfig::load("explain.yml").unwrap();
//! let db = config.store.database_builder().build().unwrap();
//! ```

mod config;
mod error;
mod loader;

pub use config::{ExplainConfig, LimitsConfig, StoreConfig};
pub use error::{DatabaseError, Result};
pub use loader::{DatabaseBuilder, DatabaseSource, ManPageDatabase};
