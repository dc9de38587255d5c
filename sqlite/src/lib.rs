//! SQLite storage backend for man pages.
//!
//! This crate stores [`ManPage`](shell_explain_core::ManPage)s in normalized
//! SQLite tables, looks them up through scored alias mappings, and manages
//! the table lifecycle.
//!
//! # Architecture
//!
//! - **`schema`**: SQL generation with customizable table prefixes
//! - **`migration`**: Lifecycle operations (up/down/seed/refresh/status)
//! - **`convert`**: `ManPage` ↔ SQL row transformations
//! - **`query`**: Runtime page access ([`ManPageStore`], [`SharedStore`])
//!
//! # Quick start
//!
//! ```no_run
//! use shell_explain_sqlite::{ManPageStore, Migration};
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("manpages.db").unwrap();
//! let mut migration = Migration::new(conn, "mp_").unwrap();
//! migration.up().unwrap();
//! migration.seed("manpages/").unwrap();
//!
//! let conn = migration.into_connection();
//! let store = ManPageStore::new(&conn, "mp_").unwrap();
//! if let Some(found) = store.find_manpage("tar").unwrap() {
//!     println!("{} documents {} options", found.page.name, found.page.options.len());
//! }
//! ```
//!
//! # Table prefix customization
//!
//! All table and index names are prefixed with a configurable string,
//! allowing multiple isolated page sets within the same SQLite database.
//! Prefixes must contain only alphanumeric characters and underscores.

mod convert;
mod error;
mod migration;
mod query;
mod schema;

pub use convert::PageRef;
pub use error::{Result, SqliteError};
pub use migration::{Migration, MigrationStatus, SeedReport};
pub use query::{FoundPage, ManPageStore, SharedStore, VerifyReport};
pub use schema::{generate_drop_sql, generate_schema_sql};
