//! Migration lifecycle operations for the SQLite tables.
//!
//! Provides [`Migration`] for creating, dropping, seeding, and refreshing
//! the normalized table structure. All mutation operations use transactions
//! to ensure atomicity.
//!
//! # Example
//!
//! ```no_run
//! use shell_explain_sqlite::Migration;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("manpages.db").unwrap();
//! let mut migration = Migration::new(conn, "mp_").unwrap();
//!
//! migration.up().unwrap();
//! migration.seed("manpages/").unwrap();
//! assert!(migration.status().unwrap().tables_exist);
//!
//! // Drop and recreate
//! migration.refresh("manpages/").unwrap();
//! ```

use std::path::Path;

use rusqlite::Connection;
use shell_explain_db::ManPageDatabase;
use tracing::info;

use crate::convert::{self, InsertCounts};
use crate::error::{Result, SqliteError};
use crate::schema::{generate_drop_sql, generate_schema_sql, validate_prefix};

/// Manages the lifecycle of the SQLite tables.
///
/// # Examples
///
/// ```no_run
/// use shell_explain_sqlite::Migration;
/// use rusqlite::Connection;
///
/// let conn = Connection::open("manpages.db").unwrap();
/// let mut migration = Migration::new(conn, "mp_").unwrap();
/// migration.up().unwrap();
///
/// let report = migration.seed("manpages/").unwrap();
/// println!("Inserted {} pages, {} options",
///     report.pages_inserted, report.options_inserted);
/// ```
pub struct Migration {
    conn: Connection,
    prefix: String,
}

impl Migration {
    /// Creates a new migration manager for the given connection and table prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix contains invalid characters.
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, prefix })
    }

    /// Creates all tables and indexes.
    ///
    /// Uses `CREATE TABLE IF NOT EXISTS` so it is safe to call multiple times.
    pub fn up(&mut self) -> Result<()> {
        let sql = generate_schema_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to create tables: {e}")))?;
        tx.commit()?;
        info!(prefix = %self.prefix, "created man page tables");
        Ok(())
    }

    /// Drops all tables in reverse dependency order.
    pub fn down(&mut self) -> Result<()> {
        let sql = generate_drop_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to drop tables: {e}")))?;
        tx.commit()?;
        info!(prefix = %self.prefix, "dropped man page tables");
        Ok(())
    }

    /// Returns whether the tables exist and the row count of each.
    pub fn status(&self) -> Result<MigrationStatus> {
        if !self.tables_exist()? {
            return Ok(MigrationStatus::default());
        }

        Ok(MigrationStatus {
            tables_exist: true,
            manpage_count: self.count_rows("manpages")?,
            option_count: self.count_rows("options")?,
            argument_count: self.count_rows("arguments")?,
            mapping_count: self.count_rows("mappings")?,
        })
    }

    /// Seeds the tables from a directory of JSON page files.
    ///
    /// Pages are loaded with [`ManPageDatabase::from_dir`] and inserted in a
    /// single transaction. A page whose source is already stored replaces the
    /// old row together with its mappings.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::LoaderError`] if the directory cannot be read,
    /// or [`SqliteError::DatabaseError`] if insertion fails.
    pub fn seed(&mut self, source_dir: impl AsRef<Path>) -> Result<SeedReport> {
        let db = ManPageDatabase::from_dir(source_dir)?;
        let mut pages: Vec<_> = db.pages().collect();
        pages.sort_by(|a, b| a.source.cmp(&b.source));

        let tx = self.conn.transaction()?;
        let mut report = SeedReport::default();

        for page in pages {
            if let Some(id) = convert::find_id_by_source(&tx, &self.prefix, &page.source)? {
                convert::delete_manpage(&tx, &self.prefix, id)?;
                report.pages_replaced += 1;
            }
            let (_, counts) = convert::insert_manpage(&tx, &self.prefix, page)?;
            report.pages_inserted += 1;
            report.merge_counts(&counts);
        }

        tx.commit()?;
        info!(
            pages = report.pages_inserted,
            replaced = report.pages_replaced,
            "seeded man page tables"
        );
        Ok(report)
    }

    /// Drops all tables, recreates them, and seeds from the given directory.
    pub fn refresh(&mut self, source_dir: impl AsRef<Path>) -> Result<SeedReport> {
        self.down()?;
        self.up()?;
        self.seed(source_dir)
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the migration and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn tables_exist(&self) -> Result<bool> {
        let table_name = format!("{}manpages", self.prefix);
        let mut stmt = self
            .conn
            .prepare("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1")?;
        let count: i64 = stmt.query_row([&table_name], |row| row.get(0))?;
        Ok(count > 0)
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let full_table = format!("{}{}", self.prefix, table);
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT COUNT(*) FROM {full_table}"))?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Snapshot of the migration state, returned by [`Migration::status`].
#[derive(Debug, Clone, Default)]
pub struct MigrationStatus {
    /// Whether the tables exist in the database.
    pub tables_exist: bool,
    pub manpage_count: usize,
    pub option_count: usize,
    pub argument_count: usize,
    pub mapping_count: usize,
}

/// Rows inserted by [`Migration::seed`] and [`Migration::refresh`].
#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    pub pages_inserted: usize,
    /// Pages that replaced an existing row with the same source.
    pub pages_replaced: usize,
    pub options_inserted: usize,
    pub spellings_inserted: usize,
    pub arguments_inserted: usize,
    pub sections_inserted: usize,
    pub mappings_inserted: usize,
}

impl SeedReport {
    fn merge_counts(&mut self, counts: &InsertCounts) {
        self.options_inserted += counts.options;
        self.spellings_inserted += counts.spellings;
        self.arguments_inserted += counts.arguments;
        self.sections_inserted += counts.sections;
        self.mappings_inserted += counts.mappings;
    }
}
