//! SQL schema generation with customizable table prefixes.
//!
//! Generates normalized `CREATE TABLE` and `CREATE INDEX` statements for
//! storing man pages in SQLite. All table names are prefixed with a
//! configurable string to allow multiple isolated page sets in the same
//! database.
//!
//! # Table structure
//!
//! - `{prefix}manpages`: one row per page, unique by `source`
//! - `{prefix}options`: documented options, ordered by `position`
//! - `{prefix}spellings`: every short and long spelling of an option
//! - `{prefix}arguments`: documented positionals, ordered by `position`
//! - `{prefix}sections`: free-text sections
//! - `{prefix}mappings`: `src` name → `dst` page id with a score
//!
//! `mappings.dst` has no foreign key. Dangling mappings are reported by
//! [`ManPageStore::verify`](crate::ManPageStore::verify).

use crate::error::{Result, SqliteError};

/// Validates that a table prefix contains only alphanumeric characters and underscores.
pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    if !prefix.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// Generates the complete SQL schema for all tables with the given prefix.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix contains characters
/// other than alphanumerics and underscores, or if it is empty.
pub fn generate_schema_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let sql = format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}manpages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    section TEXT NOT NULL DEFAULT '',
    source TEXT NOT NULL UNIQUE,
    synopsis TEXT,
    partial_match INTEGER NOT NULL DEFAULT 0,
    multi_command INTEGER NOT NULL DEFAULT 0,
    nested_command INTEGER NOT NULL DEFAULT 0,
    updated INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS {prefix}options (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    manpage_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    expects_arg INTEGER NOT NULL DEFAULT 0,
    nested_command INTEGER NOT NULL DEFAULT 0,
    text TEXT NOT NULL,
    FOREIGN KEY (manpage_id) REFERENCES {prefix}manpages(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}spellings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    option_id INTEGER NOT NULL,
    spelling TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('short', 'long')),
    FOREIGN KEY (option_id) REFERENCES {prefix}options(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}arguments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    manpage_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    variadic INTEGER NOT NULL DEFAULT 0,
    nested_command INTEGER NOT NULL DEFAULT 0,
    text TEXT NOT NULL,
    FOREIGN KEY (manpage_id) REFERENCES {prefix}manpages(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}sections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    manpage_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    title TEXT NOT NULL,
    text TEXT NOT NULL,
    FOREIGN KEY (manpage_id) REFERENCES {prefix}manpages(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}mappings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    src TEXT NOT NULL,
    dst INTEGER NOT NULL,
    score INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_{prefix}manpages_name ON {prefix}manpages(name);
CREATE INDEX IF NOT EXISTS idx_{prefix}options_manpage ON {prefix}options(manpage_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}spellings_option ON {prefix}spellings(option_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}arguments_manpage ON {prefix}arguments(manpage_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}sections_manpage ON {prefix}sections(manpage_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}mappings_src ON {prefix}mappings(src);
CREATE INDEX IF NOT EXISTS idx_{prefix}mappings_dst ON {prefix}mappings(dst);
"#,
        prefix = prefix
    );

    Ok(sql)
}

/// Generates SQL to drop all tables in reverse dependency order.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
pub fn generate_drop_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let sql = format!(
        r#"
DROP TABLE IF EXISTS {prefix}mappings;
DROP TABLE IF EXISTS {prefix}sections;
DROP TABLE IF EXISTS {prefix}arguments;
DROP TABLE IF EXISTS {prefix}spellings;
DROP TABLE IF EXISTS {prefix}options;
DROP TABLE IF EXISTS {prefix}manpages;
"#,
        prefix = prefix
    );

    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_prefix() {
        assert!(validate_prefix("mp_").is_ok());
        assert!(validate_prefix("test123").is_ok());
        assert!(validate_prefix("A_B_C").is_ok());
    }

    #[test]
    fn test_invalid_prefix() {
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("drop;--").is_err());
        assert!(validate_prefix("hello world").is_err());
        assert!(validate_prefix("test-prefix").is_err());
    }

    #[test]
    fn test_generate_schema_sql_contains_tables() {
        let sql = generate_schema_sql("mp_").unwrap();
        for table in ["manpages", "options", "spellings", "arguments", "sections", "mappings"] {
            assert!(sql.contains(&format!("CREATE TABLE IF NOT EXISTS mp_{table}")));
            assert!(generate_drop_sql("mp_")
                .unwrap()
                .contains(&format!("DROP TABLE IF EXISTS mp_{table}")));
        }
        assert!(sql.contains("idx_mp_mappings_src"));
    }

    #[test]
    fn test_generate_drop_sql_invalid_prefix() {
        assert!(generate_drop_sql("").is_err());
    }

    #[test]
    fn test_spelling_kind_check_constraint() {
        let sql = generate_schema_sql("t_").unwrap();
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn.execute_batch(&sql).unwrap();

        conn.execute(
            "INSERT INTO t_manpages (name, section, source) VALUES ('ls', '1', 'ls.1.gz')",
            [],
        )
        .unwrap();
        let page_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO t_options (manpage_id, position, text) VALUES (?1, 0, 'all')",
            [page_id],
        )
        .unwrap();
        let option_id = conn.last_insert_rowid();

        assert!(conn
            .execute(
                "INSERT INTO t_spellings (option_id, spelling, kind) VALUES (?1, '-a', 'short')",
                [option_id],
            )
            .is_ok());
        assert!(conn
            .execute(
                "INSERT INTO t_spellings (option_id, spelling, kind) VALUES (?1, '-a', 'medium')",
                [option_id],
            )
            .is_err());
    }

    #[test]
    fn test_deleting_page_cascades_to_children() {
        let sql = generate_schema_sql("t_").unwrap();
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn.execute_batch(&sql).unwrap();

        conn.execute(
            "INSERT INTO t_manpages (name, section, source) VALUES ('ls', '1', 'ls.1.gz')",
            [],
        )
        .unwrap();
        let page_id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO t_sections (manpage_id, position, title, text) VALUES (?1, 0, 'NAME', 'ls')",
            [page_id],
        )
        .unwrap();

        conn.execute("DELETE FROM t_manpages WHERE id = ?1", [page_id])
            .unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM t_sections", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
