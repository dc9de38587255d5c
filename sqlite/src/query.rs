//! Runtime man page access via SQLite queries.
//!
//! [`ManPageStore`] reads and writes pages in the normalized tables. Lookups
//! go through the `mappings` table: every alias of a page is a `src` name
//! pointing at the page with a score, and the highest score wins.
//! [`SharedStore`] wraps an owned connection behind a mutex so it can serve
//! as a [`ManPageLookup`] from several threads.
//!
//! # Example
//!
//! ```no_run
//! use shell_explain_core::ManPage;
//! use shell_explain_sqlite::ManPageStore;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("manpages.db").unwrap();
//! let store = ManPageStore::new(&conn, "mp_").unwrap();
//!
//! store.add_manpage(&ManPage::new("ls", "1")).unwrap();
//! let found = store.find_manpage("ls").unwrap().unwrap();
//! assert_eq!(found.page.name, "ls");
//! ```

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::{Connection, params};
use shell_explain_core::{LookupError, ManPage, ManPageLookup, split_section, validate_manpage};
use tracing::{debug, info, warn};

use crate::convert::{self, PageRef};
use crate::error::{Result, SqliteError};
use crate::schema::validate_prefix;

/// Result of [`ManPageStore::find_manpage`].
#[derive(Debug, Clone)]
pub struct FoundPage {
    /// The best-scoring page, fully loaded.
    pub page: ManPage,
    /// Other pages reachable under the same name, best first.
    pub suggestions: Vec<PageRef>,
}

/// Outcome of [`ManPageStore::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Pages no mapping points at, as `name(section)`.
    pub unreachable: Vec<String>,
    /// Mappings whose target page does not exist, as `(src, dst)`.
    pub dangling: Vec<(String, i64)>,
}

impl VerifyReport {
    /// Returns `true` if every page is reachable and every mapping resolves.
    pub fn is_ok(&self) -> bool {
        self.unreachable.is_empty() && self.dangling.is_empty()
    }
}

/// Query interface for reading and writing man pages in SQLite.
///
/// Mutations run in a transaction each.
///
/// # Examples
///
/// ```no_run
/// use shell_explain_core::ManPage;
/// use shell_explain_sqlite::ManPageStore;
/// use rusqlite::Connection;
///
/// let conn = Connection::open("manpages.db").unwrap();
/// let store = ManPageStore::new(&conn, "mp_").unwrap();
///
/// // `printf.3` selects section 3 when both printf(1) and printf(3) exist
/// if let Some(found) = store.find_manpage("printf.3").unwrap() {
///     println!("{} (see also: {:?})", found.page.name_section(), found.suggestions);
/// }
///
/// let report = store.verify().unwrap();
/// assert!(report.is_ok());
/// ```
pub struct ManPageStore<'a> {
    conn: &'a Connection,
    prefix: String,
}

impl<'a> ManPageStore<'a> {
    /// Creates a store over the given connection and table prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
    pub fn new(conn: &'a Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, prefix })
    }

    /// Adds a page, replacing any stored page with the same source together
    /// with its mappings. One mapping is inserted per alias.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPage`] if the page fails validation.
    pub fn add_manpage(&self, page: &ManPage) -> Result<i64> {
        check_page(page)?;
        let tx = self.conn.unchecked_transaction()?;

        if let Some(old) = convert::find_id_by_source(&tx, &self.prefix, &page.source)? {
            let removed = convert::delete_manpage(&tx, &self.prefix, old)?;
            info!(source = %page.source, id = old, mappings = removed, "removed old man page");
        }

        let (id, counts) = convert::insert_manpage(&tx, &self.prefix, page)?;
        for alias in &page.aliases {
            debug!(alias = %alias.name, page = %page.name, id, score = alias.score, "inserted mapping");
        }

        tx.commit()?;
        info!(page = %page.name_section(), id, options = counts.options, "added man page");
        Ok(id)
    }

    /// Replaces the content of the page stored under `page.source` and marks
    /// it updated. Aliases are only added for names that have no mapping yet.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::ManPageNotFound`] if no page has that source.
    pub fn update_manpage(&self, page: &ManPage) -> Result<()> {
        check_page(page)?;
        let tx = self.conn.unchecked_transaction()?;

        let id = convert::find_id_by_source(&tx, &self.prefix, &page.source)?
            .ok_or_else(|| SqliteError::ManPageNotFound(page.source.clone()))?;

        convert::update_manpage_row(&tx, &self.prefix, id, page)?;
        convert::delete_page_children(&tx, &self.prefix, id)?;
        convert::insert_page_children(&tx, &self.prefix, id, page)?;

        for alias in &page.aliases {
            if self.contains(&alias.name)? {
                debug!(alias = %alias.name, id, "mapping already exists");
            } else {
                convert::insert_mapping(&tx, &self.prefix, &alias.name, id, alias.score)?;
                debug!(alias = %alias.name, id, score = alias.score, "inserted mapping");
            }
        }

        tx.commit()?;
        info!(source = %page.source, id, "updated man page");
        Ok(())
    }

    /// Finds a page by name.
    ///
    /// A `.section` suffix (`printf.3`) restricts the result to that section;
    /// the whole dotted name is tried as a plain name when nothing matches.
    /// A name ending in `.gz` is looked up by exact source path. Returns the
    /// best-scoring page plus the others reachable under the same names.
    pub fn find_manpage(&self, name: &str) -> Result<Option<FoundPage>> {
        if name.ends_with(".gz") {
            let Some(id) = convert::find_id_by_source(self.conn, &self.prefix, name)? else {
                return Ok(None);
            };
            let page = convert::load_manpage(self.conn, &self.prefix, id)?;
            return Ok(page.map(|page| FoundPage {
                page,
                suggestions: Vec::new(),
            }));
        }

        let (program, section) = split_section(name);
        if let Some(found) = self.find_mapped(program, section)? {
            return Ok(Some(found));
        }
        if section.is_some() {
            return self.find_mapped(name, None);
        }
        Ok(None)
    }

    fn find_mapped(&self, src: &str, section: Option<&str>) -> Result<Option<FoundPage>> {
        debug!(src, ?section, "looking up man page in mappings");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT dst, MAX(score) AS best FROM {}mappings WHERE src = ?1 \
             GROUP BY dst ORDER BY best DESC, dst",
            self.prefix
        ))?;
        let dsts: Vec<i64> = stmt
            .query_map(params![src], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut candidates = Vec::with_capacity(dsts.len());
        for dst in dsts {
            match convert::load_page_ref(self.conn, &self.prefix, dst)? {
                Some(page) => candidates.push(page),
                None => warn!(src, dst, "mapping points at a missing man page"),
            }
        }

        if let Some(section) = section {
            // Stable: candidates within a section keep their score order.
            candidates.sort_by_key(|p| p.section != section);
            match candidates.first() {
                Some(best) if best.section == section => {
                    let extra = self.discover_suggestions(best.id, &candidates)?;
                    candidates.extend(extra);
                }
                _ => return Ok(None),
            }
        }

        if candidates.is_empty() {
            return Ok(None);
        }
        let best = candidates.remove(0);
        let page = convert::load_manpage(self.conn, &self.prefix, best.id)?;
        Ok(page.map(|page| FoundPage {
            page,
            suggestions: candidates,
        }))
    }

    /// Pages sharing any mapping source with page `id`, excluding `existing`.
    fn discover_suggestions(&self, id: i64, existing: &[PageRef]) -> Result<Vec<PageRef>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT b.dst FROM {p}mappings a JOIN {p}mappings b ON a.src = b.src \
             WHERE a.dst = ?1 ORDER BY b.dst",
            p = self.prefix
        ))?;
        let dsts: Vec<i64> = stmt
            .query_map(params![id], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut found = Vec::new();
        for dst in dsts {
            if existing.iter().any(|p| p.id == dst) {
                continue;
            }
            if let Some(page) = convert::load_page_ref(self.conn, &self.prefix, dst)? {
                found.push(page);
            }
        }
        Ok(found)
    }

    /// Returns the best page for `name`, without suggestions.
    pub fn get_manpage(&self, name: &str) -> Result<Option<ManPage>> {
        Ok(self.find_manpage(name)?.map(|found| found.page))
    }

    /// Deletes the page stored under `source` and every mapping to it.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::ManPageNotFound`] if no page has that source.
    pub fn delete_manpage(&self, source: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let id = convert::find_id_by_source(&tx, &self.prefix, source)?
            .ok_or_else(|| SqliteError::ManPageNotFound(source.to_string()))?;
        let removed = convert::delete_manpage(&tx, &self.prefix, id)?;
        tx.commit()?;
        info!(source, id, mappings = removed, "deleted man page");
        Ok(())
    }

    /// Returns `true` if some mapping has `name` as its source.
    pub fn contains(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}mappings WHERE src = ?1", self.prefix),
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Distinct page names, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT name FROM {}manpages ORDER BY name",
            self.prefix
        ))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Checks that every page is reachable through some mapping and that
    /// every mapping points at an existing page.
    pub fn verify(&self) -> Result<VerifyReport> {
        let p = &self.prefix;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT name, section FROM {p}manpages \
             WHERE id NOT IN (SELECT dst FROM {p}mappings) ORDER BY name, section"
        ))?;
        let unreachable = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let section: String = row.get(1)?;
                Ok(format!("{name}({section})"))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT src, dst FROM {p}mappings \
             WHERE dst NOT IN (SELECT id FROM {p}manpages) ORDER BY src, dst"
        ))?;
        let dangling = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if !unreachable.is_empty() {
            warn!(pages = ?unreachable, "man pages are unreachable (nothing maps to them)");
        }
        if !dangling.is_empty() {
            warn!(mappings = ?dangling, "mappings point at missing man pages");
        }

        Ok(VerifyReport {
            unreachable,
            dangling,
        })
    }

    /// Marks every page called `name` as having per-subcommand pages.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::ManPageNotFound`] if no page has that name.
    pub fn set_multi_command(&self, name: &str) -> Result<()> {
        let rows = self.conn.execute(
            &format!(
                "UPDATE {}manpages SET multi_command = 1 WHERE name = ?1",
                self.prefix
            ),
            params![name],
        )?;
        if rows == 0 {
            return Err(SqliteError::ManPageNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        self.conn
    }
}

fn check_page(page: &ManPage) -> Result<()> {
    match validate_manpage(page).into_iter().next() {
        Some(error) => Err(SqliteError::InvalidPage {
            page: page.name_section(),
            reason: error.to_string(),
        }),
        None => Ok(()),
    }
}

/// Owned connection usable as a [`ManPageLookup`] across threads.
///
/// # Examples
///
/// ```no_run
/// use shell_explain_core::ManPageLookup;
/// use shell_explain_sqlite::SharedStore;
///
/// let store = SharedStore::open("manpages.db", "mp_").unwrap();
/// let page = store.get_manpage("ls").unwrap();
/// ```
pub struct SharedStore {
    conn: Mutex<Connection>,
    prefix: String,
}

impl SharedStore {
    /// Wraps an open connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
            prefix,
        })
    }

    /// Opens the database file at `path`.
    pub fn open(path: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        Self::new(Connection::open(path)?, prefix)
    }

    /// Runs `f` with a [`ManPageStore`] over the locked connection.
    pub fn with_store<T>(&self, f: impl FnOnce(&ManPageStore<'_>) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let store = ManPageStore {
            conn: &*conn,
            prefix: self.prefix.clone(),
        };
        f(&store)
    }
}

impl ManPageLookup for SharedStore {
    fn get_manpage(&self, name: &str) -> std::result::Result<Option<ManPage>, LookupError> {
        self.with_store(|store| store.get_manpage(name))
            .map_err(|e| LookupError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::generate_schema_sql;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&generate_schema_sql("t_").unwrap()).unwrap();
        conn
    }

    #[test]
    fn test_store_validates_prefix() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(ManPageStore::new(&conn, "valid_").is_ok());
        assert!(ManPageStore::new(&conn, "").is_err());
    }

    #[test]
    fn test_add_rejects_invalid_page() {
        let conn = conn();
        let store = ManPageStore::new(&conn, "t_").unwrap();
        let err = store.add_manpage(&ManPage::new(" ", "1")).unwrap_err();
        assert!(matches!(err, SqliteError::InvalidPage { .. }));
    }

    #[test]
    fn test_section_suffix_falls_back_to_dotted_name() {
        let conn = conn();
        let store = ManPageStore::new(&conn, "t_").unwrap();
        store.add_manpage(&ManPage::new("python3.11", "1")).unwrap();

        let found = store.find_manpage("python3.11").unwrap().unwrap();
        assert_eq!(found.page.name, "python3.11");
    }

    #[test]
    fn test_lookup_by_source() {
        let conn = conn();
        let store = ManPageStore::new(&conn, "t_").unwrap();
        store.add_manpage(&ManPage::new("ls", "1")).unwrap();

        let found = store.find_manpage("ls.1.gz").unwrap().unwrap();
        assert_eq!(found.page.name, "ls");
        assert!(store.find_manpage("cp.1.gz").unwrap().is_none());
    }
}
