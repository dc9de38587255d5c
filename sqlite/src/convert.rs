//! Conversion between [`ManPage`] and SQLite rows.
//!
//! Inserts pages into the normalized table structure and reconstructs them
//! from queries. Option, argument, and section order survives the round trip
//! through their `position` columns; a page's aliases are rebuilt from the
//! mappings that point at it.
//!
//! These functions are used by [`Migration`](crate::Migration) and
//! [`ManPageStore`](crate::ManPageStore) inside their transactions.

use rusqlite::{Connection, OptionalExtension, params};
use shell_explain_core::{Alias, ManArgument, ManOption, ManPage, ManSection};

use crate::error::{Result, SqliteError};

/// Identity of a stored page without its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub id: i64,
    pub name: String,
    pub section: String,
    pub source: String,
}

impl PageRef {
    /// Formats as `name(section)`.
    pub fn name_section(&self) -> String {
        if self.section.is_empty() {
            self.name.clone()
        } else {
            format!("{}({})", self.name, self.section)
        }
    }
}

/// Counts of rows inserted during a conversion operation.
#[derive(Debug, Default)]
pub struct InsertCounts {
    pub options: usize,
    pub spellings: usize,
    pub arguments: usize,
    pub sections: usize,
    pub mappings: usize,
}

impl InsertCounts {
    /// Merges another set of counts into this one.
    pub fn merge(&mut self, other: &InsertCounts) {
        self.options += other.options;
        self.spellings += other.spellings;
        self.arguments += other.arguments;
        self.sections += other.sections;
        self.mappings += other.mappings;
    }
}

/// Inserts the page row and returns its ID.
pub fn insert_manpage_row(conn: &Connection, prefix: &str, page: &ManPage) -> Result<i64> {
    conn.execute(
        &format!(
            "INSERT INTO {prefix}manpages (name, section, source, synopsis, partial_match, multi_command, nested_command) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            page.name,
            page.section,
            page.source,
            page.synopsis,
            page.partial_match as i32,
            page.multi_command as i32,
            page.nested_command as i32,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrites the scalar columns of an existing page row and marks it updated.
pub fn update_manpage_row(conn: &Connection, prefix: &str, id: i64, page: &ManPage) -> Result<()> {
    conn.execute(
        &format!(
            "UPDATE {prefix}manpages SET name = ?1, section = ?2, synopsis = ?3, partial_match = ?4, \
             multi_command = ?5, nested_command = ?6, updated = 1 WHERE id = ?7"
        ),
        params![
            page.name,
            page.section,
            page.synopsis,
            page.partial_match as i32,
            page.multi_command as i32,
            page.nested_command as i32,
            id,
        ],
    )?;
    Ok(())
}

/// Inserts options with their spellings, positional arguments, and sections.
pub fn insert_page_children(
    conn: &Connection,
    prefix: &str,
    manpage_id: i64,
    page: &ManPage,
) -> Result<InsertCounts> {
    let mut counts = InsertCounts::default();

    for (position, option) in page.options.iter().enumerate() {
        conn.execute(
            &format!(
                "INSERT INTO {prefix}options (manpage_id, position, expects_arg, nested_command, text) \
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            params![
                manpage_id,
                position as i64,
                option.expects_arg as i32,
                option.nested_command as i32,
                option.text,
            ],
        )?;
        let option_id = conn.last_insert_rowid();
        counts.options += 1;

        let spellings = option
            .short
            .iter()
            .map(|s| (s, "short"))
            .chain(option.long.iter().map(|s| (s, "long")));
        for (spelling, kind) in spellings {
            conn.execute(
                &format!(
                    "INSERT INTO {prefix}spellings (option_id, spelling, kind) VALUES (?1, ?2, ?3)"
                ),
                params![option_id, spelling, kind],
            )?;
            counts.spellings += 1;
        }
    }

    for (position, argument) in page.arguments.iter().enumerate() {
        conn.execute(
            &format!(
                "INSERT INTO {prefix}arguments (manpage_id, position, name, variadic, nested_command, text) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                manpage_id,
                position as i64,
                argument.name,
                argument.variadic as i32,
                argument.nested_command as i32,
                argument.text,
            ],
        )?;
        counts.arguments += 1;
    }

    for (position, section) in page.sections.iter().enumerate() {
        conn.execute(
            &format!(
                "INSERT INTO {prefix}sections (manpage_id, position, title, text) VALUES (?1, ?2, ?3, ?4)"
            ),
            params![manpage_id, position as i64, section.title, section.text],
        )?;
        counts.sections += 1;
    }

    Ok(counts)
}

/// Removes the options, arguments, and sections of a page.
pub fn delete_page_children(conn: &Connection, prefix: &str, manpage_id: i64) -> Result<()> {
    for table in ["options", "arguments", "sections"] {
        conn.execute(
            &format!("DELETE FROM {prefix}{table} WHERE manpage_id = ?1"),
            params![manpage_id],
        )?;
    }
    Ok(())
}

/// Inserts one `src -> dst` mapping.
pub fn insert_mapping(conn: &Connection, prefix: &str, src: &str, dst: i64, score: i64) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO {prefix}mappings (src, dst, score) VALUES (?1, ?2, ?3)"),
        params![src, dst, score],
    )?;
    Ok(())
}

/// Inserts a complete page: row, children, and one mapping per alias.
pub fn insert_manpage(conn: &Connection, prefix: &str, page: &ManPage) -> Result<(i64, InsertCounts)> {
    let id = insert_manpage_row(conn, prefix, page)?;
    let mut counts = insert_page_children(conn, prefix, id, page)?;
    for alias in &page.aliases {
        insert_mapping(conn, prefix, &alias.name, id, alias.score)?;
        counts.mappings += 1;
    }
    Ok((id, counts))
}

/// Deletes a page and every mapping that points at it. Returns the number of
/// mappings removed.
pub fn delete_manpage(conn: &Connection, prefix: &str, id: i64) -> Result<usize> {
    conn.execute(&format!("DELETE FROM {prefix}manpages WHERE id = ?1"), params![id])?;
    let removed = conn.execute(
        &format!("DELETE FROM {prefix}mappings WHERE dst = ?1"),
        params![id],
    )?;
    Ok(removed)
}

/// Finds the ID of the page with this source path.
pub fn find_id_by_source(conn: &Connection, prefix: &str, source: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            &format!("SELECT id FROM {prefix}manpages WHERE source = ?1"),
            params![source],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Loads the identity columns of a page.
pub fn load_page_ref(conn: &Connection, prefix: &str, id: i64) -> Result<Option<PageRef>> {
    let page = conn
        .query_row(
            &format!("SELECT id, name, section, source FROM {prefix}manpages WHERE id = ?1"),
            params![id],
            |row| {
                Ok(PageRef {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    section: row.get(2)?,
                    source: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(page)
}

/// Loads a complete page by ID.
///
/// Returns `None` if no page with the given ID exists.
pub fn load_manpage(conn: &Connection, prefix: &str, id: i64) -> Result<Option<ManPage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT name, section, source, synopsis, partial_match, multi_command, nested_command \
         FROM {prefix}manpages WHERE id = ?1"
    ))?;

    let mut rows = stmt.query(params![id])?;
    let row = match rows.next()? {
        Some(row) => row,
        None => return Ok(None),
    };

    let name: String = row.get(0)?;
    let section: String = row.get(1)?;
    let source: String = row.get(2)?;
    let synopsis: Option<String> = row.get(3)?;
    let partial_match: bool = row.get(4)?;
    let multi_command: bool = row.get(5)?;
    let nested_command: bool = row.get(6)?;

    Ok(Some(ManPage {
        name,
        section,
        source,
        synopsis,
        options: load_options(conn, prefix, id)?,
        arguments: load_arguments(conn, prefix, id)?,
        sections: load_sections(conn, prefix, id)?,
        aliases: load_aliases(conn, prefix, id)?,
        partial_match,
        multi_command,
        nested_command,
    }))
}

fn load_options(conn: &Connection, prefix: &str, manpage_id: i64) -> Result<Vec<ManOption>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, expects_arg, nested_command, text FROM {prefix}options \
         WHERE manpage_id = ?1 ORDER BY position"
    ))?;
    let raw_rows: Vec<(i64, bool, bool, String)> = stmt
        .query_map(params![manpage_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut spelling_stmt = conn.prepare(&format!(
        "SELECT spelling, kind FROM {prefix}spellings WHERE option_id = ?1 ORDER BY id"
    ))?;

    let mut options = Vec::with_capacity(raw_rows.len());
    for (option_id, expects_arg, nested_command, text) in raw_rows {
        let mut option = ManOption {
            short: Vec::new(),
            long: Vec::new(),
            expects_arg,
            nested_command,
            text,
        };
        let spellings = spelling_stmt
            .query_map(params![option_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for (spelling, kind) in spellings {
            match kind.as_str() {
                "short" => option.short.push(spelling),
                "long" => option.long.push(spelling),
                other => {
                    return Err(SqliteError::ConversionError(format!(
                        "unknown spelling kind: {other}"
                    )));
                }
            }
        }
        options.push(option);
    }
    Ok(options)
}

fn load_arguments(conn: &Connection, prefix: &str, manpage_id: i64) -> Result<Vec<ManArgument>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT name, variadic, nested_command, text FROM {prefix}arguments \
         WHERE manpage_id = ?1 ORDER BY position"
    ))?;
    let arguments = stmt
        .query_map(params![manpage_id], |row| {
            Ok(ManArgument {
                name: row.get(0)?,
                variadic: row.get(1)?,
                nested_command: row.get(2)?,
                text: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(arguments)
}

fn load_sections(conn: &Connection, prefix: &str, manpage_id: i64) -> Result<Vec<ManSection>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT title, text FROM {prefix}sections WHERE manpage_id = ?1 ORDER BY position"
    ))?;
    let sections = stmt
        .query_map(params![manpage_id], |row| {
            Ok(ManSection {
                title: row.get(0)?,
                text: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(sections)
}

fn load_aliases(conn: &Connection, prefix: &str, manpage_id: i64) -> Result<Vec<Alias>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT src, score FROM {prefix}mappings WHERE dst = ?1 ORDER BY id"
    ))?;
    let aliases = stmt
        .query_map(params![manpage_id], |row| {
            Ok(Alias {
                name: row.get(0)?,
                score: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(aliases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::generate_schema_sql;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn.execute_batch(&generate_schema_sql("t_").unwrap()).unwrap();
        conn
    }

    fn tar_page() -> ManPage {
        let mut page = ManPage::new("tar", "1")
            .with_synopsis("tar - an archiving utility")
            .with_option(ManOption::flag(&["-x"], &["--extract", "--get"], "extract files"))
            .with_option(ManOption::with_arg(&["-f"], &["--file"], "use archive file"))
            .with_argument(ManArgument::new("FILE", "members").variadic())
            .with_section("DESCRIPTION", "GNU tar saves many files together.")
            .with_alias("gtar", 5);
        page.partial_match = true;
        page
    }

    #[test]
    fn test_page_round_trip() {
        let conn = conn();
        let page = tar_page();
        let (id, counts) = insert_manpage(&conn, "t_", &page).unwrap();
        assert_eq!(counts.options, 2);
        assert_eq!(counts.spellings, 5);
        assert_eq!(counts.mappings, 2);

        let loaded = load_manpage(&conn, "t_", id).unwrap().unwrap();
        assert_eq!(loaded, page);
    }

    #[test]
    fn test_load_missing_page() {
        let conn = conn();
        assert!(load_manpage(&conn, "t_", 42).unwrap().is_none());
        assert!(load_page_ref(&conn, "t_", 42).unwrap().is_none());
    }

    #[test]
    fn test_delete_removes_mappings() {
        let conn = conn();
        let (id, _) = insert_manpage(&conn, "t_", &tar_page()).unwrap();
        assert_eq!(delete_manpage(&conn, "t_", id).unwrap(), 2);
        assert!(find_id_by_source(&conn, "t_", "tar.1.gz").unwrap().is_none());
    }

    #[test]
    fn test_page_ref_name_section() {
        let conn = conn();
        let (id, _) = insert_manpage(&conn, "t_", &tar_page()).unwrap();
        let page = load_page_ref(&conn, "t_", id).unwrap().unwrap();
        assert_eq!(page.name_section(), "tar(1)");
        assert_eq!(page.source, "tar.1.gz");
    }
}
