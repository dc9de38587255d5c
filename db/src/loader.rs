//! Man page database loading with builder pattern and fallback chains.
//!
//! Provides [`ManPageDatabase`] for in-memory lookup and [`DatabaseBuilder`]
//! for constructing a database from multiple sources with automatic
//! fallback.
//!
//! # Loading patterns
//!
//! ```no_run
//! use shell_explain_db::ManPageDatabase;
//!
//! // Load from a directory of JSON page files
//! let db = ManPageDatabase::from_dir("manpages/").unwrap();
//! assert!(db.find("ls").is_some());
//!
//! // Load from a single ManPagePackage bundle, optionally gzipped
//! let db = ManPageDatabase::from_bundle("manpages.json.gz").unwrap();
//!
//! // Use the builder for a fallback chain
//! let db = ManPageDatabase::builder()
//!     .from_dir("manpages/")
//!     .from_bundle("manpages.json")
//!     .build()
//!     .unwrap();
//! ```

use std::collections::{HashMap, HashSet};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use shell_explain_core::{
    LookupError, ManPage, ManPageLookup, ManPagePackage, split_section, validate_manpage,
};
use tracing::{debug, info};

use crate::error::{DatabaseError, Result};

/// Describes where a [`ManPageDatabase`] was loaded from.
#[derive(Debug, Clone)]
pub enum DatabaseSource {
    /// Built in memory.
    Memory,
    /// Loaded from a directory of individual JSON page files.
    Directory(PathBuf),
    /// Loaded from a single [`ManPagePackage`] file.
    Bundle(PathBuf),
    /// Loaded via a fallback chain of multiple sources.
    Multiple(Vec<DatabaseSource>),
}

type PageKey = (String, String);

/// In-memory collection of man pages.
///
/// Pages are keyed by name and section. Lookups go through an alias index:
/// every page is reachable under each of its [aliases](ManPage::aliases),
/// and when several pages share a name the highest score wins.
///
/// # Examples
///
/// ```
/// use shell_explain_core::ManPage;
/// use shell_explain_db::ManPageDatabase;
///
/// let mut db = ManPageDatabase::new();
/// db.insert(ManPage::new("printf", "1")).unwrap();
/// let mut libc = ManPage::new("printf", "3");
/// libc.aliases[0].score = 5;
/// db.insert(libc).unwrap();
///
/// assert_eq!(db.find("printf").unwrap().section, "1");
/// assert_eq!(db.find("printf.3").unwrap().section, "3");
/// assert_eq!(db.suggestions("printf"), vec!["printf(3)"]);
/// ```
#[derive(Debug)]
pub struct ManPageDatabase {
    pages: HashMap<PageKey, ManPage>,
    aliases: HashMap<String, Vec<(i64, PageKey)>>,
    source: DatabaseSource,
}

impl Default for ManPageDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl ManPageDatabase {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            aliases: HashMap::new(),
            source: DatabaseSource::Memory,
        }
    }

    /// Returns a new [`DatabaseBuilder`] for configuring a fallback chain.
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::new()
    }

    /// Loads pages from a directory of `*.json` files, one [`ManPage`] each.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::IoError`] if the directory cannot be read,
    /// [`DatabaseError::JsonError`] if a file contains invalid JSON, or
    /// [`DatabaseError::InvalidPage`] if a page fails validation.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut db = Self::new();

        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.extension().and_then(|e| e.to_str()) == Some("json") {
                let file = std::fs::File::open(&file_path)?;
                let page: ManPage = serde_json::from_reader(BufReader::new(file))?;
                db.insert(page)?;
            }
        }

        info!(path = %path.display(), pages = db.len(), "loaded man pages from directory");
        db.source = DatabaseSource::Directory(path.to_path_buf());
        Ok(db)
    }

    /// Loads pages from a [`ManPagePackage`] file. Files ending in `.gz` are
    /// decompressed first.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::IoError`] if the file cannot be read,
    /// [`DatabaseError::CompressionError`] if decompression fails,
    /// [`DatabaseError::JsonError`] if parsing fails, or
    /// [`DatabaseError::InvalidPage`] if a page fails validation.
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;

        let package: ManPagePackage = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
            let mut json = String::new();
            GzDecoder::new(file)
                .read_to_string(&mut json)
                .map_err(|e| DatabaseError::CompressionError(format!("{}: {e}", path.display())))?;
            serde_json::from_str(&json)?
        } else {
            serde_json::from_reader(BufReader::new(file))?
        };

        let mut db = Self::from_package(package)?;
        info!(path = %path.display(), pages = db.len(), "loaded man page bundle");
        db.source = DatabaseSource::Bundle(path.to_path_buf());
        Ok(db)
    }

    /// Builds a database from an already parsed package.
    pub fn from_package(package: ManPagePackage) -> Result<Self> {
        let mut db = Self::new();
        for page in package.pages {
            db.insert(page)?;
        }
        Ok(db)
    }

    /// Inserts a page, replacing any page with the same name and section.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidPage`] if the page fails validation.
    pub fn insert(&mut self, page: ManPage) -> Result<()> {
        if let Some(error) = validate_manpage(&page).into_iter().next() {
            return Err(DatabaseError::InvalidPage(format!(
                "{}: {error}",
                page.name_section()
            )));
        }

        let key = (page.name.clone(), page.section.clone());
        if self.pages.contains_key(&key) {
            debug!(page = %page.name_section(), "replacing man page");
            self.remove_aliases(&key);
        }
        for alias in &page.aliases {
            self.aliases
                .entry(alias.name.clone())
                .or_default()
                .push((alias.score, key.clone()));
        }
        self.pages.insert(key, page);
        Ok(())
    }

    fn remove_aliases(&mut self, key: &PageKey) {
        self.aliases.retain(|_, entries| {
            entries.retain(|(_, k)| k != key);
            !entries.is_empty()
        });
    }

    /// Candidates for `name` (which may carry a `.section` suffix), best
    /// first.
    fn candidates(&self, name: &str) -> Vec<&ManPage> {
        let (program, section) = split_section(name);
        let mut found: Vec<(i64, &PageKey)> = Vec::new();
        if let Some(entries) = self.aliases.get(program) {
            found.extend(
                entries
                    .iter()
                    .filter(|(_, key)| section.is_none_or(|s| key.1 == s))
                    .map(|(score, key)| (*score, key)),
            );
        }
        // `ls.1` may be a literal page name rather than a section suffix.
        if section.is_some() {
            if let Some(entries) = self.aliases.get(name) {
                found.extend(entries.iter().map(|(score, key)| (*score, key)));
            }
        }
        found.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));

        let mut seen = HashSet::new();
        found
            .into_iter()
            .filter(|(_, key)| seen.insert(*key))
            .filter_map(|(_, key)| self.pages.get(key))
            .collect()
    }

    /// Returns the best page for `name`.
    ///
    /// `name` may carry a section suffix (`printf.3`).
    pub fn find(&self, name: &str) -> Option<&ManPage> {
        self.candidates(name).into_iter().next()
    }

    /// Returns the page with this exact name and section.
    pub fn get(&self, name: &str, section: &str) -> Option<&ManPage> {
        self.pages.get(&(name.to_string(), section.to_string()))
    }

    /// Other pages reachable under `name`, as `name(section)`.
    pub fn suggestions(&self, name: &str) -> Vec<String> {
        self.candidates(name)
            .into_iter()
            .skip(1)
            .map(ManPage::name_section)
            .collect()
    }

    /// Returns `true` if some page is reachable under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Returns the number of pages in the database.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns `true` if the database contains no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Returns the distinct page names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pages.keys().map(|(name, _)| name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Iterates over all pages in no particular order.
    pub fn pages(&self) -> impl Iterator<Item = &ManPage> {
        self.pages.values()
    }

    /// Returns a reference to the source metadata.
    pub fn source(&self) -> &DatabaseSource {
        &self.source
    }
}

impl ManPageLookup for ManPageDatabase {
    fn get_manpage(&self, name: &str) -> std::result::Result<Option<ManPage>, LookupError> {
        Ok(self.find(name).cloned())
    }
}

/// Builder for constructing a [`ManPageDatabase`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first successful load
/// wins; if all fail, [`DatabaseError::NoSourcesAvailable`] is returned.
///
/// # Example
///
/// ```no_run
/// use shell_explain_db::ManPageDatabase;
///
/// let db = ManPageDatabase::builder()
///     .from_dir("/usr/share/shell-explain/manpages/")
///     .from_bundle("/usr/share/shell-explain/manpages.json.gz")
///     .build()
///     .unwrap();
/// ```
pub struct DatabaseBuilder {
    sources: Vec<DatabaseSource>,
}

impl DatabaseBuilder {
    /// Creates a new builder with no sources.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Adds a directory of JSON page files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DatabaseSource::Directory(path.into()));
        self
    }

    /// Adds a [`ManPagePackage`] bundle file as a source.
    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DatabaseSource::Bundle(path.into()));
        self
    }

    /// Returns `true` if no source has been added.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Attempts to load pages from configured sources in order.
    ///
    /// Returns the first successfully loaded database. If all sources fail,
    /// returns [`DatabaseError::NoSourcesAvailable`].
    pub fn build(self) -> Result<ManPageDatabase> {
        if self.sources.is_empty() {
            return Err(DatabaseError::NoSourcesAvailable);
        }

        let all_sources = self.sources.clone();

        for source in &self.sources {
            let result = match source {
                DatabaseSource::Directory(path) => ManPageDatabase::from_dir(path),
                DatabaseSource::Bundle(path) => ManPageDatabase::from_bundle(path),
                DatabaseSource::Memory | DatabaseSource::Multiple(_) => continue,
            };

            match result {
                Ok(mut db) => {
                    db.source = DatabaseSource::Multiple(all_sources);
                    return Ok(db);
                }
                Err(e) => debug!(?source, error = %e, "man page source unavailable"),
            }
        }

        Err(DatabaseError::NoSourcesAvailable)
    }
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shell_explain_core::ManOption;
    use std::io::Write;

    fn write_page(dir: &Path, page: &ManPage) {
        let path = dir.join(format!("{}.{}.json", page.name, page.section));
        let mut f = std::fs::File::create(path).unwrap();
        serde_json::to_writer_pretty(&mut f, page).unwrap();
        f.flush().unwrap();
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_page(dir.path(), &ManPage::new("ls", "1"));
        write_page(dir.path(), &ManPage::new("grep", "1"));
        std::fs::write(dir.path().join("README.txt"), "ignored").unwrap();

        let db = ManPageDatabase::from_dir(dir.path()).unwrap();
        assert_eq!(db.len(), 2);
        assert!(db.contains("ls"));
        assert!(db.contains("grep"));
        assert!(matches!(db.source(), DatabaseSource::Directory(_)));
    }

    #[test]
    fn test_from_dir_rejects_invalid_page() {
        let dir = tempfile::tempdir().unwrap();
        let page = ManPage::new("bad", "1")
            .with_option(ManOption::flag(&["-a"], &[], "one"))
            .with_option(ManOption::flag(&["-a"], &[], "two"));
        write_page(dir.path(), &page);

        let err = ManPageDatabase::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidPage(ref m) if m.starts_with("bad(1)")));
    }

    #[test]
    fn test_score_ordering_and_section_suffix() {
        let mut db = ManPageDatabase::new();
        db.insert(ManPage::new("printf", "3").with_alias("printf", 5)).unwrap();
        db.insert(ManPage::new("printf", "1")).unwrap();

        // the (printf, 3) page has two aliases named printf: 10 and 5
        assert_eq!(db.find("printf").unwrap().section, "1");
        assert_eq!(db.find("printf.3").unwrap().section, "3");
        assert!(db.find("printf.8").is_none());
        assert_eq!(db.suggestions("printf"), vec!["printf(3)"]);
    }

    #[test]
    fn test_alias_lookup() {
        let mut db = ManPageDatabase::new();
        db.insert(ManPage::new("gzip", "1").with_alias("gunzip", 10).with_alias("zcat", 10))
            .unwrap();
        assert_eq!(db.find("zcat").unwrap().name, "gzip");
        assert_eq!(db.names(), vec!["gzip"]);
    }

    #[test]
    fn test_insert_replaces_and_drops_old_aliases() {
        let mut db = ManPageDatabase::new();
        db.insert(ManPage::new("vi", "1").with_alias("view", 10)).unwrap();
        db.insert(ManPage::new("vi", "1")).unwrap();
        assert_eq!(db.len(), 1);
        assert!(db.find("view").is_none());
        assert!(db.find("vi").is_some());
    }

    #[test]
    fn test_dotted_page_name() {
        let mut db = ManPageDatabase::new();
        db.insert(ManPage::new("mkfs.ext4", "8")).unwrap();
        assert_eq!(db.find("mkfs.ext4").unwrap().name, "mkfs.ext4");
    }

    #[test]
    fn test_lookup_trait() {
        let mut db = ManPageDatabase::new();
        db.insert(ManPage::new("ls", "1")).unwrap();
        assert!(db.get_manpage("ls").unwrap().is_some());
        assert!(db.get_manpage("nope").unwrap().is_none());
    }

    #[test]
    fn test_builder_all_fail() {
        let result = ManPageDatabase::builder()
            .from_dir("/nonexistent/dir1/")
            .from_bundle("/nonexistent/bundle1.json")
            .build();
        assert!(matches!(result, Err(DatabaseError::NoSourcesAvailable)));
    }

    #[test]
    fn test_builder_empty() {
        assert!(ManPageDatabase::builder().is_empty());
        assert!(ManPageDatabase::builder().build().is_err());
    }
}
