use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use shell_explain_core::{ManArgument, ManOption, ManPage, ManPageLookup, ManPagePackage};
use shell_explain_db::{DatabaseError, ExplainConfig, ManPageDatabase, StoreConfig};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ls_page() -> ManPage {
    ManPage::new("ls", "1")
        .with_synopsis("ls [OPTION]... [FILE]...")
        .with_option(ManOption::flag(&["-l"], &[], "use a long listing format"))
        .with_option(ManOption::flag(&["-a"], &["--all"], "do not ignore entries starting with ."))
        .with_argument(ManArgument::new("FILE", "files to list").variadic())
}

fn printf_pages() -> (ManPage, ManPage) {
    let shell = ManPage::new("printf", "1")
        .with_option(ManOption::flag(&[], &["--help"], "display this help and exit"));
    let mut libc = ManPage::new("printf", "3");
    libc.aliases[0].score = 5;
    (shell, libc)
}

fn write_page(dir: &Path, page: &ManPage) {
    let path = dir.join(format!("{}.{}.json", page.name, page.section));
    let mut f = std::fs::File::create(path).unwrap();
    serde_json::to_writer_pretty(&mut f, page).unwrap();
    f.flush().unwrap();
}

fn package(pages: Vec<ManPage>) -> ManPagePackage {
    let mut package = ManPagePackage::new("1.0.0", "2024-01-15T10:30:00Z");
    package.pages = pages;
    package
}

fn write_gz_bundle(path: &Path, package: &ManPagePackage) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    serde_json::to_writer(&mut encoder, package).unwrap();
    encoder.finish().unwrap();
}

// ---------------------------------------------------------------------------
// Directory loading
// ---------------------------------------------------------------------------

#[test]
fn test_directory_loading_and_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let (shell, libc) = printf_pages();
    write_page(dir.path(), &ls_page());
    write_page(dir.path(), &shell);
    write_page(dir.path(), &libc);
    std::fs::write(dir.path().join("README.txt"), "ignored").unwrap();

    let db = ManPageDatabase::from_dir(dir.path()).unwrap();
    assert_eq!(db.len(), 3);
    assert_eq!(db.names(), vec!["ls", "printf"]);

    let ls = db.find("ls").unwrap();
    assert!(ls.is_documented("--all"));

    // printf(1) carries the stronger alias.
    assert_eq!(db.find("printf").unwrap().section, "1");
    assert_eq!(db.find("printf.3").unwrap().section, "3");
    assert_eq!(db.suggestions("printf"), vec!["printf(3)".to_string()]);
}

#[test]
fn test_directory_with_invalid_page_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_page(dir.path(), &ManPage::new("", "1"));

    let err = ManPageDatabase::from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, DatabaseError::InvalidPage(_)));
}

// ---------------------------------------------------------------------------
// Bundle loading
// ---------------------------------------------------------------------------

#[test]
fn test_plain_bundle_loading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.json");
    std::fs::write(&path, serde_json::to_string(&package(vec![ls_page()])).unwrap()).unwrap();

    let db = ManPageDatabase::from_bundle(&path).unwrap();
    assert_eq!(db.len(), 1);
    assert!(db.contains("ls"));
}

#[test]
fn test_gzipped_bundle_loading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.json.gz");
    let (shell, libc) = printf_pages();
    write_gz_bundle(&path, &package(vec![ls_page(), shell, libc]));

    let db = ManPageDatabase::from_bundle(&path).unwrap();
    assert_eq!(db.len(), 3);
    assert_eq!(db.find("printf").unwrap().section, "1");
}

#[test]
fn test_corrupt_gzip_is_compression_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json.gz");
    std::fs::write(&path, b"definitely not gzip").unwrap();

    let err = ManPageDatabase::from_bundle(&path).unwrap_err();
    assert!(matches!(err, DatabaseError::CompressionError(_)));
}

// ---------------------------------------------------------------------------
// Builder fallback chain
// ---------------------------------------------------------------------------

#[test]
fn test_builder_fallback_to_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("bundle.json.gz");
    write_gz_bundle(&bundle, &package(vec![ls_page()]));

    let db = ManPageDatabase::builder()
        .from_dir(dir.path().join("missing"))
        .from_bundle(&bundle)
        .build()
        .unwrap();
    assert!(db.contains("ls"));
}

#[test]
fn test_builder_all_sources_missing() {
    let dir = tempfile::tempdir().unwrap();
    let err = ManPageDatabase::builder()
        .from_dir(dir.path().join("missing"))
        .from_bundle(dir.path().join("missing.json"))
        .build()
        .unwrap_err();
    assert!(matches!(err, DatabaseError::NoSourcesAvailable));
}

// ---------------------------------------------------------------------------
// Config workflow
// ---------------------------------------------------------------------------

#[test]
fn test_config_drives_database() {
    let dir = tempfile::tempdir().unwrap();
    let pages = dir.path().join("pages");
    std::fs::create_dir(&pages).unwrap();
    write_page(&pages, &ls_page());

    let config_path = dir.path().join("explain.yml");
    let config = ExplainConfig {
        store: StoreConfig {
            directory: Some(pages),
            ..StoreConfig::default()
        },
        ..ExplainConfig::default()
    };
    config.save(&config_path).unwrap();

    let loaded = ExplainConfig::load(&config_path).unwrap();
    assert_eq!(loaded, config);

    let db = loaded.store.database_builder().build().unwrap();
    assert!(db.contains("ls"));
}

// ---------------------------------------------------------------------------
// Lookup trait
// ---------------------------------------------------------------------------

#[test]
fn test_lookup_trait() {
    let mut db = ManPageDatabase::new();
    db.insert(ls_page()).unwrap();

    let lookup: &dyn ManPageLookup = &db;
    let page = lookup.get_manpage("ls").unwrap().unwrap();
    assert_eq!(page.name, "ls");
    assert!(lookup.get_manpage("nonexistent").unwrap().is_none());
}
