use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use flate2::Compression;
use flate2::write::GzEncoder;
use rayon::prelude::*;
use serde::Serialize;
use shell_explain_core::{
    LookupError, ManPage, ManPageLookup, ManPagePackage, validate_manpage, validate_package,
};
use shell_explain_db::{ExplainConfig, LimitsConfig, ManPageDatabase, StoreConfig};
use shell_explain_engine::{Engine, EngineOptions, ManPageCache, OutputFormat, format_explanation};
use shell_explain_sqlite::{ManPageStore, Migration, PageRef, SharedStore};
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "explain")]
#[command(about = "Explain shell command lines using man pages")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory of man page JSON files.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,
    /// Man page bundle (plain or gzipped JSON).
    #[arg(long, global = true)]
    bundle: Option<PathBuf>,
    /// SQLite database file.
    #[arg(long, global = true)]
    sqlite: Option<PathBuf>,
    /// SQLite table prefix.
    #[arg(long, global = true)]
    prefix: Option<String>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Explain a command line, or every line of a file.
    Explain(ExplainArgs),
    /// Print the man page stored for a program.
    Show(ShowArgs),
    /// Validate one or more man page JSON files.
    Validate(ValidateArgs),
    /// Bundle man page JSON files into a ManPagePackage file.
    Bundle(BundleArgs),
    /// SQLite database migration and seeding operations.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args)]
struct ExplainArgs {
    /// Command line to explain; multiple words are joined with spaces.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    line: Vec<String>,
    /// Explain every non-empty line of this file.
    #[arg(long, conflicts_with = "line")]
    file: Option<PathBuf>,
    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct ShowArgs {
    /// Program name, optionally with a section suffix (e.g. printf.3).
    program: String,
    /// Output format.
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Man page files and/or directories containing man page JSON files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct BundleArgs {
    /// Man page files and/or directories containing man page JSON files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Output bundle path; a `.gz` extension gzips the bundle.
    #[arg(long)]
    output: PathBuf,
    /// Optional bundle name metadata.
    #[arg(long)]
    name: Option<String>,
    /// Optional bundle description metadata.
    #[arg(long)]
    description: Option<String>,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(subcommand)]
    operation: MigrateOperation,
}

#[derive(Debug, Subcommand)]
enum MigrateOperation {
    /// Create man page tables in the database.
    Up,
    /// Drop man page tables from the database.
    Down,
    /// Seed the database with man page JSON files from a directory.
    Seed(SeedArgs),
    /// Drop tables, recreate, and reseed from a directory.
    Refresh(SeedArgs),
    /// Show migration and table status.
    Status,
    /// Check for unreachable pages and dangling mappings.
    Verify,
}

#[derive(Debug, Args)]
struct SeedArgs {
    /// Directory containing man page JSON files.
    #[arg(long)]
    source: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    let result = match cli.command {
        Command::Explain(args) => run_explain(&cli.global, args),
        Command::Show(args) => run_show(&cli.global, args),
        Command::Validate(args) => run_validate(args),
        Command::Bundle(args) => run_bundle(args),
        Command::Migrate(args) => run_migrate(&cli.global, args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(global: &GlobalArgs) {
    let level = if global.quiet {
        Level::ERROR
    } else {
        match global.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: failed to install log subscriber: {err}");
    }
}

// ---------------------------------------------------------------------------
// Configuration and stores
// ---------------------------------------------------------------------------

/// Loads the configuration file, if any, and applies command-line overrides.
fn load_config(global: &GlobalArgs) -> Result<ExplainConfig, String> {
    let mut config = match &global.config {
        Some(path) => ExplainConfig::load(path)
            .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?,
        None => ExplainConfig::default(),
    };

    // File-based sources named on the command line win over a configured database.
    if (global.dir.is_some() || global.bundle.is_some()) && global.sqlite.is_none() {
        config.store.sqlite = None;
    }
    if let Some(dir) = &global.dir {
        config.store.directory = Some(dir.clone());
    }
    if let Some(bundle) = &global.bundle {
        config.store.bundle = Some(bundle.clone());
    }
    if let Some(sqlite) = &global.sqlite {
        config.store.sqlite = Some(sqlite.clone());
    }
    if let Some(prefix) = &global.prefix {
        config.store.prefix = prefix.clone();
    }

    debug!(?config, "resolved configuration");
    Ok(config)
}

fn engine_options(limits: &LimitsConfig) -> EngineOptions {
    EngineOptions {
        max_command_length: limits.max_command_length,
        max_nesting_depth: limits.max_nesting_depth,
    }
}

/// The configured man page source.
enum Store {
    Memory(ManPageDatabase),
    Sqlite(SharedStore),
}

impl ManPageLookup for Store {
    fn get_manpage(&self, name: &str) -> Result<Option<ManPage>, LookupError> {
        match self {
            Store::Memory(db) => db.get_manpage(name),
            Store::Sqlite(store) => store.get_manpage(name),
        }
    }
}

fn open_store(config: &StoreConfig) -> Result<Store, String> {
    if let Some(path) = &config.sqlite {
        let store = SharedStore::open(path, config.prefix.as_str())
            .map_err(|e| format!("Failed to open database '{}': {e}", path.display()))?;
        return Ok(Store::Sqlite(store));
    }

    let builder = config.database_builder();
    if builder.is_empty() {
        return Err(
            "no man page store configured; pass --dir, --bundle, --sqlite, or --config".to_string(),
        );
    }
    let db = builder
        .build()
        .map_err(|e| format!("Failed to load man pages: {e}"))?;
    info!(pages = db.len(), "loaded man page database");
    Ok(Store::Memory(db))
}

// ---------------------------------------------------------------------------
// explain command
// ---------------------------------------------------------------------------

fn run_explain(global: &GlobalArgs, args: ExplainArgs) -> Result<(), String> {
    let config = load_config(global)?;
    let store = open_store(&config.store)?;
    let cache = ManPageCache::new();
    let engine = Engine::with_options(store, &cache, engine_options(&config.limits));

    if let Some(path) = &args.file {
        return explain_file(&engine, path, args.format);
    }
    if args.line.is_empty() {
        return Err("nothing to explain; pass a command line or --file".to_string());
    }

    let line = args.line.join(" ");
    let explanation = engine.explain(&line).map_err(|e| e.to_string())?;
    println!("{}", format_explanation(&explanation, args.format)?);
    Ok(())
}

/// Explains every non-empty line of `path` in parallel. Lines that fail to
/// parse are reported individually; the rest are still printed.
fn explain_file(engine: &Engine<'_, Store>, path: &Path, format: OutputFormat) -> Result<(), String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?;
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| (index + 1, line))
        .collect();

    let results: Vec<_> = lines
        .par_iter()
        .map(|(number, line)| (*number, engine.explain(line)))
        .collect();

    let mut failed = 0;
    for (number, result) in results {
        match result {
            Ok(explanation) => {
                if format == OutputFormat::Yaml {
                    println!("---");
                }
                println!("{}", format_explanation(&explanation, format)?);
            }
            Err(err) => {
                eprintln!("error: line {number}: {err}");
                failed += 1;
            }
        }
    }

    info!(
        lines = lines.len(),
        failed,
        cached_pages = engine.cache().len(),
        "explained file"
    );

    if failed > 0 {
        return Err(format!(
            "{failed} of {} line(s) could not be explained",
            lines.len()
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show command
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ShownPage<'a> {
    page: &'a ManPage,
    suggestions: &'a [String],
}

fn run_show(global: &GlobalArgs, args: ShowArgs) -> Result<(), String> {
    let config = load_config(global)?;
    let program = args.program.as_str();

    let found = match open_store(&config.store)? {
        Store::Memory(db) => db
            .find(program)
            .map(|page| (page.clone(), db.suggestions(program))),
        Store::Sqlite(store) => store
            .with_store(|s| s.find_manpage(program))
            .map_err(|e| format!("Lookup failed: {e}"))?
            .map(|found| {
                let suggestions = found.suggestions.iter().map(PageRef::name_section).collect();
                (found.page, suggestions)
            }),
    };
    let (page, suggestions) = found.ok_or_else(|| format!("No man page found for '{program}'"))?;

    let shown = ShownPage {
        page: &page,
        suggestions: &suggestions,
    };
    let raw = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&shown)
            .map_err(|e| format!("JSON serialization failed: {e}"))?,
        OutputFormat::Yaml => {
            serde_yaml::to_string(&shown).map_err(|e| format!("YAML serialization failed: {e}"))?
        }
        OutputFormat::Text => page_to_text(&page, &suggestions),
    };
    println!("{raw}");
    Ok(())
}

fn page_to_text(page: &ManPage, suggestions: &[String]) -> String {
    let mut out = page.name_section();
    if !page.summary().is_empty() {
        out.push_str(&format!(" - {}", page.summary()));
    }
    out.push_str(&format!("\nsource: {}\n", page.source));

    let options: Vec<(String, &str)> = page
        .options
        .iter()
        .map(|o| {
            let mut names = o.spellings().collect::<Vec<_>>().join(", ");
            if o.expects_arg {
                names.push_str(" ARG");
            }
            (names, o.text.as_str())
        })
        .collect();
    let arguments: Vec<(String, &str)> = page
        .arguments
        .iter()
        .map(|a| {
            let name = if a.variadic {
                format!("{}...", a.name)
            } else {
                a.name.clone()
            };
            (name, a.text.as_str())
        })
        .collect();

    let width = options
        .iter()
        .chain(arguments.iter())
        .map(|(name, _)| name.chars().count())
        .max()
        .unwrap_or(0)
        .min(28);

    for (title, rows) in [("options", &options), ("arguments", &arguments)] {
        if rows.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{title}:\n"));
        for (name, text) in rows {
            let first = text.lines().next().unwrap_or("");
            out.push_str(&format!("  {name:<width$}  {first}\n"));
        }
    }

    if !suggestions.is_empty() {
        out.push_str(&format!("\nsee also: {}\n", suggestions.join(", ")));
    }
    out
}

// ---------------------------------------------------------------------------
// validate and bundle commands
// ---------------------------------------------------------------------------

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    let paths = collect_page_paths(&args.inputs)?;

    let mut failures = Vec::new();
    for path in &paths {
        let page = read_page(path)?;
        let errors = validate_manpage(&page);
        if !errors.is_empty() {
            let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
            failures.push(format!("{}: {}", path.display(), reasons.join("; ")));
        }
    }

    if !failures.is_empty() {
        return Err(format!(
            "{} invalid man page file(s):\n{}",
            failures.len(),
            failures.join("\n")
        ));
    }

    println!("Validated {} man page file(s).", paths.len());
    Ok(())
}

fn run_bundle(args: BundleArgs) -> Result<(), String> {
    let paths = collect_page_paths(&args.inputs)?;

    let mut package = ManPagePackage::new(PACKAGE_VERSION, chrono::Utc::now().to_rfc3339());
    package.name = args.name;
    package.description = args.description;
    for path in &paths {
        package.pages.push(read_page(path)?);
    }
    package
        .pages
        .sort_by(|a, b| (&a.name, &a.section).cmp(&(&b.name, &b.section)));

    let errors = validate_package(&package);
    if !errors.is_empty() {
        let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
        return Err(format!("Invalid bundle: {}", reasons.join("; ")));
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }

    let raw = serde_json::to_string_pretty(&package)
        .map_err(|err| format!("Failed to serialize man page bundle: {err}"))?;
    let write_err = |err: std::io::Error| format!("Failed to write '{}': {err}", args.output.display());
    if args.output.extension().and_then(|e| e.to_str()) == Some("gz") {
        let file = fs::File::create(&args.output).map_err(write_err)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(raw.as_bytes()).map_err(write_err)?;
        encoder.finish().map_err(write_err)?;
    } else {
        fs::write(&args.output, raw).map_err(write_err)?;
    }

    println!(
        "Bundled {} man page(s) into '{}'.",
        package.page_count(),
        args.output.display()
    );
    Ok(())
}

/// Expands directories to their `*.json` files, sorted by path.
fn collect_page_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = fs::read_dir(input)
                .map_err(|e| format!("Failed to read directory '{}': {e}", input.display()))?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
                .collect();
            found.sort();
            paths.extend(found);
        } else {
            paths.push(input.clone());
        }
    }

    if paths.is_empty() {
        return Err("No man page JSON files found in the given inputs".to_string());
    }
    Ok(paths)
}

fn read_page(path: &Path) -> Result<ManPage, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("Failed to parse '{}': {e}", path.display()))
}

// ---------------------------------------------------------------------------
// migrate command
// ---------------------------------------------------------------------------

fn run_migrate(global: &GlobalArgs, args: MigrateArgs) -> Result<(), String> {
    let config = load_config(global)?;
    let path = config
        .store
        .sqlite
        .clone()
        .ok_or_else(|| "migrate requires --sqlite or store.sqlite in the config".to_string())?;
    let prefix = config.store.prefix.as_str();

    let conn = rusqlite::Connection::open(&path)
        .map_err(|e| format!("Failed to open database '{}': {e}", path.display()))?;
    let mut migration =
        Migration::new(conn, prefix).map_err(|e| format!("Failed to initialize migration: {e}"))?;

    match args.operation {
        MigrateOperation::Up => {
            migration
                .up()
                .map_err(|e| format!("Migration up failed: {e}"))?;
            println!(
                "Migration up complete. Tables created with prefix '{prefix}' in '{}'.",
                path.display()
            );
        }
        MigrateOperation::Down => {
            migration
                .down()
                .map_err(|e| format!("Migration down failed: {e}"))?;
            println!(
                "Migration down complete. Tables with prefix '{prefix}' dropped from '{}'.",
                path.display()
            );
        }
        MigrateOperation::Seed(seed) => {
            let report = migration
                .seed(&seed.source)
                .map_err(|e| format!("Seed failed: {e}"))?;
            println!("Seed complete:");
            println!("  Pages inserted: {}", report.pages_inserted);
            println!("  Pages replaced: {}", report.pages_replaced);
            println!("  Options inserted: {}", report.options_inserted);
            println!("  Mappings inserted: {}", report.mappings_inserted);
        }
        MigrateOperation::Refresh(seed) => {
            let report = migration
                .refresh(&seed.source)
                .map_err(|e| format!("Refresh failed: {e}"))?;
            println!("Refresh complete (tables dropped, recreated, and reseeded):");
            println!("  Pages inserted: {}", report.pages_inserted);
            println!("  Options inserted: {}", report.options_inserted);
            println!("  Mappings inserted: {}", report.mappings_inserted);
        }
        MigrateOperation::Status => {
            let status = migration
                .status()
                .map_err(|e| format!("Failed to get migration status: {e}"))?;
            println!("Migration Status:");
            println!(
                "  Tables exist: {}",
                if status.tables_exist { "yes" } else { "no" }
            );
            println!("  Man page count: {}", status.manpage_count);
            println!("  Option count: {}", status.option_count);
            println!("  Argument count: {}", status.argument_count);
            println!("  Mapping count: {}", status.mapping_count);
        }
        MigrateOperation::Verify => {
            let conn = migration.into_connection();
            let store = ManPageStore::new(&conn, prefix).map_err(|e| e.to_string())?;
            let report = store.verify().map_err(|e| format!("Verify failed: {e}"))?;
            for page in &report.unreachable {
                println!("  unreachable: {page}");
            }
            for (src, dst) in &report.dangling {
                println!("  dangling mapping: {src} -> {dst}");
            }
            if !report.is_ok() {
                return Err("store verification failed".to_string());
            }
            println!("Store verified: every page is reachable and every mapping resolves.");
        }
    }
    Ok(())
}
