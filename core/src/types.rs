//! Man page model definitions.
//!
//! This module defines the normalized in-memory form of a manual page as the
//! explanation engine consumes it: a name, a synopsis, the documented options
//! and positional arguments, and free-text sections used for fallback
//! explanations. The types are designed for serialization with [`serde`] and
//! round-trip through JSON, SQLite, and other storage backends.

use serde::{Deserialize, Serialize};

/// Version of the man page contract (semver).
///
/// Embedded in every [`ManPagePackage`](crate::ManPagePackage) to track
/// compatibility across bundle versions.
pub const MANPAGE_CONTRACT_VERSION: &str = "1.0.0";

/// A documented flag of a man page.
///
/// An option has any number of short spellings (e.g. `-v`) and long
/// spellings (e.g. `--verbose`). Pages whose options are written without
/// dashes, such as `dd`'s `bs=BYTES`, store those as long spellings too.
/// All spellings alias the same explanation.
///
/// # Examples
///
/// ```
/// use shell_explain_core::ManOption;
///
/// let verbose = ManOption::flag(&["-v"], &["--verbose"], "explain what is being done");
/// assert!(verbose.matches("-v"));
/// assert!(verbose.matches("--verbose"));
/// assert!(!verbose.expects_arg);
///
/// let color = ManOption::with_arg(&[], &["--color"], "colorize the output");
/// assert!(color.expects_arg);
/// assert_eq!(color.canonical_name(), "--color");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManOption {
    /// Short spellings (e.g. "-v")
    #[serde(default)]
    pub short: Vec<String>,
    /// Long spellings (e.g. "--verbose", "bs")
    #[serde(default)]
    pub long: Vec<String>,
    /// Whether the option consumes a value
    #[serde(default)]
    pub expects_arg: bool,
    /// Whether the option's value starts a nested command
    #[serde(default)]
    pub nested_command: bool,
    /// Explanation text from the man page
    pub text: String,
}

impl ManOption {
    /// Creates an option that takes no value.
    pub fn flag(short: &[&str], long: &[&str], text: &str) -> Self {
        Self {
            short: short.iter().map(|s| s.to_string()).collect(),
            long: long.iter().map(|s| s.to_string()).collect(),
            expects_arg: false,
            nested_command: false,
            text: text.to_string(),
        }
    }

    /// Creates an option that consumes a value.
    pub fn with_arg(short: &[&str], long: &[&str], text: &str) -> Self {
        Self {
            expects_arg: true,
            ..Self::flag(short, long, text)
        }
    }

    /// Marks the option's value as the start of a nested command.
    ///
    /// Implies [`expects_arg`](Self::expects_arg).
    pub fn nesting(mut self) -> Self {
        self.expects_arg = true;
        self.nested_command = true;
        self
    }

    /// Iterates over all spellings, short ones first.
    pub fn spellings(&self) -> impl Iterator<Item = &str> {
        self.short
            .iter()
            .chain(self.long.iter())
            .map(String::as_str)
    }

    /// Returns the canonical spelling (first long form, falls back to short).
    pub fn canonical_name(&self) -> &str {
        self.long
            .first()
            .or(self.short.first())
            .map(String::as_str)
            .unwrap_or("unknown")
    }

    /// Checks if this option is spelled exactly `s`.
    pub fn matches(&self, s: &str) -> bool {
        self.spellings().any(|spelling| spelling == s)
    }
}

/// A documented positional argument of a man page.
///
/// # Examples
///
/// ```
/// use shell_explain_core::ManArgument;
///
/// let files = ManArgument::new("FILE", "files to list").variadic();
/// assert!(files.variadic);
/// assert_eq!(files.name, "FILE");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManArgument {
    /// Name as written in the synopsis (e.g. "FILE")
    pub name: String,
    /// Whether the argument absorbs all remaining positionals
    #[serde(default)]
    pub variadic: bool,
    /// Whether this argument starts a nested command (e.g. `sudo COMMAND`)
    #[serde(default)]
    pub nested_command: bool,
    /// Explanation text from the man page
    pub text: String,
}

impl ManArgument {
    /// Creates a single positional argument.
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            variadic: false,
            nested_command: false,
            text: text.to_string(),
        }
    }

    /// Marks the argument as accepting any number of values.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

/// Free-text section of a man page (e.g. DESCRIPTION).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManSection {
    pub title: String,
    pub text: String,
}

/// Alternative name under which a man page can be found.
///
/// When several pages share an alias the one with the highest score wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub score: i64,
}

/// Normalized man page.
///
/// This is the primary type in the crate. It holds everything the matcher
/// needs to align command-line tokens to documentation. A page is treated as
/// immutable once it has been resolved.
///
/// # Examples
///
/// ```
/// use shell_explain_core::*;
///
/// let page = ManPage::new("ls", "1")
///     .with_synopsis("ls - list directory contents")
///     .with_option(ManOption::flag(&["-l"], &[], "use a long listing format"))
///     .with_option(ManOption::flag(&["-a"], &["--all"], "do not ignore entries starting with ."))
///     .with_argument(ManArgument::new("FILE", "files to list").variadic());
///
/// assert_eq!(page.summary(), "list directory contents");
/// assert_eq!(page.name_section(), "ls(1)");
/// assert!(page.find_option("--all").is_some());
/// assert!(page.short_option('l').is_some());
/// assert!(validate_manpage(&page).is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManPage {
    /// Program name (e.g. "ls")
    pub name: String,
    /// Manual section (e.g. "1")
    #[serde(default)]
    pub section: String,
    /// Path of the page this model was extracted from (e.g. "ls.1.gz")
    #[serde(default)]
    pub source: String,
    /// One-line synopsis, usually "name - description"
    #[serde(default)]
    pub synopsis: Option<String>,
    /// Documented flags
    #[serde(default)]
    pub options: Vec<ManOption>,
    /// Documented positional arguments, in order
    #[serde(default)]
    pub arguments: Vec<ManArgument>,
    /// Free-text sections for fallback explanations
    #[serde(default)]
    pub sections: Vec<ManSection>,
    /// Names this page is reachable under
    #[serde(default)]
    pub aliases: Vec<Alias>,
    /// Options may be written without a leading dash (`tar xzf`)
    #[serde(default)]
    pub partial_match: bool,
    /// Subcommands have pages of their own (`git commit` -> `git-commit`)
    #[serde(default)]
    pub multi_command: bool,
    /// The first positional argument starts a nested command (`sudo`)
    #[serde(default)]
    pub nested_command: bool,
}

impl ManPage {
    /// Creates an empty page for `name` in manual `section`.
    ///
    /// The source defaults to `{name}.{section}.gz` and the page is reachable
    /// under its own name with score 10.
    pub fn new(name: &str, section: &str) -> Self {
        Self {
            name: name.to_string(),
            section: section.to_string(),
            source: format!("{name}.{section}.gz"),
            aliases: vec![Alias {
                name: name.to_string(),
                score: 10,
            }],
            ..Default::default()
        }
    }

    /// Sets the synopsis.
    pub fn with_synopsis(mut self, synopsis: &str) -> Self {
        self.synopsis = Some(synopsis.to_string());
        self
    }

    /// Adds a documented option.
    pub fn with_option(mut self, option: ManOption) -> Self {
        self.options.push(option);
        self
    }

    /// Adds a documented positional argument.
    pub fn with_argument(mut self, argument: ManArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Adds an alias with the given score.
    pub fn with_alias(mut self, name: &str, score: i64) -> Self {
        self.aliases.push(Alias {
            name: name.to_string(),
            score,
        });
        self
    }

    /// Adds a free-text section.
    pub fn with_section(mut self, title: &str, text: &str) -> Self {
        self.sections.push(ManSection {
            title: title.to_string(),
            text: text.to_string(),
        });
        self
    }

    /// Finds the option spelled exactly `spelling`.
    pub fn find_option(&self, spelling: &str) -> Option<&ManOption> {
        self.options.iter().find(|o| o.matches(spelling))
    }

    /// Finds the option with the single-character short spelling `-c`.
    pub fn short_option(&self, c: char) -> Option<&ManOption> {
        let mut buf = [0u8; 4];
        let spelling = format!("-{}", c.encode_utf8(&mut buf));
        self.options
            .iter()
            .find(|o| o.short.iter().any(|s| *s == spelling))
    }

    /// Returns `true` if any option is spelled exactly `spelling`.
    pub fn is_documented(&self, spelling: &str) -> bool {
        self.find_option(spelling).is_some()
    }

    /// Returns the synopsis without its leading `name - ` part.
    ///
    /// Falls back to the full synopsis when it does not follow that shape,
    /// and to an empty string when there is no synopsis.
    pub fn summary(&self) -> &str {
        let Some(synopsis) = self.synopsis.as_deref() else {
            return "";
        };
        match synopsis.split_once(" - ") {
            Some((head, rest))
                if !head.is_empty()
                    && head
                        .chars()
                        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ',' | ' ')) =>
            {
                rest.trim()
            }
            _ => synopsis.trim(),
        }
    }

    /// Returns `name(section)`, or just the name when no section is known.
    pub fn name_section(&self) -> String {
        if self.section.is_empty() {
            self.name.clone()
        } else {
            format!("{}({})", self.name, self.section)
        }
    }

    /// Returns the text of the first section titled `title` (case-insensitive).
    pub fn section_text(&self, title: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.title.eq_ignore_ascii_case(title))
            .map(|s| s.text.as_str())
    }
}

/// Splits a lookup name into the program name and an optional manual
/// section suffix.
///
/// `"."` (the `source` builtin) is never split.
///
/// # Examples
///
/// ```
/// use shell_explain_core::split_section;
///
/// assert_eq!(split_section("ls.1"), ("ls", Some("1")));
/// assert_eq!(split_section("ls"), ("ls", None));
/// assert_eq!(split_section("."), (".", None));
/// ```
pub fn split_section(name: &str) -> (&str, Option<&str>) {
    if name == "." {
        return (name, None);
    }
    match name.rsplit_once('.') {
        Some((program, section)) if !program.is_empty() && !section.is_empty() => {
            (program, Some(section))
        }
        _ => (name, None),
    }
}
