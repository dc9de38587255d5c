//! Alignment of argument tokens to documented options and positionals.
//!
//! Tokens are scanned left to right with a cursor. For a token that looks
//! like an option the matcher tries, in order:
//!
//! 1. an exact documented spelling (`-all`, `--verbose-level`),
//! 2. a documented spelling followed by `=value` (`--color=auto`, `bs=1M`),
//! 3. a getopt cluster of single-character short options (`-la`, `-n5`).
//!
//! Spellings are compared for equality only; no prefix is ever guessed.
//! A token consumed as an option value is never matched again.

use serde::Serialize;
use shell_explain_core::{ManOption, ManPage};
use tracing::debug;

use crate::ast::Token;

/// What a token was matched to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchKind {
    /// A documented option, by the spelling that matched.
    Option { spelling: String },
    /// A documented positional argument.
    Argument { name: String },
    /// Nothing documented applies.
    Unknown,
}

/// The value consumed by a value-taking option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "token", rename_all = "snake_case")]
pub enum OptionValue {
    /// Part of the option token itself (`--color=auto`, `-n5`).
    Inline(Token),
    /// The following token (`-n 5`).
    Separate(Token),
    /// The option was the last token.
    Missing,
}

impl OptionValue {
    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::Inline(token) | Self::Separate(token) => Some(token),
            Self::Missing => None,
        }
    }
}

/// One token (or cluster fragment) and its documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub token: Token,
    pub kind: MatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<OptionValue>,
}

impl MatchResult {
    pub fn unknown(token: &Token) -> Self {
        Self {
            token: token.clone(),
            kind: MatchKind::Unknown,
            help: None,
            value: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == MatchKind::Unknown
    }

    /// The option spelling, if this is an option match.
    pub fn spelling(&self) -> Option<&str> {
        match &self.kind {
            MatchKind::Option { spelling } => Some(spelling),
            _ => None,
        }
    }
}

/// Result of matching one command's arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub results: Vec<MatchResult>,
    /// Index into the arguments where a nested command starts. Tokens from
    /// there on are not part of `results`.
    pub nested_at: Option<usize>,
}

/// Matches of one simple command, after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMatch {
    /// The command name as written.
    pub name: Token,
    /// The name the man page was resolved under (`ls`, `git-commit`).
    pub lookup_name: String,
    /// The word that selected a subcommand page, if any.
    pub subcommand: Option<Token>,
    pub results: Vec<MatchResult>,
    /// A command started by one of the arguments (`sudo ls -l`).
    pub nested: Option<Box<CommandMatch>>,
}

/// Marks every token unknown; used for commands without a man page.
pub fn unmatched(args: &[Token]) -> Vec<MatchResult> {
    args.iter().map(MatchResult::unknown).collect()
}

/// Aligns `args` to the options and arguments documented in `page`.
///
/// # Examples
///
/// ```
/// use shell_explain_core::{ManOption, ManPage};
/// use shell_explain_engine::{MatchKind, match_arguments, parse};
///
/// let page = ManPage::new("ls", "1")
///     .with_option(ManOption::flag(&["-l"], &[], "long format"))
///     .with_option(ManOption::flag(&["-a"], &[], "show hidden"));
/// let list = parse("ls -la /tmp").unwrap();
/// let cmd = list.simple_commands()[0];
///
/// let outcome = match_arguments("ls", cmd.arguments(), &page);
/// let kinds: Vec<&MatchKind> = outcome.results.iter().map(|r| &r.kind).collect();
/// assert_eq!(kinds, vec![
///     &MatchKind::Option { spelling: "-l".into() },
///     &MatchKind::Option { spelling: "-a".into() },
///     &MatchKind::Unknown,
/// ]);
/// ```
pub fn match_arguments(command: &str, args: &[Token], page: &ManPage) -> MatchOutcome {
    let mut matcher = Matcher {
        page,
        args,
        cursor: 0,
        next_argument: 0,
        seen_positional: false,
        options_done: false,
        outcome: MatchOutcome::default(),
    };
    matcher.run();

    let unknown = matcher.outcome.results.iter().filter(|r| r.is_unknown()).count();
    debug!(
        command,
        matched = matcher.outcome.results.len() - unknown,
        unknown,
        nested_at = ?matcher.outcome.nested_at,
        "matched arguments"
    );
    matcher.outcome
}

struct Matcher<'a> {
    page: &'a ManPage,
    args: &'a [Token],
    cursor: usize,
    next_argument: usize,
    seen_positional: bool,
    options_done: bool,
    outcome: MatchOutcome,
}

impl<'a> Matcher<'a> {
    fn run(&mut self) {
        let (args, page) = (self.args, self.page);
        while self.outcome.nested_at.is_none() {
            let Some(token) = args.get(self.cursor) else {
                break;
            };
            let index = self.cursor;
            self.cursor += 1;

            if self.options_done {
                self.positional(index, token);
            } else if token.text == "--" {
                self.options_done = true;
                match page.find_option("--") {
                    Some(option) => self.push_option(token.clone(), "--", option, None),
                    None => self.outcome.results.push(MatchResult::unknown(token)),
                }
            } else if token.text.len() > 1 && token.text.starts_with('-') {
                if !self.option(token) {
                    self.outcome.results.push(MatchResult::unknown(token));
                }
            } else if !self.dashless_option(token) && !self.partial_cluster(token) {
                self.positional(index, token);
            }
        }
    }

    /// Tries the exact, `=value` and cluster forms of an option token.
    fn option(&mut self, token: &Token) -> bool {
        if self.exact_or_inline(token) {
            return true;
        }
        !token.text.starts_with("--") && self.cluster(token, 1)
    }

    fn exact_or_inline(&mut self, token: &Token) -> bool {
        let page = self.page;
        let text = token.text.as_str();
        if let Some(option) = page.find_option(text) {
            self.push_option(token.clone(), text, option, None);
            return true;
        }
        let Some((name, _)) = text.split_once('=') else {
            return false;
        };
        let Some(option) = page.find_option(name) else {
            return false;
        };
        if !option.expects_arg {
            return false;
        }
        let value = token.fragment(name.len() + 1, text.len());
        self.push_option(token.clone(), name, option, Some(value));
        true
    }

    /// Documented spellings without a dash, such as `dd`'s `bs=SIZE`.
    fn dashless_option(&mut self, token: &Token) -> bool {
        if token.text.is_empty() || !token.expansions.is_empty() {
            return false;
        }
        self.exact_or_inline(token)
    }

    /// `tar xzf`: the first positional may be a cluster without its dash.
    fn partial_cluster(&mut self, token: &Token) -> bool {
        self.page.partial_match && !self.seen_positional && self.cluster(token, 0)
    }

    /// Decomposes `token.text[skip..]` into short options, getopt style.
    ///
    /// Every character up to the first value-taking option must be a
    /// documented short option, otherwise nothing is emitted. Characters
    /// after a value-taking option are its inline value.
    fn cluster(&mut self, token: &Token, skip: usize) -> bool {
        let page = self.page;
        let text = token.text.as_str();
        let Some(body) = text.get(skip..) else {
            return false;
        };
        if body.is_empty() {
            return false;
        }

        let mut plan: Vec<(usize, usize, char, &ManOption)> = Vec::new();
        for (offset, c) in body.char_indices() {
            let Some(option) = page.short_option(c) else {
                return false;
            };
            let start = skip + offset;
            let end = start + c.len_utf8();
            plan.push((start, end, c, option));
            if option.expects_arg {
                break;
            }
        }

        let last = plan.len() - 1;
        for (i, (start, end, c, option)) in plan.into_iter().enumerate() {
            let fragment = token.fragment(if i == 0 { 0 } else { start }, end);
            let inline = (i == last && end < text.len()).then(|| token.fragment(end, text.len()));
            self.push_option(fragment, &format!("-{c}"), option, inline);
        }
        true
    }

    fn push_option(&mut self, token: Token, spelling: &str, option: &ManOption, inline: Option<Token>) {
        let args = self.args;
        let value = match inline {
            Some(value) => Some(OptionValue::Inline(value)),
            None if option.expects_arg => match args.get(self.cursor) {
                Some(_) if option.nested_command => {
                    self.outcome.nested_at = Some(self.cursor);
                    None
                }
                Some(next) => {
                    self.cursor += 1;
                    Some(OptionValue::Separate(next.clone()))
                }
                None => Some(OptionValue::Missing),
            },
            None => None,
        };
        self.outcome.results.push(MatchResult {
            token,
            kind: MatchKind::Option {
                spelling: spelling.to_string(),
            },
            help: Some(option.text.clone()),
            value,
        });
    }

    fn positional(&mut self, index: usize, token: &Token) {
        let first = !self.seen_positional;
        self.seen_positional = true;
        if first && self.page.nested_command {
            self.outcome.nested_at = Some(index);
            return;
        }

        let page = self.page;
        let Some(argument) = page.arguments.get(self.next_argument) else {
            self.outcome.results.push(MatchResult::unknown(token));
            return;
        };
        if argument.nested_command {
            self.outcome.nested_at = Some(index);
            return;
        }
        if !argument.variadic {
            self.next_argument += 1;
        }
        self.outcome.results.push(MatchResult {
            token: token.clone(),
            kind: MatchKind::Argument {
                name: argument.name.clone(),
            },
            help: Some(argument.text.clone()),
            value: None,
        });
    }
}
