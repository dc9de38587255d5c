//! The `explain` entry point.

use serde::{Deserialize, Serialize};
use shell_explain_core::ManPageLookup;
use tracing::{debug, warn};

use crate::assemble::{Explanation, assemble, assemble_substitution};
use crate::ast::{CommandList, Token};
use crate::error::Result;
use crate::matcher::{CommandMatch, MatchOutcome, match_arguments, unmatched};
use crate::parser::{DEFAULT_MAX_NESTING_DEPTH, parse_substitutions, parse_with_depth};
use crate::resolver::{ManPageCache, Resolution, Resolver, normalize_name};

/// Default cap on the length of an explained command line, in bytes.
pub const DEFAULT_MAX_COMMAND_LENGTH: usize = 1000;

/// Limits applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Longer input is truncated before parsing.
    pub max_command_length: usize,
    /// Bound on group, substitution, and nested-command depth.
    pub max_nesting_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_command_length: DEFAULT_MAX_COMMAND_LENGTH,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

/// Explains command lines against man pages from a lookup.
///
/// The engine holds no per-request state, so one instance may serve many
/// requests at once when the lookup is `Sync`. All of them share `cache`.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use shell_explain_core::{LookupError, ManOption, ManPage, ManPageLookup};
/// use shell_explain_engine::{Engine, ManPageCache, ManPageRef};
///
/// struct Pages(HashMap<String, ManPage>);
///
/// impl ManPageLookup for Pages {
///     fn get_manpage(&self, name: &str) -> Result<Option<ManPage>, LookupError> {
///         Ok(self.0.get(name).cloned())
///     }
/// }
///
/// let ls = ManPage::new("ls", "1")
///     .with_synopsis("ls - list directory contents")
///     .with_option(ManOption::flag(&["-l"], &[], "use a long listing format"));
/// let pages = Pages(HashMap::from([("ls".to_string(), ls)]));
///
/// let cache = ManPageCache::new();
/// let engine = Engine::new(pages, &cache);
/// let explanation = engine.explain("ls -l | frobnicate").unwrap();
///
/// let commands = explanation.commands();
/// assert!(matches!(&commands[0].manpage, ManPageRef::Documented(p) if p.summary == "list directory contents"));
/// assert!(matches!(commands[1].manpage, ManPageRef::Unknown { .. }));
/// ```
pub struct Engine<'c, L> {
    lookup: L,
    cache: &'c ManPageCache,
    options: EngineOptions,
}

impl<'c, L: ManPageLookup> Engine<'c, L> {
    pub fn new(lookup: L, cache: &'c ManPageCache) -> Self {
        Self::with_options(lookup, cache, EngineOptions::default())
    }

    pub fn with_options(lookup: L, cache: &'c ManPageCache, options: EngineOptions) -> Self {
        Self {
            lookup,
            cache,
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn cache(&self) -> &'c ManPageCache {
        self.cache
    }

    /// Parses `command_line` under this engine's limits without resolving
    /// anything.
    pub fn parse(&self, command_line: &str) -> Result<CommandList> {
        parse_with_depth(self.truncate(command_line), self.options.max_nesting_depth)
    }

    /// Explains one command line.
    ///
    /// Commands inside substitution bodies are resolved through the same
    /// per-request resolver as the rest of the line. Only malformed syntax
    /// is an error. Commands without a usable man page are reported as
    /// unknown inside the explanation.
    pub fn explain(&self, command_line: &str) -> Result<Explanation> {
        let line = self.truncate(command_line);
        let depth = self.options.max_nesting_depth;
        let list = parse_with_depth(line, depth)?;
        let substitutions = parse_substitutions(line, &list, depth)?;

        let mut resolver = Resolver::new(&self.lookup, self.cache);
        let matches = self.match_list(&mut resolver, &list);
        let substitution_matches: Vec<Vec<Option<CommandMatch>>> = substitutions
            .iter()
            .map(|s| self.match_list(&mut resolver, &s.body))
            .collect();
        let resolutions = resolver.into_resolutions();
        debug!(
            commands = matches.len(),
            substitutions = substitutions.len(),
            names = resolutions.len(),
            "explained command line"
        );

        let mut explanation = assemble(line, &list, &resolutions, &matches);
        explanation.substitutions = substitutions
            .iter()
            .zip(&substitution_matches)
            .map(|(s, m)| assemble_substitution(s, &resolutions, m))
            .collect();
        Ok(explanation)
    }

    fn match_list(
        &self,
        resolver: &mut Resolver<'_, L>,
        list: &CommandList,
    ) -> Vec<Option<CommandMatch>> {
        list.simple_commands()
            .into_iter()
            .map(|cmd| {
                cmd.name()
                    .map(|name| self.match_command(resolver, name, cmd.arguments(), 0))
            })
            .collect()
    }

    fn truncate<'a>(&self, command_line: &'a str) -> &'a str {
        let max = self.options.max_command_length;
        if command_line.len() <= max {
            return command_line;
        }
        let mut end = max;
        while !command_line.is_char_boundary(end) {
            end -= 1;
        }
        warn!(
            length = command_line.len(),
            max, "command line too long, truncating"
        );
        &command_line[..end]
    }

    fn match_command(
        &self,
        resolver: &mut Resolver<'_, L>,
        name: &Token,
        args: &[Token],
        depth: usize,
    ) -> CommandMatch {
        let mut lookup_name = normalize_name(&name.text).to_string();
        let mut resolution = resolver.resolve(&lookup_name);
        let mut subcommand = None;
        let mut args = args;

        let multi = resolution.page().is_some_and(|page| page.multi_command);
        if let (true, Some(first)) = (multi, args.first()) {
            if is_subcommand_word(first) {
                let candidate = format!("{lookup_name}-{}", first.text);
                let sub = resolver.resolve(&candidate);
                if sub.is_resolved() {
                    lookup_name = candidate;
                    resolution = sub;
                    subcommand = Some(first.clone());
                    args = &args[1..];
                }
            }
        }

        let mut outcome = match &resolution {
            Resolution::Resolved(page) => match_arguments(&lookup_name, args, page),
            Resolution::Unresolved(_) => MatchOutcome {
                results: unmatched(args),
                nested_at: None,
            },
        };

        let mut nested = None;
        if let Some(at) = outcome.nested_at {
            let rest = args.get(at..).unwrap_or_default();
            match rest.split_first() {
                Some((nested_name, nested_args)) if depth < self.options.max_nesting_depth => {
                    nested = Some(Box::new(self.match_command(
                        resolver,
                        nested_name,
                        nested_args,
                        depth + 1,
                    )));
                }
                _ => outcome.results.extend(unmatched(rest)),
            }
        }

        CommandMatch {
            name: name.clone(),
            lookup_name,
            subcommand,
            results: outcome.results,
            nested,
        }
    }
}

/// A plain word that may name a subcommand page (`commit` in `git commit`).
fn is_subcommand_word(token: &Token) -> bool {
    token.is_verbatim()
        && token.expansions.is_empty()
        && token
            .text
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
        && token
            .text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Span, TokenKind};

    #[test]
    fn test_subcommand_word() {
        let word = |s: &str| Token::new(s, Span::new(0, s.len()), TokenKind::Word);
        assert!(is_subcommand_word(&word("commit")));
        assert!(is_subcommand_word(&word("ls-files")));
        assert!(!is_subcommand_word(&word("-m")));
        assert!(!is_subcommand_word(&word("a/b")));
        assert!(!is_subcommand_word(&Token::new("commit", Span::new(0, 8), TokenKind::Word)));
    }

    #[test]
    fn test_options_default() {
        let options = EngineOptions::default();
        assert_eq!(options.max_command_length, 1000);
        assert_eq!(options.max_nesting_depth, 32);
    }
}
