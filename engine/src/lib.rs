//! Explanation engine for shell command lines.
//!
//! A command line flows through four stages:
//!
//! 1. [`parse`] turns the text into a [`CommandList`] of simple commands,
//!    groups, compound commands, operators, and redirections.
//!    [`parse_substitutions`] parses the bodies of `$(...)`, backticks,
//!    and `<(...)` found in its words.
//! 2. A per-request [`Resolver`] maps every distinct command name to its
//!    man page, through the process-wide [`ManPageCache`] and an external
//!    [`ManPageLookup`](shell_explain_core::ManPageLookup).
//! 3. [`match_arguments`] aligns each command's arguments to the page's
//!    documented options and positionals.
//! 4. [`assemble`] recombines everything into an [`Explanation`] that keeps
//!    the shape of the parse tree.
//!
//! [`Engine::explain`] runs all four. Only a [`SyntaxError`] fails a request;
//! missing pages and unknown tokens are part of the result.

pub mod assemble;
pub mod ast;
mod engine;
mod error;
pub mod help;
mod lexer;
pub mod matcher;
pub mod output;
mod parser;
pub mod resolver;

pub use assemble::{
    Annotation, AnnotationKind, ExplainedClause, ExplainedCommand, ExplainedCompound,
    ExplainedEntry, ExplainedGroup, ExplainedNode, ExplainedRedirection, ExplainedSubstitution,
    Explanation, ManPageRef, ManPageSummary, ShellAnnotation, assemble, assemble_substitution,
};
pub use ast::{CommandList, Span, Substitution, Token, TokenKind, reconstruct};
pub use engine::{DEFAULT_MAX_COMMAND_LENGTH, Engine, EngineOptions};
pub use error::{Result, SyntaxError};
pub use matcher::{
    CommandMatch, MatchKind, MatchOutcome, MatchResult, OptionValue, match_arguments, unmatched,
};
pub use output::{OutputFormat, format_explanation};
pub use parser::{DEFAULT_MAX_NESTING_DEPTH, parse, parse_substitutions, parse_with_depth};
pub use resolver::{ManPageCache, Resolution, Resolver, UnresolvedReason, normalize_name};
