//! Error types for command-line parsing.
//!
//! Only a [`SyntaxError`] aborts an explanation. Unknown commands and
//! unknown tokens are recorded in the result instead.

use thiserror::Error;

/// Malformed shell syntax. Every variant carries the byte offset where the
/// problem was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    /// A `'`, `"` or `$'` quote is never closed.
    #[error("unterminated {quote} quote starting at byte {pos}")]
    UnterminatedQuote { quote: char, pos: usize },

    /// `$(`, `` ` ``, `${`, `<(` or `>(` is never closed.
    #[error("unterminated substitution starting at byte {pos}")]
    UnterminatedSubstitution { pos: usize },

    /// An operator appears where a command is expected.
    #[error("unexpected operator '{op}' at byte {pos}")]
    UnexpectedOperator { op: String, pos: usize },

    /// A pipe or list operator has nothing after it.
    #[error("operator '{op}' at byte {pos} is missing a command after it")]
    DanglingOperator { op: String, pos: usize },

    /// A redirection operator has no target word.
    #[error("redirection '{op}' at byte {pos} has no target")]
    MissingRedirectionTarget { op: String, pos: usize },

    /// A `(` or `{` group is never closed.
    #[error("group opened at byte {pos} is never closed")]
    UnclosedGroup { pos: usize },

    /// A group contains no commands.
    #[error("empty group at byte {pos}")]
    EmptyGroup { pos: usize },

    /// A reserved word such as `then` or `done` outside its compound command.
    #[error("unexpected '{word}' at byte {pos}")]
    UnexpectedWord { word: String, pos: usize },

    /// A compound command ends before one of its reserved words.
    #[error("'{keyword}' at byte {pos} is missing '{expected}'")]
    UnclosedCompound {
        keyword: String,
        expected: String,
        pos: usize,
    },

    /// A compound command clause that needs commands has none.
    #[error("'{keyword}' at byte {pos} has no commands")]
    EmptyClause { keyword: String, pos: usize },

    /// Groups or substitutions nest deeper than allowed.
    #[error("nesting deeper than {limit} levels at byte {pos}")]
    NestingTooDeep { limit: usize, pos: usize },
}

impl SyntaxError {
    /// Byte offset in the input where the error was detected.
    pub fn position(&self) -> usize {
        match self {
            Self::UnterminatedQuote { pos, .. }
            | Self::UnterminatedSubstitution { pos }
            | Self::UnexpectedOperator { pos, .. }
            | Self::DanglingOperator { pos, .. }
            | Self::MissingRedirectionTarget { pos, .. }
            | Self::UnclosedGroup { pos }
            | Self::EmptyGroup { pos }
            | Self::UnexpectedWord { pos, .. }
            | Self::UnclosedCompound { pos, .. }
            | Self::EmptyClause { pos, .. }
            | Self::NestingTooDeep { pos, .. } => *pos,
        }
    }
}

/// Convenience alias for parse results.
pub type Result<T> = std::result::Result<T, SyntaxError>;
