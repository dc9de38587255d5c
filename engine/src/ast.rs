//! Parse tree for shell command lines.
//!
//! Tokens own their unquoted text and remember where they came from in the
//! original string. The tree is strictly acyclic: groups and compound
//! commands own their nested [`CommandList`]s, never a reference back up.

use serde::Serialize;

/// Byte range in the original command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns `true` if `other` lies entirely inside this span.
    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Control operators recognized between commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operator {
    /// `|`
    Pipe,
    /// `|&`
    PipeAll,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `;`
    Semicolon,
    /// `&`
    Background,
    /// An unquoted line break.
    Newline,
    /// `(`
    OpenSubshell,
    /// `)`
    CloseSubshell,
    /// `{` in command position.
    OpenBrace,
    /// `}` in command position.
    CloseBrace,
    /// `;;` ending a `case` arm.
    CaseBreak,
    /// `;&` or `;;&` continuing a `case` into the next arm.
    CaseFallThrough,
}

impl Operator {
    /// Operators that must be followed by another command.
    pub fn is_binary(self) -> bool {
        matches!(self, Self::Pipe | Self::PipeAll | Self::And | Self::Or)
    }

    /// Operators that may end a list.
    pub fn is_terminator(self) -> bool {
        matches!(self, Self::Semicolon | Self::Background | Self::Newline)
    }
}

/// Kind tag of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    /// Command name or argument.
    Word,
    /// `NAME=value` before the command name.
    Assignment,
    /// Control operator.
    Operator(Operator),
    /// Redirection operator such as `>`, `2>&` or `<<<`.
    Redirection,
    /// `# ...` up to the end of the line.
    Comment,
    /// Reserved word of a compound command (`if`, `do`, `esac`, `!`).
    Keyword,
    /// Body lines of a `<<` or `<<-` here document.
    HereDocument,
}

/// Kind of expansion embedded in a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpansionKind {
    /// `$(...)` or `` `...` ``
    CommandSubstitution,
    /// `<(...)` or `>(...)`
    ProcessSubstitution,
    /// `$((...))`
    Arithmetic,
    /// `$name`, `${...}`, `$1`, `$?`
    Parameter,
}

/// An expansion found inside a word, located in the original string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Expansion {
    pub kind: ExpansionKind,
    pub span: Span,
}

/// A lexical unit of the command line after quote and escape removal.
///
/// # Examples
///
/// ```
/// use shell_explain_engine::parse;
///
/// let list = parse(r#"echo fo"o""#).unwrap();
/// let cmd = list.simple_commands()[0];
/// assert_eq!(cmd.words[1].text, "foo");
/// assert_eq!(cmd.words[1].raw(r#"echo fo"o""#), r#"fo"o""#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub text: String,
    pub span: Span,
    pub kind: TokenKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expansions: Vec<Expansion>,
}

impl Token {
    pub fn new(text: impl Into<String>, span: Span, kind: TokenKind) -> Self {
        Self {
            text: text.into(),
            span,
            kind,
            expansions: Vec::new(),
        }
    }

    /// Returns the token as it was written in `source`.
    pub fn raw<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.span.start..self.span.end).unwrap_or("")
    }

    /// Returns `true` if the token text is the source slice, unchanged by
    /// quote or escape removal.
    ///
    /// Removal always drops characters, so equal lengths mean nothing was
    /// removed.
    pub fn is_verbatim(&self) -> bool {
        self.span.len() == self.text.len()
    }

    /// Returns `true` for an unquoted word spelled exactly `s`.
    pub fn is_bare(&self, s: &str) -> bool {
        self.kind == TokenKind::Word && self.is_verbatim() && self.text == s
    }

    /// Returns the operator if this is an operator token.
    pub fn operator(&self) -> Option<Operator> {
        match self.kind {
            TokenKind::Operator(op) => Some(op),
            _ => None,
        }
    }

    /// Cuts a fragment `text[start..end]` out of this token.
    ///
    /// The fragment span is exact for verbatim tokens; for quoted tokens the
    /// source offsets of the fragment are unknown and the whole span is kept.
    pub fn fragment(&self, start: usize, end: usize) -> Token {
        let span = if self.is_verbatim() {
            Span::new(self.span.start + start, self.span.start + end)
        } else {
            self.span
        };
        Token {
            text: self.text.get(start..end).unwrap_or("").to_string(),
            span,
            kind: self.kind,
            expansions: self
                .expansions
                .iter()
                .filter(|e| span.contains(e.span))
                .copied()
                .collect(),
        }
    }
}

/// A redirection attached to a command, group, or compound command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirection {
    pub operator: Token,
    pub target: Token,
    /// Lines read after the next line break for `<<` and `<<-`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Token>,
}

impl Redirection {
    /// Returns `true` for `<<` and `<<-`, with or without a descriptor.
    pub fn is_here_document(&self) -> bool {
        is_here_document_operator(&self.operator.text)
    }
}

pub(crate) fn is_here_document_operator(op: &str) -> bool {
    matches!(op.trim_start_matches(|c: char| c.is_ascii_digit()), "<<" | "<<-")
}

/// One executable invocation: assignments, words, and redirections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimpleCommand {
    pub assignments: Vec<Token>,
    pub words: Vec<Token>,
    pub redirections: Vec<Redirection>,
}

impl SimpleCommand {
    /// The command name, absent for assignment- or redirection-only commands.
    pub fn name(&self) -> Option<&Token> {
        self.words.first()
    }

    /// Everything after the command name.
    pub fn arguments(&self) -> &[Token] {
        self.words.get(1..).unwrap_or(&[])
    }

    pub fn span(&self) -> Option<Span> {
        let tokens = self
            .assignments
            .iter()
            .chain(self.words.iter())
            .chain(self.redirections.iter().flat_map(|r| [&r.operator, &r.target]))
            .chain(self.redirections.iter().filter_map(|r| r.body.as_ref()));
        tokens.fold(None, |acc: Option<Span>, t| {
            Some(match acc {
                Some(s) => Span::new(s.start.min(t.span.start), s.end.max(t.span.end)),
                None => t.span,
            })
        })
    }
}

/// Kind of a grouping construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GroupKind {
    /// `( list )`
    Subshell,
    /// `{ list; }`
    Brace,
}

/// A parenthesized or braced group with its own nested list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub kind: GroupKind,
    pub open: Token,
    pub body: CommandList,
    pub close: Token,
    pub redirections: Vec<Redirection>,
}

/// Kind of a compound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompoundKind {
    /// `if list; then list; [elif list; then list;] [else list;] fi`
    If,
    /// `while list; do list; done`
    While,
    /// `until list; do list; done`
    Until,
    /// `for name [in words]; do list; done` or `for ((...)); do list; done`
    For,
    /// `select name [in words]; do list; done`
    Select,
    /// `case word in [(]pattern[|pattern]) list ;; ... esac`
    Case,
    /// `name () body` or `function name [()] body`
    Function,
    /// `! pipeline`
    Negation,
}

/// One section of a compound command.
///
/// `if a; then b; fi` has three clauses: `if` with body `a;`, `then` with
/// body `b;`, and a bare `fi`. A `case` arm keeps its pattern delimiters
/// in `keywords`, its patterns in `words`, and its `;;` as `terminator`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Clause {
    /// Reserved words and delimiters introducing the clause.
    pub keywords: Vec<Token>,
    /// Words bound by the clause: loop variable, `in` list, `case` subject,
    /// patterns, or a function name.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<Token>,
    #[serde(skip_serializing_if = "CommandList::is_empty")]
    pub body: CommandList,
    /// `;`, line break, or `;;` ending the clause.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminator: Option<Token>,
}

impl Clause {
    pub(crate) fn keyword(token: Token) -> Self {
        Self {
            keywords: vec![token],
            ..Self::default()
        }
    }

    pub(crate) fn with_body(token: Token, body: CommandList) -> Self {
        Self {
            keywords: vec![token],
            body,
            ..Self::default()
        }
    }
}

/// A command built from reserved words around nested lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Compound {
    pub kind: CompoundKind,
    pub clauses: Vec<Clause>,
    pub redirections: Vec<Redirection>,
}

/// A member of a [`CommandList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Node {
    Command(SimpleCommand),
    Group(Group),
    Compound(Compound),
}

/// A node and the operator that follows it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub node: Node,
    pub separator: Option<Token>,
}

/// Commands joined by control operators at one nesting level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandList {
    pub entries: Vec<ListEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Token>,
}

impl CommandList {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All simple commands in source order, including those inside groups
    /// and compound commands.
    pub fn simple_commands(&self) -> Vec<&SimpleCommand> {
        let mut out = Vec::new();
        self.walk(&mut |cmd| out.push(cmd));
        out
    }

    /// Visits every simple command in source order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a SimpleCommand)) {
        for entry in &self.entries {
            match &entry.node {
                Node::Command(cmd) => visit(cmd),
                Node::Group(group) => group.body.walk(visit),
                Node::Compound(compound) => {
                    for clause in &compound.clauses {
                        clause.body.walk(visit);
                    }
                }
            }
        }
    }

    /// Every token of the tree ordered by position.
    pub fn tokens(&self) -> Vec<&Token> {
        let mut out = Vec::new();
        self.collect_tokens(&mut out);
        out.sort_by_key(|t| (t.span.start, t.span.end));
        out
    }

    fn collect_tokens<'a>(&'a self, out: &mut Vec<&'a Token>) {
        for entry in &self.entries {
            match &entry.node {
                Node::Command(cmd) => {
                    out.extend(cmd.assignments.iter());
                    out.extend(cmd.words.iter());
                    collect_redirections(&cmd.redirections, out);
                }
                Node::Group(group) => {
                    out.push(&group.open);
                    group.body.collect_tokens(out);
                    out.push(&group.close);
                    collect_redirections(&group.redirections, out);
                }
                Node::Compound(compound) => {
                    for clause in &compound.clauses {
                        out.extend(clause.keywords.iter());
                        out.extend(clause.words.iter());
                        clause.body.collect_tokens(out);
                        out.extend(clause.terminator.iter());
                    }
                    collect_redirections(&compound.redirections, out);
                }
            }
            if let Some(sep) = &entry.separator {
                out.push(sep);
            }
        }
        out.extend(self.comments.iter());
    }
}

fn collect_redirections<'a>(redirections: &'a [Redirection], out: &mut Vec<&'a Token>) {
    for r in redirections {
        out.push(&r.operator);
        out.push(&r.target);
        out.extend(r.body.iter());
    }
}

/// The parsed body of a `$(...)`, `` `...` ``, `<(...)` or `>(...)`.
///
/// Body spans index the enclosing command line, not the substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Substitution {
    pub kind: ExpansionKind,
    pub span: Span,
    pub body: CommandList,
}

/// Re-serializes the token texts of a parse tree in source order.
///
/// Normalization is limited to joining tokens with single spaces.
pub fn reconstruct(list: &CommandList) -> String {
    list.tokens()
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_verbatim_has_exact_span() {
        let token = Token::new("--color=auto", Span::new(5, 17), TokenKind::Word);
        let value = token.fragment(8, 12);
        assert_eq!(value.text, "auto");
        assert_eq!(value.span, Span::new(13, 17));
    }

    #[test]
    fn test_fragment_quoted_keeps_whole_span() {
        let token = Token::new("--color=auto", Span::new(0, 14), TokenKind::Word);
        assert!(!token.is_verbatim());
        let value = token.fragment(8, 12);
        assert_eq!(value.text, "auto");
        assert_eq!(value.span, Span::new(0, 14));
    }

    #[test]
    fn test_is_bare_requires_unquoted() {
        assert!(Token::new("{", Span::new(0, 1), TokenKind::Word).is_bare("{"));
        assert!(!Token::new("{", Span::new(0, 3), TokenKind::Word).is_bare("{"));
    }

    #[test]
    fn test_operator_classes() {
        assert!(Operator::Pipe.is_binary());
        assert!(Operator::Or.is_binary());
        assert!(!Operator::Semicolon.is_binary());
        assert!(Operator::Background.is_terminator());
        assert!(!Operator::And.is_terminator());
        assert!(!Operator::CaseBreak.is_terminator());
    }

    #[test]
    fn test_is_verbatim() {
        assert!(Token::new("ls", Span::new(0, 2), TokenKind::Word).is_verbatim());
        assert!(!Token::new("ls", Span::new(0, 4), TokenKind::Word).is_verbatim());
    }

    #[test]
    fn test_here_document_operators() {
        assert!(is_here_document_operator("<<"));
        assert!(is_here_document_operator("<<-"));
        assert!(is_here_document_operator("0<<"));
        assert!(!is_here_document_operator("<<<"));
        assert!(!is_here_document_operator("<"));
    }
}
