//! Recursive-descent parser producing a [`CommandList`] tree.
//!
//! ```text
//! list     := and_or ((';' | '&' | NEWLINE) and_or)* [';' | '&']
//! and_or   := pipeline (('&&' | '||') pipeline)*
//! pipeline := node (('|' | '|&') node)*
//! node     := simple | group redirect* | compound redirect* | function | '!' node
//! group    := '(' list ')' | '{' list '}'
//! compound := if | while | until | for | select | case
//! function := NAME '(' ')' body | 'function' NAME ['(' ')'] body
//! ```
//!
//! The three list levels are flattened: every node is stored together with
//! the operator that follows it. Reserved words are recognized only in
//! command position, so `echo done` stays a plain command.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;

use crate::ast::{
    Clause, CommandList, Compound, CompoundKind, Expansion, ExpansionKind, Group, GroupKind,
    ListEntry, Node, Operator, Redirection, SimpleCommand, Substitution, Token, TokenKind,
    is_here_document_operator,
};
use crate::error::{Result, SyntaxError};
use crate::lexer::Lexer;

/// Default bound on group, compound, and substitution nesting.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 32;

static ASSIGNMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=").expect("static regex must compile"));

/// Reserved words that close a compound command and never start a node.
const CLOSERS: &[&str] = &["then", "elif", "else", "fi", "do", "done", "esac"];

/// Reserved words that open a compound command usable as a function body.
const OPENERS: &[&str] = &["{", "if", "while", "until", "for", "select", "case"];

const CASE_ARM_STOPS: &[&str] = &[";;", ";&", ";;&", "esac"];

/// Parses a command line with the default nesting bound.
///
/// Empty or blank input yields an empty list.
///
/// # Examples
///
/// ```
/// use shell_explain_engine::parse;
///
/// let list = parse("ls -la | wc -l && echo done").unwrap();
/// let names: Vec<&str> = list
///     .simple_commands()
///     .iter()
///     .filter_map(|c| c.name())
///     .map(|t| t.text.as_str())
///     .collect();
/// assert_eq!(names, vec!["ls", "wc", "echo"]);
///
/// assert!(parse("ls |").is_err());
/// assert!(parse("").unwrap().is_empty());
/// ```
pub fn parse(text: &str) -> Result<CommandList> {
    parse_with_depth(text, DEFAULT_MAX_NESTING_DEPTH)
}

/// Parses a command line, rejecting groups, compound commands, or
/// substitutions nested deeper than `max_depth`.
pub fn parse_with_depth(text: &str, max_depth: usize) -> Result<CommandList> {
    parse_range(text, 0, max_depth)
}

/// Parses every command and process substitution reachable from `list`,
/// including substitutions nested inside other substitution bodies.
///
/// `text` must be the line `list` was parsed from. The result is ordered by
/// position; body spans index `text`.
///
/// # Examples
///
/// ```
/// use shell_explain_engine::{parse, parse_substitutions};
///
/// let line = "ls $(grep -il todo src)";
/// let list = parse(line).unwrap();
/// let subs = parse_substitutions(line, &list, 32).unwrap();
/// let grep = subs[0].body.simple_commands()[0];
/// assert_eq!(grep.name().unwrap().raw(line), "grep");
/// ```
pub fn parse_substitutions(
    text: &str,
    list: &CommandList,
    max_depth: usize,
) -> Result<Vec<Substitution>> {
    let mut pending = command_expansions(list);
    let mut substitutions = Vec::new();
    while let Some(expansion) = pending.pop() {
        let Some((start, end)) = substitution_body(text, &expansion) else {
            continue;
        };
        let Some(src) = text.get(..end) else {
            continue;
        };
        let body = parse_range(src, start, max_depth)?;
        pending.extend(command_expansions(&body));
        substitutions.push(Substitution {
            kind: expansion.kind,
            span: expansion.span,
            body,
        });
    }
    substitutions.sort_by_key(|s| (s.span.start, s.span.end));
    Ok(substitutions)
}

fn command_expansions(list: &CommandList) -> Vec<Expansion> {
    list.tokens()
        .into_iter()
        .flat_map(|t| t.expansions.iter().copied())
        .filter(|e| {
            matches!(
                e.kind,
                ExpansionKind::CommandSubstitution | ExpansionKind::ProcessSubstitution
            )
        })
        .collect()
}

/// Byte range inside the delimiters of `$(...)`, `` `...` ``, `<(...)`.
fn substitution_body(text: &str, expansion: &Expansion) -> Option<(usize, usize)> {
    let raw = text.get(expansion.span.start..expansion.span.end)?;
    let open = if raw.starts_with('`') { 1 } else { 2 };
    let start = expansion.span.start + open;
    let end = expansion.span.end.checked_sub(1)?;
    (start <= end).then_some((start, end))
}

fn parse_range(text: &str, start: usize, max_depth: usize) -> Result<CommandList> {
    let mut comments = Vec::new();
    let mut here_documents = VecDeque::new();
    let mut tokens = Vec::new();
    for token in Lexer::starting_at(text, start, max_depth).tokenize()? {
        match token.kind {
            TokenKind::Comment => comments.push(token),
            TokenKind::HereDocument => here_documents.push_back(token),
            _ => tokens.push(token),
        }
    }

    let mut parser = Parser {
        src: text,
        tokens,
        here_documents,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let mut list = parser.list(&[])?;
    if let Some(extra) = parser.peek() {
        return Err(unexpected(extra));
    }
    list.comments = comments;
    Ok(list)
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    here_documents: VecDeque<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

fn unexpected(token: &Token) -> SyntaxError {
    SyntaxError::UnexpectedOperator {
        op: token.text.clone(),
        pos: token.span.start,
    }
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_operator(&self, n: usize) -> Option<Operator> {
        self.tokens.get(self.pos + n).and_then(Token::operator)
    }

    /// The next token's text if it is an unquoted word.
    fn peek_word(&self) -> Option<&str> {
        self.peek()
            .filter(|t| t.kind == TokenKind::Word && t.is_verbatim())
            .map(|t| t.text.as_str())
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned()?;
        self.pos += 1;
        Some(token)
    }

    fn end_of_input(&self) -> SyntaxError {
        SyntaxError::UnexpectedOperator {
            op: String::new(),
            pos: self.src.len(),
        }
    }

    /// Error for a compound command opened by `open` when the next token is
    /// not `expected`.
    fn expected(&self, open: &Token, expected: &str) -> SyntaxError {
        match self.peek() {
            None => SyntaxError::UnclosedCompound {
                keyword: open.text.clone(),
                expected: expected.to_string(),
                pos: open.span.start,
            },
            Some(t) if t.kind == TokenKind::Word => SyntaxError::UnexpectedWord {
                word: t.text.clone(),
                pos: t.span.start,
            },
            Some(t) => unexpected(t),
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek_operator(0) == Some(Operator::Newline) {
            self.pos += 1;
        }
    }

    /// Returns `true` when the next token is one of `stops`: an operator, or
    /// an unquoted word in command position.
    fn at_stop(&self, stops: &[&str]) -> bool {
        self.peek().is_some_and(|t| {
            let candidate = t.operator().is_some() || (t.kind == TokenKind::Word && t.is_verbatim());
            candidate && stops.contains(&t.text.as_str())
        })
    }

    fn list(&mut self, stops: &[&str]) -> Result<CommandList> {
        let mut list = CommandList::default();
        let mut pending: Option<Token> = None;

        loop {
            self.skip_newlines();
            let at_end = self.peek().is_none() || self.at_stop(stops);
            if at_end {
                if let Some(op) = pending.take() {
                    return Err(SyntaxError::DanglingOperator {
                        op: op.text,
                        pos: op.span.start,
                    });
                }
                break;
            }

            let node = self.node()?;

            let separator = match self.peek_operator(0) {
                Some(op) if op.is_binary() || op.is_terminator() => self.advance(),
                _ => None,
            };
            pending = separator
                .as_ref()
                .filter(|t| t.operator().is_some_and(Operator::is_binary))
                .cloned();
            let terminated = separator.is_some();
            list.entries.push(ListEntry { node, separator });

            if !terminated {
                match self.peek() {
                    None => break,
                    Some(_) if self.at_stop(stops) => break,
                    Some(token) => return Err(unexpected(token)),
                }
            }
        }
        Ok(list)
    }

    fn node(&mut self) -> Result<Node> {
        let Some(token) = self.peek() else {
            return Ok(Node::Command(SimpleCommand::default()));
        };
        match token.operator() {
            Some(Operator::OpenSubshell) => return self.group(GroupKind::Subshell),
            Some(_) => return Err(unexpected(token)),
            None => {}
        }
        let pos = token.span.start;
        let word = self.peek_word().map(str::to_owned);
        match word.as_deref() {
            Some("{") => self.group(GroupKind::Brace),
            Some("}") => Err(SyntaxError::UnexpectedOperator {
                op: "}".into(),
                pos,
            }),
            Some("if") => self.if_command(),
            Some("while") => self.loop_command(CompoundKind::While),
            Some("until") => self.loop_command(CompoundKind::Until),
            Some("for") => self.for_command(CompoundKind::For),
            Some("select") => self.for_command(CompoundKind::Select),
            Some("case") => self.case_command(),
            Some("function") => self.function(),
            Some("!") => self.negation(),
            Some(closer) if CLOSERS.contains(&closer) => Err(SyntaxError::UnexpectedWord {
                word: closer.to_string(),
                pos,
            }),
            Some(_) if self.at_parens(1) => self.function(),
            _ => self.simple_command().map(Node::Command),
        }
    }

    fn at_parens(&self, n: usize) -> bool {
        self.peek_operator(n) == Some(Operator::OpenSubshell)
            && self.peek_operator(n + 1) == Some(Operator::CloseSubshell)
    }

    fn enter(&mut self, pos: usize) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(SyntaxError::NestingTooDeep {
                limit: self.max_depth,
                pos,
            });
        }
        Ok(())
    }

    fn trailing_redirections(&mut self) -> Result<Vec<Redirection>> {
        let mut redirections = Vec::new();
        while self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Redirection)
        {
            redirections.push(self.redirection()?);
        }
        Ok(redirections)
    }

    fn group(&mut self, kind: GroupKind) -> Result<Node> {
        let Some(mut open) = self.advance() else {
            return Ok(Node::Command(SimpleCommand::default()));
        };
        if kind == GroupKind::Brace {
            open.kind = TokenKind::Operator(Operator::OpenBrace);
        }
        let stops: &[&str] = match kind {
            GroupKind::Subshell => &[")"],
            GroupKind::Brace => &["}"],
        };

        self.enter(open.span.start)?;
        let body = self.list(stops)?;
        self.depth -= 1;

        if !self.at_stop(stops) {
            return Err(SyntaxError::UnclosedGroup {
                pos: open.span.start,
            });
        }
        let Some(mut close) = self.advance() else {
            return Err(SyntaxError::UnclosedGroup {
                pos: open.span.start,
            });
        };
        if kind == GroupKind::Brace {
            close.kind = TokenKind::Operator(Operator::CloseBrace);
        }
        if body.is_empty() {
            return Err(SyntaxError::EmptyGroup {
                pos: open.span.start,
            });
        }

        let redirections = self.trailing_redirections()?;
        Ok(Node::Group(Group {
            kind,
            open,
            body,
            close,
            redirections,
        }))
    }

    /// Consumes the next token as a reserved word.
    fn keyword(&mut self) -> Result<Token> {
        let mut token = self.advance().ok_or_else(|| self.end_of_input())?;
        token.kind = TokenKind::Keyword;
        Ok(token)
    }

    fn expect_keyword(&mut self, word: &str, open: &Token) -> Result<Token> {
        if self.peek_word() == Some(word) {
            self.keyword()
        } else {
            Err(self.expected(open, word))
        }
    }

    /// Consumes a word bound by a compound command: a name, subject, or pattern.
    fn bound_word(&mut self, open: &Token, expected: &str) -> Result<Token> {
        if self.peek().is_some_and(|t| t.kind == TokenKind::Word) {
            self.advance().ok_or_else(|| self.end_of_input())
        } else {
            Err(self.expected(open, expected))
        }
    }

    fn clause_body(&mut self, keyword: &Token, stops: &[&str]) -> Result<CommandList> {
        let body = self.list(stops)?;
        if body.is_empty() {
            return Err(SyntaxError::EmptyClause {
                keyword: keyword.text.clone(),
                pos: keyword.span.start,
            });
        }
        Ok(body)
    }

    fn clause_terminator(&mut self) -> Option<Token> {
        match self.peek_operator(0) {
            Some(Operator::Semicolon | Operator::Newline) => self.advance(),
            _ => None,
        }
    }

    fn compound(&mut self, kind: CompoundKind, clauses: Vec<Clause>) -> Result<Node> {
        self.depth -= 1;
        let redirections = self.trailing_redirections()?;
        Ok(Node::Compound(Compound {
            kind,
            clauses,
            redirections,
        }))
    }

    fn if_command(&mut self) -> Result<Node> {
        let open = self.keyword()?;
        self.enter(open.span.start)?;

        let mut clauses = Vec::new();
        let mut keyword = open.clone();
        loop {
            let condition = self.clause_body(&keyword, &["then"])?;
            clauses.push(Clause::with_body(keyword, condition));
            let then = self.expect_keyword("then", &open)?;
            let body = self.clause_body(&then, &["elif", "else", "fi"])?;
            clauses.push(Clause::with_body(then, body));
            if self.peek_word() != Some("elif") {
                break;
            }
            keyword = self.keyword()?;
        }
        if self.peek_word() == Some("else") {
            let otherwise = self.keyword()?;
            let body = self.clause_body(&otherwise, &["fi"])?;
            clauses.push(Clause::with_body(otherwise, body));
        }
        clauses.push(Clause::keyword(self.expect_keyword("fi", &open)?));
        self.compound(CompoundKind::If, clauses)
    }

    fn loop_command(&mut self, kind: CompoundKind) -> Result<Node> {
        let open = self.keyword()?;
        self.enter(open.span.start)?;
        let condition = self.clause_body(&open, &["do"])?;
        let mut clauses = vec![Clause::with_body(open.clone(), condition)];
        self.loop_body(&open, &mut clauses)?;
        self.compound(kind, clauses)
    }

    fn loop_body(&mut self, open: &Token, clauses: &mut Vec<Clause>) -> Result<()> {
        let start = self.expect_keyword("do", open)?;
        let body = self.clause_body(&start, &["done"])?;
        clauses.push(Clause::with_body(start, body));
        clauses.push(Clause::keyword(self.expect_keyword("done", open)?));
        Ok(())
    }

    fn for_command(&mut self, kind: CompoundKind) -> Result<Node> {
        let open = self.keyword()?;
        self.enter(open.span.start)?;

        let mut head = Clause::keyword(open.clone());
        if kind == CompoundKind::For && self.at_parens_open() {
            head.words = self.arithmetic_header(&open)?;
        } else {
            head.words.push(self.bound_word(&open, "name")?);
        }
        self.skip_newlines();

        let mut clauses = Vec::new();
        if self.peek_word() == Some("in") {
            clauses.push(head);
            let mut words = Clause::keyword(self.keyword()?);
            while self.peek().is_some_and(|t| t.kind == TokenKind::Word) {
                words.words.extend(self.advance());
            }
            words.terminator = self.clause_terminator();
            clauses.push(words);
        } else {
            head.terminator = self.clause_terminator();
            clauses.push(head);
        }
        self.skip_newlines();

        self.loop_body(&open, &mut clauses)?;
        self.compound(kind, clauses)
    }

    fn at_parens_open(&self) -> bool {
        self.peek_operator(0) == Some(Operator::OpenSubshell)
    }

    /// `((init; test; step))` of an arithmetic `for`, kept as raw tokens.
    fn arithmetic_header(&mut self, open: &Token) -> Result<Vec<Token>> {
        let mut words = Vec::new();
        let mut depth = 0usize;
        loop {
            let Some(token) = self.advance() else {
                return Err(self.expected(open, "))"));
            };
            match token.operator() {
                Some(Operator::OpenSubshell) => depth += 1,
                Some(Operator::CloseSubshell) => depth = depth.saturating_sub(1),
                _ => {}
            }
            words.push(token);
            if depth == 0 {
                return Ok(words);
            }
        }
    }

    fn case_command(&mut self) -> Result<Node> {
        let open = self.keyword()?;
        self.enter(open.span.start)?;

        let mut head = Clause::keyword(open.clone());
        head.words.push(self.bound_word(&open, "word")?);
        self.skip_newlines();
        let mut clauses = vec![head, Clause::keyword(self.expect_keyword("in", &open)?)];
        loop {
            self.skip_newlines();
            if self.peek_word() == Some("esac") {
                break;
            }
            clauses.push(self.case_arm(&open)?);
        }
        clauses.push(Clause::keyword(self.expect_keyword("esac", &open)?));
        self.compound(CompoundKind::Case, clauses)
    }

    fn case_arm(&mut self, open: &Token) -> Result<Clause> {
        let mut arm = Clause::default();
        if self.at_parens_open() {
            arm.keywords.extend(self.advance());
        }
        loop {
            arm.words.push(self.bound_word(open, "esac")?);
            match self.peek_operator(0) {
                Some(Operator::Pipe) => arm.keywords.extend(self.advance()),
                Some(Operator::CloseSubshell) => {
                    arm.keywords.extend(self.advance());
                    break;
                }
                _ => return Err(self.expected(open, ")")),
            }
        }
        arm.body = self.list(CASE_ARM_STOPS)?;
        if matches!(
            self.peek_operator(0),
            Some(Operator::CaseBreak | Operator::CaseFallThrough)
        ) {
            arm.terminator = self.advance();
        }
        Ok(arm)
    }

    fn function(&mut self) -> Result<Node> {
        let Some(open) = self.peek().cloned() else {
            return Err(self.end_of_input());
        };
        let mut clause = Clause::default();
        if self.peek_word() == Some("function") {
            clause.keywords.push(self.keyword()?);
        }
        clause.words.push(self.bound_word(&open, "name")?);
        if self.at_parens(0) {
            clause.keywords.extend(self.advance());
            clause.keywords.extend(self.advance());
        }
        self.skip_newlines();

        let has_body = self.at_parens_open()
            || self.peek_word().is_some_and(|w| OPENERS.contains(&w));
        if !has_body {
            return Err(self.expected(&open, "{"));
        }
        self.enter(open.span.start)?;
        let body = self.node()?;
        clause.body.entries.push(ListEntry {
            node: body,
            separator: None,
        });
        self.compound(CompoundKind::Function, vec![clause])
    }

    fn negation(&mut self) -> Result<Node> {
        let bang = self.keyword()?;
        if self.peek().is_none() {
            return Err(self.expected(&bang, "command"));
        }
        self.enter(bang.span.start)?;
        let node = self.node()?;
        let body = CommandList {
            entries: vec![ListEntry {
                node,
                separator: None,
            }],
            comments: Vec::new(),
        };
        self.compound(CompoundKind::Negation, vec![Clause::with_body(bang, body)])
    }

    fn simple_command(&mut self) -> Result<SimpleCommand> {
        let mut cmd = SimpleCommand::default();
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Operator(_) => break,
                TokenKind::Redirection => {
                    let redirection = self.redirection()?;
                    cmd.redirections.push(redirection);
                }
                TokenKind::Word
                | TokenKind::Assignment
                | TokenKind::Keyword
                | TokenKind::Comment
                | TokenKind::HereDocument => {
                    let is_assignment =
                        cmd.words.is_empty() && ASSIGNMENT_RE.is_match(token.raw(self.src));
                    let Some(mut token) = self.advance() else {
                        break;
                    };
                    if is_assignment {
                        token.kind = TokenKind::Assignment;
                        cmd.assignments.push(token);
                    } else {
                        cmd.words.push(token);
                    }
                }
            }
        }
        Ok(cmd)
    }

    fn redirection(&mut self) -> Result<Redirection> {
        let Some(operator) = self.advance() else {
            return Err(self.end_of_input());
        };
        let target = match self.peek() {
            Some(t) if t.kind == TokenKind::Word => t.clone(),
            _ => {
                return Err(SyntaxError::MissingRedirectionTarget {
                    op: operator.text,
                    pos: operator.span.start,
                });
            }
        };
        self.pos += 1;
        let body = if is_here_document_operator(&operator.text) {
            self.here_documents.pop_front()
        } else {
            None
        };
        Ok(Redirection {
            operator,
            target,
            body,
        })
    }
}
