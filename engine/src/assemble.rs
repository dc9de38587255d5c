//! Recombination of the parse tree with resolutions and matches.
//!
//! Assembly is pure and infallible. It keeps the shape and token order of
//! the parsed [`CommandList`] and produces exactly one [`ExplainedCommand`]
//! per simple command, whatever happened during resolution. Reserved words
//! of compound commands become [`ShellAnnotation`]s; the commands between
//! them are explained like any other.

use std::collections::HashMap;

use serde::Serialize;
use shell_explain_core::ManPage;

use crate::ast::{
    Clause, CommandList, Compound, CompoundKind, ExpansionKind, GroupKind, Node, Operator,
    Redirection, SimpleCommand, Span, Substitution, Token,
};
use crate::help;
use crate::matcher::{CommandMatch, MatchKind, MatchResult, OptionValue, unmatched};
use crate::resolver::{Resolution, UnresolvedReason, normalize_name};

/// The identifying part of a resolved man page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManPageSummary {
    pub name: String,
    pub section: String,
    pub summary: String,
    pub source: String,
}

impl From<&ManPage> for ManPageSummary {
    fn from(page: &ManPage) -> Self {
        Self {
            name: page.name.clone(),
            section: page.section.clone(),
            summary: page.summary().to_string(),
            source: page.source.clone(),
        }
    }
}

/// Documentation state of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ManPageRef {
    Documented(ManPageSummary),
    Unknown { reason: UnresolvedReason },
    /// Assignments or redirections without a command name.
    NoCommand,
}

/// A piece of shell syntax with its fixed help text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellAnnotation {
    pub token: Token,
    pub help: String,
}

impl ShellAnnotation {
    fn new(token: &Token, help: &str) -> Self {
        Self {
            token: token.clone(),
            help: help.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedRedirection {
    pub operator: ShellAnnotation,
    pub target: Token,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Token>,
}

impl From<&Redirection> for ExplainedRedirection {
    fn from(r: &Redirection) -> Self {
        Self {
            operator: ShellAnnotation::new(&r.operator, help::redirection(&r.operator.text)),
            target: r.target.clone(),
            body: r.body.clone(),
        }
    }
}

/// One simple command with its documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedCommand {
    pub assignments: Vec<ShellAnnotation>,
    pub name: Option<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcommand: Option<Token>,
    pub manpage: ManPageRef,
    pub matches: Vec<MatchResult>,
    pub redirections: Vec<ExplainedRedirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<Box<ExplainedCommand>>,
}

impl ExplainedCommand {
    pub fn is_documented(&self) -> bool {
        matches!(self.manpage, ManPageRef::Documented(_))
    }

    /// Matches of this command and every nested command, in order.
    pub fn all_matches(&self) -> Vec<&MatchResult> {
        let mut out: Vec<&MatchResult> = self.matches.iter().collect();
        if let Some(nested) = &self.nested {
            out.extend(nested.all_matches());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedGroup {
    pub kind: GroupKind,
    pub open: ShellAnnotation,
    pub body: Vec<ExplainedEntry>,
    pub close: Token,
    pub redirections: Vec<ExplainedRedirection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedClause {
    pub keywords: Vec<ShellAnnotation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<ShellAnnotation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<ExplainedEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminator: Option<ShellAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedCompound {
    pub kind: CompoundKind,
    pub clauses: Vec<ExplainedClause>,
    pub redirections: Vec<ExplainedRedirection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExplainedNode {
    Command(ExplainedCommand),
    Group(ExplainedGroup),
    Compound(ExplainedCompound),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedEntry {
    pub node: ExplainedNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<ShellAnnotation>,
}

/// The explained body of a command or process substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainedSubstitution {
    pub kind: ExpansionKind,
    pub span: Span,
    pub entries: Vec<ExplainedEntry>,
}

/// The annotated form of a whole command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub source: String,
    pub entries: Vec<ExplainedEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<ShellAnnotation>,
    /// Substitution bodies in source order, nested ones included.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub substitutions: Vec<ExplainedSubstitution>,
}

/// Category of an [`Annotation`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Command,
    Option,
    Argument,
    Value,
    Unknown,
    Shell,
}

/// A flat row for renderers: one annotated piece of the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub span: Span,
    pub text: String,
    pub kind: AnnotationKind,
    pub help: Option<String>,
}

impl Explanation {
    /// Simple commands in source order, including those inside groups and
    /// compound commands but not nested commands, followed by the commands
    /// of each substitution body.
    pub fn commands(&self) -> Vec<&ExplainedCommand> {
        let mut out = Vec::new();
        collect_commands(&self.entries, &mut out);
        for substitution in &self.substitutions {
            collect_commands(&substitution.entries, &mut out);
        }
        out
    }

    pub fn command_count(&self) -> usize {
        self.commands().len()
    }

    /// Every annotated token ordered by position.
    pub fn annotations(&self) -> Vec<Annotation> {
        let mut rows = Vec::new();
        entry_rows(&self.entries, &mut rows);
        for substitution in &self.substitutions {
            entry_rows(&substitution.entries, &mut rows);
        }
        rows.extend(self.comments.iter().map(shell_row));
        rows.sort_by_key(|r| (r.span.start, r.span.end));
        rows
    }
}

fn collect_commands<'a>(entries: &'a [ExplainedEntry], out: &mut Vec<&'a ExplainedCommand>) {
    for entry in entries {
        match &entry.node {
            ExplainedNode::Command(cmd) => out.push(cmd),
            ExplainedNode::Group(group) => collect_commands(&group.body, out),
            ExplainedNode::Compound(compound) => {
                for clause in &compound.clauses {
                    collect_commands(&clause.body, out);
                }
            }
        }
    }
}

fn shell_row(annotation: &ShellAnnotation) -> Annotation {
    Annotation {
        span: annotation.token.span,
        text: annotation.token.text.clone(),
        kind: AnnotationKind::Shell,
        help: Some(annotation.help.clone()),
    }
}

fn redirection_rows(redirections: &[ExplainedRedirection], rows: &mut Vec<Annotation>) {
    for r in redirections {
        let mut row = shell_row(&r.operator);
        row.span = Span::new(r.operator.token.span.start, r.target.span.end);
        row.text = format!("{}{}", r.operator.token.text, r.target.text);
        rows.push(row);
    }
}

fn entry_rows(entries: &[ExplainedEntry], rows: &mut Vec<Annotation>) {
    for entry in entries {
        match &entry.node {
            ExplainedNode::Command(cmd) => command_rows(cmd, rows),
            ExplainedNode::Group(group) => {
                rows.push(shell_row(&group.open));
                entry_rows(&group.body, rows);
                rows.push(Annotation {
                    span: group.close.span,
                    text: group.close.text.clone(),
                    kind: AnnotationKind::Shell,
                    help: Some(group.open.help.clone()),
                });
                redirection_rows(&group.redirections, rows);
            }
            ExplainedNode::Compound(compound) => {
                for clause in &compound.clauses {
                    rows.extend(clause.keywords.iter().map(shell_row));
                    rows.extend(clause.words.iter().map(shell_row));
                    entry_rows(&clause.body, rows);
                    rows.extend(clause.terminator.iter().map(shell_row));
                }
                redirection_rows(&compound.redirections, rows);
            }
        }
        if let Some(sep) = &entry.separator {
            rows.push(shell_row(sep));
        }
    }
}

fn command_rows(cmd: &ExplainedCommand, rows: &mut Vec<Annotation>) {
    rows.extend(cmd.assignments.iter().map(shell_row));

    let summary = match &cmd.manpage {
        ManPageRef::Documented(page) if !page.summary.is_empty() => Some(page.summary.clone()),
        _ => None,
    };
    let kind = if cmd.is_documented() {
        AnnotationKind::Command
    } else {
        AnnotationKind::Unknown
    };
    for token in cmd.name.iter().chain(cmd.subcommand.iter()) {
        rows.push(Annotation {
            span: token.span,
            text: token.text.clone(),
            kind,
            help: summary.clone(),
        });
    }

    for m in &cmd.matches {
        let kind = match m.kind {
            MatchKind::Option { .. } => AnnotationKind::Option,
            MatchKind::Argument { .. } => AnnotationKind::Argument,
            MatchKind::Unknown => AnnotationKind::Unknown,
        };
        rows.push(Annotation {
            span: m.token.span,
            text: m.token.text.clone(),
            kind,
            help: m.help.clone(),
        });
        if let Some(OptionValue::Separate(value)) = &m.value {
            rows.push(Annotation {
                span: value.span,
                text: value.text.clone(),
                kind: AnnotationKind::Value,
                help: m.help.clone(),
            });
        }
    }

    redirection_rows(&cmd.redirections, rows);
    if let Some(nested) = &cmd.nested {
        command_rows(nested, rows);
    }
}

/// Builds the explanation tree.
///
/// `matches` holds one entry per simple command in walk order (see
/// [`CommandList::walk`]); `None` marks a command without a name. Missing
/// entries degrade to all-unknown arguments.
pub fn assemble(
    source: &str,
    list: &CommandList,
    resolutions: &HashMap<String, Resolution>,
    matches: &[Option<CommandMatch>],
) -> Explanation {
    let mut assembler = Assembler {
        resolutions,
        matches: matches.iter(),
    };
    Explanation {
        source: source.to_string(),
        entries: assembler.entries(list),
        comments: list
            .comments
            .iter()
            .map(|t| ShellAnnotation::new(t, help::COMMENT))
            .collect(),
        substitutions: Vec::new(),
    }
}

/// Builds the explanation of one substitution body. `matches` follows the
/// walk order of `substitution.body`, as for [`assemble`].
pub fn assemble_substitution(
    substitution: &Substitution,
    resolutions: &HashMap<String, Resolution>,
    matches: &[Option<CommandMatch>],
) -> ExplainedSubstitution {
    let mut assembler = Assembler {
        resolutions,
        matches: matches.iter(),
    };
    ExplainedSubstitution {
        kind: substitution.kind,
        span: substitution.span,
        entries: assembler.entries(&substitution.body),
    }
}

fn separator_annotation(token: &Token) -> ShellAnnotation {
    ShellAnnotation::new(token, token.operator().map_or("", help::operator))
}

struct Assembler<'a> {
    resolutions: &'a HashMap<String, Resolution>,
    matches: std::slice::Iter<'a, Option<CommandMatch>>,
}

impl Assembler<'_> {
    fn entries(&mut self, list: &CommandList) -> Vec<ExplainedEntry> {
        list.entries
            .iter()
            .map(|entry| {
                let node = match &entry.node {
                    Node::Command(cmd) => ExplainedNode::Command(self.command(cmd)),
                    Node::Group(group) => {
                        let help = match group.kind {
                            GroupKind::Subshell => help::operator(Operator::OpenSubshell),
                            GroupKind::Brace => help::operator(Operator::OpenBrace),
                        };
                        ExplainedNode::Group(ExplainedGroup {
                            kind: group.kind,
                            open: ShellAnnotation::new(&group.open, help),
                            body: self.entries(&group.body),
                            close: group.close.clone(),
                            redirections: group.redirections.iter().map(Into::into).collect(),
                        })
                    }
                    Node::Compound(compound) => ExplainedNode::Compound(self.compound(compound)),
                };
                let separator = entry.separator.as_ref().map(separator_annotation);
                ExplainedEntry { node, separator }
            })
            .collect()
    }

    fn compound(&mut self, compound: &Compound) -> ExplainedCompound {
        ExplainedCompound {
            kind: compound.kind,
            clauses: compound
                .clauses
                .iter()
                .map(|clause| self.clause(compound.kind, clause))
                .collect(),
            redirections: compound.redirections.iter().map(Into::into).collect(),
        }
    }

    fn clause(&mut self, kind: CompoundKind, clause: &Clause) -> ExplainedClause {
        let first = clause.keywords.first().map_or("", |t| t.text.as_str());
        let help = help::compound(kind, first);
        let annotate = |tokens: &[Token]| -> Vec<ShellAnnotation> {
            tokens.iter().map(|t| ShellAnnotation::new(t, help)).collect()
        };
        ExplainedClause {
            keywords: annotate(&clause.keywords),
            words: annotate(&clause.words),
            body: self.entries(&clause.body),
            terminator: clause.terminator.as_ref().map(separator_annotation),
        }
    }

    fn command(&mut self, cmd: &SimpleCommand) -> ExplainedCommand {
        let matched = self.matches.next().and_then(Option::as_ref);
        let mut explained = match (cmd.name(), matched) {
            (None, _) => ExplainedCommand {
                assignments: Vec::new(),
                name: None,
                subcommand: None,
                manpage: ManPageRef::NoCommand,
                matches: Vec::new(),
                redirections: Vec::new(),
                nested: None,
            },
            (Some(_), Some(m)) => self.matched(m),
            (Some(name), None) => ExplainedCommand {
                assignments: Vec::new(),
                name: Some(name.clone()),
                subcommand: None,
                manpage: self.manpage(normalize_name(&name.text)),
                matches: unmatched(cmd.arguments()),
                redirections: Vec::new(),
                nested: None,
            },
        };
        explained.assignments = cmd
            .assignments
            .iter()
            .map(|t| ShellAnnotation::new(t, help::ASSIGNMENT))
            .collect();
        explained.redirections = cmd.redirections.iter().map(Into::into).collect();
        explained
    }

    fn matched(&self, m: &CommandMatch) -> ExplainedCommand {
        ExplainedCommand {
            assignments: Vec::new(),
            name: Some(m.name.clone()),
            subcommand: m.subcommand.clone(),
            manpage: self.manpage(&m.lookup_name),
            matches: m.results.clone(),
            redirections: Vec::new(),
            nested: m.nested.as_deref().map(|n| Box::new(self.matched(n))),
        }
    }

    fn manpage(&self, name: &str) -> ManPageRef {
        match self.resolutions.get(name) {
            Some(Resolution::Resolved(page)) => ManPageRef::Documented(page.as_ref().into()),
            Some(Resolution::Unresolved(reason)) => ManPageRef::Unknown {
                reason: reason.clone(),
            },
            None => ManPageRef::Unknown {
                reason: UnresolvedReason::NotFound,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn test_without_matches_every_command_is_unknown() {
        let list = parse("FOO=1 foo -x | (bar y) > out; >log").unwrap();
        let explanation = assemble("", &list, &HashMap::new(), &[]);
        let commands = explanation.commands();
        assert_eq!(commands.len(), 3);
        assert!(commands[..2].iter().all(|c| matches!(
            c.manpage,
            ManPageRef::Unknown { reason: UnresolvedReason::NotFound }
        )));
        assert_eq!(commands[2].manpage, ManPageRef::NoCommand);
        assert_eq!(commands[0].assignments.len(), 1);
        assert!(commands[0].matches.iter().all(MatchResult::is_unknown));
    }

    #[test]
    fn test_structure_is_preserved() {
        let list = parse("a && (b | c) >x").unwrap();
        let explanation = assemble("", &list, &HashMap::new(), &[]);
        assert_eq!(explanation.entries.len(), 2);
        assert_eq!(
            explanation.entries[0].separator.as_ref().map(|s| s.token.text.as_str()),
            Some("&&")
        );
        let ExplainedNode::Group(group) = &explanation.entries[1].node else {
            panic!("expected a group");
        };
        assert_eq!(group.body.len(), 2);
        assert_eq!(group.redirections.len(), 1);
    }

    #[test]
    fn test_annotations_are_ordered() {
        let line = "ls -l | wc # count";
        let list = parse(line).unwrap();
        let explanation = assemble(line, &list, &HashMap::new(), &[]);
        let texts: Vec<String> = explanation.annotations().into_iter().map(|a| a.text).collect();
        assert_eq!(texts, vec!["ls", "-l", "|", "wc", "# count"]);
    }

    #[test]
    fn test_compound_keywords_are_shell_annotations() {
        let line = "for f in *.txt; do wc -l $f; done";
        let list = parse(line).unwrap();
        let explanation = assemble(line, &list, &HashMap::new(), &[]);
        assert_eq!(explanation.command_count(), 1);
        let ExplainedNode::Compound(compound) = &explanation.entries[0].node else {
            panic!("expected a compound command");
        };
        assert_eq!(compound.kind, CompoundKind::For);
        assert_eq!(compound.clauses[0].keywords[0].help, help::compound(CompoundKind::For, "for"));
        assert_eq!(compound.clauses[1].words[0].token.text, "*.txt");

        let rows = explanation.annotations();
        let texts: Vec<&str> = rows.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(texts, vec!["for", "f", "in", "*.txt", ";", "do", "wc", "-l", "$f", ";", "done"]);
        assert!(rows.iter().filter(|a| a.text == "done").all(|a| a.kind == AnnotationKind::Shell));
    }

    #[test]
    fn test_here_document_body_is_kept() {
        let line = "cat <<EOF\nls -l\nEOF";
        let list = parse(line).unwrap();
        let explanation = assemble(line, &list, &HashMap::new(), &[]);
        assert_eq!(explanation.command_count(), 1);
        let redirection = &explanation.commands()[0].redirections[0];
        assert_eq!(redirection.body.as_ref().map(|t| t.text.as_str()), Some("ls -l\n"));
    }
}
