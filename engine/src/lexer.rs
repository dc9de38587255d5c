//! Single-pass tokenizer for shell command lines.
//!
//! Scans left to right with a byte cursor, tracking quote and escape state.
//! Words accumulate their unquoted text until unquoted whitespace or a
//! control operator closes them. Substitutions are kept verbatim inside the
//! word and recorded as [`Expansion`]s; only their nesting is analysed.
//! Here-document bodies are read at the line break that follows their
//! redirection and emitted as a single [`TokenKind::HereDocument`] token.

use crate::ast::{
    Expansion, ExpansionKind, Operator, Span, Token, TokenKind, is_here_document_operator,
};
use crate::error::{Result, SyntaxError};

/// Redirection operators, longest first so that prefixes never win.
const REDIRECTIONS: &[&str] = &[
    "&>>", "&>", "<<<", "<<-", "<<", "<>", "<&", "<", ">>", ">|", ">&", ">",
];

pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    max_depth: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(src: &'a str, max_depth: usize) -> Self {
        Self::starting_at(src, 0, max_depth)
    }

    /// Lexes `src[pos..]` while keeping spans relative to the start of `src`.
    pub(crate) fn starting_at(src: &'a str, pos: usize, max_depth: usize) -> Self {
        Self {
            src,
            pos,
            max_depth,
        }
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens: Vec<Token> = Vec::new();
        // (delimiter, strip leading tabs) of here documents awaiting a line break
        let mut pending: Vec<(String, bool)> = Vec::new();
        loop {
            self.skip_blanks();
            let Some(c) = self.peek() else {
                break;
            };
            let token = match c {
                '\n' => {
                    let start = self.pos;
                    self.bump();
                    Token::new("\n", Span::new(start, self.pos), TokenKind::Operator(Operator::Newline))
                }
                '#' => self.comment(),
                '|' | ';' | '(' | ')' => self.control(),
                '&' if self.peek_at(1) == Some('>') => self.redirection()?,
                '&' => self.control(),
                '<' | '>' if self.peek_at(1) == Some('(') => self.word()?,
                '<' | '>' => self.redirection()?,
                // `2>&1>out`: the `1` is the target of `2>&`, not an fd prefix
                c if c.is_ascii_digit()
                    && tokens.last().is_none_or(|t| t.kind != TokenKind::Redirection)
                    && self.fd_redirection_ahead() =>
                {
                    self.redirection()?
                }
                _ => self.word()?,
            };
            if let Some(last) = tokens.last() {
                if token.kind == TokenKind::Word
                    && last.kind == TokenKind::Redirection
                    && is_here_document_operator(&last.text)
                {
                    pending.push((token.text.clone(), last.text.ends_with('-')));
                }
            }
            let newline = token.operator() == Some(Operator::Newline);
            tokens.push(token);
            if newline {
                for (delimiter, strip_tabs) in std::mem::take(&mut pending) {
                    tokens.push(self.here_document(&delimiter, strip_tabs));
                }
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn skip_blanks(&mut self) {
        loop {
            if self.starts_with("\\\n") {
                self.pos += 2;
            } else if matches!(self.peek(), Some(' ' | '\t' | '\r')) {
                self.pos += 1;
            } else {
                return;
            }
        }
    }

    fn comment(&mut self) -> Token {
        let start = self.pos;
        let end = self.src[start..]
            .find('\n')
            .map_or(self.src.len(), |i| start + i);
        self.pos = end;
        Token::new(&self.src[start..end], Span::new(start, end), TokenKind::Comment)
    }

    /// Reads lines up to one equal to `delimiter`. The delimiter line and its
    /// line break are consumed but not part of the token; a missing
    /// delimiter ends the body at the end of input.
    fn here_document(&mut self, delimiter: &str, strip_tabs: bool) -> Token {
        let start = self.pos;
        let mut text = String::new();
        while self.pos < self.src.len() {
            let rest = &self.src[self.pos..];
            let len = rest.find('\n').unwrap_or(rest.len());
            let line = &rest[..len];
            let line = if strip_tabs {
                line.trim_start_matches('\t')
            } else {
                line
            };
            if line == delimiter {
                let end = self.pos;
                self.pos = (self.pos + len + 1).min(self.src.len());
                return Token::new(text, Span::new(start, end), TokenKind::HereDocument);
            }
            text.push_str(line);
            self.pos += len;
            if self.pos < self.src.len() {
                text.push('\n');
                self.pos += 1;
            }
        }
        Token::new(text, Span::new(start, self.pos), TokenKind::HereDocument)
    }

    fn control(&mut self) -> Token {
        let start = self.pos;
        let (op, len) = if self.starts_with(";;&") {
            (Operator::CaseFallThrough, 3)
        } else if self.starts_with(";;") {
            (Operator::CaseBreak, 2)
        } else if self.starts_with(";&") {
            (Operator::CaseFallThrough, 2)
        } else if self.starts_with("|&") {
            (Operator::PipeAll, 2)
        } else if self.starts_with("||") {
            (Operator::Or, 2)
        } else if self.starts_with("|") {
            (Operator::Pipe, 1)
        } else if self.starts_with("&&") {
            (Operator::And, 2)
        } else if self.starts_with("&") {
            (Operator::Background, 1)
        } else if self.starts_with(";") {
            (Operator::Semicolon, 1)
        } else if self.starts_with("(") {
            (Operator::OpenSubshell, 1)
        } else {
            (Operator::CloseSubshell, 1)
        };
        self.pos += len;
        Token::new(
            &self.src[start..self.pos],
            Span::new(start, self.pos),
            TokenKind::Operator(op),
        )
    }

    /// Digits immediately followed by `<` or `>` form a file descriptor prefix.
    fn fd_redirection_ahead(&self) -> bool {
        let rest = &self.src[self.pos..];
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        digits > 0 && matches!(rest.as_bytes().get(digits), Some(b'<' | b'>'))
    }

    fn redirection(&mut self) -> Result<Token> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        match REDIRECTIONS.iter().find(|op| self.starts_with(op)) {
            Some(op) => {
                self.pos += op.len();
                Ok(Token::new(
                    &self.src[start..self.pos],
                    Span::new(start, self.pos),
                    TokenKind::Redirection,
                ))
            }
            None => {
                self.pos = start;
                self.word()
            }
        }
    }

    fn word(&mut self) -> Result<Token> {
        let start = self.pos;
        let mut text = String::new();
        let mut expansions = Vec::new();

        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' | ';' | '&' | '|' | '(' | ')' => break,
                '<' | '>' if self.peek_at(1) == Some('(') => {
                    let open = self.pos;
                    self.pos += 1;
                    self.scan_parens(open)?;
                    text.push_str(&self.src[open..self.pos]);
                    expansions.push(Expansion {
                        kind: ExpansionKind::ProcessSubstitution,
                        span: Span::new(open, self.pos),
                    });
                }
                '<' | '>' => break,
                '\\' => {
                    self.bump();
                    match self.bump() {
                        Some('\n') => {}
                        Some(escaped) => text.push(escaped),
                        None => text.push('\\'),
                    }
                }
                '\'' => self.single_quoted(&mut text)?,
                '"' => self.double_quoted(&mut text, &mut expansions)?,
                '$' => self.dollar(&mut text, &mut expansions, false)?,
                '`' => self.backtick(&mut text, &mut expansions)?,
                _ => {
                    self.bump();
                    text.push(c);
                }
            }
        }

        Ok(Token {
            text,
            span: Span::new(start, self.pos),
            kind: TokenKind::Word,
            expansions,
        })
    }

    fn single_quoted(&mut self, text: &mut String) -> Result<()> {
        let open = self.pos;
        self.pos += 1;
        let Some(len) = self.src[self.pos..].find('\'') else {
            return Err(SyntaxError::UnterminatedQuote { quote: '\'', pos: open });
        };
        text.push_str(&self.src[self.pos..self.pos + len]);
        self.pos += len + 1;
        Ok(())
    }

    fn double_quoted(&mut self, text: &mut String, expansions: &mut Vec<Expansion>) -> Result<()> {
        let open = self.pos;
        self.pos += 1;
        loop {
            let Some(c) = self.peek() else {
                return Err(SyntaxError::UnterminatedQuote { quote: '"', pos: open });
            };
            match c {
                '"' => {
                    self.pos += 1;
                    return Ok(());
                }
                '\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some('\n') => self.pos += 1,
                        Some(e @ ('$' | '`' | '"' | '\\')) => {
                            self.pos += 1;
                            text.push(e);
                        }
                        _ => text.push('\\'),
                    }
                }
                '$' => self.dollar(text, expansions, true)?,
                '`' => self.backtick(text, expansions)?,
                _ => {
                    self.bump();
                    text.push(c);
                }
            }
        }
    }

    /// `$'...'` with the common backslash escapes.
    fn ansi_c_quoted(&mut self, text: &mut String) -> Result<()> {
        let open = self.pos;
        self.pos += 2;
        loop {
            match self.bump() {
                None => return Err(SyntaxError::UnterminatedQuote { quote: '\'', pos: open }),
                Some('\'') => return Ok(()),
                Some('\\') => match self.bump() {
                    None => return Err(SyntaxError::UnterminatedQuote { quote: '\'', pos: open }),
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some('a') => text.push('\x07'),
                    Some('e' | 'E') => text.push('\x1b'),
                    Some(e @ ('\\' | '\'' | '"')) => text.push(e),
                    Some(other) => {
                        text.push('\\');
                        text.push(other);
                    }
                },
                Some(c) => text.push(c),
            }
        }
    }

    fn dollar(
        &mut self,
        text: &mut String,
        expansions: &mut Vec<Expansion>,
        in_double_quotes: bool,
    ) -> Result<()> {
        let start = self.pos;
        let kind = match self.peek_at(1) {
            Some('\'') if !in_double_quotes => return self.ansi_c_quoted(text),
            Some('(') => {
                let kind = if self.peek_at(2) == Some('(') {
                    ExpansionKind::Arithmetic
                } else {
                    ExpansionKind::CommandSubstitution
                };
                self.pos += 1;
                self.scan_parens(start)?;
                kind
            }
            Some('{') => {
                self.pos += 1;
                self.scan_braces(start)?;
                ExpansionKind::Parameter
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.pos += 1;
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                    self.pos += 1;
                }
                ExpansionKind::Parameter
            }
            Some(c) if c.is_ascii_digit() || "?$!#@*-".contains(c) => {
                self.pos += 2;
                ExpansionKind::Parameter
            }
            _ => {
                self.pos += 1;
                text.push('$');
                return Ok(());
            }
        };
        text.push_str(&self.src[start..self.pos]);
        expansions.push(Expansion {
            kind,
            span: Span::new(start, self.pos),
        });
        Ok(())
    }

    fn backtick(&mut self, text: &mut String, expansions: &mut Vec<Expansion>) -> Result<()> {
        let open = self.pos;
        self.pos += 1;
        self.skip_backticks(open)?;
        text.push_str(&self.src[open..self.pos]);
        expansions.push(Expansion {
            kind: ExpansionKind::CommandSubstitution,
            span: Span::new(open, self.pos),
        });
        Ok(())
    }

    /// Advances past the backtick that closes a substitution opened at `open`.
    fn skip_backticks(&mut self, open: usize) -> Result<()> {
        loop {
            match self.bump() {
                None => return Err(SyntaxError::UnterminatedSubstitution { pos: open }),
                Some('`') => return Ok(()),
                Some('\\') => {
                    self.bump();
                }
                Some(_) => {}
            }
        }
    }

    /// Skips a double-quoted string nested inside a substitution.
    fn skip_double_quoted(&mut self, open: usize) -> Result<()> {
        loop {
            match self.bump() {
                None => return Err(SyntaxError::UnterminatedQuote { quote: '"', pos: open }),
                Some('"') => return Ok(()),
                Some('\\') => {
                    self.bump();
                }
                Some('$') if self.peek() == Some('(') => {
                    let start = self.pos - 1;
                    self.scan_parens(start)?;
                }
                Some('`') => self.skip_backticks(self.pos - 1)?,
                Some(_) => {}
            }
        }
    }

    fn skip_single_quoted(&mut self, open: usize) -> Result<()> {
        match self.src[self.pos..].find('\'') {
            Some(len) => {
                self.pos += len + 1;
                Ok(())
            }
            None => Err(SyntaxError::UnterminatedQuote { quote: '\'', pos: open }),
        }
    }

    /// Advances from an opening `(` to just past its matching `)`.
    fn scan_parens(&mut self, start: usize) -> Result<()> {
        self.scan_balanced(start, '(', ')')
    }

    /// Advances from an opening `{` to just past its matching `}`.
    fn scan_braces(&mut self, start: usize) -> Result<()> {
        self.scan_balanced(start, '{', '}')
    }

    fn scan_balanced(&mut self, start: usize, open: char, close: char) -> Result<()> {
        let mut depth = 0usize;
        loop {
            let at = self.pos;
            let Some(c) = self.bump() else {
                return Err(SyntaxError::UnterminatedSubstitution { pos: start });
            };
            match c {
                c if c == open => {
                    depth += 1;
                    if depth > self.max_depth {
                        return Err(SyntaxError::NestingTooDeep {
                            limit: self.max_depth,
                            pos: at,
                        });
                    }
                }
                c if c == close => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                '\\' => {
                    self.bump();
                }
                '$' if self.peek() == Some('\'') => {
                    self.pos = at;
                    self.ansi_c_quoted(&mut String::new())?;
                }
                '\'' => self.skip_single_quoted(at)?,
                '"' => self.skip_double_quoted(at)?,
                '`' => self.skip_backticks(at)?,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        Lexer::new(input, 32).tokenize().unwrap()
    }

    fn texts(input: &str) -> Vec<String> {
        lex(input).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_words_and_spans() {
        let tokens = lex("ls -la  /tmp");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].text, "-la");
        assert_eq!(tokens[1].span, Span::new(3, 6));
        assert_eq!(tokens[2].span, Span::new(8, 12));
    }

    #[test]
    fn test_adjacent_quotes_concatenate() {
        assert_eq!(texts(r#"fo"o" 'a'b"c" x\ y"#), vec!["foo", "abc", "x y"]);
    }

    #[test]
    fn test_empty_quotes_make_empty_word() {
        let tokens = lex("echo ''");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].text, "");
        assert_eq!(tokens[1].span, Span::new(5, 7));
    }

    #[test]
    fn test_double_quote_escapes() {
        assert_eq!(texts(r#""a\"b\$c\n""#), vec![r#"a"b$c\n"#]);
    }

    #[test]
    fn test_ansi_c_quotes() {
        assert_eq!(texts(r"$'a\tb\'c'"), vec!["a\tb'c"]);
    }

    #[test]
    fn test_ansi_c_quote_inside_substitution() {
        let tokens = lex(r"echo $(echo $'it\'s')");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].text, r"$(echo $'it\'s')");
        assert_eq!(
            Lexer::new(r"echo $(echo $'it)", 32).tokenize(),
            Err(SyntaxError::UnterminatedQuote { quote: '\'', pos: 12 })
        );
    }

    #[test]
    fn test_case_operators() {
        let ops: Vec<Operator> = lex("a;; b;& c;;& d;").iter().filter_map(Token::operator).collect();
        assert_eq!(
            ops,
            vec![
                Operator::CaseBreak,
                Operator::CaseFallThrough,
                Operator::CaseFallThrough,
                Operator::Semicolon,
            ]
        );
    }

    #[test]
    fn test_here_document_body() {
        let tokens = lex("cat <<EOF\nls -l\nEOF\necho done");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["cat", "<<", "EOF", "\n", "ls -l\n", "echo", "done"]);
        assert_eq!(tokens[4].kind, TokenKind::HereDocument);
        assert_eq!(tokens[4].span, Span::new(10, 16));
    }

    #[test]
    fn test_here_document_strips_tabs() {
        let tokens = lex("cat <<-'END' >out\n\tone\n\tEND");
        let body = tokens.iter().find(|t| t.kind == TokenKind::HereDocument).unwrap();
        assert_eq!(body.text, "one\n");
    }

    #[test]
    fn test_here_document_without_delimiter_runs_to_end() {
        let tokens = lex("cat <<EOF\nls -l");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::HereDocument);
        assert_eq!(tokens.last().unwrap().text, "ls -l");
    }

    #[test]
    fn test_here_string_reads_no_body() {
        let tokens = lex("cat <<<word\nls");
        assert!(tokens.iter().all(|t| t.kind != TokenKind::HereDocument));
        assert_eq!(tokens.last().unwrap().text, "ls");
    }

    #[test]
    fn test_starting_at_keeps_absolute_spans() {
        let tokens = Lexer::starting_at("echo $(ls -l", 7, 32).tokenize().unwrap();
        assert_eq!(tokens[0].text, "ls");
        assert_eq!(tokens[0].span, Span::new(7, 9));
        assert_eq!(tokens[1].span, Span::new(10, 12));
    }

    #[test]
    fn test_operators() {
        let kinds: Vec<TokenKind> = lex("a|b||c&&d;e&f|&g").iter().map(|t| t.kind).collect();
        let ops: Vec<Operator> = kinds
            .iter()
            .filter_map(|k| match k {
                TokenKind::Operator(op) => Some(*op),
                _ => None,
            })
            .collect();
        assert_eq!(
            ops,
            vec![
                Operator::Pipe,
                Operator::Or,
                Operator::And,
                Operator::Semicolon,
                Operator::Background,
                Operator::PipeAll,
            ]
        );
    }

    #[test]
    fn test_redirections() {
        let tokens = lex("cmd 2>&1 >>out <in &>all 3<>rw <<<here");
        let redirs: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Redirection)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(redirs, vec!["2>&", ">>", "<", "&>", "3<>", "<<<"]);
        assert_eq!(tokens[2].text, "1");
    }

    #[test]
    fn test_redirection_target_digits_are_not_fd_prefix() {
        let tokens = lex("cmd 2>&1>/dev/null");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["cmd", "2>&", "1", ">", "/dev/null"]);
    }

    #[test]
    fn test_digits_without_redirection_are_words() {
        assert_eq!(texts("head -n 10 file2"), vec!["head", "-n", "10", "file2"]);
    }

    #[test]
    fn test_command_substitution_stays_in_word() {
        let tokens = lex("echo $(ls | wc -l) done");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].text, "$(ls | wc -l)");
        assert_eq!(tokens[1].expansions[0].kind, ExpansionKind::CommandSubstitution);
        assert_eq!(tokens[1].expansions[0].span, Span::new(5, 18));
    }

    #[test]
    fn test_nested_substitution_with_quotes() {
        let tokens = lex(r#"echo "$(echo ")" $(date))""#);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_process_substitution() {
        let tokens = lex("diff <(ls a) <(ls b)");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].expansions[0].kind, ExpansionKind::ProcessSubstitution);
    }

    #[test]
    fn test_parameters() {
        let tokens = lex("echo $HOME ${PATH:-x} $? $1 $((1+2))");
        let kinds: Vec<ExpansionKind> = tokens
            .iter()
            .flat_map(|t| t.expansions.iter().map(|e| e.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ExpansionKind::Parameter,
                ExpansionKind::Parameter,
                ExpansionKind::Parameter,
                ExpansionKind::Parameter,
                ExpansionKind::Arithmetic,
            ]
        );
    }

    #[test]
    fn test_comment() {
        let tokens = lex("ls # list things");
        assert_eq!(tokens[1].kind, TokenKind::Comment);
        assert_eq!(tokens[1].text, "# list things");
    }

    #[test]
    fn test_hash_inside_word_is_literal() {
        assert_eq!(texts("echo a#b"), vec!["echo", "a#b"]);
    }

    #[test]
    fn test_line_continuation() {
        assert_eq!(texts("ls \\\n -l"), vec!["ls", "-l"]);
    }

    #[test]
    fn test_unterminated_quotes() {
        assert_eq!(
            Lexer::new("echo \"unterminated", 32).tokenize(),
            Err(SyntaxError::UnterminatedQuote { quote: '"', pos: 5 })
        );
        assert_eq!(
            Lexer::new("echo 'x", 32).tokenize(),
            Err(SyntaxError::UnterminatedQuote { quote: '\'', pos: 5 })
        );
    }

    #[test]
    fn test_unterminated_substitution() {
        assert_eq!(
            Lexer::new("echo $(ls", 32).tokenize(),
            Err(SyntaxError::UnterminatedSubstitution { pos: 5 })
        );
        assert_eq!(
            Lexer::new("echo `ls", 32).tokenize(),
            Err(SyntaxError::UnterminatedSubstitution { pos: 5 })
        );
    }

    #[test]
    fn test_substitution_depth_limit() {
        let err = Lexer::new("echo $($($(ls)))", 2).tokenize().unwrap_err();
        assert!(matches!(err, SyntaxError::NestingTooDeep { limit: 2, .. }));
    }
}
