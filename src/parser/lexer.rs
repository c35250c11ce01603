//! Lexer for SecLang configuration text.
//!
//! Input is split into logical lines. A backslash at the end of a physical
//! line joins it with the next one. The first token of a logical line is the
//! directive name; the rest are its arguments.
//!
//! Tokens are whitespace separated. `"..."` and `'...'` quote a token; inside
//! them only the active quote character may be escaped and every other
//! backslash sequence is kept as written, so `"@rx \d+"` reaches the operator
//! untouched. Backticks quote a raw token that may span lines.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result, SourceLocation};

/// One logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Directive name as written.
    pub directive: String,
    /// Unquoted arguments.
    pub arguments: Vec<String>,
    /// Line of the directive name (1-indexed).
    pub line: usize,
    /// Column of the directive name (1-indexed).
    pub column: usize,
}

/// Iterator over the statements of one source text.
pub struct Lexer<'a> {
    input: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: Option<&'a Path>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file: None,
        }
    }

    /// Attribute locations to `file`.
    pub fn with_file(mut self, file: Option<&'a Path>) -> Self {
        self.file = file;
        self
    }

    /// Location of a line and column in the current source.
    pub fn location(&self, line: usize, column: usize) -> SourceLocation {
        SourceLocation {
            file: self.file.map(PathBuf::from),
            line,
            column,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Length of a line continuation at the cursor: `\` then `\n` or `\r\n`.
    fn continuation_len(&self) -> usize {
        if self.peek() != Some('\\') {
            return 0;
        }
        match (self.peek_at(1), self.peek_at(2)) {
            (Some('\n'), _) => 2,
            (Some('\r'), Some('\n')) => 3,
            _ => 0,
        }
    }

    fn skip_continuation(&mut self) -> bool {
        let len = self.continuation_len();
        for _ in 0..len {
            self.advance();
        }
        len > 0
    }

    fn error(&self, message: impl Into<String>, line: usize, column: usize) -> Error {
        Error::parse(message, self.location(line, column).to_string())
    }

    /// Skip blank lines and `#` comments. Backticks inside comments are
    /// plain text.
    fn skip_blank_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else if c == '#' {
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn next_statement(&mut self) -> Option<Result<Statement>> {
        self.skip_blank_and_comments();
        self.peek()?;

        let line = self.line;
        let column = self.column;
        let mut tokens = Vec::new();

        loop {
            while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
                self.advance();
            }
            if self.skip_continuation() {
                continue;
            }
            let token = match self.peek() {
                None => break,
                Some('\n') => {
                    self.advance();
                    break;
                }
                Some(quote @ ('"' | '\'')) => self.read_quoted(quote),
                Some('`') => self.read_backtick(),
                Some(_) => Ok(self.read_word()),
            };
            match token {
                Ok(token) => tokens.push(token),
                Err(e) => {
                    // Lexing stops at the first error.
                    self.pos = self.input.len();
                    return Some(Err(e));
                }
            }
        }

        let mut tokens = tokens.into_iter();
        let Some(directive) = tokens.next() else {
            return self.next_statement();
        };
        Some(Ok(Statement {
            directive,
            arguments: tokens.collect(),
            line,
            column,
        }))
    }

    fn read_quoted(&mut self, quote: char) -> Result<String> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut s = String::new();

        loop {
            if self.skip_continuation() {
                continue;
            }
            match self.advance() {
                None | Some('\n') => {
                    return Err(self.error(
                        format!("unterminated {} quoted string", quote),
                        line,
                        column,
                    ))
                }
                Some('\\') if self.peek() == Some(quote) => {
                    self.advance();
                    s.push(quote);
                }
                Some(c) if c == quote => return Ok(s),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_backtick(&mut self) -> Result<String> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut s = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(self.error("unterminated backtick quoted string", line, column))
                }
                Some('`') => return Ok(s),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || self.continuation_len() > 0 {
                break;
            }
            s.push(c);
            self.advance();
        }
        s
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_statement()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Statement> {
        Lexer::new(input).collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_simple_rule() {
        let stmts = lex(r#"SecRule REQUEST_URI "@contains /admin" "id:1,deny""#);
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].directive, "SecRule");
        assert_eq!(
            stmts[0].arguments,
            vec!["REQUEST_URI", "@contains /admin", "id:1,deny"]
        );
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let stmts = lex("# a comment with a `backtick\n\n  SecRuleEngine On\n# trailing");
        assert_eq!(stmts.len(), 1);
        assert_eq!(stmts[0].directive, "SecRuleEngine");
        assert_eq!(stmts[0].line, 3);
        assert_eq!(stmts[0].column, 3);
    }

    #[test]
    fn test_escapes_kept_verbatim() {
        let stmts = lex(r#"SecRule ARGS "@rx \d+\x41\"q" 'msg:\'x\''"#);
        assert_eq!(stmts[0].arguments[1], r#"@rx \d+\x41"q"#);
        assert_eq!(stmts[0].arguments[2], "msg:'x'");
    }

    #[test]
    fn test_line_continuation() {
        let stmts = lex("SecRule ARGS \\\n    \"@rx a\" \\\r\n    \"id:1,\\\n deny\"\nSecAction \"id:2\"");
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].arguments, vec!["ARGS", "@rx a", "id:1, deny"]);
        assert_eq!(stmts[1].line, 5);
    }

    #[test]
    fn test_backtick_spans_lines() {
        let stmts = lex("SecAction `id:1,\nphase:1`");
        assert_eq!(stmts[0].arguments, vec!["id:1,\nphase:1"]);
    }

    #[test]
    fn test_unterminated_backtick() {
        let err = Lexer::new("SecAction `id:1")
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        assert!(matches!(err, Error::Parse { ref location, .. } if location == "1:11"));
    }

    #[test]
    fn test_unterminated_quote_reports_file() {
        let path = Path::new("rules.conf");
        let err = Lexer::new("\nSecRule ARGS \"@rx a\n")
            .with_file(Some(path))
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        assert!(matches!(err, Error::Parse { ref location, .. } if location == "rules.conf:2:14"));
    }
}
