//! Tokenizer for declaration sources.
//!
//! The lexer never fails: malformed input produces a [`TokenKind::Error`]
//! token carrying the line and a message, and the parser turns it into a
//! [`CompileError::Lex`](crate::CompileError::Lex).
//!
//! Three quotes in a row always open a multi-line string, so an empty string
//! directly followed by another string (`"""a"`) is read as the start of a
//! `"""..."""` block. Separate the two with whitespace: `"" "a"`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word, including the literals `true` and `false`.
    Ident(String),
    /// Unescaped content of a `"..."` or `"""..."""` string.
    Str(String),
    Number(i64),
    Equals,
    Eof,
    Error(String),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(word) => write!(f, "`{word}`"),
            Self::Str(_) => f.write_str("string"),
            Self::Number(n) => write!(f, "number {n}"),
            Self::Equals => f.write_str("`=`"),
            Self::Eof => f.write_str("end of input"),
            Self::Error(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based line the token starts on.
    pub line: usize,
}

/// Forward-only token stream over a source string.
///
/// # Examples
///
/// ```
/// use cmdtree_core::lexer::{Lexer, TokenKind};
///
/// let mut lexer = Lexer::new("attr retries = 3 # comment");
/// assert_eq!(lexer.next_token().kind, TokenKind::Ident("attr".into()));
/// assert_eq!(lexer.next_token().kind, TokenKind::Ident("retries".into()));
/// assert_eq!(lexer.next_token().kind, TokenKind::Equals);
/// assert_eq!(lexer.next_token().kind, TokenKind::Number(3));
/// assert_eq!(lexer.next_token().kind, TokenKind::Eof);
/// ```
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
        }
    }

    /// Rewinds to the start of the source.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.line = 1;
    }

    /// Produces the next token. Once the input is exhausted every call
    /// returns [`TokenKind::Eof`].
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();
        let line = self.line;
        let Some(ch) = self.peek() else {
            return Token {
                kind: TokenKind::Eof,
                line,
            };
        };

        let kind = match ch {
            '=' => {
                self.bump();
                TokenKind::Equals
            }
            '"' if self.rest().starts_with("\"\"\"") => self.triple_string(),
            '"' => self.string(),
            '-' if self.rest()[1..].starts_with(|c: char| c.is_ascii_digit()) => self.number(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_ascii_alphabetic() || c == '_' => TokenKind::Ident(self.word().to_string()),
            other => {
                self.bump();
                TokenKind::Error(format!("unexpected character `{other}`"))
            }
        };

        Token { kind, line }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else if ch.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn word(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if is_word_char(ch) {
                self.bump();
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }

    fn number(&mut self) -> TokenKind {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let digits = &self.src[start..self.pos];
        if self.peek().is_some_and(is_word_char) {
            let tail = self.word();
            return TokenKind::Error(format!("malformed number `{digits}{tail}`"));
        }
        match digits.parse::<i64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Error(format!("number `{digits}` is out of range")),
        }
    }

    fn string(&mut self) -> TokenKind {
        self.bump();
        let mut out = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return TokenKind::Error("unterminated string".to_string()),
                Some('"') => {
                    self.bump();
                    return TokenKind::Str(out);
                }
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('"') => out.push('"'),
                        Some('\\') => out.push('\\'),
                        Some(other) => {
                            return TokenKind::Error(format!("unknown escape `\\{other}`"));
                        }
                        None => return TokenKind::Error("unterminated string".to_string()),
                    }
                }
                Some(_) => {
                    if let Some(ch) = self.bump() {
                        out.push(ch);
                    }
                }
            }
        }
    }

    fn triple_string(&mut self) -> TokenKind {
        for _ in 0..3 {
            self.bump();
        }
        let start = self.pos;
        let Some(len) = self.rest().find("\"\"\"") else {
            while self.bump().is_some() {}
            return TokenKind::Error("unterminated multi-line string".to_string());
        };
        let body = &self.src[start..start + len];
        while self.pos < start + len + 3 {
            self.bump();
        }
        TokenKind::Str(dedent(body.strip_prefix('\n').unwrap_or(body)))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    /// Yields tokens up to, but not including, end of input.
    fn next(&mut self) -> Option<Token> {
        let token = self.next_token();
        (token.kind != TokenKind::Eof).then_some(token)
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | ':')
}

/// Strips the indentation shared by all non-blank lines.
fn dedent(body: &str) -> String {
    let indent = body
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    body.split('\n')
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
