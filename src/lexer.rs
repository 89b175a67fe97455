//! Tokenizer for Tyco source text.
//!
//! The lexer is a lazy iterator over [`Token`]s that ends after a single
//! [`TokenKind::Eof`] (or the first error). Whitespace and `#` comments are
//! trivia; a line that starts with `#include` is the one comment that
//! produces a token.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    error::{SourceSpan, TycoError},
    utils::{parse_float, parse_integer, trim_multiline, unescape_basic_string},
};

static DATETIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})?").unwrap()
});
static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());
static TIME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}:\d{2}:\d{2}(?:\.\d+)?").unwrap());
static RADIX_INT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?0[xXoObB][0-9A-Fa-f_]+").unwrap());
static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?[0-9][0-9_]*(\.[0-9][0-9_]*)?([eE][+-]?[0-9][0-9_]*)?").unwrap()
});

/// A string literal as written in the source.
#[derive(Clone, Debug, PartialEq)]
pub struct StrLit {
    pub value: String,
    /// Single-quoted: no escape processing and no template expansion.
    pub literal: bool,
}

impl StrLit {
    pub fn basic(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            literal: false,
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            literal: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(StrLit),
    Date(String),
    Time(String),
    DateTime(String),
    Include(String),
    Star,
    Question,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Equals,
    Lt,
    Gt,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier '{name}'"),
            TokenKind::Int(value) => write!(f, "integer {value}"),
            TokenKind::Float(value) => write!(f, "float {value}"),
            TokenKind::Str(_) => f.write_str("string literal"),
            TokenKind::Date(text) | TokenKind::Time(text) | TokenKind::DateTime(text) => {
                write!(f, "'{text}'")
            }
            TokenKind::Include(_) => f.write_str("#include directive"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Question => f.write_str("'?'"),
            TokenKind::LBrace => f.write_str("'{'"),
            TokenKind::RBrace => f.write_str("'}'"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Equals => f.write_str("'='"),
            TokenKind::Lt => f.write_str("'<'"),
            TokenKind::Gt => f.write_str("'>'"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: SourceSpan,
}

impl Token {
    pub fn new(kind: TokenKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }
}

#[derive(Clone, Debug)]
pub struct Lexer<'a> {
    source: &'a str,
    offset: usize,
    line: usize,
    column: usize,
    line_has_content: bool,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
            line_has_content: false,
            finished: false,
        }
    }

    /// Rewinds to the start of the source.
    pub fn reset(&mut self) {
        *self = Self::new(self.source);
    }

    /// Lexes the whole source, stopping at the first error.
    pub fn tokenize(source: &str) -> Result<Vec<Token>, TycoError> {
        Lexer::new(source).collect()
    }

    fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
            self.line_has_content = false;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn bump_bytes(&mut self, len: usize) {
        let target = self.offset + len;
        while self.offset < target && self.bump().is_some() {}
    }

    fn span(&self) -> SourceSpan {
        SourceSpan::new(self.line, self.column)
    }

    fn skip_trivia(&mut self) -> Result<Option<Token>, TycoError> {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else if ch == '#' {
                if !self.line_has_content && self.rest().starts_with("#include") {
                    return self.lex_include().map(Some);
                }
                while self.peek().is_some_and(|c| c != '\n') {
                    self.bump();
                }
            } else {
                break;
            }
        }
        Ok(None)
    }

    fn lex_include(&mut self) -> Result<Token, TycoError> {
        let span = self.span();
        self.bump_bytes("#include".len());
        let line_end = self.rest().find('\n').unwrap_or(self.rest().len());
        let line = self.rest()[..line_end].trim_start();
        let target = match line.chars().next() {
            Some(quote @ ('"' | '\'')) => match line[1..].find(quote) {
                Some(end) => line[1..1 + end].to_string(),
                None => {
                    return Err(TycoError::lex("Unterminated #include path").with_span(span))
                }
            },
            _ => line
                .split(|c: char| c == '#' || c.is_whitespace())
                .next()
                .unwrap_or_default()
                .to_string(),
        };
        self.bump_bytes(line_end);
        if target.is_empty() {
            return Err(TycoError::lex("#include requires a file path").with_span(span));
        }
        Ok(Token::new(TokenKind::Include(target), span))
    }

    fn next_token(&mut self) -> Result<Token, TycoError> {
        if let Some(directive) = self.skip_trivia()? {
            return Ok(directive);
        }
        let span = self.span();
        let Some(ch) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, span));
        };
        self.line_has_content = true;

        let kind = match ch {
            '*' => self.punct(TokenKind::Star),
            '?' => self.punct(TokenKind::Question),
            '{' => self.punct(TokenKind::LBrace),
            '}' => self.punct(TokenKind::RBrace),
            '(' => self.punct(TokenKind::LParen),
            ')' => self.punct(TokenKind::RParen),
            '[' => self.punct(TokenKind::LBracket),
            ']' => self.punct(TokenKind::RBracket),
            ':' => self.punct(TokenKind::Colon),
            ',' => self.punct(TokenKind::Comma),
            '=' => self.punct(TokenKind::Equals),
            '<' => self.punct(TokenKind::Lt),
            '>' => self.punct(TokenKind::Gt),
            '"' => self.lex_basic_string(&span)?,
            '\'' => self.lex_literal_string(&span)?,
            c if c.is_ascii_digit() => self.lex_number(&span)?,
            '+' | '-' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.lex_number(&span)?
            }
            c if c.is_alphabetic() || c == '_' => self.lex_ident(),
            other => {
                return Err(
                    TycoError::lex(format!("Unexpected character '{other}'")).with_span(span)
                )
            }
        };
        Ok(Token::new(kind, span))
    }

    fn punct(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn lex_ident(&mut self) -> TokenKind {
        let start = self.offset;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.bump();
        }
        TokenKind::Ident(self.source[start..self.offset].to_string())
    }

    fn lex_basic_string(&mut self, span: &SourceSpan) -> Result<TokenKind, TycoError> {
        let raw = if self.rest().starts_with("\"\"\"") {
            self.bump_bytes(3);
            let raw = self.scan_multiline("\"\"\"", true, span)?;
            trim_multiline(&raw).to_string()
        } else {
            self.bump();
            let mut raw = String::new();
            loop {
                match self.bump() {
                    None | Some('\n') => return Err(unterminated(span)),
                    Some('"') => break,
                    Some('\\') => {
                        raw.push('\\');
                        match self.bump() {
                            None | Some('\n') => return Err(unterminated(span)),
                            Some(escaped) => raw.push(escaped),
                        }
                    }
                    Some(ch) => raw.push(ch),
                }
            }
            raw
        };
        let value = unescape_basic_string(&raw).map_err(|e| e.with_span(span.clone()))?;
        Ok(TokenKind::Str(StrLit::basic(value)))
    }

    fn lex_literal_string(&mut self, span: &SourceSpan) -> Result<TokenKind, TycoError> {
        if self.rest().starts_with("'''") {
            self.bump_bytes(3);
            let raw = self.scan_multiline("'''", false, span)?;
            return Ok(TokenKind::Str(StrLit::literal(trim_multiline(&raw))));
        }
        self.bump();
        let mut raw = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(unterminated(span)),
                Some('\'') => break,
                Some(ch) => raw.push(ch),
            }
        }
        Ok(TokenKind::Str(StrLit::literal(raw)))
    }

    fn scan_multiline(
        &mut self,
        delimiter: &str,
        escapes: bool,
        span: &SourceSpan,
    ) -> Result<String, TycoError> {
        let mut raw = String::new();
        loop {
            if self.rest().starts_with(delimiter) {
                self.bump_bytes(delimiter.len());
                return Ok(raw);
            }
            match self.bump() {
                None => return Err(unterminated(span)),
                Some('\\') if escapes => {
                    raw.push('\\');
                    if let Some(escaped) = self.bump() {
                        raw.push(escaped);
                    }
                }
                Some(ch) => raw.push(ch),
            }
        }
    }

    fn lex_number(&mut self, span: &SourceSpan) -> Result<TokenKind, TycoError> {
        let rest = self.rest();
        let kind = if let Some(m) = DATETIME_RE.find(rest) {
            self.bump_bytes(m.end());
            TokenKind::DateTime(m.as_str().to_string())
        } else if let Some(m) = DATE_RE.find(rest) {
            self.bump_bytes(m.end());
            TokenKind::Date(m.as_str().to_string())
        } else if let Some(m) = TIME_RE.find(rest) {
            self.bump_bytes(m.end());
            TokenKind::Time(m.as_str().to_string())
        } else if let Some(m) = RADIX_INT_RE.find(rest) {
            self.bump_bytes(m.end());
            TokenKind::Int(parse_integer(m.as_str()).map_err(|e| e.with_span(span.clone()))?)
        } else if let Some(caps) = DECIMAL_RE.captures(rest) {
            let text = caps.get(0).map_or("", |m| m.as_str());
            self.bump_bytes(text.len());
            if caps.get(1).is_some() || caps.get(2).is_some() {
                TokenKind::Float(parse_float(text).map_err(|e| e.with_span(span.clone()))?)
            } else {
                TokenKind::Int(parse_integer(text).map_err(|e| e.with_span(span.clone()))?)
            }
        } else {
            return Err(TycoError::lex("Malformed numeric literal").with_span(span.clone()));
        };

        if self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            return Err(TycoError::lex(format!(
                "Malformed literal: unexpected '{}' after {kind}",
                self.peek().unwrap_or_default()
            ))
            .with_span(span.clone()));
        }
        Ok(kind)
    }
}

fn unterminated(span: &SourceSpan) -> TycoError {
    TycoError::lex("Unterminated string literal").with_span(span.clone())
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, TycoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        if matches!(
            result,
            Ok(Token {
                kind: TokenKind::Eof,
                ..
            }) | Err(_)
        ) {
            self.finished = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn ident(name: &str) -> TokenKind {
        TokenKind::Ident(name.to_string())
    }

    #[test]
    fn struct_header_and_fields() {
        assert_eq!(
            kinds("struct Person { *id: str, ?nick: array<str> = [] }"),
            vec![
                ident("struct"),
                ident("Person"),
                TokenKind::LBrace,
                TokenKind::Star,
                ident("id"),
                TokenKind::Colon,
                ident("str"),
                TokenKind::Comma,
                TokenKind::Question,
                ident("nick"),
                TokenKind::Colon,
                ident("array"),
                TokenKind::Lt,
                ident("str"),
                TokenKind::Gt,
                TokenKind::Equals,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(
            kinds("0x1A 0o12 0b101 -42 1_000 2.5 -1e3"),
            vec![
                TokenKind::Int(26),
                TokenKind::Int(10),
                TokenKind::Int(5),
                TokenKind::Int(-42),
                TokenKind::Int(1000),
                TokenKind::Float(2.5),
                TokenKind::Float(-1000.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn temporal_literals() {
        assert_eq!(
            kinds("[2024-01-02, 10:30:00.25, 2024-01-02T10:30:00Z, 2024-01-02 10:30:00]"),
            vec![
                TokenKind::LBracket,
                TokenKind::Date("2024-01-02".into()),
                TokenKind::Comma,
                TokenKind::Time("10:30:00.25".into()),
                TokenKind::Comma,
                TokenKind::DateTime("2024-01-02T10:30:00Z".into()),
                TokenKind::Comma,
                TokenKind::DateTime("2024-01-02 10:30:00".into()),
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_forms() {
        let source = "\"a\\n{b}\" 'c:\\raw' \"\"\"\n  keep\n    indent\n  \"\"\" '''\nx\\n\n'''";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Str(StrLit::basic("a\n{b}")),
                TokenKind::Str(StrLit::literal("c:\\raw")),
                TokenKind::Str(StrLit::basic("  keep\n    indent")),
                TokenKind::Str(StrLit::literal("x\\n")),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_trivia_but_include_is_not() {
        assert_eq!(
            kinds("# leading comment\n#include \"base.tyco\"\nname: 1 # trailing\n"),
            vec![
                TokenKind::Include("base.tyco".into()),
                ident("name"),
                TokenKind::Colon,
                TokenKind::Int(1),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("x: 1 #include nope"), kinds("x: 1"));
    }

    #[test]
    fn unterminated_string_reports_position() {
        let err = Lexer::tokenize("name: \"abc\nnext: 1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
        assert_eq!(err.span(), Some(&SourceSpan::new(1, 7)));

        let err = Lexer::tokenize("text: \"\"\"never closed").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
    }

    #[test]
    fn illegal_characters_and_malformed_numbers() {
        let err = Lexer::tokenize("a: 1\nb: @").unwrap_err();
        assert_eq!(err.span(), Some(&SourceSpan::new(2, 4)));
        assert_eq!(Lexer::tokenize("x: 12abc").unwrap_err().kind(), ErrorKind::Lex);
        assert_eq!(Lexer::tokenize("x: 0b102").unwrap_err().kind(), ErrorKind::Lex);
    }

    #[test]
    fn overflowing_floats_are_rejected() {
        let err = Lexer::tokenize("x: 1e999").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
        assert_eq!(err.span(), Some(&SourceSpan::new(1, 4)));
        assert_eq!(Lexer::tokenize("y: -1e400").unwrap_err().kind(), ErrorKind::Lex);
        assert_eq!(kinds("z: 1.5e300")[2], TokenKind::Float(1.5e300));
    }

    #[test]
    fn include_paths_stop_at_the_closing_quote() {
        let include = |source: &str| kinds(source).into_iter().next();
        let expected = Some(TokenKind::Include("a.tyco".into()));
        assert_eq!(include("#include \"a.tyco\" # shared"), expected);
        assert_eq!(include("#include 'a.tyco'"), expected);
        assert_eq!(include("#include a.tyco # shared"), expected);
        assert_eq!(include("#include \"dir with space/a.tyco\""), Some(TokenKind::Include("dir with space/a.tyco".into())));
        let err = Lexer::tokenize("#include \"a.tyco").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lex);
    }

    #[test]
    fn lexer_is_lazy_and_restartable() {
        let mut lexer = Lexer::new("a: 1");
        let first: Vec<_> = lexer.by_ref().map(|t| t.unwrap().kind).collect();
        assert!(lexer.next().is_none());
        lexer.reset();
        let second: Vec<_> = lexer.map(|t| t.unwrap().kind).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }
}
