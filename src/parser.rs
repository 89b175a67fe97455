use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, trace};

use crate::{
    document::Document,
    error::{SourceSpan, TycoError},
    lexer::{Lexer, Token, TokenKind},
    options::ParserOptions,
    resolver::resolve,
    syntax::{
        Argument, Assignment, FieldNode, GlobalNode, InstanceNode, Item, Literal, LiteralKind,
        StructNode, SyntaxTree, TypeExpr,
    },
};

/// Parses Tyco source into an unresolved [`SyntaxTree`].
///
/// `path` only decorates spans; `#include` items are left in the tree.
pub fn parse(source: &str, path: Option<&Path>) -> Result<SyntaxTree, TycoError> {
    let tokens = Lexer::tokenize(source).map_err(|e| match path {
        Some(path) => e.with_path(path),
        None => e,
    })?;
    Parser::new(tokens, path).parse_document()
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    path: Option<PathBuf>,
}

impl Parser {
    fn new(tokens: Vec<Token>, path: Option<&Path>) -> Self {
        Self {
            tokens,
            cursor: 0,
            path: path.map(Path::to_path_buf),
        }
    }

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.cursor + offset)
            .map(|token| &token.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn span(&self) -> SourceSpan {
        let span = self
            .tokens
            .get(self.cursor)
            .or_else(|| self.tokens.last())
            .map(|token| token.span.clone())
            .unwrap_or_default();
        span.with_path(self.path.as_deref())
    }

    fn advance(&mut self) -> Token {
        let token = self
            .tokens
            .get(self.cursor)
            .cloned()
            .unwrap_or_else(|| Token::new(TokenKind::Eof, SourceSpan::default()));
        if token.kind != TokenKind::Eof {
            self.cursor += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, msg: impl Into<String>) -> TycoError {
        TycoError::parse(msg).with_span(self.span())
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<(), TycoError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(format!(
                "Expected {kind} {context}, found {}",
                self.peek()
            )))
        }
    }

    fn ident(&mut self, what: &str) -> Result<(String, SourceSpan), TycoError> {
        let span = self.span();
        match self.peek() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok((name, span))
            }
            other => Err(self.error(format!("Expected {what}, found {other}"))),
        }
    }

    fn parse_document(&mut self) -> Result<SyntaxTree, TycoError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Eof => break,
                TokenKind::Include(path) => {
                    let path = path.clone();
                    let span = self.span();
                    self.advance();
                    items.push(Item::Include { path, span });
                }
                _ => items.push(self.parse_item()?),
            }
        }
        trace!(items = items.len(), "parsed syntax tree");
        Ok(SyntaxTree { items })
    }

    fn parse_item(&mut self) -> Result<Item, TycoError> {
        let starts_struct = matches!(self.peek(), TokenKind::Ident(word) if word == "struct")
            && matches!(self.peek_at(1), TokenKind::Ident(_));
        if starts_struct {
            return self.parse_struct().map(Item::Struct);
        }
        match (self.peek(), self.peek_at(1)) {
            (TokenKind::Ident(_), TokenKind::LParen) => self.parse_instance().map(Item::Instance),
            (TokenKind::Ident(_) | TokenKind::Question, _) => {
                self.parse_global().map(Item::Global)
            }
            (other, _) => Err(self.error(format!(
                "Expected a struct definition, instance or global attribute, found {other}"
            ))),
        }
    }

    fn parse_struct(&mut self) -> Result<StructNode, TycoError> {
        let span = self.span();
        self.advance();
        let (name, _) = self.ident("struct name")?;
        self.expect(TokenKind::LBrace, &format!("to open struct '{name}'"))?;

        let mut fields: Vec<FieldNode> = Vec::new();
        loop {
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            if self.check(&TokenKind::Eof) {
                return Err(self.error(format!("Missing closing '}}' for struct '{name}'")));
            }
            let field = self.parse_field_def()?;
            if field.primary_key && fields.iter().any(|existing| existing.primary_key) {
                return Err(TycoError::parse(format!(
                    "Struct '{name}' marks more than one primary key field"
                ))
                .with_span(field.span));
            }
            fields.push(field);
            self.eat(&TokenKind::Comma);
        }

        Ok(StructNode { name, fields, span })
    }

    fn parse_field_def(&mut self) -> Result<FieldNode, TycoError> {
        let span = self.span();
        let mut primary_key = false;
        let mut nullable = false;
        loop {
            match self.peek() {
                TokenKind::Star if primary_key => {
                    return Err(self.error("Duplicate primary-key marker '*'"))
                }
                TokenKind::Star => primary_key = true,
                TokenKind::Question if nullable => {
                    return Err(self.error("Duplicate nullable marker '?'"))
                }
                TokenKind::Question => nullable = true,
                _ => break,
            }
            self.advance();
        }

        let (name, _) = self.ident("field name")?;
        self.expect(TokenKind::Colon, &format!("after field '{name}'"))?;
        let type_expr = self.parse_type()?;
        let default = if self.eat(&TokenKind::Equals) {
            Some(self.parse_literal()?)
        } else {
            None
        };

        Ok(FieldNode {
            name,
            type_expr,
            nullable,
            primary_key,
            default,
            span,
        })
    }

    fn parse_type(&mut self) -> Result<TypeExpr, TycoError> {
        let (name, _) = self.ident("type name")?;
        let mut type_expr = if name == "array" && self.eat(&TokenKind::Lt) {
            let element = self.parse_type()?;
            self.expect(TokenKind::Gt, "to close array<...>")?;
            TypeExpr::Array(Box::new(element))
        } else {
            TypeExpr::Named(name)
        };
        while self.check(&TokenKind::LBracket) && self.peek_at(1) == &TokenKind::RBracket {
            self.advance();
            self.advance();
            type_expr = TypeExpr::Array(Box::new(type_expr));
        }
        Ok(type_expr)
    }

    fn parse_instance(&mut self) -> Result<InstanceNode, TycoError> {
        let (struct_name, span) = self.ident("struct name")?;
        self.expect(TokenKind::LParen, "after instance struct name")?;
        let key = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_literal()?)
        };
        self.expect(
            TokenKind::RParen,
            &format!("to close the key of {struct_name} instance"),
        )?;
        self.eat(&TokenKind::Colon);
        let fields = self.parse_block_body()?;
        Ok(InstanceNode {
            struct_name,
            key,
            fields,
            span,
        })
    }

    fn parse_global(&mut self) -> Result<GlobalNode, TycoError> {
        let span = self.span();
        let nullable = self.eat(&TokenKind::Question);
        let untyped = !nullable
            && matches!(self.peek(), TokenKind::Ident(_))
            && self.peek_at(1) == &TokenKind::Colon;
        let type_expr = if untyped {
            None
        } else {
            Some(self.parse_type()?)
        };
        let (name, _) = self.ident("attribute name")?;
        self.expect(TokenKind::Colon, &format!("after attribute '{name}'"))?;
        let value = self.parse_literal()?;
        Ok(GlobalNode {
            name,
            type_expr,
            nullable,
            value,
            span,
        })
    }

    fn parse_block_body(&mut self) -> Result<Vec<Assignment>, TycoError> {
        self.expect(TokenKind::LBrace, "to open instance body")?;
        let mut fields: Vec<Assignment> = Vec::new();
        loop {
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            if self.check(&TokenKind::Eof) {
                return Err(self.error("Missing closing '}' for instance body"));
            }
            let (name, span) = self.ident("field name")?;
            self.expect(TokenKind::Colon, &format!("after field '{name}'"))?;
            let value = self.parse_literal()?;
            if fields.iter().any(|existing| existing.name == name) {
                return Err(
                    TycoError::parse(format!("Field '{name}' is assigned more than once"))
                        .with_span(span),
                );
            }
            fields.push(Assignment { name, value, span });
            self.eat(&TokenKind::Comma);
        }
        Ok(fields)
    }

    fn parse_literal(&mut self) -> Result<Literal, TycoError> {
        let span = self.span();
        let kind = match self.peek().clone() {
            TokenKind::Str(text) => {
                self.advance();
                LiteralKind::Str(text)
            }
            TokenKind::Int(value) => {
                self.advance();
                LiteralKind::Int(value)
            }
            TokenKind::Float(value) => {
                self.advance();
                LiteralKind::Float(value)
            }
            TokenKind::Date(text) => {
                self.advance();
                LiteralKind::Date(text)
            }
            TokenKind::Time(text) => {
                self.advance();
                LiteralKind::Time(text)
            }
            TokenKind::DateTime(text) => {
                self.advance();
                LiteralKind::DateTime(text)
            }
            TokenKind::LBracket => self.parse_array()?,
            TokenKind::LBrace => LiteralKind::Block {
                type_name: None,
                fields: self.parse_block_body()?,
            },
            TokenKind::Ident(word) => {
                self.advance();
                if word == "true" || word == "false" {
                    LiteralKind::Bool(word == "true")
                } else if word == "null" {
                    LiteralKind::Null
                } else if self.check(&TokenKind::LParen) {
                    let args = self.parse_arguments(&word)?;
                    LiteralKind::Call { name: word, args }
                } else if self.check(&TokenKind::LBrace) {
                    let fields = self.parse_block_body()?;
                    LiteralKind::Block {
                        type_name: Some(word),
                        fields,
                    }
                } else {
                    return Err(TycoError::parse(format!(
                        "Unexpected identifier '{word}'; string values must be quoted"
                    ))
                    .with_span(span));
                }
            }
            other => return Err(self.error(format!("Expected a value, found {other}"))),
        };
        Ok(Literal::new(kind, span))
    }

    fn parse_array(&mut self) -> Result<LiteralKind, TycoError> {
        self.advance();
        let mut items = Vec::new();
        loop {
            if self.eat(&TokenKind::RBracket) {
                break;
            }
            if self.check(&TokenKind::Eof) {
                return Err(self.error("Missing closing ']' for array"));
            }
            items.push(self.parse_literal()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(TokenKind::RBracket, "to close array")?;
                break;
            }
        }
        Ok(LiteralKind::Array(items))
    }

    fn parse_arguments(&mut self, callee: &str) -> Result<Vec<Argument>, TycoError> {
        self.advance();
        let mut args = Vec::new();
        loop {
            if self.eat(&TokenKind::RParen) {
                break;
            }
            if self.check(&TokenKind::Eof) {
                return Err(self.error(format!("Missing closing ')' for {callee}(...)")));
            }
            let name = match (self.peek(), self.peek_at(1)) {
                (TokenKind::Ident(name), TokenKind::Colon) => {
                    let name = name.clone();
                    self.advance();
                    self.advance();
                    Some(name)
                }
                _ => None,
            };
            let value = self.parse_literal()?;
            args.push(Argument { name, value });
            if !self.eat(&TokenKind::Comma) {
                self.expect(TokenKind::RParen, &format!("to close {callee}(...)"))?;
                break;
            }
        }
        Ok(args)
    }
}

/// Loads Tyco documents from files or strings, expanding `#include`
/// directives before resolution.
pub struct TycoParser {
    options: ParserOptions,
    included: HashSet<PathBuf>,
}

impl TycoParser {
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    pub fn with_options(options: ParserOptions) -> Self {
        Self {
            options,
            included: HashSet::new(),
        }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Document, TycoError> {
        self.included.clear();
        let items = self.read_file_with_includes(path.as_ref())?;
        resolve(SyntaxTree { items }, &self.options)
    }

    pub fn parse_str(&mut self, content: &str) -> Result<Document, TycoError> {
        self.included.clear();
        let tree = parse(content, None)?;
        let items = self.expand_includes(tree.items, Path::new("."))?;
        resolve(SyntaxTree { items }, &self.options)
    }

    fn read_file_with_includes(&mut self, path: &Path) -> Result<Vec<Item>, TycoError> {
        let canonical = fs::canonicalize(path)?;
        if !self.included.insert(canonical.clone()) {
            debug!(path = %canonical.display(), "skipping file that was already included");
            return Ok(Vec::new());
        }
        debug!(path = %canonical.display(), "reading tyco file");
        let content = fs::read_to_string(&canonical)?;
        let tree = parse(&content, Some(&canonical))?;
        let parent = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        self.expand_includes(tree.items, &parent)
    }

    fn expand_includes(&mut self, items: Vec<Item>, base: &Path) -> Result<Vec<Item>, TycoError> {
        let mut result = Vec::with_capacity(items.len());
        for item in items {
            let (path, span) = match item {
                Item::Include { path, span } => (path, span),
                other => {
                    result.push(other);
                    continue;
                }
            };
            if !self.options.allow_includes {
                return Err(TycoError::parse(format!(
                    "#include \"{path}\" is not allowed by the parser options"
                ))
                .with_span(span));
            }
            let include_full = base.join(&path);
            debug!(include = %include_full.display(), "expanding include");
            match self.read_file_with_includes(&include_full) {
                Ok(nested) => result.extend(nested),
                Err(TycoError::Io(err)) => {
                    return Err(TycoError::parse(format!(
                        "Cannot include \"{path}\": {err}"
                    ))
                    .with_span(span))
                }
                Err(err) => return Err(err),
            }
        }
        Ok(result)
    }
}

impl Default for TycoParser {
    fn default() -> Self {
        Self::new()
    }
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<Document, TycoError> {
    TycoParser::new().parse_file(path)
}

pub fn loads(content: &str) -> Result<Document, TycoError> {
    TycoParser::new().parse_str(content)
}
