//! Untyped syntax tree produced by the parser.
//!
//! Nothing here is validated against a schema: literals keep the shape they
//! were written in and are only coerced to [`crate::Value`]s by the resolver.

use crate::{error::SourceSpan, lexer::StrLit};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyntaxTree {
    pub items: Vec<Item>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Include { path: String, span: SourceSpan },
    Struct(StructNode),
    Instance(InstanceNode),
    Global(GlobalNode),
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructNode {
    pub name: String,
    pub fields: Vec<FieldNode>,
    pub span: SourceSpan,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldNode {
    pub name: String,
    pub type_expr: TypeExpr,
    pub nullable: bool,
    pub primary_key: bool,
    pub default: Option<Literal>,
    pub span: SourceSpan,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    Named(String),
    Array(Box<TypeExpr>),
}

/// `Name(key): { field: value, ... }`
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceNode {
    pub struct_name: String,
    pub key: Option<Literal>,
    pub fields: Vec<Assignment>,
    pub span: SourceSpan,
}

/// `[?][type] name: literal`
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalNode {
    pub name: String,
    pub type_expr: Option<TypeExpr>,
    pub nullable: bool,
    pub value: Literal,
    pub span: SourceSpan,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Literal,
    pub span: SourceSpan,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub value: Literal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub span: SourceSpan,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LiteralKind {
    Str(StrLit),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Date(String),
    Time(String),
    DateTime(String),
    Array(Vec<Literal>),
    /// `{ ... }` or `Name { ... }`
    Block {
        type_name: Option<String>,
        fields: Vec<Assignment>,
    },
    /// `Name(args)`: a reference for keyed structs, an inline instance otherwise.
    Call {
        name: String,
        args: Vec<Argument>,
    },
}

impl Literal {
    pub fn new(kind: LiteralKind, span: SourceSpan) -> Self {
        Self { kind, span }
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            LiteralKind::Str(_) => "string".to_string(),
            LiteralKind::Int(_) => "integer".to_string(),
            LiteralKind::Float(_) => "float".to_string(),
            LiteralKind::Bool(_) => "boolean".to_string(),
            LiteralKind::Null => "null".to_string(),
            LiteralKind::Date(_) => "date".to_string(),
            LiteralKind::Time(_) => "time".to_string(),
            LiteralKind::DateTime(_) => "datetime".to_string(),
            LiteralKind::Array(_) => "array".to_string(),
            LiteralKind::Block {
                type_name: Some(name),
                ..
            } => format!("{name} block"),
            LiteralKind::Block { .. } => "anonymous block".to_string(),
            LiteralKind::Call { name, .. } => format!("{name}(...)"),
        }
    }
}
