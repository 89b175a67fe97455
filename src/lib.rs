//! Tyco configuration language processor.
//!
//! Source text is lexed, parsed into an untyped syntax tree, resolved against
//! its struct schemas and finally projected to JSON:
//!
//! ```
//! let doc = tyco::loads(r#"
//! struct Person { *id: str, name: str }
//! Person("p1"): { name: "Ada" }
//! greeting: "Hello, {owner.name}"
//! owner: Person("p1")
//! "#).unwrap();
//! assert_eq!(doc.global("greeting").and_then(|v| v.as_str()), Some("Hello, Ada"));
//! ```

mod document;
mod error;
mod json;
mod lexer;
mod options;
mod parser;
mod resolver;
mod syntax;
mod temporal;
mod utils;
mod value;

pub use document::{Document, FieldDef, StructDef, TypeTag};
pub use error::{ErrorKind, SourceSpan, TycoError};
pub use lexer::{Lexer, StrLit, Token, TokenKind};
pub use options::{ParserOptions, DEFAULT_MAX_TEMPLATE_DEPTH};
pub use parser::{load, loads, parse, TycoParser};
pub use syntax::{
    Argument, Assignment, FieldNode, GlobalNode, InstanceNode, Item, Literal, LiteralKind,
    StructNode, SyntaxTree, TypeExpr,
};
pub use value::{Instance, Reference, TycoString, Value};
