use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Location of a construct in Tyco source text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub path: Option<PathBuf>,
    pub line: usize,
    pub column: usize,
}

impl SourceSpan {
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            path: None,
            line,
            column,
        }
    }

    pub fn with_path(mut self, path: Option<&Path>) -> Self {
        if let Some(path) = path {
            self.path = Some(path.to_path_buf());
        }
        self
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}:{}:{}", path.display(), self.line, self.column),
            None => write!(f, "line {}, column {}", self.line, self.column),
        }
    }
}

/// Fieldless discriminant of [`TycoError`], handy for matching in callers
/// and tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Lex,
    Parse,
    Type,
    MissingRequiredField,
    UnresolvedReference,
    DuplicatePrimaryKey,
    TemplateCycle,
    UndefinedTemplateVariable,
}

/// Shared error type for the Tyco parser.
///
/// Every error is fatal to the load that produced it; there is no partial
/// document.
#[derive(Debug, Error)]
pub enum TycoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Lex error{}: {message}", location(.span))]
    Lex {
        message: String,
        span: Option<SourceSpan>,
    },
    #[error("Parse error{}: {message}", location(.span))]
    Parse {
        message: String,
        span: Option<SourceSpan>,
    },
    #[error("Type error{}: {message}", location(.span))]
    Type {
        message: String,
        span: Option<SourceSpan>,
    },
    #[error("Missing required field '{field}' on {struct_name}{}", location(.span))]
    MissingRequiredField {
        struct_name: String,
        field: String,
        span: Option<SourceSpan>,
    },
    #[error("Unresolved reference {struct_name}({key}){}", location(.span))]
    UnresolvedReference {
        struct_name: String,
        key: String,
        span: Option<SourceSpan>,
    },
    #[error("Duplicate primary key '{key}' for {struct_name}{}", location(.span))]
    DuplicatePrimaryKey {
        struct_name: String,
        key: String,
        span: Option<SourceSpan>,
    },
    #[error("Template cycle detected at {slot}{}", location(.span))]
    TemplateCycle {
        slot: String,
        span: Option<SourceSpan>,
    },
    #[error("Undefined template variable '{name}'{}", location(.span))]
    UndefinedTemplateVariable {
        name: String,
        span: Option<SourceSpan>,
    },
}

fn location(span: &Option<SourceSpan>) -> String {
    span.as_ref()
        .map(|span| format!(" at {span}"))
        .unwrap_or_default()
}

impl TycoError {
    pub fn lex(msg: impl Into<String>) -> Self {
        TycoError::Lex {
            message: msg.into(),
            span: None,
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        TycoError::Parse {
            message: msg.into(),
            span: None,
        }
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        TycoError::Type {
            message: msg.into(),
            span: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TycoError::Io(_) => ErrorKind::Io,
            TycoError::Lex { .. } => ErrorKind::Lex,
            TycoError::Parse { .. } => ErrorKind::Parse,
            TycoError::Type { .. } => ErrorKind::Type,
            TycoError::MissingRequiredField { .. } => ErrorKind::MissingRequiredField,
            TycoError::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            TycoError::DuplicatePrimaryKey { .. } => ErrorKind::DuplicatePrimaryKey,
            TycoError::TemplateCycle { .. } => ErrorKind::TemplateCycle,
            TycoError::UndefinedTemplateVariable { .. } => ErrorKind::UndefinedTemplateVariable,
        }
    }

    pub fn span(&self) -> Option<&SourceSpan> {
        match self {
            TycoError::Io(_) => None,
            TycoError::Lex { span, .. }
            | TycoError::Parse { span, .. }
            | TycoError::Type { span, .. }
            | TycoError::MissingRequiredField { span, .. }
            | TycoError::UnresolvedReference { span, .. }
            | TycoError::DuplicatePrimaryKey { span, .. }
            | TycoError::TemplateCycle { span, .. }
            | TycoError::UndefinedTemplateVariable { span, .. } => span.as_ref(),
        }
    }

    fn span_slot(&mut self) -> Option<&mut Option<SourceSpan>> {
        match self {
            TycoError::Io(_) => None,
            TycoError::Lex { span, .. }
            | TycoError::Parse { span, .. }
            | TycoError::Type { span, .. }
            | TycoError::MissingRequiredField { span, .. }
            | TycoError::UnresolvedReference { span, .. }
            | TycoError::DuplicatePrimaryKey { span, .. }
            | TycoError::TemplateCycle { span, .. }
            | TycoError::UndefinedTemplateVariable { span, .. } => Some(span),
        }
    }

    /// Attaches a location unless the error already carries a more precise one.
    pub fn with_span(mut self, span: SourceSpan) -> Self {
        if let Some(slot) = self.span_slot() {
            if slot.is_none() {
                *slot = Some(span);
            }
        }
        self
    }

    pub fn with_optional_span(self, span: Option<SourceSpan>) -> Self {
        match span {
            Some(span) => self.with_span(span),
            None => self,
        }
    }

    /// Records the file an error came from when the span does not name one.
    pub fn with_path(mut self, path: &Path) -> Self {
        if let Some(Some(span)) = self.span_slot() {
            if span.path.is_none() {
                span.path = Some(path.to_path_buf());
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_span_keeps_the_first_location() {
        let err = TycoError::parse("boom")
            .with_span(SourceSpan::new(3, 7))
            .with_span(SourceSpan::new(9, 1));
        assert_eq!(err.span(), Some(&SourceSpan::new(3, 7)));
        assert_eq!(err.to_string(), "Parse error at line 3, column 7: boom");
    }

    #[test]
    fn with_path_fills_in_missing_file() {
        let err = TycoError::lex("bad")
            .with_span(SourceSpan::new(1, 2))
            .with_path(Path::new("conf/app.tyco"));
        assert_eq!(err.kind(), ErrorKind::Lex);
        assert_eq!(err.to_string(), "Lex error at conf/app.tyco:1:2: bad");
    }
}
