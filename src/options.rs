use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TEMPLATE_DEPTH: usize = 64;

/// Knobs for [`crate::TycoParser`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Longest chain of nested template expansions before the resolver
    /// reports a cycle.
    pub max_template_depth: usize,
    /// Whether `#include` directives are honoured.
    pub allow_includes: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_template_depth: DEFAULT_MAX_TEMPLATE_DEPTH,
            allow_includes: true,
        }
    }
}

impl ParserOptions {
    pub fn with_max_template_depth(mut self, depth: usize) -> Self {
        self.max_template_depth = depth;
        self
    }

    pub fn with_includes(mut self, allow: bool) -> Self {
        self.allow_includes = allow;
        self
    }
}
