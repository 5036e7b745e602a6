use crate::scope::ScopeRef;

/// Per-compilation settings. A caller-supplied scope lets successive units
/// share manglings and macros (the way an embedding host drives the
/// compiler); otherwise each call builds a fresh root scope.
#[derive(Clone, Default)]
pub struct CompileOptions {
    pub scope: Option<ScopeRef>,
    pub indent: Option<String>,
    pub source_name: Option<String>,
}

impl CompileOptions {
    pub fn indent(&self) -> &str {
        self.indent.as_deref().unwrap_or("  ")
    }

    pub fn with_scope(mut self, scope: ScopeRef) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = Some(indent.into());
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }
}
