use thiserror::Error;

pub const ERROR_TAG: &str = "\x1b[31m[ERROR]\x1b[0m";

/// Every failure in the compiler is fatal to the current unit; there is no
/// partial recovery. The variants mirror the phases of the pipeline.
#[derive(Error, Debug, Clone)]
pub enum AniseError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Macro error: {0}")]
    Macro(String),

    #[error("Bad special form: {0}")]
    Form(String),

    #[error("Name error: {0}")]
    Name(String),

    #[error("Compiler bridge error: {0}")]
    Bridge(String),

    #[error("Eval error: {0}")]
    Eval(String),

    // Internal control-flow signal for `*break` inside the compile-time
    // interpreter; never surfaces to callers.
    #[error("internal break signal")]
    BreakSignal,
}

impl AniseError {
    pub fn parse(message: impl Into<String>) -> Self {
        AniseError::Parse(message.into())
    }

    pub fn macro_error(message: impl Into<String>) -> Self {
        AniseError::Macro(message.into())
    }

    pub fn form(message: impl Into<String>) -> Self {
        AniseError::Form(message.into())
    }

    pub fn name(message: impl Into<String>) -> Self {
        AniseError::Name(message.into())
    }

    pub fn bridge(message: impl Into<String>) -> Self {
        AniseError::Bridge(message.into())
    }

    pub fn eval(message: impl Into<String>) -> Self {
        AniseError::Eval(message.into())
    }

    pub fn vararg_not_allowed() -> Self {
        AniseError::Name("'...' referenced in a scope without variadic parameters".into())
    }
}

impl From<String> for AniseError {
    fn from(s: String) -> Self {
        AniseError::eval(s)
    }
}

impl From<&str> for AniseError {
    fn from(s: &str) -> Self {
        AniseError::eval(s.to_string())
    }
}
