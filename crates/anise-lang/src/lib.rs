use std::fs;
use std::path::Path;

use anise_core::error::AniseError;
use anise_core::{ast_to_string, compile, parse, CompileOptions};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compile a source string to target text with the given options.
pub fn compile_source(source: &str, options: &CompileOptions) -> Result<String, AniseError> {
    compile(source, options)
}

/// Compile a file, naming it in any diagnostics.
pub fn compile_file(path: &Path, options: &CompileOptions) -> Result<String, String> {
    let source =
        fs::read_to_string(path).map_err(|err| format!("cannot read {}: {}", path.display(), err))?;
    let options = options
        .clone()
        .with_source_name(path.display().to_string());
    compile(&source, &options).map_err(|err| err.to_string())
}

/// Parse and re-serialize, one top-level form per line (`--ast` mode).
pub fn render_ast(source: &str) -> Result<String, AniseError> {
    let (forms, _) = parse(source)?;
    Ok(forms
        .iter()
        .map(ast_to_string)
        .collect::<Vec<_>>()
        .join("\n"))
}
