pub mod ast;
pub mod ast_to_string;
pub mod chunk;
pub mod compiler;
pub mod error;
pub mod input;
pub mod interp;
pub mod macros;
pub mod options;
pub mod reader;
pub mod scope;
pub mod specials;

pub use ast::Value;
pub use ast_to_string::ast_to_string;
pub use compiler::{compile, compile_ast};
pub use error::AniseError;
pub use input::Input;
pub use interp::eval;
pub use options::CompileOptions;
pub use reader::Reader;
pub use scope::{gensym, mangle, Scope, ScopeRef};

/// Parse a source string into its top-level forms.
pub fn parse(source: &str) -> Result<(Vec<Value>, usize), AniseError> {
    let mut reader = Reader::new(source);
    let forms = reader.read_all()?;
    let count = forms.len();
    Ok((forms, count))
}

/// Parse from any input, dispatching each completed top-level form to the
/// callback and releasing consumed bytes as it goes. Returns an empty list
/// and the dispatched count.
pub fn parse_dispatch(
    input: Input,
    source_name: Option<String>,
    on_form: impl FnMut(Value) -> Result<(), AniseError>,
) -> Result<(Vec<Value>, usize), AniseError> {
    let mut reader = Reader::with_input(input, source_name);
    let count = reader.read_dispatch(on_form)?;
    Ok((Vec::new(), count))
}

/// AST constructors, mirroring what compile-time code can build.
pub fn list(items: Vec<Value>) -> Value {
    Value::List(items)
}

pub fn sym(name: impl Into<String>) -> Value {
    Value::Symbol(name.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_returns_forms_and_count() {
        let (forms, count) = parse("(+ 1 2) x").unwrap();
        assert_eq!(count, 2);
        assert_eq!(forms.len(), 2);
    }

    #[test]
    fn parse_dispatch_returns_an_empty_list() {
        let mut seen = 0usize;
        let (forms, count) = parse_dispatch(
            Input::from_string("(a) (b) (c)"),
            None,
            |_| {
                seen += 1;
                Ok(())
            },
        )
        .unwrap();
        assert!(forms.is_empty());
        assert_eq!(count, 3);
        assert_eq!(seen, 3);
    }
}
