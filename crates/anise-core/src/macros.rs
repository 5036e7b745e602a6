use std::sync::Arc;

use crate::ast::Value;
use crate::error::AniseError;
use crate::interp::CtFunction;
use crate::scope::ScopeRef;

pub type NativeMacroFn = Arc<dyn Fn(&[Value]) -> Result<Value, AniseError> + Send + Sync>;

/// A compile-time transformer from AST to AST, invoked with the tail of the
/// call site. `Interp` macros are installed through the reflective bridge;
/// `Native` macros come from the embedding host.
#[derive(Clone)]
pub enum Macro {
    Native(NativeMacroFn),
    Interp(CtFunction),
}

impl Macro {
    pub fn expand(&self, args: &[Value]) -> Result<Value, AniseError> {
        match self {
            Macro::Native(transformer) => transformer(args),
            Macro::Interp(function) => function.call_with_data(args),
        }
    }
}

/// Iterative head-position expansion: while the form is a list whose head
/// symbol resolves to a macro, replace the whole form with the
/// transformer's output. Sub-forms are left alone; they expand lazily when
/// compiled.
pub fn macroexpand(mut ast: Value, scope: &ScopeRef) -> Result<Value, AniseError> {
    loop {
        let transformer = match &ast {
            Value::List(items) => match items.first().and_then(Value::as_symbol) {
                Some(head) => scope.read().unwrap().lookup_macro(head),
                None => None,
            },
            _ => None,
        };
        let Some(transformer) = transformer else {
            return Ok(ast);
        };
        let (head, args) = match &ast {
            Value::List(items) => (
                items[0].as_symbol().unwrap_or_default().to_string(),
                &items[1..],
            ),
            _ => unreachable!(),
        };
        let expanded = transformer.expand(args)?;
        if !matches!(expanded, Value::List(_)) {
            return Err(AniseError::macro_error(format!(
                "expansion of '{}' produced a {}, expected a list",
                head,
                expanded.type_name()
            )));
        }
        ast = expanded;
    }
}
