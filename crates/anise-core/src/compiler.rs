use crate::ast::{number_to_string, Value};
use crate::chunk::Chunk;
use crate::error::AniseError;
use crate::macros::macroexpand;
use crate::options::CompileOptions;
use crate::reader::Reader;
use crate::scope::{gensym, mangle, Scope, ScopeRef};

/// The metadata threaded through compilation: the emitted expression
/// fragments plus everything a caller needs to know to place them safely.
#[derive(Clone, Debug)]
pub struct Emitted {
    pub exprs: Vec<String>,
    pub side_effects: bool,
    pub single_eval: bool,
    pub valid_statement: bool,
    /// True when emitting already introduced bindings into the parent
    /// chunk, so the fragments must not be emitted again.
    pub scoped: bool,
    pub unknown_expr_count: bool,
}

impl Emitted {
    pub fn literal(expr: impl Into<String>) -> Self {
        Emitted {
            exprs: vec![expr.into()],
            side_effects: false,
            single_eval: true,
            valid_statement: false,
            scoped: false,
            unknown_expr_count: false,
        }
    }

    /// A form that emitted itself directly into the parent chunk and
    /// evaluates to nothing.
    pub fn statement() -> Self {
        Emitted {
            exprs: Vec::new(),
            side_effects: true,
            single_eval: true,
            valid_statement: false,
            scoped: true,
            unknown_expr_count: false,
        }
    }

    pub fn empty() -> Self {
        Emitted {
            exprs: Vec::new(),
            side_effects: false,
            single_eval: true,
            valid_statement: false,
            scoped: false,
            unknown_expr_count: false,
        }
    }
}

/// Compile one form into target fragments, emitting any supporting
/// statements into `chunk`. Macro expansion happens here, at the head
/// position only; special forms dispatch through the scope chain; anything
/// else is a function application.
pub fn compile_expr(
    ast: &Value,
    scope: &ScopeRef,
    chunk: &mut Chunk,
) -> Result<Emitted, AniseError> {
    let ast = macroexpand(ast.clone(), scope)?;
    let items = match &ast {
        Value::List(items) => items,
        other => return compile_literal(other, scope, chunk),
    };
    let Some(head) = items.first() else {
        return Err(AniseError::form("cannot call the empty list ()"));
    };
    if let Some(name) = head.as_symbol() {
        let special = scope.read().unwrap().lookup_special(name);
        if let Some(special) = special {
            return special(items, scope, chunk);
        }
    }

    let callee = compile_toss_rest(head, scope, chunk)?;
    let argc = items.len() - 1;
    let mut arg_exprs = Vec::with_capacity(argc);
    for (i, arg) in items[1..].iter().enumerate() {
        if i + 1 == argc {
            // the final argument keeps its full arity so a multi-value
            // tail can flow into the call
            let last = compile_expr(arg, scope, chunk)?;
            arg_exprs.extend(last.exprs);
        } else {
            let mut e = compile_toss_rest(arg, scope, chunk)?;
            arg_exprs.append(&mut e.exprs);
        }
    }
    Ok(Emitted {
        exprs: vec![format!("{}({})", callee.exprs[0], arg_exprs.join(", "))],
        side_effects: true,
        single_eval: true,
        valid_statement: true,
        scoped: false,
        unknown_expr_count: true,
    })
}

/// Compile and collapse to exactly one fragment.
pub fn compile_toss_rest(
    ast: &Value,
    scope: &ScopeRef,
    chunk: &mut Chunk,
) -> Result<Emitted, AniseError> {
    let emitted = compile_expr(ast, scope, chunk)?;
    Ok(toss_rest(emitted, scope, chunk))
}

/// Collapse a compile result to a single expression fragment. Extra
/// fragments keep their source-order evaluation: the first is bound to a
/// fresh local, the rest run as statements for their side effects only.
pub fn toss_rest(mut emitted: Emitted, scope: &ScopeRef, chunk: &mut Chunk) -> Emitted {
    if emitted.exprs.is_empty() {
        emitted.exprs.push("nil".to_string());
        emitted.side_effects = false;
        emitted.single_eval = true;
        emitted.valid_statement = false;
        emitted.unknown_expr_count = false;
        return emitted;
    }
    if emitted.exprs.len() > 1 {
        let name = gensym(scope);
        chunk.line(format!("local {} = {}", name, emitted.exprs[0]));
        for frag in &emitted.exprs[1..] {
            emit_statement(frag, emitted.valid_statement, chunk);
        }
        return Emitted {
            exprs: vec![name],
            side_effects: false,
            single_eval: true,
            valid_statement: false,
            scoped: true,
            unknown_expr_count: false,
        };
    }
    emitted.unknown_expr_count = false;
    emitted
}

/// Compile a form in statement position. Fragments without side effects
/// are dropped; fragments already emitted through their own bindings are
/// not emitted twice.
pub fn compile_do(ast: &Value, scope: &ScopeRef, chunk: &mut Chunk) -> Result<(), AniseError> {
    let emitted = compile_expr(ast, scope, chunk)?;
    if emitted.scoped || !emitted.side_effects {
        return Ok(());
    }
    for frag in &emitted.exprs {
        emit_statement(frag, emitted.valid_statement, chunk);
    }
    Ok(())
}

/// Compile the final form of a chunk or function body and return its
/// value(s).
pub fn compile_tail(ast: &Value, scope: &ScopeRef, chunk: &mut Chunk) -> Result<(), AniseError> {
    let emitted = compile_expr(ast, scope, chunk)?;
    if emitted.exprs.is_empty() {
        return Ok(());
    }
    chunk.line(format!("return {}", emitted.exprs.join(", ")));
    Ok(())
}

pub fn emit_statement(frag: &str, valid_statement: bool, chunk: &mut Chunk) {
    if valid_statement {
        chunk.line(frag.to_string());
    } else {
        chunk.line(format!("do local _ = {} end", frag));
    }
}

fn compile_literal(
    ast: &Value,
    scope: &ScopeRef,
    chunk: &mut Chunk,
) -> Result<Emitted, AniseError> {
    match ast {
        Value::Symbol(name) => Ok(Emitted::literal(mangle(scope, name)?)),
        Value::Number(n) => Ok(Emitted::literal(lua_number_literal(*n))),
        Value::String(text) => Ok(Emitted::literal(lua_string_literal(text))),
        Value::Bool(true) => Ok(Emitted::literal("true")),
        Value::Bool(false) => Ok(Emitted::literal("false")),
        Value::Nil => Ok(Emitted::literal("nil")),
        Value::Map(entries) => {
            let mut parts = Vec::with_capacity(entries.len());
            let mut side_effects = false;
            let mut positional = 0usize;
            for (i, (key, value)) in entries.iter().enumerate() {
                let v = compile_toss_rest(value, scope, chunk)?;
                side_effects |= v.side_effects;
                let in_sequence_prefix = positional == i
                    && matches!(key, Value::Number(n) if *n == (i + 1) as f64);
                if in_sequence_prefix {
                    positional += 1;
                    parts.push(v.exprs[0].clone());
                } else {
                    let k = compile_toss_rest(key, scope, chunk)?;
                    side_effects |= k.side_effects;
                    parts.push(format!("[{}] = {}", k.exprs[0], v.exprs[0]));
                }
            }
            Ok(Emitted {
                exprs: vec![format!("{{{}}}", parts.join(", "))],
                side_effects,
                single_eval: true,
                valid_statement: false,
                scoped: false,
                unknown_expr_count: false,
            })
        }
        Value::List(_) => unreachable!("lists are compiled as calls"),
    }
}

fn lua_number_literal(n: f64) -> String {
    if n.is_nan() {
        "(0/0)".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "(1/0)".to_string()
        } else {
            "(-1/0)".to_string()
        }
    } else {
        number_to_string(n)
    }
}

fn lua_string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for &byte in text.as_bytes() {
        match byte {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            other => out.push_str(&format!("\\{:03}", other)),
        }
    }
    out.push('"');
    out
}

/// Compile a full source string. Each top-level form compiles
/// independently; the last one returns its value from the produced chunk.
pub fn compile(source: &str, options: &CompileOptions) -> Result<String, AniseError> {
    let mut reader = Reader::new(source);
    reader.source_name = options.source_name.clone();
    let forms = reader.read_all()?;
    compile_forms(&forms, options)
}

/// Compile a single, already-parsed form.
pub fn compile_ast(ast: &Value, options: &CompileOptions) -> Result<String, AniseError> {
    compile_forms(std::slice::from_ref(ast), options)
}

fn compile_forms(forms: &[Value], options: &CompileOptions) -> Result<String, AniseError> {
    let scope = options.scope.clone().unwrap_or_else(Scope::root);
    let mut chunk = Chunk::new();
    for (i, form) in forms.iter().enumerate() {
        if i + 1 == forms.len() {
            compile_tail(form, &scope, &mut chunk)?;
        } else {
            compile_do(form, &scope, &mut chunk)?;
        }
    }
    Ok(chunk.assemble(options.indent()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_str(source: &str) -> String {
        compile(source, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn literals_emit_target_forms() {
        assert_eq!(compile_str("1.5"), "return 1.5");
        assert_eq!(compile_str("\"hi\\n\""), "return \"hi\\n\"");
        assert_eq!(compile_str("true"), "return true");
        assert_eq!(compile_str("nil"), "return nil");
    }

    #[test]
    fn high_bytes_escape_as_decimal() {
        // "é" is the two bytes 195 169 in UTF-8
        assert_eq!(compile_str("\"é\""), "return \"\\195\\169\"");
    }

    #[test]
    fn table_literals_mix_positional_and_keyed_entries() {
        assert_eq!(compile_str("[1 2 3]"), "return {1, 2, 3}");
        assert_eq!(compile_str("{\"k\" 1}"), "return {[\"k\"] = 1}");
    }

    #[test]
    fn applications_keep_source_argument_order() {
        assert_eq!(compile_str("(f (g 1) 2)"), "return f(g(1), 2)");
    }

    #[test]
    fn final_call_argument_keeps_full_arity() {
        assert_eq!(compile_str("(f 1 (g))"), "return f(1, g())");
    }

    #[test]
    fn toss_rest_collapses_to_one_fragment() {
        let scope = Scope::root();
        let mut chunk = Chunk::new();
        let emitted = Emitted {
            exprs: vec!["f()".into(), "g()".into()],
            side_effects: true,
            single_eval: true,
            valid_statement: true,
            scoped: false,
            unknown_expr_count: false,
        };
        let collapsed = toss_rest(emitted, &scope, &mut chunk);
        assert_eq!(collapsed.exprs, vec!["_0".to_string()]);
        assert_eq!(chunk.assemble("  "), "local _0 = f()\ng()");
    }

    #[test]
    fn toss_rest_fills_missing_values_with_nil() {
        let scope = Scope::root();
        let mut chunk = Chunk::new();
        let collapsed = toss_rest(Emitted::empty(), &scope, &mut chunk);
        assert_eq!(collapsed.exprs, vec!["nil".to_string()]);
        assert!(chunk.is_empty());
    }

    #[test]
    fn pure_statements_are_dropped() {
        assert_eq!(compile_str("1 2 3"), "return 3");
    }

    #[test]
    fn side_effecting_statements_survive() {
        assert_eq!(compile_str("(f) 1"), "f()\nreturn 1");
    }

    #[test]
    fn empty_list_call_is_a_form_error() {
        let err = compile("()", &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, AniseError::Form(_)));
    }

    #[test]
    fn compile_ast_matches_compile() {
        let form = Value::list(vec![
            Value::sym("+"),
            Value::Number(1.0),
            Value::Number(2.0),
        ]);
        assert_eq!(
            compile_ast(&form, &CompileOptions::default()).unwrap(),
            compile_str("(+ 1 2)")
        );
    }

    #[test]
    fn a_shared_scope_carries_manglings_across_units() {
        let scope = Scope::root();
        let options = CompileOptions::default().with_scope(scope);
        compile("(var my-var 1)", &options).unwrap();
        assert_eq!(compile("my-var", &options).unwrap(), "return my19var");
    }
}
