use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::Value;
use crate::chunk::Chunk;
use crate::compiler::{compile_do, compile_expr, compile_tail, compile_toss_rest, Emitted};
use crate::error::AniseError;
use crate::scope::{gensym, mangle, Scope, ScopeRef};

/// An emitter for one primitive construct. It receives the whole call form
/// (head included), emits lines into the parent chunk, and reports what it
/// left behind.
pub type SpecialFn =
    Arc<dyn Fn(&[Value], &ScopeRef, &mut Chunk) -> Result<Emitted, AniseError> + Send + Sync>;

/// The built-in special forms, installed once into each root scope. Child
/// scopes reach them through parent-chain lookup.
pub fn builtin_specials() -> HashMap<String, SpecialFn> {
    let mut table: HashMap<String, SpecialFn> = HashMap::new();
    table.insert("fn".into(), Arc::new(special_fn));
    table.insert(".".into(), Arc::new(special_dot));
    table.insert("var".into(), assignment_special(true));
    table.insert("set".into(), assignment_special(false));
    table.insert("--".into(), Arc::new(special_comment));
    table.insert("block".into(), Arc::new(special_block));
    table.insert("do".into(), Arc::new(special_do));
    table.insert("values".into(), Arc::new(special_values));
    table.insert("*branch".into(), Arc::new(special_branch));
    table.insert("*while".into(), Arc::new(special_while));
    table.insert("*dowhile".into(), Arc::new(special_dowhile));
    table.insert("*for".into(), Arc::new(special_for));
    table.insert("*break".into(), Arc::new(special_break));
    table.insert("*compiler".into(), Arc::new(special_compiler));
    let arithmetic: [(&'static str, Option<&'static str>); 9] = [
        ("+", None),
        ("..", None),
        ("^", None),
        ("-", Some("-")),
        ("*", None),
        ("%", None),
        ("/", None),
        ("or", None),
        ("and", None),
    ];
    for (op, unary_prefix) in arithmetic {
        table.insert(op.into(), arithmetic_special(op, unary_prefix));
    }
    let comparators: [(&'static str, &'static str); 6] = [
        (">", ">"),
        ("<", "<"),
        (">=", ">="),
        ("<=", "<="),
        ("=", "=="),
        ("~=", "~="),
    ];
    for (source_op, target_op) in comparators {
        table.insert(source_op.into(), comparator_special(source_op, target_op));
    }
    for op in ["not", "#"] {
        table.insert(op.into(), unary_special(op));
    }
    table
}

fn special_fn(args: &[Value], scope: &ScopeRef, chunk: &mut Chunk) -> Result<Emitted, AniseError> {
    let mut idx = 1;
    let name = match args.get(1) {
        Some(Value::Symbol(sym)) => {
            idx = 2;
            mangle(scope, sym)?
        }
        _ => gensym(scope),
    };
    let params_form = args
        .get(idx)
        .and_then(Value::seq_items)
        .ok_or_else(|| AniseError::form("fn requires a parameter vector"))?;

    let child = Scope::child(scope);
    child.write().unwrap().vararg = false;
    let mut params = Vec::with_capacity(params_form.len());
    for (i, param) in params_form.iter().enumerate() {
        let Some(pname) = param.as_symbol() else {
            return Err(AniseError::form(format!(
                "fn parameter {} is a {}, expected a symbol",
                i + 1,
                param.type_name()
            )));
        };
        if pname == "..." {
            if i + 1 != params_form.len() {
                return Err(AniseError::form("'...' must be the last parameter"));
            }
            child.write().unwrap().vararg = true;
            params.push("...".to_string());
        } else {
            params.push(mangle(&child, pname)?);
        }
    }

    let body = &args[idx + 1..];
    let mut fchunk = Chunk::new();
    if let Some((last, init)) = body.split_last() {
        for form in init {
            compile_do(form, &child, &mut fchunk)?;
        }
        compile_tail(last, &child, &mut fchunk)?;
    }
    chunk.line(format!("local function {}({})", name, params.join(", ")));
    chunk.push_sub(fchunk);
    chunk.line("end");
    Ok(Emitted {
        exprs: vec![name],
        side_effects: false,
        single_eval: true,
        valid_statement: false,
        scoped: true,
        unknown_expr_count: false,
    })
}

fn special_dot(args: &[Value], scope: &ScopeRef, chunk: &mut Chunk) -> Result<Emitted, AniseError> {
    if args.len() != 3 {
        return Err(AniseError::form("'.' expects a table and one key"));
    }
    let table = compile_toss_rest(&args[1], scope, chunk)?;
    let key = compile_toss_rest(&args[2], scope, chunk)?;
    Ok(Emitted {
        exprs: vec![format!("({})[{}]", table.exprs[0], key.exprs[0])],
        side_effects: table.side_effects || key.side_effects,
        single_eval: true,
        valid_statement: false,
        scoped: false,
        unknown_expr_count: false,
    })
}

fn assignment_special(declares_local: bool) -> SpecialFn {
    Arc::new(move |args, scope, chunk| {
        let form_name = if declares_local { "var" } else { "set" };
        if args.len() < 3 {
            return Err(AniseError::form(format!(
                "{} expects a target and a value",
                form_name
            )));
        }
        let mut targets = Vec::with_capacity(args.len() - 2);
        for target in &args[1..args.len() - 1] {
            let Some(name) = target.as_symbol() else {
                return Err(AniseError::form(format!(
                    "{} target is a {}, expected a symbol",
                    form_name,
                    target.type_name()
                )));
            };
            targets.push(mangle(scope, name)?);
        }
        // full arity so a multi-value expression feeds every target
        let value = compile_expr(&args[args.len() - 1], scope, chunk)?;
        let rhs = if value.exprs.is_empty() {
            "nil".to_string()
        } else {
            value.exprs.join(", ")
        };
        let prefix = if declares_local { "local " } else { "" };
        chunk.line(format!("{}{} = {}", prefix, targets.join(", "), rhs));
        Ok(Emitted::statement())
    })
}

fn special_comment(
    args: &[Value],
    _scope: &ScopeRef,
    chunk: &mut Chunk,
) -> Result<Emitted, AniseError> {
    for arg in &args[1..] {
        let Value::String(text) = arg else {
            return Err(AniseError::form(format!(
                "'--' takes strings, got a {}",
                arg.type_name()
            )));
        };
        for line in text.split('\n') {
            chunk.line(format!("-- {}", line));
        }
    }
    Ok(Emitted::empty())
}

fn special_block(
    args: &[Value],
    scope: &ScopeRef,
    chunk: &mut Chunk,
) -> Result<Emitted, AniseError> {
    let child = Scope::child(scope);
    let mut body = Chunk::new();
    for form in &args[1..] {
        compile_do(form, &child, &mut body)?;
    }
    chunk.line("do");
    chunk.push_sub(body);
    chunk.line("end");
    Ok(Emitted::statement())
}

fn special_do(args: &[Value], scope: &ScopeRef, chunk: &mut Chunk) -> Result<Emitted, AniseError> {
    let body = &args[1..];
    let Some((last, init)) = body.split_last() else {
        return Ok(Emitted::empty());
    };
    let child = Scope::child(scope);
    let mut inner = Chunk::new();
    for form in init {
        compile_do(form, &child, &mut inner)?;
    }
    let tail = compile_expr(last, &child, &mut inner)?;

    if tail.unknown_expr_count {
        // an unknown-arity tail survives a block only inside a function,
        // so wrap the body and invoke it immediately
        let fname = gensym(scope);
        let forward = if scope.read().unwrap().vararg { "..." } else { "" };
        if !tail.exprs.is_empty() {
            inner.line(format!("return {}", tail.exprs.join(", ")));
        }
        chunk.line(format!("local function {}({})", fname, forward));
        chunk.push_sub(inner);
        chunk.line("end");
        return Ok(Emitted {
            exprs: vec![format!("{}({})", fname, forward)],
            side_effects: true,
            single_eval: true,
            valid_statement: true,
            scoped: false,
            unknown_expr_count: true,
        });
    }

    let names: Vec<String> = tail.exprs.iter().map(|_| gensym(scope)).collect();
    if !names.is_empty() {
        chunk.line(format!("local {}", names.join(", ")));
        inner.line(format!("{} = {}", names.join(", "), tail.exprs.join(", ")));
    }
    chunk.line("do");
    chunk.push_sub(inner);
    chunk.line("end");
    Ok(Emitted {
        exprs: names,
        side_effects: true,
        single_eval: true,
        valid_statement: false,
        scoped: true,
        unknown_expr_count: false,
    })
}

fn special_values(
    args: &[Value],
    scope: &ScopeRef,
    chunk: &mut Chunk,
) -> Result<Emitted, AniseError> {
    let argc = args.len() - 1;
    let mut exprs = Vec::with_capacity(argc);
    let mut side_effects = false;
    let mut single_eval = true;
    let mut valid_statement = true;
    let mut unknown_expr_count = false;
    for (i, arg) in args[1..].iter().enumerate() {
        let e = if i + 1 == argc {
            compile_expr(arg, scope, chunk)?
        } else {
            compile_toss_rest(arg, scope, chunk)?
        };
        side_effects |= e.side_effects;
        single_eval &= e.single_eval;
        valid_statement &= e.valid_statement;
        if i + 1 == argc {
            unknown_expr_count = e.unknown_expr_count;
        }
        exprs.extend(e.exprs);
    }
    Ok(Emitted {
        exprs,
        side_effects,
        single_eval,
        valid_statement,
        scoped: false,
        unknown_expr_count,
    })
}

fn special_branch(
    args: &[Value],
    scope: &ScopeRef,
    chunk: &mut Chunk,
) -> Result<Emitted, AniseError> {
    if args.len() < 2 {
        return Err(AniseError::form("*branch requires a condition"));
    }
    let cond = compile_toss_rest(&args[1], scope, chunk)?;
    chunk.line(format!("if {} then", cond.exprs[0]));
    let mut i = 2;
    loop {
        let child = Scope::child(scope);
        let mut body = Chunk::new();
        while i < args.len() && !args[i].is_symbol_named("*branch") {
            compile_do(&args[i], &child, &mut body)?;
            i += 1;
        }
        chunk.push_sub(body);
        if i >= args.len() {
            break;
        }
        i += 1; // past the '*branch' marker
        match args.get(i).and_then(Value::as_symbol) {
            Some("else") => {
                chunk.line("else");
                i += 1;
            }
            Some("elseif") => {
                i += 1;
                let cond_form = args
                    .get(i)
                    .ok_or_else(|| AniseError::form("*branch elseif requires a condition"))?;
                let cond = compile_toss_rest(cond_form, scope, chunk)?;
                chunk.line(format!("elseif {} then", cond.exprs[0]));
                i += 1;
            }
            _ => {
                return Err(AniseError::form(
                    "*branch expects 'else' or 'elseif' after a '*branch' marker",
                ))
            }
        }
    }
    chunk.line("end");
    Ok(Emitted::statement())
}

fn special_while(
    args: &[Value],
    scope: &ScopeRef,
    chunk: &mut Chunk,
) -> Result<Emitted, AniseError> {
    if args.len() < 2 {
        return Err(AniseError::form("*while requires a condition"));
    }
    let cond = compile_toss_rest(&args[1], scope, chunk)?;
    chunk.line(format!("while {} do", cond.exprs[0]));
    let child = Scope::child(scope);
    let mut body = Chunk::new();
    for form in &args[2..] {
        compile_do(form, &child, &mut body)?;
    }
    chunk.push_sub(body);
    chunk.line("end");
    Ok(Emitted::statement())
}

fn special_dowhile(
    args: &[Value],
    scope: &ScopeRef,
    chunk: &mut Chunk,
) -> Result<Emitted, AniseError> {
    if args.len() < 2 {
        return Err(AniseError::form("*dowhile requires a condition"));
    }
    let child = Scope::child(scope);
    let mut body = Chunk::new();
    for form in &args[2..] {
        compile_do(form, &child, &mut body)?;
    }
    // the condition re-evaluates after each pass, so it compiles into the
    // loop body
    let cond = compile_toss_rest(&args[1], &child, &mut body)?;
    chunk.line("repeat");
    chunk.push_sub(body);
    chunk.line(format!("until {}", cond.exprs[0]));
    Ok(Emitted::statement())
}

fn special_for(args: &[Value], scope: &ScopeRef, chunk: &mut Chunk) -> Result<Emitted, AniseError> {
    let var = args
        .get(1)
        .and_then(Value::as_symbol)
        .ok_or_else(|| AniseError::form("*for requires a loop variable"))?;
    let bindings = args
        .get(2)
        .and_then(Value::seq_items)
        .ok_or_else(|| AniseError::form("*for requires a range vector"))?;
    if bindings.is_empty() || bindings.len() > 3 {
        return Err(AniseError::form(
            "*for range takes a start, an end, and an optional step",
        ));
    }
    let mut ranges = Vec::with_capacity(bindings.len());
    for binding in bindings {
        ranges.push(compile_toss_rest(binding, scope, chunk)?.exprs.remove(0));
    }
    let child = Scope::child(scope);
    let mangled = mangle(&child, var)?;
    chunk.line(format!("for {} = {} do", mangled, ranges.join(", ")));
    let mut body = Chunk::new();
    for form in &args[3..] {
        compile_do(form, &child, &mut body)?;
    }
    chunk.push_sub(body);
    chunk.line("end");
    Ok(Emitted::statement())
}

fn special_break(
    _args: &[Value],
    _scope: &ScopeRef,
    chunk: &mut Chunk,
) -> Result<Emitted, AniseError> {
    chunk.line("break");
    Ok(Emitted::statement())
}

fn special_compiler(
    args: &[Value],
    scope: &ScopeRef,
    _chunk: &mut Chunk,
) -> Result<Emitted, AniseError> {
    crate::interp::run_compiler_bridge(args, scope)?;
    Ok(Emitted::empty())
}

fn arithmetic_special(op: &'static str, unary_prefix: Option<&'static str>) -> SpecialFn {
    Arc::new(move |args, scope, chunk| {
        let operands = &args[1..];
        if operands.is_empty() {
            return Ok(Emitted::literal(unary_prefix.unwrap_or("0")));
        }
        if operands.len() == 1 {
            if let Some(prefix) = unary_prefix {
                let operand = compile_toss_rest(&operands[0], scope, chunk)?;
                return Ok(Emitted {
                    exprs: vec![format!("({} {})", prefix, operand.exprs[0])],
                    side_effects: operand.side_effects,
                    single_eval: true,
                    valid_statement: false,
                    scoped: false,
                    unknown_expr_count: false,
                });
            }
        }
        let mut parts = Vec::with_capacity(operands.len());
        let mut side_effects = false;
        for operand in operands {
            let mut e = compile_toss_rest(operand, scope, chunk)?;
            side_effects |= e.side_effects;
            parts.push(e.exprs.remove(0));
        }
        Ok(Emitted {
            exprs: vec![format!("({})", parts.join(&format!(" {} ", op)))],
            side_effects,
            single_eval: true,
            valid_statement: false,
            scoped: false,
            unknown_expr_count: false,
        })
    })
}

fn comparator_special(source_op: &'static str, target_op: &'static str) -> SpecialFn {
    Arc::new(move |args, scope, chunk| {
        if args.len() != 3 {
            return Err(AniseError::form(format!(
                "'{}' takes exactly two operands",
                source_op
            )));
        }
        let lhs = compile_toss_rest(&args[1], scope, chunk)?;
        let rhs = compile_toss_rest(&args[2], scope, chunk)?;
        Ok(Emitted {
            exprs: vec![format!(
                "(({}) {} ({}))",
                lhs.exprs[0], target_op, rhs.exprs[0]
            )],
            side_effects: lhs.side_effects || rhs.side_effects,
            single_eval: true,
            valid_statement: false,
            scoped: false,
            unknown_expr_count: false,
        })
    })
}

fn unary_special(op: &'static str) -> SpecialFn {
    Arc::new(move |args, scope, chunk| {
        if args.len() != 2 {
            return Err(AniseError::form(format!(
                "'{}' takes exactly one operand",
                op
            )));
        }
        let operand = compile_toss_rest(&args[1], scope, chunk)?;
        let expr = if op == "#" {
            format!("#({})", operand.exprs[0])
        } else {
            format!("{} ({})", op, operand.exprs[0])
        };
        Ok(Emitted {
            exprs: vec![expr],
            side_effects: operand.side_effects,
            single_eval: true,
            valid_statement: false,
            scoped: false,
            unknown_expr_count: false,
        })
    })
}
