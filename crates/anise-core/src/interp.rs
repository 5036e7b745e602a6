use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::ast::Value;
use crate::error::AniseError;
use crate::macros::Macro;
use crate::options::CompileOptions;
use crate::reader::Reader;
use crate::scope::{gensym, Scope, ScopeRef};

// The fixed compile-time interpreter behind the `*compiler` special form
// and the public `eval` operation. It evaluates the surface language
// directly over AST values; no target-language host is involved.

pub type CtEnvRef = Arc<RwLock<CtEnv>>;

/// A compile-time value: plain AST data, a closure, a builtin, or a handle
/// onto the compilation state that `*compiler` exposes.
#[derive(Clone)]
pub enum CtValue {
    Data(Value),
    Func(CtFunction),
    Builtin(&'static str),
    Scope(ScopeRef),
    Macros(ScopeRef),
}

impl std::fmt::Debug for CtValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CtValue::Data(value) => f.debug_tuple("Data").field(value).finish(),
            CtValue::Func(_) => f.write_str("Func(..)"),
            CtValue::Builtin(name) => f.debug_tuple("Builtin").field(name).finish(),
            CtValue::Scope(_) => f.write_str("Scope(..)"),
            CtValue::Macros(_) => f.write_str("Macros(..)"),
        }
    }
}

impl CtValue {
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            CtValue::Data(value) => Some(value),
            _ => None,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            CtValue::Data(value) => value.truthy(),
            _ => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            CtValue::Data(value) => value.type_name(),
            CtValue::Func(_) => "function",
            CtValue::Builtin(_) => "builtin",
            CtValue::Scope(_) => "scope",
            CtValue::Macros(_) => "macro table",
        }
    }
}

#[derive(Clone)]
pub struct CtFunction {
    params: Vec<String>,
    vararg: bool,
    body: Vec<Value>,
    env: CtEnvRef,
}

impl CtFunction {
    pub fn call(&self, args: Vec<CtValue>) -> Result<CtValue, AniseError> {
        let env = CtEnv::child(&self.env);
        let positional = if self.vararg {
            self.params.len() - 1
        } else {
            self.params.len()
        };
        {
            let mut guard = env.write().unwrap();
            for (i, param) in self.params.iter().take(positional).enumerate() {
                guard.set(param, args.get(i).cloned().unwrap_or(CtValue::Data(Value::Nil)));
            }
            if self.vararg {
                let mut rest = Vec::new();
                for arg in args.iter().skip(positional) {
                    match arg.as_data() {
                        Some(value) => rest.push(value.clone()),
                        None => {
                            return Err(AniseError::eval(
                                "only data values can flow into '...'",
                            ))
                        }
                    }
                }
                guard.set("...", CtValue::Data(Value::List(rest)));
            }
        }
        let mut result = CtValue::Data(Value::Nil);
        for form in &self.body {
            result = eval_form(form, &env)?;
        }
        Ok(result)
    }

    /// Invoke as a macro transformer: AST in, AST out.
    pub fn call_with_data(&self, args: &[Value]) -> Result<Value, AniseError> {
        let args = args
            .iter()
            .map(|value| CtValue::Data(value.clone()))
            .collect();
        match self.call(args)? {
            CtValue::Data(value) => Ok(value),
            other => Err(AniseError::macro_error(format!(
                "macro returned a {}, expected AST data",
                other.type_name()
            ))),
        }
    }
}

pub struct CtEnv {
    data: HashMap<String, CtValue>,
    outer: Option<CtEnvRef>,
}

impl CtEnv {
    fn child(outer: &CtEnvRef) -> CtEnvRef {
        Arc::new(RwLock::new(CtEnv {
            data: HashMap::new(),
            outer: Some(outer.clone()),
        }))
    }

    fn set(&mut self, key: &str, value: CtValue) {
        self.data.insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<CtValue> {
        if let Some(found) = self.data.get(key) {
            return Some(found.clone());
        }
        self.outer
            .as_ref()
            .and_then(|outer| outer.read().unwrap().get(key))
    }

    fn set_in_chain(&mut self, key: &str, value: CtValue) {
        if self.data.contains_key(key) {
            self.data.insert(key.to_string(), value);
            return;
        }
        match &self.outer {
            Some(outer) => outer.write().unwrap().set_in_chain(key, value),
            None => {
                self.data.insert(key.to_string(), value);
            }
        }
    }
}

const BUILTINS: &[&str] = &[
    "list", "sym", "gensym", "len", "first", "rest", "push", "concat", "print",
];

fn base_env() -> CtEnvRef {
    let mut data = HashMap::new();
    for &name in BUILTINS {
        data.insert(name.to_string(), CtValue::Builtin(name));
    }
    Arc::new(RwLock::new(CtEnv { data, outer: None }))
}

/// Run the argument forms of a `(*compiler …)` call. The environment
/// carries the bindings the reference prelude would have passed: the active
/// scope, its macro table, and the original form.
pub fn run_compiler_bridge(args: &[Value], scope: &ScopeRef) -> Result<(), AniseError> {
    let env = base_env();
    {
        let mut guard = env.write().unwrap();
        guard.set("_S", CtValue::Scope(scope.clone()));
        guard.set("_M", CtValue::Macros(scope.clone()));
        guard.set("_C", CtValue::Data(Value::Nil));
        guard.set("_A", CtValue::Data(Value::List(args.to_vec())));
        guard.set("__COMPILER_ENV__", CtValue::Data(Value::Bool(true)));
    }
    for form in &args[1..] {
        eval_form(form, &env).map_err(|err| match err {
            AniseError::Bridge(_) => err,
            AniseError::BreakSignal => AniseError::bridge("'*break' outside a loop"),
            other => AniseError::bridge(other.to_string()),
        })?;
    }
    Ok(())
}

/// Evaluate a source string with the compile-time interpreter, returning
/// the last form's value.
pub fn eval(source: &str, options: &CompileOptions) -> Result<CtValue, AniseError> {
    let mut reader = Reader::new(source);
    reader.source_name = options.source_name.clone();
    let forms = reader.read_all()?;
    let scope = options.scope.clone().unwrap_or_else(Scope::root);
    let env = base_env();
    {
        let mut guard = env.write().unwrap();
        guard.set("_S", CtValue::Scope(scope.clone()));
        guard.set("_M", CtValue::Macros(scope));
        guard.set("__COMPILER_ENV__", CtValue::Data(Value::Bool(false)));
    }
    let mut result = CtValue::Data(Value::Nil);
    for form in &forms {
        result = eval_form(form, &env).map_err(|err| match err {
            AniseError::BreakSignal => AniseError::eval("'*break' outside a loop"),
            other => other,
        })?;
    }
    Ok(result)
}

fn eval_form(form: &Value, env: &CtEnvRef) -> Result<CtValue, AniseError> {
    match form {
        Value::Symbol(name) => env
            .read()
            .unwrap()
            .get(name)
            .ok_or_else(|| AniseError::eval(format!("unbound symbol '{}'", name))),
        Value::Number(_) | Value::String(_) | Value::Bool(_) | Value::Nil => {
            Ok(CtValue::Data(form.clone()))
        }
        Value::Map(entries) => {
            let mut evaluated = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let key = eval_to_data(key, env)?;
                let value = eval_to_data(value, env)?;
                evaluated.push((key, value));
            }
            Ok(CtValue::Data(Value::Map(evaluated)))
        }
        Value::List(items) => {
            let Some(head) = items.first() else {
                return Err(AniseError::eval("cannot call the empty list ()"));
            };
            if let Some(name) = head.as_symbol() {
                if let Some(result) = eval_special(name, &items[1..], env)? {
                    return Ok(result);
                }
            }
            let callee = eval_form(head, env)?;
            let mut args = Vec::with_capacity(items.len() - 1);
            for arg in &items[1..] {
                args.push(eval_form(arg, env)?);
            }
            match callee {
                CtValue::Func(function) => function.call(args),
                CtValue::Builtin(name) => call_builtin(name, args),
                other => Err(AniseError::eval(format!(
                    "a {} is not callable",
                    other.type_name()
                ))),
            }
        }
    }
}

fn eval_to_data(form: &Value, env: &CtEnvRef) -> Result<Value, AniseError> {
    match eval_form(form, env)? {
        CtValue::Data(value) => Ok(value),
        other => Err(AniseError::eval(format!(
            "expected data, got a {}",
            other.type_name()
        ))),
    }
}

fn eval_special(
    name: &str,
    args: &[Value],
    env: &CtEnvRef,
) -> Result<Option<CtValue>, AniseError> {
    let result = match name {
        "fn" => eval_fn(args, env)?,
        "var" => {
            let (target, value) = split_assignment("var", args)?;
            let value = eval_form(value, env)?;
            env.write().unwrap().set(target, value);
            CtValue::Data(Value::Nil)
        }
        "set" => return eval_set(args, env).map(Some),
        "do" => {
            let child = CtEnv::child(env);
            let mut result = CtValue::Data(Value::Nil);
            for form in args {
                result = eval_form(form, &child)?;
            }
            result
        }
        "block" => {
            let child = CtEnv::child(env);
            for form in args {
                eval_form(form, &child)?;
            }
            CtValue::Data(Value::Nil)
        }
        "." => {
            let obj = args
                .first()
                .ok_or_else(|| AniseError::eval("'.' expects a table and one key"))?;
            let key = args
                .get(1)
                .ok_or_else(|| AniseError::eval("'.' expects a table and one key"))?;
            let obj = eval_form(obj, env)?;
            let key = eval_to_data(key, env)?;
            index_value(&obj, &key)?
        }
        "values" => {
            let mut result = CtValue::Data(Value::Nil);
            for (i, form) in args.iter().enumerate() {
                let value = eval_form(form, env)?;
                if i == 0 {
                    result = value;
                }
            }
            result
        }
        "--" => CtValue::Data(Value::Nil),
        "*branch" => eval_branch(args, env)?,
        "*while" => {
            loop {
                let cond = eval_form(
                    args.first()
                        .ok_or_else(|| AniseError::eval("*while requires a condition"))?,
                    env,
                )?;
                if !cond.truthy() {
                    break;
                }
                let child = CtEnv::child(env);
                match eval_body(&args[1..], &child) {
                    Err(AniseError::BreakSignal) => break,
                    Err(err) => return Err(err),
                    Ok(_) => {}
                }
            }
            CtValue::Data(Value::Nil)
        }
        "*dowhile" => {
            if args.is_empty() {
                return Err(AniseError::eval("*dowhile requires a condition"));
            }
            loop {
                let child = CtEnv::child(env);
                match eval_body(&args[1..], &child) {
                    Err(AniseError::BreakSignal) => break,
                    Err(err) => return Err(err),
                    Ok(_) => {}
                }
                let cond = eval_form(
                    args.first()
                        .ok_or_else(|| AniseError::eval("*dowhile requires a condition"))?,
                    env,
                )?;
                if cond.truthy() {
                    break;
                }
            }
            CtValue::Data(Value::Nil)
        }
        "*for" => eval_for(args, env)?,
        "*break" => return Err(AniseError::BreakSignal),
        "+" | ".." | "^" | "-" | "*" | "%" | "/" | "or" | "and" => {
            eval_arithmetic(name, args, env)?
        }
        ">" | "<" | ">=" | "<=" | "=" | "~=" => eval_comparison(name, args, env)?,
        "not" => {
            let operand = eval_form(
                args.first()
                    .ok_or_else(|| AniseError::eval("'not' takes one operand"))?,
                env,
            )?;
            CtValue::Data(Value::Bool(!operand.truthy()))
        }
        "#" => {
            let operand = eval_to_data(
                args.first()
                    .ok_or_else(|| AniseError::eval("'#' takes one operand"))?,
                env,
            )?;
            CtValue::Data(Value::Number(data_len(&operand)? as f64))
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

fn eval_body(forms: &[Value], env: &CtEnvRef) -> Result<CtValue, AniseError> {
    let mut result = CtValue::Data(Value::Nil);
    for form in forms {
        result = eval_form(form, env)?;
    }
    Ok(result)
}

fn eval_fn(args: &[Value], env: &CtEnvRef) -> Result<CtValue, AniseError> {
    let mut idx = 0;
    let name = match args.first() {
        Some(Value::Symbol(sym)) => {
            idx = 1;
            Some(sym.clone())
        }
        _ => None,
    };
    let params_form = args
        .get(idx)
        .and_then(Value::seq_items)
        .ok_or_else(|| AniseError::eval("fn requires a parameter vector"))?;
    let mut params = Vec::with_capacity(params_form.len());
    let mut vararg = false;
    for (i, param) in params_form.iter().enumerate() {
        let Some(pname) = param.as_symbol() else {
            return Err(AniseError::eval("fn parameters must be symbols"));
        };
        if pname == "..." {
            if i + 1 != params_form.len() {
                return Err(AniseError::eval("'...' must be the last parameter"));
            }
            vararg = true;
        }
        params.push(pname.to_string());
    }
    let function = CtFunction {
        params,
        vararg,
        body: args[idx + 1..].to_vec(),
        env: env.clone(),
    };
    if let Some(name) = name {
        env.write()
            .unwrap()
            .set(&name, CtValue::Func(function.clone()));
    }
    Ok(CtValue::Func(function))
}

fn split_assignment<'a>(
    form_name: &str,
    args: &'a [Value],
) -> Result<(&'a str, &'a Value), AniseError> {
    if args.len() != 2 {
        return Err(AniseError::eval(format!(
            "{} expects a target and a value",
            form_name
        )));
    }
    let target = args[0]
        .as_symbol()
        .ok_or_else(|| AniseError::eval(format!("{} target must be a symbol", form_name)))?;
    Ok((target, &args[1]))
}

fn eval_set(args: &[Value], env: &CtEnvRef) -> Result<CtValue, AniseError> {
    if args.len() != 2 {
        return Err(AniseError::eval("set expects a target and a value"));
    }
    // (set (. _M "name") transformer) installs a macro through the bridge
    if let Value::List(target) = &args[0] {
        if target.len() == 3 && target[0].is_symbol_named(".") {
            let obj = eval_form(&target[1], env)?;
            let key = eval_to_data(&target[2], env)?;
            let value = eval_form(&args[1], env)?;
            return assign_index(&obj, &key, value);
        }
    }
    let (target, value_form) = split_assignment("set", args)?;
    let value = eval_form(value_form, env)?;
    env.write().unwrap().set_in_chain(target, value);
    Ok(CtValue::Data(Value::Nil))
}

fn assign_index(obj: &CtValue, key: &Value, value: CtValue) -> Result<CtValue, AniseError> {
    match obj {
        CtValue::Macros(scope) => {
            let name = match key {
                Value::String(name) => name.clone(),
                Value::Symbol(name) => name.clone(),
                other => {
                    return Err(AniseError::eval(format!(
                        "macro names are strings, got a {}",
                        other.type_name()
                    )))
                }
            };
            let CtValue::Func(function) = value else {
                return Err(AniseError::eval("a macro must be a compile-time function"));
            };
            scope
                .write()
                .unwrap()
                .define_macro(name, Macro::Interp(function));
            Ok(CtValue::Data(Value::Nil))
        }
        other => Err(AniseError::eval(format!(
            "cannot assign into a {}",
            other.type_name()
        ))),
    }
}

fn index_value(obj: &CtValue, key: &Value) -> Result<CtValue, AniseError> {
    match obj {
        CtValue::Data(map @ Value::Map(_)) => Ok(CtValue::Data(
            map.map_get(key).cloned().unwrap_or(Value::Nil),
        )),
        CtValue::Data(Value::List(items)) => {
            let index = match key {
                Value::Number(n) => *n as usize,
                _ => return Ok(CtValue::Data(Value::Nil)),
            };
            Ok(CtValue::Data(
                index
                    .checked_sub(1)
                    .and_then(|i| items.get(i))
                    .cloned()
                    .unwrap_or(Value::Nil),
            ))
        }
        CtValue::Scope(scope) => {
            let guard = scope.read().unwrap();
            match key {
                Value::String(k) if k == "vararg" => Ok(CtValue::Data(Value::Bool(guard.vararg))),
                Value::String(k) if k == "depth" => {
                    Ok(CtValue::Data(Value::Number(guard.depth as f64)))
                }
                Value::String(k) if k == "macros" => {
                    drop(guard);
                    Ok(CtValue::Macros(scope.clone()))
                }
                _ => Ok(CtValue::Data(Value::Nil)),
            }
        }
        CtValue::Macros(scope) => {
            let name = match key {
                Value::String(name) | Value::Symbol(name) => name,
                _ => return Ok(CtValue::Data(Value::Nil)),
            };
            match scope.read().unwrap().lookup_macro(name) {
                Some(Macro::Interp(function)) => Ok(CtValue::Func(function)),
                Some(Macro::Native(_)) => Ok(CtValue::Data(Value::Bool(true))),
                None => Ok(CtValue::Data(Value::Nil)),
            }
        }
        other => Err(AniseError::eval(format!(
            "cannot index a {}",
            other.type_name()
        ))),
    }
}

fn eval_branch(args: &[Value], env: &CtEnvRef) -> Result<CtValue, AniseError> {
    let mut i = 0;
    loop {
        let cond_form = args
            .get(i)
            .ok_or_else(|| AniseError::eval("*branch requires a condition"))?;
        let cond = eval_form(cond_form, env)?.truthy();
        i += 1;
        let start = i;
        while i < args.len() && !args[i].is_symbol_named("*branch") {
            i += 1;
        }
        if cond {
            let child = CtEnv::child(env);
            eval_body(&args[start..i], &child)?;
            return Ok(CtValue::Data(Value::Nil));
        }
        if i >= args.len() {
            return Ok(CtValue::Data(Value::Nil));
        }
        i += 1; // past the '*branch' marker
        match args.get(i).and_then(Value::as_symbol) {
            Some("else") => {
                let child = CtEnv::child(env);
                eval_body(&args[i + 1..], &child)?;
                return Ok(CtValue::Data(Value::Nil));
            }
            Some("elseif") => {
                i += 1;
            }
            _ => {
                return Err(AniseError::eval(
                    "*branch expects 'else' or 'elseif' after a '*branch' marker",
                ))
            }
        }
    }
}

fn eval_for(args: &[Value], env: &CtEnvRef) -> Result<CtValue, AniseError> {
    let var = args
        .first()
        .and_then(Value::as_symbol)
        .ok_or_else(|| AniseError::eval("*for requires a loop variable"))?;
    let bindings = args
        .get(1)
        .and_then(Value::seq_items)
        .ok_or_else(|| AniseError::eval("*for requires a range vector"))?;
    if bindings.len() < 2 || bindings.len() > 3 {
        return Err(AniseError::eval(
            "*for range takes a start, an end, and an optional step",
        ));
    }
    let mut numbers = Vec::with_capacity(bindings.len());
    for binding in &bindings {
        match eval_to_data(binding, env)? {
            Value::Number(n) => numbers.push(n),
            other => {
                return Err(AniseError::eval(format!(
                    "*for bounds are numbers, got a {}",
                    other.type_name()
                )))
            }
        }
    }
    let step = numbers.get(2).copied().unwrap_or(1.0);
    if step == 0.0 {
        return Err(AniseError::eval("*for step cannot be zero"));
    }
    let mut i = numbers[0];
    while (step > 0.0 && i <= numbers[1]) || (step < 0.0 && i >= numbers[1]) {
        let child = CtEnv::child(env);
        child
            .write()
            .unwrap()
            .set(var, CtValue::Data(Value::Number(i)));
        match eval_body(&args[2..], &child) {
            Err(AniseError::BreakSignal) => break,
            Err(err) => return Err(err),
            Ok(_) => {}
        }
        i += step;
    }
    Ok(CtValue::Data(Value::Nil))
}

fn eval_arithmetic(op: &str, args: &[Value], env: &CtEnvRef) -> Result<CtValue, AniseError> {
    if op == "or" || op == "and" {
        let mut last = CtValue::Data(Value::Nil);
        for (i, form) in args.iter().enumerate() {
            last = eval_form(form, env)?;
            let truthy = last.truthy();
            if (op == "or" && truthy) || (op == "and" && !truthy) {
                return Ok(last);
            }
            if i + 1 == args.len() {
                return Ok(last);
            }
        }
        return Ok(last);
    }
    if op == ".." {
        let mut out = String::new();
        for form in args {
            match eval_to_data(form, env)? {
                Value::String(text) => out.push_str(&text),
                Value::Number(n) => out.push_str(&crate::ast::number_to_string(n)),
                other => {
                    return Err(AniseError::eval(format!(
                        "'..' concatenates strings and numbers, got a {}",
                        other.type_name()
                    )))
                }
            }
        }
        return Ok(CtValue::Data(Value::String(out)));
    }
    let mut numbers = Vec::with_capacity(args.len());
    for form in args {
        match eval_to_data(form, env)? {
            Value::Number(n) => numbers.push(n),
            other => {
                return Err(AniseError::eval(format!(
                    "'{}' takes numbers, got a {}",
                    op,
                    other.type_name()
                )))
            }
        }
    }
    if numbers.is_empty() {
        return Ok(CtValue::Data(Value::Number(0.0)));
    }
    if numbers.len() == 1 && op == "-" {
        return Ok(CtValue::Data(Value::Number(-numbers[0])));
    }
    let mut acc = numbers[0];
    for &n in &numbers[1..] {
        acc = match op {
            "+" => acc + n,
            "-" => acc - n,
            "*" => acc * n,
            "/" => acc / n,
            "%" => acc - (acc / n).floor() * n,
            "^" => acc.powf(n),
            _ => unreachable!(),
        };
    }
    Ok(CtValue::Data(Value::Number(acc)))
}

fn eval_comparison(op: &str, args: &[Value], env: &CtEnvRef) -> Result<CtValue, AniseError> {
    if args.len() != 2 {
        return Err(AniseError::eval(format!(
            "'{}' takes exactly two operands",
            op
        )));
    }
    let lhs = eval_to_data(&args[0], env)?;
    let rhs = eval_to_data(&args[1], env)?;
    let result = match op {
        "=" => lhs == rhs,
        "~=" => lhs != rhs,
        _ => {
            let ordering = match (&lhs, &rhs) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let Some(ordering) = ordering else {
                return Err(AniseError::eval(format!(
                    "'{}' cannot order a {} against a {}",
                    op,
                    lhs.type_name(),
                    rhs.type_name()
                )));
            };
            match op {
                ">" => ordering.is_gt(),
                "<" => ordering.is_lt(),
                ">=" => ordering.is_ge(),
                "<=" => ordering.is_le(),
                _ => unreachable!(),
            }
        }
    };
    Ok(CtValue::Data(Value::Bool(result)))
}

fn data_len(value: &Value) -> Result<usize, AniseError> {
    match value {
        Value::String(text) => Ok(text.len()),
        Value::List(items) => Ok(items.len()),
        Value::Map(entries) => Ok(entries.len()),
        other => Err(AniseError::eval(format!(
            "a {} has no length",
            other.type_name()
        ))),
    }
}

fn call_builtin(name: &str, args: Vec<CtValue>) -> Result<CtValue, AniseError> {
    match name {
        "list" => {
            let mut items = Vec::with_capacity(args.len());
            for arg in &args {
                match arg.as_data() {
                    Some(value) => items.push(value.clone()),
                    None => return Err(AniseError::eval("list takes data values")),
                }
            }
            Ok(CtValue::Data(Value::List(items)))
        }
        "sym" => match args.first().and_then(CtValue::as_data) {
            Some(Value::String(name)) => Ok(CtValue::Data(Value::Symbol(name.clone()))),
            _ => Err(AniseError::eval("sym takes one string")),
        },
        "gensym" => match args.first() {
            Some(CtValue::Scope(scope)) => {
                Ok(CtValue::Data(Value::Symbol(gensym(scope))))
            }
            _ => Err(AniseError::eval("gensym takes the compilation scope")),
        },
        "len" => match args.first().and_then(CtValue::as_data) {
            Some(value) => Ok(CtValue::Data(Value::Number(data_len(value)? as f64))),
            None => Err(AniseError::eval("len takes a data value")),
        },
        "first" => match args.first().and_then(CtValue::as_data) {
            Some(Value::List(items)) => Ok(CtValue::Data(
                items.first().cloned().unwrap_or(Value::Nil),
            )),
            _ => Err(AniseError::eval("first takes a list")),
        },
        "rest" => match args.first().and_then(CtValue::as_data) {
            Some(Value::List(items)) => Ok(CtValue::Data(Value::List(
                items.iter().skip(1).cloned().collect(),
            ))),
            _ => Err(AniseError::eval("rest takes a list")),
        },
        "push" => {
            let list = match args.first().and_then(CtValue::as_data) {
                Some(Value::List(items)) => items.clone(),
                _ => return Err(AniseError::eval("push takes a list and a value")),
            };
            let item = match args.get(1).and_then(CtValue::as_data) {
                Some(value) => value.clone(),
                None => return Err(AniseError::eval("push takes a list and a value")),
            };
            let mut list = list;
            list.push(item);
            Ok(CtValue::Data(Value::List(list)))
        }
        "concat" => {
            let mut items = Vec::new();
            for arg in &args {
                match arg.as_data() {
                    Some(Value::List(more)) => items.extend(more.iter().cloned()),
                    _ => return Err(AniseError::eval("concat takes lists")),
                }
            }
            Ok(CtValue::Data(Value::List(items)))
        }
        "print" => {
            let rendered: Vec<String> = args
                .iter()
                .map(|arg| match arg.as_data() {
                    Some(value) => value.to_string(),
                    None => format!("<{}>", arg.type_name()),
                })
                .collect();
            println!("{}", rendered.join(" "));
            Ok(CtValue::Data(Value::Nil))
        }
        _ => Err(AniseError::eval(format!("unknown builtin '{}'", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_str(source: &str) -> Value {
        eval(source, &CompileOptions::default())
            .unwrap()
            .as_data()
            .expect("data result")
            .clone()
    }

    #[test]
    fn arithmetic_and_comparison_evaluate() {
        assert_eq!(eval_str("(+ 1 2 3)"), Value::Number(6.0));
        assert_eq!(eval_str("(- 10 4)"), Value::Number(6.0));
        assert_eq!(eval_str("(- 5)"), Value::Number(-5.0));
        assert_eq!(eval_str("(.. \"a\" 1)"), Value::string("a1"));
        assert_eq!(eval_str("(< 1 2)"), Value::Bool(true));
        assert_eq!(eval_str("(= \"x\" \"x\")"), Value::Bool(true));
    }

    #[test]
    fn functions_close_over_their_environment() {
        assert_eq!(
            eval_str("(var base 10) (fn add [n] (+ base n)) (add 5)"),
            Value::Number(15.0)
        );
    }

    #[test]
    fn variadic_functions_collect_the_rest() {
        assert_eq!(
            eval_str("(fn count [...] (len ...)) (count 1 2 3)"),
            Value::Number(3.0)
        );
    }

    #[test]
    fn branches_and_loops_run() {
        assert_eq!(
            eval_str("(var x 0) (*branch (< 1 2) (set x 1) *branch else (set x 2)) x"),
            Value::Number(1.0)
        );
        assert_eq!(
            eval_str("(var s 0) (*for i [1 4] (set s (+ s i))) s"),
            Value::Number(10.0)
        );
        assert_eq!(
            eval_str("(var n 0) (*while (< n 5) (set n (+ n 1))) n"),
            Value::Number(5.0)
        );
        assert_eq!(
            eval_str("(var n 0) (*while true (set n (+ n 1)) (*branch (< 2 n) (*break))) n"),
            Value::Number(3.0)
        );
    }

    #[test]
    fn list_builtins_build_asts() {
        assert_eq!(
            eval_str("(list (sym \"+\") 1 2)"),
            Value::list(vec![Value::sym("+"), Value::Number(1.0), Value::Number(2.0)])
        );
        assert_eq!(eval_str("(first (list 1 2))"), Value::Number(1.0));
        assert_eq!(
            eval_str("(rest (list 1 2 3))"),
            Value::list(vec![Value::Number(2.0), Value::Number(3.0)])
        );
        assert_eq!(
            eval_str("(push (list 1) 2)"),
            Value::list(vec![Value::Number(1.0), Value::Number(2.0)])
        );
    }

    #[test]
    fn indexing_reads_maps_lists_and_scopes() {
        assert_eq!(eval_str("(. {\"a\" 1} \"a\")"), Value::Number(1.0));
        assert_eq!(eval_str("(. (list 7 8) 2)"), Value::Number(8.0));
        assert_eq!(eval_str("(. _S \"depth\")"), Value::Number(0.0));
        assert_eq!(eval_str("(. _S \"vararg\")"), Value::Bool(true));
    }

    #[test]
    fn bridge_installs_macros_into_the_scope() {
        let scope = Scope::root();
        let args = vec![
            Value::sym("*compiler"),
            Value::list(vec![
                Value::sym("set"),
                Value::list(vec![
                    Value::sym("."),
                    Value::sym("_M"),
                    Value::string("twice"),
                ]),
                Value::list(vec![
                    Value::sym("fn"),
                    Value::seq(vec![Value::sym("x")]),
                    Value::list(vec![
                        Value::sym("list"),
                        Value::list(vec![Value::sym("sym"), Value::string("+")]),
                        Value::sym("x"),
                        Value::sym("x"),
                    ]),
                ]),
            ]),
        ];
        run_compiler_bridge(&args, &scope).unwrap();
        assert!(scope.read().unwrap().lookup_macro("twice").is_some());
    }

    #[test]
    fn bridge_failures_surface_as_bridge_errors() {
        let scope = Scope::root();
        let args = vec![Value::sym("*compiler"), Value::sym("no-such-binding")];
        let err = run_compiler_bridge(&args, &scope).unwrap_err();
        assert!(matches!(err, AniseError::Bridge(_)));
    }

    #[test]
    fn break_outside_a_loop_is_an_eval_error() {
        let err = eval("(*break)", &CompileOptions::default()).unwrap_err();
        assert!(matches!(err, AniseError::Eval(_)));
    }
}
