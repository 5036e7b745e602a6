use crate::ast::{number_to_string, Value};

/// Render an AST back to source text. The output re-parses to a
/// structurally equal AST for cycle-free values (maps with one textual form
/// per key, strings of 7-bit content).
pub fn ast_to_string(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::List(items) => {
            out.push('(');
            write_items(out, items.iter());
            out.push(')');
        }
        Value::Symbol(name) => out.push_str(name),
        Value::Map(entries) => match value.seq_items() {
            Some(items) => {
                out.push('[');
                write_items(out, items.into_iter());
                out.push(']');
            }
            None => {
                out.push('{');
                let mut first = true;
                for (key, entry) in entries {
                    if !first {
                        out.push(' ');
                    }
                    first = false;
                    write_value(out, key);
                    out.push(' ');
                    write_value(out, entry);
                }
                out.push('}');
            }
        },
        Value::String(text) => {
            out.push('"');
            for ch in text.chars() {
                match ch {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    other => out.push(other),
                }
            }
            out.push('"');
        }
        Value::Number(n) => out.push_str(&number_to_string(*n)),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Nil => out.push_str("nil"),
    }
}

fn write_items<'a>(out: &mut String, items: impl Iterator<Item = &'a Value>) {
    let mut first = true;
    for item in items {
        if !first {
            out.push(' ');
        }
        first = false;
        write_value(out, item);
    }
}
