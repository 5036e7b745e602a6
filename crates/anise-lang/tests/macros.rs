use std::sync::Arc;

use anise_core::macros::Macro;
use anise_core::{compile, sym, CompileOptions, Scope, Value};

fn compile_str(source: &str) -> String {
    compile(source, &CompileOptions::default()).unwrap()
}

#[test]
fn compiler_bridge_installs_a_macro_for_later_forms() {
    let source = "(*compiler (set (. _M \"twice\") (fn [x] (list (sym \"+\") x x)))) (twice 21)";
    assert_eq!(compile_str(source), "return (21 + 21)");
}

#[test]
fn bridge_macros_can_build_nested_forms() {
    let source = "(*compiler \
       (set (. _M \"incr!\") (fn [place] \
         (list (sym \"set\") place (list (sym \"+\") place 1))))) \
     (var n 0) (incr! n) n";
    assert_eq!(compile_str(source), "local n = 0\nn = (n + 1)\nreturn n");
}

#[test]
fn macros_expand_iteratively_until_a_special_head() {
    // alias expands to twice, twice expands to +
    let source = "(*compiler \
       (set (. _M \"twice\") (fn [x] (list (sym \"+\") x x))) \
       (set (. _M \"alias\") (fn [x] (list (sym \"twice\") x)))) \
     (alias 4)";
    assert_eq!(compile_str(source), "return (4 + 4)");
}

#[test]
fn a_shared_scope_keeps_macros_across_compilations() {
    let scope = Scope::root();
    let options = CompileOptions::default().with_scope(scope);
    compile(
        "(*compiler (set (. _M \"twice\") (fn [x] (list (sym \"+\") x x))))",
        &options,
    )
    .unwrap();
    assert_eq!(compile("(twice 3)", &options).unwrap(), "return (3 + 3)");
}

#[test]
fn native_macros_from_the_host_expand_too() {
    let scope = Scope::root();
    scope.write().unwrap().define_macro(
        "unless",
        Macro::Native(Arc::new(|args: &[Value]| {
            let mut items = vec![
                sym("*branch"),
                Value::list(vec![sym("not"), args[0].clone()]),
            ];
            items.extend(args[1..].iter().cloned());
            Ok(Value::List(items))
        })),
    );
    let options = CompileOptions::default().with_scope(scope);
    assert_eq!(
        compile("(unless ready (boot)) nil", &options).unwrap(),
        "if not (ready) then\n  boot()\nend\nreturn nil"
    );
}

#[test]
fn macro_expansion_to_a_scalar_is_a_macro_error() {
    let scope = Scope::root();
    scope.write().unwrap().define_macro(
        "broken",
        Macro::Native(Arc::new(|_: &[Value]| Ok(Value::Number(1.0)))),
    );
    let options = CompileOptions::default().with_scope(scope);
    let err = compile("(broken)", &options).unwrap_err();
    assert!(matches!(err, anise_core::AniseError::Macro(_)));
}

#[test]
fn bridge_errors_carry_the_bridge_kind() {
    let err = compile_str_err("(*compiler (no-such-fn 1))");
    assert!(matches!(err, anise_core::AniseError::Bridge(_)));
}

fn compile_str_err(source: &str) -> anise_core::AniseError {
    compile(source, &CompileOptions::default()).unwrap_err()
}
