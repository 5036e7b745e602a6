use anise_core::{compile, CompileOptions};

fn compile_str(source: &str) -> String {
    compile(source, &CompileOptions::default()).unwrap()
}

#[test]
fn addition_returns_its_expression() {
    assert_eq!(compile_str("(+ 1 2)"), "return (1 + 2)");
}

#[test]
fn function_definition_declares_then_returns_the_name() {
    assert_eq!(
        compile_str("(fn add [a b] (+ a b))"),
        "local function add(a, b)\n  return (a + b)\nend\nreturn add"
    );
}

#[test]
fn var_set_and_reference_compile_in_sequence() {
    assert_eq!(
        compile_str("(var x 10) (set x (+ x 1)) x"),
        "local x = 10\nx = (x + 1)\nreturn x"
    );
}

#[test]
fn branch_compiles_to_if_else_end() {
    let out = compile_str("(*branch (= x 0) (f \"zero\") *branch else (f \"nonzero\")) nil");
    assert_eq!(
        out,
        "if ((x) == (0)) then\n  f(\"zero\")\nelse\n  f(\"nonzero\")\nend\nreturn nil"
    );
}

#[test]
fn do_hoists_a_local_for_the_block_value() {
    assert_eq!(
        compile_str("(do (var a 1) (+ a 2))"),
        "local _0\ndo\n  local a = 1\n  _0 = (a + 2)\nend\nreturn _0"
    );
}

#[test]
fn numeric_for_accumulates_in_place() {
    assert_eq!(
        compile_str("(*for i [1 10] (set s (+ s i))) nil"),
        "for i = 1, 10 do\n  s = (s + i)\nend\nreturn nil"
    );
}

#[test]
fn call_arguments_stay_in_source_order() {
    assert_eq!(compile_str("(f (g) (h) (i))"), "return f(g(), h(), i())");
}

#[test]
fn multi_values_in_the_middle_are_tossed_with_order_preserved() {
    assert_eq!(
        compile_str("(f (values 1 2) 3)"),
        "local _0 = 1\ndo local _ = 2 end\nreturn f(_0, 3)"
    );
}

#[test]
fn multi_values_in_final_position_flow_into_the_call() {
    assert_eq!(compile_str("(f (values 1 2))"), "return f(1, 2)");
}

#[test]
fn reserved_words_never_leak_into_locals() {
    assert_eq!(
        compile_str("(var end 1) end"),
        "local _end = 1\nreturn _end"
    );
    assert_eq!(
        compile_str("(var while 1) (var do 2) (+ while do)"),
        "local _while = 1\nlocal _do = 2\nreturn (_while + _do)"
    );
}

#[test]
fn punctuation_in_names_mangles_deterministically() {
    assert_eq!(
        compile_str("(var count-items 3) count-items"),
        "local count19items = 3\nreturn count19items"
    );
}

#[test]
fn indent_string_is_configurable() {
    let options = CompileOptions::default().with_indent("\t");
    assert_eq!(
        compile("(block (f))", &options).unwrap(),
        "do\n\tf()\nend"
    );
}

#[test]
fn nested_blocks_indent_one_level_each() {
    assert_eq!(
        compile_str("(block (*while (p) (q))) nil"),
        "do\n  while p() do\n    q()\n  end\nend\nreturn nil"
    );
}

#[test]
fn table_and_sequence_literals_compile_to_constructors() {
    assert_eq!(compile_str("[1 2 3]"), "return {1, 2, 3}");
    assert_eq!(
        compile_str("{\"name\" \"anise\" \"major\" 0}"),
        "return {[\"name\"] = \"anise\", [\"major\"] = 0}"
    );
}

#[test]
fn parse_errors_abort_compilation() {
    let err = compile("(+ 1", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, anise_core::AniseError::Parse(_)));
}
