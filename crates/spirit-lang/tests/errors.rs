use spirit_core::ast::Value;
use spirit_core::eval_source;
use spirit_core::stack;

fn eval_ok(src: &str) -> Value {
    eval_source(src).unwrap_or_else(|e| panic!("{} failed: {}", src, e))
}

#[test]
fn unbound_symbol_is_resolve_error() {
    let err = eval_source("(bruh)").unwrap_err();
    assert!(err.is_kind("ResolveError"), "got {}", err.kind());
}

#[test]
fn stack_trace_names_frames_outer_to_inner() {
    stack::clear();
    let err = eval_source("(do (if true (bruh)))").unwrap_err();
    assert!(err.is_kind("ResolveError"));

    let trace = err.stack();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[0].name, "do");
    assert_eq!(trace[0].pos.line, 1);
    assert_eq!(trace[0].pos.col, 1);
    assert_eq!(trace[1].name, "if");
    assert_eq!(trace[1].pos.line, 1);
    assert_eq!(trace[1].pos.col, 5);

    // Frames stay on the stack for the reporter, which clears them.
    let snapshot = stack::snapshot();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[0].name, "do");
    assert_eq!(snapshot[1].name, "if");
    stack::clear();
}

#[test]
fn stack_positions_survive_multiline_sources() {
    stack::clear();
    let err = eval_source("(do (def x 100)\n    (if true (bruh)))").unwrap_err();
    let trace = err.stack();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[1].name, "if");
    assert_eq!(trace[1].pos.line, 2);
    assert_eq!(trace[1].pos.col, 5);
    stack::clear();
}

#[test]
fn stack_is_empty_after_successful_eval() {
    stack::clear();
    assert_eq!(eval_ok("(+ 1 (+ 2 3))"), Value::Number(6.0));
    assert_eq!(stack::depth(), 0);
}

#[test]
fn try_without_catch_returns_nil() {
    assert_eq!(eval_ok("(try (throw \"boom\"))"), Value::Nil);
}

#[test]
fn try_passes_error_to_catch() {
    let src = "(try (throw \"boom\") (fn* [e] :caught))";
    assert_eq!(eval_ok(src), Value::Keyword("caught".into()));
}

#[test]
fn try_returns_body_value_on_success() {
    assert_eq!(eval_ok("(try (+ 1 2))"), Value::Number(3.0));
}

#[test]
fn error_is_matches_variant_tag() {
    assert_eq!(
        eval_ok("(try (bruh) (fn* [e] (error-is e \"ResolveError\")))"),
        Value::Bool(true)
    );
    assert_eq!(
        eval_ok("(try (bruh) (fn* [e] (error-is e \"TypeError\")))"),
        Value::Bool(false)
    );
    assert_eq!(
        eval_ok("(try (throw \"x\") (fn* [e] (error-is e exception)))"),
        Value::Bool(true)
    );
}

#[test]
fn wrong_arity_is_argument_error() {
    let err = eval_source("(def f (fn* [x] x)) (f 1 2)").unwrap_err();
    assert!(err.is_kind("ArgumentError"), "got {}", err.kind());
}

#[test]
fn invoking_a_number_is_implement_error() {
    let err = eval_source("(1 2 3)").unwrap_err();
    assert!(err.is_kind("ImplementError"), "got {}", err.kind());
}

#[test]
fn special_form_value_position_is_an_error() {
    assert!(eval_source("(def x if)").is_err());
}

#[test]
fn import_of_missing_file_is_import_error() {
    let err = eval_source("(import \"/definitely/not/here.st\")").unwrap_err();
    assert!(err.is_kind("ImportError"), "got {}", err.kind());
}

#[test]
fn eval_error_cites_the_failing_position() {
    let err = eval_source("(do\n  (bruh))").unwrap_err();
    let pos = err.pos().expect("error should carry a position");
    assert_eq!(pos.line, 2);
    stack::clear();
}

#[test]
fn macro_expansion_preserves_source_positions() {
    let src = "(defmacro unless [c b] (syntax-quote (if (unquote c) nil (unquote b))))\n\
               (unless false (bruh))";
    let err = eval_source(src).unwrap_err();
    assert!(err.is_kind("ResolveError"));
    let pos = err.pos().expect("error should carry a position");
    assert_eq!(pos.line, 2);
    stack::clear();
}

#[test]
fn let_requires_even_bindings() {
    let err = eval_source("(let [x] x)").unwrap_err();
    assert!(err.to_string().contains("even"));
}

#[test]
fn if_arity_is_validated_at_parse() {
    let err = eval_source("(if true)").unwrap_err();
    assert!(err.to_string().contains("argument"));
}
