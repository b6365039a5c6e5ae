use spirit_core::ast::Value;
use spirit_core::eval_source;

fn eval_ok(src: &str) -> Value {
    eval_source(src).unwrap_or_else(|e| panic!("{} failed: {}", src, e))
}

#[test]
fn atom_swap_and_deref() {
    let src = "(def a (atom 0)) (swap! a (fn* [v] (+ v 1))) @a";
    assert_eq!(eval_ok(src), Value::Number(1.0));
}

#[test]
fn swap_returns_the_new_value() {
    let src = "(def a (atom 10)) (swap! a (fn* [v] (* v 2)))";
    assert_eq!(eval_ok(src), Value::Number(20.0));
}

#[test]
fn failed_swap_leaves_atom_untouched() {
    let src = "(def a (atom 5)) \
               (try (swap! a (fn* [v] (bruh)))) \
               @a";
    assert_eq!(eval_ok(src), Value::Number(5.0));
}

#[test]
fn atom_prints_its_value() {
    assert_eq!(eval_ok("(atom 3)").to_string(), "(atom 3)");
}

#[test]
fn future_deref_blocks_until_value() {
    let src = "(def f (future* (+ 1 2))) (deref f)";
    assert_eq!(eval_ok(src), Value::Number(3.0));
}

#[test]
fn future_is_realized_after_deref() {
    let src = "(def f (future* 42)) (deref f) (realized* f)";
    assert_eq!(eval_ok(src), Value::Bool(true));
}

#[test]
fn future_evaluates_against_shared_bindings() {
    let src = "(def base 40) (def f (future* (+ base 2))) @f";
    assert_eq!(eval_ok(src), Value::Number(42.0));
}

#[test]
fn future_error_surfaces_at_deref() {
    let src = "(def f (future* (bruh))) (deref f)";
    assert!(eval_source(src).is_err());
}

#[test]
fn futures_can_bind_concurrently() {
    let src = "(def f (future* (def from-future 1) (sleep 5) 2)) \
               (def here 3) \
               (+ (deref f) here)";
    assert_eq!(eval_ok(src), Value::Number(5.0));
}

#[test]
fn deref_requires_atom_or_future() {
    assert!(eval_source("(deref 42)").is_err());
}
