use spirit_core::ast::Value;
use spirit_core::eval_source;

fn eval_ok(src: &str) -> Value {
    eval_source(src).unwrap_or_else(|e| panic!("{} failed: {}", src, e))
}

#[test]
fn construct_and_read_member() {
    let src = "(defclass Point {:x :number :y :number}) \
               (def p (Point {:x 3 :y 4})) \
               p.x";
    assert_eq!(eval_ok(src), Value::Number(3.0));
}

#[test]
fn constructor_rejects_undeclared_keys() {
    let src = "(defclass Point {:x :number}) (Point {:z 1})";
    let err = eval_source(src).unwrap_err();
    assert!(err.to_string().contains("cannot find member or method"));
}

#[test]
fn declared_value_is_the_default() {
    let src = "(defclass Config {:retries 3}) \
               (def c (Config {})) \
               c.retries";
    assert_eq!(eval_ok(src), Value::Number(3.0));
}

#[test]
fn instance_payload_shadows_default() {
    let src = "(defclass Config {:retries 3}) \
               (def c (Config {:retries 9})) \
               c.retries";
    assert_eq!(eval_ok(src), Value::Number(9.0));
}

#[test]
fn instance_method_lookup() {
    let src = "(defclass Greeter {:name :string} \
                 (method :greet (fn* [who] (str \"hi \" who)))) \
               (def g (Greeter {:name \"x\"})) \
               (g.greet \"there\")";
    assert_eq!(eval_ok(src), Value::String("hi there".into()));
}

#[test]
fn static_method_lookup_on_class() {
    let src = "(defclass Counter {:n :number} \
                 (static :zero (fn* [] (Counter {:n 0})))) \
               (def c (Counter.zero)) \
               c.n";
    assert_eq!(eval_ok(src), Value::Number(0.0));
}

#[test]
fn single_inheritance_members_and_methods() {
    let src = "(defclass Animal {:name :string} \
                 (method :describe (fn* [a] (str \"animal \" a)))) \
               (defclass Dog <- Animal {:breed :string}) \
               (def d (Dog {:name \"rex\" :breed \"lab\"})) \
               [(d.describe \"rex\") d.name d.breed]";
    match eval_ok(src) {
        Value::Vector(vec) => {
            assert_eq!(vec.get(0), Some(&Value::String("animal rex".into())));
            assert_eq!(vec.get(1), Some(&Value::String("rex".into())));
            assert_eq!(vec.get(2), Some(&Value::String("lab".into())));
        }
        other => panic!("expected vector, got {}", other),
    }
}

#[test]
fn instance_of_walks_the_chain() {
    let src = "(defclass Animal {:name :string}) \
               (defclass Dog <- Animal {}) \
               (def d (Dog {:name \"rex\"})) \
               [(instance-of Dog d) (instance-of Animal d)]";
    match eval_ok(src) {
        Value::Vector(vec) => {
            assert_eq!(vec.get(0), Some(&Value::Bool(true)));
            assert_eq!(vec.get(1), Some(&Value::Bool(true)));
        }
        other => panic!("expected vector, got {}", other),
    }
}

#[test]
fn instance_of_unrelated_class_is_false() {
    let src = "(defclass A {}) (defclass B {}) \
               (def a (A {})) \
               (instance-of B a)";
    assert_eq!(eval_ok(src), Value::Bool(false));
}

#[test]
fn assoc_rejects_undeclared_keys() {
    let src = "(defclass Point {:x :number}) \
               (def p (Point {:x 1})) \
               (assoc* p :z 9)";
    assert!(eval_source(src).is_err());
}

#[test]
fn assoc_returns_a_new_object() {
    let src = "(defclass Point {:x :number}) \
               (def p (Point {:x 1})) \
               (def q (assoc* p :x 2)) \
               [p.x q.x]";
    match eval_ok(src) {
        Value::Vector(vec) => {
            assert_eq!(vec.get(0), Some(&Value::Number(1.0)));
            assert_eq!(vec.get(1), Some(&Value::Number(2.0)));
        }
        other => panic!("expected vector, got {}", other),
    }
}

#[test]
fn parent_expression_must_be_a_class() {
    let err = eval_source("(defclass Broken <- 42 {})").unwrap_err();
    assert!(err.is_kind("TypeError"));
}

#[test]
fn member_map_keys_must_be_keywords() {
    let err = eval_source("(defclass Broken {\"x\" 1})").unwrap_err();
    assert!(err.is_kind("TypeError"));
}
