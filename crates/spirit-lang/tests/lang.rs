use spirit_core::ast::Value;
use spirit_core::eval_source;

fn eval_ok(src: &str) -> Value {
    eval_source(src).unwrap_or_else(|e| panic!("{} failed: {}", src, e))
}

#[test]
fn arithmetic() {
    assert_eq!(eval_ok("(+ 1 2 3)"), Value::Number(6.0));
    assert_eq!(eval_ok("(- 10 4 1)"), Value::Number(5.0));
    assert_eq!(eval_ok("(- 3)"), Value::Number(-3.0));
    assert_eq!(eval_ok("(* 2 3 4)"), Value::Number(24.0));
    assert_eq!(eval_ok("(/ 12 4)"), Value::Number(3.0));
    assert_eq!(eval_ok("(/ 2)"), Value::Number(0.5));
    assert_eq!(eval_ok("(mod 7 3)"), Value::Number(1.0));
}

#[test]
fn division_by_zero_follows_ieee() {
    match eval_ok("(/ 1 0)") {
        Value::Number(n) => assert!(n.is_infinite() && n > 0.0),
        other => panic!("expected number, got {}", other),
    }
    match eval_ok("(/ 0 0)") {
        Value::Number(n) => assert!(n.is_nan()),
        other => panic!("expected number, got {}", other),
    }
}

#[test]
fn comparisons() {
    assert_eq!(eval_ok("(= 2 2)"), Value::Bool(true));
    assert_eq!(eval_ok("(= :a :b)"), Value::Bool(false));
    assert_eq!(eval_ok("(< 1 2 3)"), Value::Bool(true));
    assert_eq!(eval_ok("(<= 2 2)"), Value::Bool(true));
    assert_eq!(eval_ok("(> 3 1)"), Value::Bool(true));
    assert_eq!(eval_ok("(>= 3 4)"), Value::Bool(false));
    assert_eq!(eval_ok("(prime? 7)"), Value::Bool(true));
    assert_eq!(eval_ok("(prime? 9)"), Value::Bool(false));
    assert_eq!(eval_ok("(sqrt 16)"), Value::Number(4.0));
}

#[test]
fn def_and_function_call() {
    let src = "(def f (fn* [x] (* x x))) (f 9)";
    assert_eq!(eval_ok(src), Value::Number(81.0));
}

#[test]
fn defn_macro_defines_named_function() {
    let src = "(defn sq [x] (* x x)) (sq 6)";
    assert_eq!(eval_ok(src), Value::Number(36.0));
}

#[test]
fn let_binds_sequentially() {
    assert_eq!(eval_ok("(let [a 1 b 2] (+ a b))"), Value::Number(3.0));
    assert_eq!(eval_ok("(let [x 1 x 2] x)"), Value::Number(2.0));
    assert_eq!(
        eval_ok("(let [a 1 b (+ a 1)] (* b b))"),
        Value::Number(4.0)
    );
}

#[test]
fn loop_recur_accumulates() {
    let src = "(loop [i 0 acc 0] (if (= i 10) acc (recur (+ i 1) (+ acc i))))";
    assert_eq!(eval_ok(src), Value::Number(45.0));
}

#[test]
fn truthiness_is_nil_and_false_only() {
    assert_eq!(eval_ok("(if 0 :t :f)"), Value::Keyword("t".into()));
    assert_eq!(eval_ok("(if \"\" :t :f)"), Value::Keyword("t".into()));
    assert_eq!(eval_ok("(if nil :t :f)"), Value::Keyword("f".into()));
    assert_eq!(eval_ok("(if false :t :f)"), Value::Keyword("f".into()));
    assert_eq!(eval_ok("(if false :t)"), Value::Nil);
}

#[test]
fn variadic_packs_remaining_args() {
    let src = "(def f (fn* [x & xs] xs)) (f 1 2 3)";
    match eval_ok(src) {
        Value::List(list) => {
            assert_eq!(
                list.items(),
                vec![Value::Number(2.0), Value::Number(3.0)]
            );
        }
        other => panic!("expected list, got {}", other),
    }
}

#[test]
fn variadic_with_no_extras_binds_empty_list() {
    let src = "(def f (fn* [x & xs] xs)) (f 1)";
    match eval_ok(src) {
        Value::List(list) => assert!(list.is_empty()),
        other => panic!("expected list, got {}", other),
    }
}

#[test]
fn multi_arity_dispatch() {
    let src = "(def g (fn* g ([x] x) ([x y] (+ x y)))) [(g 5) (g 1 2)]";
    match eval_ok(src) {
        Value::Vector(vec) => {
            assert_eq!(vec.get(0), Some(&Value::Number(5.0)));
            assert_eq!(vec.get(1), Some(&Value::Number(3.0)));
        }
        other => panic!("expected vector, got {}", other),
    }
}

#[test]
fn quote_returns_form_verbatim() {
    assert_eq!(eval_ok("(quote (a b))").to_string(), "(a b)");
    assert_eq!(eval_ok("'x").to_string(), "x");
    assert_eq!(eval_ok("(quote 42)"), Value::Number(42.0));
}

#[test]
fn syntax_quote_unquote() {
    assert_eq!(
        eval_ok("`(a (unquote (+ 1 2)))").to_string(),
        "(a 3)"
    );
    assert_eq!(
        eval_ok("`((unquote-splice '(1 2)) 3)").to_string(),
        "(1 2 3)"
    );
}

#[test]
fn unless_macro_scenario() {
    let src = "(defmacro unless [c b] (syntax-quote (if (unquote c) nil (unquote b)))) \
               (unless false :ok)";
    assert_eq!(eval_ok(src), Value::Keyword("ok".into()));
}

#[test]
fn macroexpand_returns_final_form() {
    let src = "(defmacro unless [c b] (syntax-quote (if (unquote c) nil (unquote b)))) \
               (macroexpand '(unless false :ok))";
    assert_eq!(eval_ok(src).to_string(), "(if false nil :ok)");
}

#[test]
fn macroexpand_is_idempotent_without_macro_head() {
    assert_eq!(eval_ok("(macroexpand '(+ 1 2))").to_string(), "(+ 1 2)");
}

#[test]
fn collections_invoke() {
    assert_eq!(eval_ok("([10 20 30] 1)"), Value::Number(20.0));
    assert_eq!(eval_ok("(:a {:a 1})"), Value::Number(1.0));
    assert_eq!(eval_ok("(:b {:a 1})"), Value::Nil);
    assert_eq!(eval_ok("(:b {:a 1} :none)"), Value::Keyword("none".into()));
    assert_eq!(eval_ok("({:a 1} :a)"), Value::Number(1.0));
    assert_eq!(eval_ok("({:a 1} :b 9)"), Value::Number(9.0));
}

#[test]
fn collection_literals_evaluate_children() {
    assert_eq!(eval_ok("[(+ 1 2)]").to_string(), "[3]");
    assert_eq!(eval_ok("{:a (+ 1 2)}").to_string(), "{:a 3}");
}

#[test]
fn assoc_star_on_collections() {
    assert_eq!(eval_ok("((assoc* {:a 1} :b 2) :b)"), Value::Number(2.0));
    assert_eq!(eval_ok("((assoc* {:a 1} :b 2) :a)"), Value::Number(1.0));
    assert_eq!(eval_ok("((assoc* [1 2 3] 1 9) 1)"), Value::Number(9.0));
    assert!(spirit_core::eval_source("(assoc* [1 2] 5 0)").is_err());
}

#[test]
fn seq_builtins() {
    assert_eq!(eval_ok("(first [1 2 3])"), Value::Number(1.0));
    assert_eq!(eval_ok("(first (next [1 2 3]))"), Value::Number(2.0));
    assert_eq!(eval_ok("(count \"hello\")"), Value::Number(5.0));
    assert_eq!(eval_ok("(first \"ab\")"), Value::Char('a'));
    assert_eq!(eval_ok("(count (lazy-range* 0 10 2))"), Value::Number(5.0));
    assert_eq!(eval_ok("(first (cons 0 [1 2]))"), Value::Number(0.0));
    assert_eq!(eval_ok("(count (conj [1 2] 3 4))"), Value::Number(4.0));
}

#[test]
fn apply_spreads_final_seq() {
    assert_eq!(eval_ok("(<> + 1 2 [3 4])"), Value::Number(10.0));
}

#[test]
fn case_matches_clauses() {
    assert_eq!(eval_ok("(case 2 1 :one 2 :two :other)"), Value::Keyword("two".into()));
    assert_eq!(eval_ok("(case 9 1 :one 2 :two :other)"), Value::Keyword("other".into()));
}

#[test]
fn case_trailing_default_is_not_evaluated() {
    assert_eq!(eval_ok("(case 9 1 :one (+ 1 2))").to_string(), "(+ 1 2)");
    assert_eq!(eval_ok("(case 1 1 (+ 1 2) (+ 3 4))"), Value::Number(3.0));
}

#[test]
fn and_or_builtins() {
    assert_eq!(eval_ok("(and* true 1)"), Value::Bool(true));
    assert_eq!(eval_ok("(and* true nil)"), Value::Bool(false));
    assert_eq!(eval_ok("(or* nil 1)"), Value::Bool(true));
    assert_eq!(eval_ok("(or* nil false)"), Value::Bool(false));
}

#[test]
fn string_builtins() {
    assert_eq!(eval_ok("(str \"a\" 1 :k)"), Value::String("a1:k".into()));
    assert_eq!(eval_ok("(count (split \"a,b,c\" \",\"))"), Value::Number(3.0));
    assert_eq!(eval_ok("(trim \"xxaxx\" \"x\")"), Value::String("a".into()));
    assert_eq!(eval_ok("(substring \"hello\" \"ell\")"), Value::Bool(true));
    assert_eq!(
        eval_ok("(trim-suffix \"main.st\" \".st\")"),
        Value::String("main".into())
    );
    assert_eq!(eval_ok("(keyword \"a\")"), Value::Keyword("a".into()));
}

#[test]
fn eval_and_eval_string() {
    assert_eq!(eval_ok("(eval '(+ 1 2))"), Value::Number(3.0));
    assert_eq!(eval_ok("(eval-string \"(+ 1 2)\")"), Value::Number(3.0));
}

#[test]
fn type_reflection() {
    assert_eq!(eval_ok("(impl? [1 2] types/Seq)"), Value::Bool(true));
    assert_eq!(eval_ok("(impl? 1 types/Seq)"), Value::Bool(false));
    assert_eq!(eval_ok("(impl? {:a 1} types/Assoc)"), Value::Bool(true));
    assert_eq!(
        eval_ok("(impl? (fn* [x] x) types/Invokable)"),
        Value::Bool(true)
    );
    assert_eq!(eval_ok("(= (type 1) (type 2.5))"), Value::Bool(true));
    assert_eq!(eval_ok("(to-type (type 1) \"42\")"), Value::Number(42.0));
}

#[test]
fn bounded_and_resolve() {
    assert_eq!(eval_ok("(bounded? 'bruh)"), Value::Bool(false));
    assert_eq!(eval_ok("(def x 5) (bounded? 'x)"), Value::Bool(true));
    assert_eq!(eval_ok("(def x 5) (resolve 'x)"), Value::Number(5.0));
    assert_eq!(eval_ok("(resolve 'missing)"), Value::Nil);
}

#[test]
fn doseq_iterates_in_order() {
    let src = "(def a (atom 0)) (doseq [x [1 2 3]] (swap! a (fn* [v] (+ v x)))) (deref a)";
    assert_eq!(eval_ok(src), Value::Number(6.0));
}

#[test]
fn in_ns_switches_namespace() {
    let src = "(in-ns 'other) (def y 1) (+ y 1)";
    assert_eq!(eval_ok(src), Value::Number(2.0));
}

#[test]
fn def_outside_current_namespace_fails() {
    assert!(spirit_core::eval_source("(def other/x 1)").is_err());
}

#[test]
fn empty_list_evaluates_to_itself() {
    match eval_ok("()") {
        Value::List(list) => assert!(list.is_empty()),
        other => panic!("expected list, got {}", other),
    }
}

#[test]
fn quoted_value_self_evaluates() {
    for src in ["42", ":kw", "\"s\"", "[1 2]", "nil", "true"] {
        let direct = eval_ok(src);
        let quoted = eval_ok(&format!("(eval (quote {}))", src));
        assert_eq!(direct, quoted, "eval of quote({}) differs", src);
    }
}
