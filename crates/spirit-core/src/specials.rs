use std::fmt;
use std::sync::Arc;

use crate::ast::{HostValue, Value};
use crate::collections::Set;
use crate::env::{root_scope, Scope, ScopeRef};
use crate::error::SpiritError;
use crate::eval::{analyze, analyze_forms, call_values, eval, eval_module};
use crate::fns::{eval_value_list, Lambda, MultiFn};

pub type SpecialParser = fn(&ScopeRef, &[Value]) -> Result<Lambda, SpiritError>;

/// A form whose head is a parser, not a function. Parsing happens once
/// per source list; the parsed thunk is cached on the list and invoked
/// with the raw argument forms.
#[derive(Clone, Copy)]
pub struct SpecialForm {
    pub name: &'static str,
    pub parse: SpecialParser,
}

impl fmt::Debug for SpecialForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpecialForm{{name={}}}", self.name)
    }
}

pub const DEF: SpecialForm = SpecialForm {
    name: "def",
    parse: parse_def,
};

pub const LAMBDA: SpecialForm = SpecialForm {
    name: "fn*",
    parse: parse_fn,
};

pub const MACRO: SpecialForm = SpecialForm {
    name: "macro*",
    parse: parse_macro,
};

pub const LET: SpecialForm = SpecialForm {
    name: "let",
    parse: parse_let,
};

pub const LOOP: SpecialForm = SpecialForm {
    name: "loop",
    parse: parse_loop,
};

pub const DO: SpecialForm = SpecialForm {
    name: "do",
    parse: parse_do,
};

pub const IF: SpecialForm = SpecialForm {
    name: "if",
    parse: parse_if,
};

pub const SIMPLE_QUOTE: SpecialForm = SpecialForm {
    name: "quote",
    parse: parse_simple_quote,
};

pub const SYNTAX_QUOTE: SpecialForm = SpecialForm {
    name: "syntax-quote",
    parse: parse_syntax_quote,
};

pub const TRY: SpecialForm = SpecialForm {
    name: "try",
    parse: parse_try,
};

pub const RECUR: SpecialForm = SpecialForm {
    name: "recur",
    parse: parse_recur,
};

/// Validates the argument count against the allowed arities before any
/// semantic execution.
pub fn verify_arg_count(arities: &[usize], args: &[Value]) -> Result<(), SpiritError> {
    let actual = args.len();
    match arities {
        [] if actual != 0 => Err(SpiritError::runtime(format!(
            "call requires no arguments, got {}",
            actual
        ))),
        [] => Ok(()),
        [expected] if actual != *expected => Err(SpiritError::runtime(format!(
            "call requires exactly {} argument(s), got {}",
            expected, actual
        ))),
        [_] => Ok(()),
        [a, b] => {
            if actual != *a && actual != *b {
                Err(SpiritError::runtime(format!(
                    "call requires {} or {} argument(s), got {}",
                    a, b, actual
                )))
            } else {
                Ok(())
            }
        }
        _ => {
            if arities.contains(&actual) {
                Ok(())
            } else {
                Err(SpiritError::runtime(format!(
                    "wrong number of arguments ({}) passed",
                    actual
                )))
            }
        }
    }
}

fn parse_def(scope: &ScopeRef, forms: &[Value]) -> Result<Lambda, SpiritError> {
    verify_arg_count(&[2], forms)?;
    analyze(scope, &forms[1])?;
    Ok(Lambda::host(|scope, args| {
        let sym = match &args[0] {
            Value::Symbol(sym) => sym.clone(),
            other => {
                return Err(SpiritError::type_mismatch("Symbol", other.type_name()));
            }
        };
        let v = eval(scope, &args[1])?;
        root_scope(scope).bind(&sym.name, v)?;
        Ok(Value::Symbol(sym))
    }))
}

fn parse_if(scope: &ScopeRef, args: &[Value]) -> Result<Lambda, SpiritError> {
    verify_arg_count(&[2, 3], args)?;
    analyze_forms(scope, args)?;
    Ok(Lambda::host(|scope, args| {
        let test = eval(scope, &args[0])?;
        if !test.is_truthy() {
            if args.len() == 2 {
                return Ok(Value::Nil);
            }
            return eval(scope, &args[2]);
        }
        eval(scope, &args[1])
    }))
}

fn parse_do(_scope: &ScopeRef, _args: &[Value]) -> Result<Lambda, SpiritError> {
    Ok(Lambda::host(|scope, args| {
        if args.is_empty() {
            return Ok(Value::Nil);
        }
        let results = eval_value_list(scope, args)?;
        Ok(results.into_iter().last().unwrap_or(Value::Nil))
    }))
}

/// Shared by `let` and `loop`: the binding vector must hold an even
/// number of forms, names must be symbols.
fn parse_bindings(args: &[Value]) -> Result<Vec<(String, Value)>, SpiritError> {
    if args.is_empty() {
        return Err(SpiritError::runtime(
            "call requires at-least bindings argument",
        ));
    }
    let vec = match &args[0] {
        Value::Vector(vec) => vec,
        other => {
            return Err(SpiritError::runtime(format!(
                "first argument must be bindings vector, not {}",
                other.type_name()
            )));
        }
    };
    if vec.size() % 2 != 0 {
        return Err(SpiritError::runtime("bindings must contain even forms"));
    }
    let mut bindings = Vec::with_capacity(vec.size() / 2);
    let mut iter = vec.iter();
    while let (Some(name), Some(expr)) = (iter.next(), iter.next()) {
        let sym = match name {
            Value::Symbol(sym) => sym.name.clone(),
            other => {
                return Err(SpiritError::runtime(format!(
                    "binding name must be symbol, not {}",
                    other
                )));
            }
        };
        bindings.push((sym, expr.clone()));
    }
    Ok(bindings)
}

fn parse_let(_scope: &ScopeRef, args: &[Value]) -> Result<Lambda, SpiritError> {
    let bindings = parse_bindings(args)?;
    let body = args[1..].to_vec();
    Ok(Lambda::host(move |scope, _| {
        let let_scope = Scope::child(scope);
        for (name, expr) in &bindings {
            let v = eval(&let_scope, expr)?;
            let_scope.bind(name, v)?;
        }
        eval_module(&let_scope, &body)
    }))
}

fn parse_loop(_scope: &ScopeRef, args: &[Value]) -> Result<Lambda, SpiritError> {
    let bindings = parse_bindings(args)?;
    let body = args[1..].to_vec();
    Ok(Lambda::host(move |scope, _| {
        let loop_scope = Scope::child(scope);
        for (name, expr) in &bindings {
            let v = eval(&loop_scope, expr)?;
            loop_scope.bind(name, v)?;
        }
        let mut result = eval_module(&loop_scope, &body)?;
        while let Some(new_vals) = recur_values(&result) {
            if new_vals.len() != bindings.len() {
                return Err(SpiritError::arity("recur", new_vals.len()));
            }
            for ((name, _), v) in bindings.iter().zip(new_vals) {
                loop_scope.bind(name, v)?;
            }
            result = eval_module(&loop_scope, &body)?;
        }
        Ok(result)
    }))
}

/// A `(recur …)` list produced in tail position.
pub fn recur_values(v: &Value) -> Option<Vec<Value>> {
    let list = match v {
        Value::List(list) => list,
        _ => return None,
    };
    let items = list.items();
    match items.first() {
        Some(Value::Symbol(sym)) if sym.name == "recur" => Some(items[1..].to_vec()),
        _ => None,
    }
}

fn parse_fn(scope: &ScopeRef, forms: &[Value]) -> Result<Lambda, SpiritError> {
    make_fn_form(scope, forms, false)
}

fn parse_macro(scope: &ScopeRef, forms: &[Value]) -> Result<Lambda, SpiritError> {
    make_fn_form(scope, forms, true)
}

fn make_fn_form(
    _scope: &ScopeRef,
    forms: &[Value],
    is_macro: bool,
) -> Result<Lambda, SpiritError> {
    if forms.is_empty() {
        return Err(SpiritError::runtime("insufficient args (0) for 'fn'"));
    }
    let forms = forms.to_vec();
    Ok(Lambda::host(move |scope, _| {
        let mut idx = 0;
        let mut name = String::new();
        if let Value::Symbol(sym) = &forms[0] {
            name = sym.name.clone();
            idx = 1;
        }
        if idx >= forms.len() {
            return Err(SpiritError::runtime(format!(
                "insufficient args ({}) for 'fn'",
                forms.len()
            )));
        }
        let mut methods = Vec::new();
        if matches!(forms[idx], Value::List(_)) {
            for spec in &forms[idx..] {
                let list = match spec {
                    Value::List(list) => list,
                    other => {
                        return Err(SpiritError::runtime(format!(
                            "expected arg to be list, not {}",
                            other.type_name()
                        )));
                    }
                };
                methods.push(make_fn(scope, &list.items(), &name)?);
            }
        } else {
            methods.push(make_fn(scope, &forms[idx..], &name)?);
        }
        let mf = MultiFn {
            name,
            is_macro,
            methods,
        };
        mf.validate()?;
        Ok(Value::MultiFn(Arc::new(mf)))
    }))
}

fn make_fn(scope: &ScopeRef, spec: &[Value], name: &str) -> Result<Lambda, SpiritError> {
    if spec.is_empty() {
        return Err(SpiritError::runtime("insufficient args (0) for 'fn'"));
    }
    let body = spec[1..].to_vec();
    analyze_forms(scope, &body)?;
    let mut lambda = Lambda::new(body, scope.clone());
    if !name.is_empty() {
        lambda.name = Some(name.to_string());
    }
    lambda.parse_arg_spec(&spec[0])?;
    Ok(lambda)
}

fn parse_simple_quote(_scope: &ScopeRef, forms: &[Value]) -> Result<Lambda, SpiritError> {
    verify_arg_count(&[1], forms)?;
    Ok(Lambda::host(|_, args| Ok(args[0].clone())))
}

fn parse_syntax_quote(scope: &ScopeRef, forms: &[Value]) -> Result<Lambda, SpiritError> {
    verify_arg_count(&[1], forms)?;
    analyze(scope, &forms[0])?;
    Ok(Lambda::host(|scope, args| recursive_quote(scope, &args[0])))
}

fn parse_recur(_scope: &ScopeRef, _forms: &[Value]) -> Result<Lambda, SpiritError> {
    Ok(Lambda::host(|scope, args| {
        let mut items = vec![Value::symbol("recur")];
        items.extend(eval_value_list(scope, args)?);
        Ok(Value::list(items, Default::default()))
    }))
}

fn parse_try(_scope: &ScopeRef, forms: &[Value]) -> Result<Lambda, SpiritError> {
    verify_arg_count(&[1, 2], forms)?;
    Ok(Lambda::host(|scope, args| {
        match eval(scope, &args[0]) {
            Ok(v) => Ok(v),
            Err(err) => {
                if args.len() < 2 {
                    return Ok(Value::Nil);
                }
                let handler = eval(scope, &args[1])?;
                let wrapped = Value::Host(HostValue::wrap_error(err));
                call_values(scope, &handler, vec![wrapped])
            }
        }
    }))
}

/// Recursively quotes a form. `(unquote x)` evaluates `x` in place;
/// `(unquote-splice x)` evaluates `x` and splices its elements into
/// the enclosing list.
pub fn recursive_quote(scope: &ScopeRef, f: &Value) -> Result<Value, SpiritError> {
    match f {
        Value::List(list) => {
            let items = list.items();
            if is_unquote(&items) {
                verify_arg_count(&[1], &items[1..])?;
                return eval(scope, &items[1]);
            }
            let mut quoted = Vec::with_capacity(items.len());
            for item in &items {
                match unquote_splice_target(item) {
                    Some(expr) => {
                        // Spliced elements are already evaluated and
                        // enter the output verbatim; re-quoting them
                        // would disturb unquotes belonging to a nested
                        // syntax-quote.
                        let evaled = eval(scope, &expr)?;
                        match evaled {
                            Value::List(inner) => quoted.extend(inner.items()),
                            other => {
                                return Err(SpiritError::runtime(format!(
                                    "unquote-splice must evaluate to list, not {}",
                                    other.type_name()
                                )));
                            }
                        }
                    }
                    None => quoted.push(recursive_quote(scope, item)?),
                }
            }
            Ok(Value::list(quoted, list.pos.clone()))
        }
        Value::Vector(vec) => {
            let quoted: Result<Vec<Value>, SpiritError> = vec
                .iter()
                .map(|item| recursive_quote(scope, item))
                .collect();
            Ok(Value::Vector(quoted?.into()))
        }
        Value::Set(set) => {
            let mut out = Set::new();
            for item in set.iter() {
                out = out.conj(recursive_quote(scope, item)?);
            }
            Ok(Value::Set(out))
        }
        other => Ok(other.clone()),
    }
}

fn is_unquote(items: &[Value]) -> bool {
    matches!(items.first(), Some(Value::Symbol(sym)) if sym.name == "unquote")
}

fn unquote_splice_target(v: &Value) -> Option<Value> {
    let list = match v {
        Value::List(list) => list,
        _ => return None,
    };
    let items = list.items();
    match items.first() {
        Some(Value::Symbol(sym)) if sym.name == "unquote-splice" => items.get(1).cloned(),
        _ => None,
    }
}
