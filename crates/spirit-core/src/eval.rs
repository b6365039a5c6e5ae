use std::sync::Arc;

use crate::ast::{List, Symbol, Value};
use crate::collections::{PersistentMap, Set};
use crate::env::{ScopeRef, Spirit, Scope, SpiritRef};
use crate::error::{ErrorData, SpiritError};
use crate::fns::eval_value_list;
use crate::reader::Reader;
use crate::stack::{self, Call};

/// Evaluates the given form against the scope; the single entry point
/// for every variant.
pub fn eval(scope: &ScopeRef, form: &Value) -> Result<Value, SpiritError> {
    match form {
        Value::Symbol(sym) => eval_symbol(scope, sym),
        Value::List(list) => eval_list(scope, list),
        Value::Vector(vec) => {
            let items: Result<Vec<Value>, SpiritError> =
                vec.iter().map(|item| eval(scope, item)).collect();
            Ok(Value::Vector(items?.into()))
        }
        Value::Map(map) => {
            let mut out = PersistentMap::new();
            for (k, v) in map.iter() {
                let key = eval(scope, k)?;
                let val = eval(scope, v)?;
                out = out.set(key, val);
            }
            Ok(Value::Map(out))
        }
        Value::Set(set) => {
            let mut out = Set::new();
            for item in set.iter() {
                out = out.conj(eval(scope, item)?);
            }
            Ok(Value::Set(out))
        }
        Value::Module(forms) => eval_module(scope, forms),
        Value::Special(sf) => Err(SpiritError::runtime(format!(
            "can't take value of special form '{}'",
            sf.name
        ))),
        other => Ok(other.clone()),
    }
}

/// Evaluates forms in order and returns the last result, Nil when
/// empty.
pub fn eval_module(scope: &ScopeRef, forms: &[Value]) -> Result<Value, SpiritError> {
    let mut last = Value::Nil;
    for form in forms {
        last = eval(scope, form)?;
    }
    Ok(last)
}

/// Reads all forms from the source and evaluates the resulting module.
pub fn read_eval_str(scope: &ScopeRef, src: &str) -> Result<Value, SpiritError> {
    read_eval(scope, src, "<string>")
}

pub fn read_eval(scope: &ScopeRef, src: &str, file: &str) -> Result<Value, SpiritError> {
    let module = Reader::with_file(src, file).all()?;
    eval(scope, &module)
}

/// Derived definition forms; everything else the standard library
/// provides loads from disk at driver startup.
const BOOTSTRAP: &str = r#"
(def defn (macro* defn [name args & body]
  (syntax-quote
    (def (unquote name)
         (fn* (unquote name) (unquote args) (unquote-splice body))))))

(def defmacro (macro* defmacro [name args & body]
  (syntax-quote
    (def (unquote name)
         (macro* (unquote name) (unquote args) (unquote-splice body))))))
"#;

/// A fresh interpreter with the full set of built-ins, sealed and
/// switched to the `user` namespace.
pub fn new_interpreter() -> (SpiritRef, ScopeRef) {
    let spirit = Spirit::bare();
    crate::builtins::bind_all(&spirit).expect("builtin binding cannot fail before sealing");
    {
        let bootstrap_scope = Scope::root(spirit.clone());
        read_eval_str(&bootstrap_scope, BOOTSTRAP).expect("bootstrap forms must evaluate");
    }
    spirit.seal();
    spirit
        .switch_ns(Symbol::new(crate::env::DEFAULT_NS))
        .expect("switching to the default namespace cannot fail");
    spirit
        .bind("ns", crate::builtins::ns_switcher())
        .expect("binding ns in the active namespace cannot fail");
    let scope = Scope::root(spirit.clone());
    (spirit, scope)
}

fn eval_symbol(scope: &ScopeRef, sym: &Symbol) -> Result<Value, SpiritError> {
    let target = resolve_symbol_value(scope, sym)?;
    if let Value::Special(sf) = &target {
        return Err(SpiritError::runtime(format!(
            "can't take value of special form '{}'",
            sf.name
        )));
    }
    if let Value::MultiFn(mf) = &target {
        if mf.is_macro {
            return Err(SpiritError::runtime(format!(
                "can't take value of macro '{}'",
                sym.name
            )));
        }
    }
    Ok(target)
}

/// Resolves a symbol; a dotted identifier performs recursive member
/// access on the first segment's bound value.
pub fn resolve_symbol_value(scope: &ScopeRef, sym: &Symbol) -> Result<Value, SpiritError> {
    let fields: Vec<&str> = if sym.name == "." {
        vec!["."]
    } else {
        sym.name.split('.').collect()
    };

    let mut target = scope
        .resolve(fields[0])
        .map_err(|e| e.with_pos(sym.pos.clone()))?;
    for member in &fields[1..] {
        target = access_member(&target, member).map_err(|e| e.with_pos(sym.pos.clone()))?;
    }
    Ok(target)
}

fn access_member(target: &Value, member: &str) -> Result<Value, SpiritError> {
    let key = Value::Keyword(member.to_string());
    match target {
        Value::Object(obj) => obj.member(&key),
        Value::Class(class) => class.static_method(&key).ok_or_else(|| {
            SpiritError::runtime(format!("cannot find member or method :{}", member))
        }),
        Value::Host(hv) => hv
            .members
            .get(&key)
            .cloned()
            .ok_or_else(|| {
                SpiritError::runtime(format!(
                    "value of type '{}' has no member named '{}'",
                    hv.tag, member
                ))
            }),
        other => Err(SpiritError::runtime(format!(
            "cannot access member '{}' on value of type '{}'",
            member,
            other.type_name()
        ))),
    }
}

fn eval_list(scope: &ScopeRef, list: &Arc<List>) -> Result<Value, SpiritError> {
    if list.is_empty() {
        return Ok(Value::List(list.clone()));
    }

    parse_list(scope, list)?;

    let items = list.items();
    let head = &items[0];
    let frame = Call::new(head.to_string(), list.pos.clone());

    if let Some(special) = list.cached_special() {
        stack::push(frame);
        match special.invoke(scope, &items[1..], false) {
            Ok(v) => {
                stack::pop();
                Ok(v)
            }
            Err(e) => Err(decorate_list_error(e, list)),
        }
    } else {
        let target = eval(scope, head).map_err(|e| decorate_list_error(e, list))?;
        if !target.is_invokable() {
            return Err(decorate_list_error(
                SpiritError::implement("Invokable", target.type_name()),
                list,
            ));
        }
        stack::push(frame);
        match invoke_value(scope, &target, &items[1..]) {
            Ok(v) => {
                stack::pop();
                Ok(v)
            }
            Err(e) => Err(decorate_list_error(e, list)),
        }
    }
}

/// Macro-expands the list and caches the parsed special form, at most
/// once per source form.
fn parse_list(scope: &ScopeRef, list: &Arc<List>) -> Result<(), SpiritError> {
    if list.cached_special().is_some() {
        return Ok(());
    }

    let (expanded_form, expanded) = macro_expand(scope, &Value::List(list.clone()))?;
    if expanded {
        // Memoize the expansion on the source form itself.
        list.replace(vec![
            Value::symbol_at("do", list.pos.clone()),
            expanded_form,
        ]);
    }

    let head = match list.first() {
        Some(head) => head,
        None => return Ok(()),
    };

    match resolve_special(scope, &head) {
        Some(special) => {
            let items = list.items();
            let parsed = (special.parse)(scope, &items[1..])
                .map_err(|e| SpiritError::runtime(format!("{}: {}", special.name, e)))?;
            list.cache_special(Arc::new(parsed));
        }
        None => {
            let items = list.items();
            analyze_forms(scope, &items)?;
        }
    }
    Ok(())
}

fn resolve_special(scope: &ScopeRef, head: &Value) -> Option<crate::specials::SpecialForm> {
    let sym = match head {
        Value::Symbol(sym) => sym,
        _ => return None,
    };
    match resolve_symbol_value(scope, sym) {
        Ok(Value::Special(sf)) => Some(sf),
        _ => None,
    }
}

/// Pre-parses nested invocation forms so malformed special forms are
/// rejected before any semantic execution.
pub fn analyze(scope: &ScopeRef, form: &Value) -> Result<(), SpiritError> {
    match form {
        Value::Module(forms) => analyze_forms(scope, forms),
        Value::List(list) => parse_list(scope, list),
        Value::Vector(vec) => {
            for item in vec.iter() {
                analyze(scope, item)?;
            }
            Ok(())
        }
        Value::Set(set) => {
            for item in set.iter() {
                analyze(scope, item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

pub fn analyze_forms(scope: &ScopeRef, forms: &[Value]) -> Result<(), SpiritError> {
    for form in forms {
        analyze(scope, form)?;
    }
    Ok(())
}

/// Expands macro invocations until the head no longer names a macro.
/// Returns the final form and whether any expansion occurred.
pub fn macro_expand(scope: &ScopeRef, form: &Value) -> Result<(Value, bool), SpiritError> {
    let mut form = form.clone();
    let mut expanded = false;
    loop {
        let list = match &form {
            Value::List(list) if !list.is_empty() => list.clone(),
            _ => break,
        };
        let sym = match list.first() {
            Some(Value::Symbol(sym)) => sym,
            _ => break,
        };
        let target = match resolve_symbol_value(scope, &sym) {
            Ok(v) => v,
            Err(_) => break,
        };
        let mf = match target {
            Value::MultiFn(mf) if mf.is_macro => mf,
            _ => break,
        };
        let items = list.items();
        form = mf.invoke(scope, &items[1..])?;
        expanded = true;
    }
    Ok((form, expanded))
}

fn decorate_list_error(err: SpiritError, list: &Arc<List>) -> SpiritError {
    let err = if err.has_stack() {
        err
    } else {
        err.with_stack(stack::capture_trace())
    };
    if matches!(err, SpiritError::Eval { .. }) {
        return err;
    }
    let stack_snapshot = err.stack().to_vec();
    SpiritError::Eval {
        cause: Box::new(err),
        form: Value::List(list.clone()).to_string(),
        data: ErrorData::new(""),
    }
    .with_pos(list.pos.clone())
    .with_stack(stack_snapshot)
}

/// Invokes a value with raw argument forms; each invokable decides how
/// its arguments evaluate.
pub fn invoke_value(scope: &ScopeRef, target: &Value, args: &[Value]) -> Result<Value, SpiritError> {
    match target {
        Value::Fn(lambda) => lambda.invoke(scope, args, true),
        Value::MultiFn(mf) => mf.invoke(scope, args),
        Value::Keyword(_) | Value::Vector(_) | Value::Map(_) | Value::Class(_) => {
            let vals = eval_value_list(scope, args)?;
            call_values(scope, target, vals)
        }
        other => Err(SpiritError::implement("Invokable", other.type_name())),
    }
}

/// Applies a value to already-evaluated arguments; used by `swap!`,
/// `try` handlers, `apply` and the class constructor path.
pub fn call_values(scope: &ScopeRef, target: &Value, vals: Vec<Value>) -> Result<Value, SpiritError> {
    match target {
        Value::Fn(lambda) => lambda.invoke_values(scope, vals),
        Value::MultiFn(mf) => mf.invoke_values(scope, vals),
        Value::Keyword(kw) => {
            if vals.is_empty() || vals.len() > 2 {
                return Err(SpiritError::arity(format!(":{}", kw), vals.len()));
            }
            let default = vals.get(1).cloned().unwrap_or(Value::Nil);
            match &vals[0] {
                Value::Map(map) => Ok(map.get_or(&Value::Keyword(kw.clone()), default)),
                _ => Ok(Value::Nil),
            }
        }
        Value::Vector(vec) => {
            if vals.len() != 1 {
                return Err(SpiritError::arity("vector", vals.len()));
            }
            let index = match &vals[0] {
                Value::Number(n) => *n,
                other => {
                    return Err(SpiritError::type_mismatch("Number", other.type_name()));
                }
            };
            vec.index(index as usize)
        }
        Value::Map(map) => {
            if vals.is_empty() || vals.len() > 2 {
                return Err(SpiritError::arity("hash-map", vals.len()));
            }
            let default = vals.get(1).cloned().unwrap_or(Value::Nil);
            Ok(map.get_or(&vals[0], default))
        }
        Value::Class(class) => {
            if vals.len() != 1 {
                return Err(SpiritError::arity(class.name.as_str(), vals.len()));
            }
            match &vals[0] {
                Value::Map(init) => Ok(Value::Object(class.construct(init.clone())?)),
                other => Err(SpiritError::type_mismatch("HashMap", other.type_name())),
            }
        }
        other => Err(SpiritError::implement("Invokable", other.type_name())),
    }
}
