use std::sync::Arc;
use std::time::Instant;

use crate::ast::{compare, HostValue, LazyRange, TypeTag, Value};
use crate::builtins::string::unquoted;
use crate::builtins::{as_number, as_string, err};
use crate::collections::PersistentMap;
use crate::concurrency::{AtomHandle, FutureHandle};
use crate::env::{root_scope, Scope, SpiritRef};
use crate::error::SpiritError;
use crate::eval::{call_values, eval, macro_expand, read_eval_str};
use crate::fns::{eval_value_list, FnArity};
use crate::oop::Class;
use crate::{def_builtin, def_raw_builtin};

pub(crate) fn install(spirit: &SpiritRef) -> Result<(), SpiritError> {
    install_flow(spirit)?;
    install_reflection(spirit)?;
    install_state(spirit)?;
    install_classes(spirit)?;
    install_seq(spirit)?;
    install_util(spirit)?;
    Ok(())
}

fn install_flow(spirit: &SpiritRef) -> Result<(), SpiritError> {
    // (case expr clause-val clause-expr ... default?) compares the
    // evaluated expr against raw clause values.
    def_raw_builtin!(spirit, "core/case", |scope, args| {
        if args.len() < 2 {
            return Err(SpiritError::arity("case", args.len()));
        }
        let res = eval(scope, &args[0])?;
        if args.len() == 2 {
            return eval(scope, &args[1]);
        }
        let mut start = 1;
        while start < args.len() {
            // A trailing default clause is returned as-is, unevaluated.
            if start + 1 >= args.len() {
                return Ok(args[start].clone());
            }
            if compare(&res, &args[start]) {
                return eval(scope, &args[start + 1]);
            }
            start += 2;
        }
        err(format!("no matching clause for '{}'", res))
    });

    def_raw_builtin!(spirit, "core/doseq", |scope, args| {
        if args.is_empty() {
            return Err(SpiritError::arity("doseq", args.len()));
        }
        let binding = match &args[0] {
            Value::Vector(vec) => vec,
            other => {
                return Err(SpiritError::type_mismatch("Vector", other.type_name()));
            }
        };
        if binding.size() < 2 {
            return Err(SpiritError::arity("binding", binding.size()));
        }
        let sym = match binding.get(0) {
            Some(Value::Symbol(sym)) => sym.name.clone(),
            _ => return err("doseq binding name must be a symbol"),
        };
        let coll = eval(scope, &binding.index(1)?)?;
        let items = crate::seq::realize(&coll)?;
        let loop_scope = Scope::child(scope);
        let mut result = Value::Nil;
        for item in items {
            loop_scope.bind(&sym, item)?;
            for body in &args[1..] {
                result = eval(&loop_scope, body)?;
            }
        }
        Ok(result)
    });

    // (<> f a b coll) applies f to a, b and the realized elements of
    // coll.
    def_raw_builtin!(spirit, "core/<>", |scope, args| {
        if args.len() < 2 {
            return Err(SpiritError::arity("<>", args.len()));
        }
        let vals = eval_value_list(scope, args)?;
        let target = vals[0].clone();
        if !target.is_invokable() {
            return Err(SpiritError::implement("Invokable", target.type_name()));
        }
        let mut fn_args: Vec<Value> = vals[1..vals.len() - 1].to_vec();
        let last = &vals[vals.len() - 1];
        if !crate::seq::is_seq(last) {
            return Err(SpiritError::implement("Seq", last.type_name()));
        }
        fn_args.extend(crate::seq::realize(last)?);
        call_values(scope, &target, fn_args)
    });

    Ok(())
}

fn install_reflection(spirit: &SpiritRef) -> Result<(), SpiritError> {
    def_builtin!(spirit, "core/type", FnArity::exact(1), |args| {
        Ok(Value::Type(args[0].type_tag()))
    });

    def_builtin!(spirit, "core/to-type", FnArity::exact(2), |args| {
        let target = match &args[0] {
            Value::Type(tag) => *tag,
            other => {
                return Err(SpiritError::type_mismatch("Type", other.type_name()));
            }
        };
        to_type(target, &args[1])
    });

    def_builtin!(spirit, "core/impl?", FnArity::exact(2), |args| {
        let tag = match &args[1] {
            Value::Type(tag) => *tag,
            other => {
                return Err(SpiritError::type_mismatch("Type", other.type_name()));
            }
        };
        if !tag.is_interface() {
            return err(format!("type '{}' is not an interface type", tag));
        }
        Ok(Value::Bool(args[0].implements(tag)))
    });

    def_raw_builtin!(spirit, "core/macroexpand", |scope, args| {
        let vals = eval_value_list(scope, args)?;
        FnArity::exact(1).check("macroexpand", vals.len())?;
        let (form, _) = macro_expand(scope, &vals[0])?;
        Ok(form)
    });

    def_builtin!(spirit, "core/bounded?", FnArity::exact(1), |scope, args| {
        let sym = match &args[0] {
            Value::Symbol(sym) => sym,
            other => {
                return Err(SpiritError::type_mismatch("Symbol", other.type_name()));
            }
        };
        Ok(Value::Bool(scope.has(&sym.name)))
    });

    def_builtin!(spirit, "core/resolve", FnArity::exact(1), |scope, args| {
        let sym = match &args[0] {
            Value::Symbol(sym) => sym,
            other => {
                return Err(SpiritError::type_mismatch("Symbol", other.type_name()));
            }
        };
        Ok(scope.resolve(&sym.name).unwrap_or(Value::Nil))
    });

    def_raw_builtin!(spirit, "core/eval", |scope, args| {
        FnArity::exact(1).check("eval", args.len())?;
        let form = eval(scope, &args[0])?;
        eval(scope, &form)
    });

    def_raw_builtin!(spirit, "core/eval-string", |scope, args| {
        let vals = eval_value_list(scope, args)?;
        FnArity::exact(1).check("eval-string", vals.len())?;
        let src = as_string(&vals[0])?;
        read_eval_str(scope, src)
    });

    spirit.bind("types/Seq", Value::Type(TypeTag::Seq))?;
    spirit.bind("types/Invokable", Value::Type(TypeTag::Invokable))?;
    spirit.bind("types/Assoc", Value::Type(TypeTag::Assoc))?;

    Ok(())
}

fn to_type(target: TypeTag, val: &Value) -> Result<Value, SpiritError> {
    match (target, val) {
        (TypeTag::Number, Value::String(s)) => s
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|e| SpiritError::os(e.to_string())),
        (TypeTag::Number, Value::Number(_)) => Ok(val.clone()),
        (TypeTag::String, other) => Ok(Value::String(unquoted(other))),
        (TypeTag::Keyword, Value::String(s)) => Ok(Value::Keyword(s.clone())),
        _ => err(format!(
            "cannot convert '{}' to '{}'",
            val.type_name(),
            target
        )),
    }
}

fn install_state(spirit: &SpiritRef) -> Result<(), SpiritError> {
    def_builtin!(spirit, "core/atom", FnArity::exact(1), |args| {
        Ok(Value::Atom(AtomHandle::new(args[0].clone())))
    });

    def_raw_builtin!(spirit, "core/swap!", |scope, args| {
        let vals = eval_value_list(scope, args)?;
        FnArity::exact(2).check("swap!", vals.len())?;
        let atom = match &vals[0] {
            Value::Atom(handle) => handle,
            other => {
                return Err(SpiritError::type_mismatch("Atom", other.type_name()));
            }
        };
        if !vals[1].is_invokable() {
            return Err(SpiritError::implement("Invokable", vals[1].type_name()));
        }
        atom.swap(scope, &vals[1])
    });

    // Rebinds a symbol in the caller's scope without any lock; the
    // checked variant is `swap!`.
    def_raw_builtin!(spirit, "unsafe/swap", |scope, args| {
        FnArity::exact(2).check("swap", args.len())?;
        let sym = match &args[0] {
            Value::Symbol(sym) => sym.name.clone(),
            other => {
                return Err(SpiritError::type_mismatch("Symbol", other.type_name()));
            }
        };
        let value = eval(scope, &args[1])?;
        scope.bind(&sym, value.clone())?;
        Ok(value)
    });

    def_raw_builtin!(spirit, "core/future*", |scope, args| {
        if args.is_empty() {
            return Err(SpiritError::arity("future*", 0));
        }
        let body = Value::Module(Arc::new(args.to_vec()));
        Ok(Value::Future(FutureHandle::spawn(scope.clone(), body)))
    });

    def_builtin!(spirit, "core/deref", FnArity::exact(1), |args| {
        match &args[0] {
            Value::Atom(handle) => Ok(handle.deref()),
            Value::Future(handle) => handle.deref(),
            other => Err(SpiritError::type_mismatch("Future", other.type_name())),
        }
    });

    def_builtin!(spirit, "core/realized*", FnArity::exact(1), |args| {
        match &args[0] {
            Value::Future(handle) => Ok(Value::Bool(handle.is_realized())),
            other => Err(SpiritError::type_mismatch("Future", other.type_name())),
        }
    });

    Ok(())
}

fn install_classes(spirit: &SpiritRef) -> Result<(), SpiritError> {
    def_raw_builtin!(spirit, "core/defclass", |scope, args| {
        defclass(scope, args)
    });

    def_builtin!(spirit, "core/instance-of", FnArity::exact(2), |args| {
        let class = match &args[0] {
            Value::Class(class) => class,
            other => {
                return Err(SpiritError::type_mismatch("Class", other.type_name()));
            }
        };
        match &args[1] {
            Value::Object(obj) => Ok(Value::Bool(obj.instance_of(class))),
            _ => Ok(Value::Bool(false)),
        }
    });

    def_raw_builtin!(spirit, "core/in-ns", |scope, args| {
        let vals = eval_value_list(scope, args)?;
        FnArity::exact(1).check("in-ns", vals.len())?;
        let sym = match &vals[0] {
            Value::Symbol(sym) => sym.clone(),
            other => {
                return Err(SpiritError::type_mismatch("Symbol", other.type_name()));
            }
        };
        scope.spirit().switch_ns(sym.clone())?;
        Ok(Value::Symbol(sym))
    });

    Ok(())
}

/// `(defclass Name (<- Parent)? {members} (method :k fn)* (static :k fn)*)`
fn defclass(scope: &crate::env::ScopeRef, args: &[Value]) -> Result<Value, SpiritError> {
    if args.len() < 2 {
        return Err(SpiritError::arity("defclass", args.len()));
    }
    let name = match &args[0] {
        Value::Symbol(sym) => sym.name.clone(),
        other => {
            return Err(SpiritError::type_mismatch("Symbol", other.type_name()));
        }
    };

    let mut members_index = 1;
    let mut parent: Option<Arc<Class>> = None;
    if let Value::Symbol(sym) = &args[1] {
        if sym.name != "<-" {
            return err("expecting hash-map or <- symbol");
        }
        if args.len() < 4 {
            return Err(SpiritError::arity("defclass", args.len()));
        }
        match eval(scope, &args[2])? {
            Value::Class(class) => parent = Some(class),
            other => {
                return Err(SpiritError::type_mismatch("Class", other.type_name()));
            }
        }
        members_index = 3;
    }

    let members = match eval(scope, &args[members_index])? {
        Value::Map(map) => map,
        other => {
            return Err(SpiritError::type_mismatch("HashMap", other.type_name()));
        }
    };
    for (key, _) in members.iter() {
        if !matches!(key, Value::Keyword(_)) {
            return Err(SpiritError::type_mismatch("Keyword", key.type_name()));
        }
    }

    let mut methods = PersistentMap::new();
    let mut statics = PersistentMap::new();
    for decl in &args[members_index + 1..] {
        let list = match decl {
            Value::List(list) => list,
            other => {
                return Err(SpiritError::type_mismatch("List", other.type_name()));
            }
        };
        let items = list.items();
        if items.len() != 3 {
            return err("method declaration must be (method :name fn)");
        }
        let kind = match &items[0] {
            Value::Symbol(sym) => sym.name.clone(),
            other => {
                return Err(SpiritError::type_mismatch("Symbol", other.type_name()));
            }
        };
        let key = match &items[1] {
            Value::Keyword(k) => Value::Keyword(k.clone()),
            other => {
                return Err(SpiritError::type_mismatch("Keyword", other.type_name()));
            }
        };
        let body = eval(scope, &items[2])?;
        if !body.is_invokable() {
            return Err(SpiritError::implement("Invokable", body.type_name()));
        }
        match kind.as_str() {
            "method" => methods = methods.set(key, body),
            "static" => statics = statics.set(key, body),
            other => {
                return err(format!("expected method or static, got '{}'", other));
            }
        }
    }

    let class = Value::Class(Arc::new(Class {
        name: name.clone(),
        parent,
        members,
        methods,
        statics,
    }));
    root_scope(scope).bind(&name, class.clone())?;
    Ok(class)
}

fn install_seq(spirit: &SpiritRef) -> Result<(), SpiritError> {
    def_builtin!(spirit, "core/first", FnArity::exact(1), |args| {
        crate::seq::first(&args[0])
    });

    def_builtin!(spirit, "core/next", FnArity::exact(1), |args| {
        Ok(crate::seq::next(&args[0])?.unwrap_or(Value::Nil))
    });

    def_builtin!(spirit, "core/cons", FnArity::exact(2), |args| {
        crate::seq::cons(&args[1], args[0].clone())
    });

    def_builtin!(spirit, "core/conj", FnArity::at_least(1), |args| {
        crate::seq::conj(&args[0], &args[1..])
    });

    def_builtin!(spirit, "core/count", FnArity::exact(1), |args| {
        Ok(Value::Number(crate::seq::size(&args[0])? as f64))
    });

    def_builtin!(spirit, "core/assoc*", FnArity::at_least(3), |args| {
        assoc(&args[0], &args[1..])
    });

    def_builtin!(spirit, "core/lazy-range*", FnArity::exact(3), |args| {
        Ok(Value::LazySeq(LazyRange {
            min: as_number(&args[0])? as i64,
            max: as_number(&args[1])? as i64,
            step: as_number(&args[2])? as i64,
        }))
    });

    Ok(())
}

/// Associates key/value pairs onto a map, vector or object, returning
/// the updated structure.
fn assoc(target: &Value, pairs: &[Value]) -> Result<Value, SpiritError> {
    if pairs.len() % 2 != 0 {
        return Err(SpiritError::arity("assoc*", pairs.len()));
    }
    let mut current = target.clone();
    let mut iter = pairs.iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        current = match current {
            Value::Map(map) => Value::Map(map.set(key.clone(), value.clone())),
            Value::Vector(vec) => {
                let index = as_number(key)?;
                if index < 0.0 {
                    return err("vector out of bound");
                }
                Value::Vector(vec.assoc(index as usize, value.clone())?)
            }
            Value::Object(obj) => Value::Object(obj.assoc(key.clone(), value.clone())?),
            other => {
                return Err(SpiritError::implement("Assoc", other.type_name()));
            }
        };
    }
    Ok(current)
}

fn install_util(spirit: &SpiritRef) -> Result<(), SpiritError> {
    def_builtin!(spirit, "core/throw", FnArity::at_least(1), |args| {
        let message: String = args.iter().map(unquoted).collect();
        Err(SpiritError::runtime(message))
    });

    def_builtin!(spirit, "core/error-is", FnArity::exact(2), |args| {
        let error = match &args[0] {
            Value::Host(hv) => match hv.error() {
                Some(err) => err,
                None => return Ok(Value::Bool(false)),
            },
            _ => return Ok(Value::Bool(false)),
        };
        let kind = match &args[1] {
            Value::String(s) => s.clone(),
            Value::Keyword(k) => k.clone(),
            Value::Host(hv) => hv.tag.clone(),
            other => {
                return Err(SpiritError::type_mismatch("String", other.type_name()));
            }
        };
        Ok(Value::Bool(error.is_kind(&kind)))
    });

    // Sentinel for matching errors raised by `throw`.
    spirit.bind(
        "core/exception",
        Value::Host(HostValue::new("Error", Arc::new(()))),
    )?;

    def_raw_builtin!(spirit, "core/time", |scope, args| {
        let start = Instant::now();
        let mut last = Value::Nil;
        for form in args {
            last = eval(scope, form)?;
        }
        println!("Elapsed time: {:?}", start.elapsed());
        Ok(last)
    });

    def_raw_builtin!(spirit, "core/mem", |scope, args| {
        let before = resident_bytes();
        let mut last = Value::Nil;
        for form in args {
            last = eval(scope, form)?;
        }
        let delta = resident_bytes().saturating_sub(before);
        println!("Total memory used: {}", byte_count(delta));
        Ok(last)
    });

    def_builtin!(spirit, "core/memory", FnArity::exact(0), |_args| {
        println!("{}", byte_count(resident_bytes()));
        Ok(Value::Nil)
    });

    // Rust has no collector; kept for source compatibility.
    def_builtin!(spirit, "core/force-gc", FnArity::exact(0), |_args| {
        Ok(Value::Nil)
    });

    Ok(())
}

/// Resident set size in bytes, 0 where /proc is unavailable.
fn resident_bytes() -> u64 {
    let statm = match std::fs::read_to_string("/proc/self/statm") {
        Ok(content) => content,
        Err(_) => return 0,
    };
    let pages: u64 = statm
        .split_whitespace()
        .nth(1)
        .and_then(|field| field.parse().ok())
        .unwrap_or(0);
    pages * 4096
}

fn byte_count(bytes: u64) -> String {
    const UNIT: u64 = 1000;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let suffix = ['k', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.2} {}B", bytes as f64 / div as f64, suffix)
}

/// Installed by the interpreter constructor after the namespace latch,
/// so `ns` lives under `user` like every other user-level binding.
pub fn ns_switcher() -> Value {
    Value::Fn(Arc::new(crate::fns::Lambda::host_named(
        "ns",
        |scope, args| {
            let vals = eval_value_list(scope, args)?;
            FnArity::exact(1).check("ns", vals.len())?;
            let sym = match &vals[0] {
                Value::Symbol(sym) => sym.clone(),
                other => {
                    return Err(SpiritError::type_mismatch("Symbol", other.type_name()));
                }
            };
            scope.spirit().switch_ns(sym.clone())?;
            Ok(Value::Symbol(sym))
        },
    )))
}
