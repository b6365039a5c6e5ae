use crate::ast::Value;
use crate::builtins::as_string;
use crate::def_builtin;
use crate::env::SpiritRef;
use crate::error::SpiritError;
use crate::fns::FnArity;

/// Renders a value for string building: strings drop their quotes,
/// everything else uses its printed form.
pub(crate) fn unquoted(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Nil => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn install(spirit: &SpiritRef) -> Result<(), SpiritError> {
    def_builtin!(spirit, "core/str", FnArity::at_least(0), |args| {
        let mut out = String::new();
        for arg in &args {
            out.push_str(&unquoted(arg));
        }
        Ok(Value::String(out))
    });

    def_builtin!(spirit, "core/split", FnArity::exact(2), |args| {
        let s = as_string(&args[0])?;
        let sep = as_string(&args[1])?;
        let parts: Vec<Value> = if sep.is_empty() {
            s.chars().map(|c| Value::String(c.to_string())).collect()
        } else {
            s.split(sep).map(|p| Value::String(p.to_string())).collect()
        };
        Ok(Value::Vector(parts.into()))
    });

    def_builtin!(spirit, "core/trim", FnArity::exact(2), |args| {
        let s = as_string(&args[0])?;
        let cutset: Vec<char> = as_string(&args[1])?.chars().collect();
        Ok(Value::String(
            s.trim_matches(|c| cutset.contains(&c)).to_string(),
        ))
    });

    // Substring containment, after the original's binding of the same
    // name.
    def_builtin!(spirit, "core/substring", FnArity::exact(2), |args| {
        let s = as_string(&args[0])?;
        let needle = as_string(&args[1])?;
        Ok(Value::Bool(s.contains(needle)))
    });

    def_builtin!(spirit, "core/trim-suffix", FnArity::exact(2), |args| {
        let s = as_string(&args[0])?;
        let suffix = as_string(&args[1])?;
        Ok(Value::String(
            s.strip_suffix(suffix).unwrap_or(s).to_string(),
        ))
    });

    def_builtin!(spirit, "core/keyword", FnArity::exact(1), |args| {
        Ok(Value::Keyword(as_string(&args[0])?.to_string()))
    });

    Ok(())
}
