use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::Command;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::ast::Value;
use crate::builtins::{as_number, as_string, err};
use crate::builtins::string::unquoted;
use crate::collections::PersistentMap;
use crate::env::SpiritRef;
use crate::error::SpiritError;
use crate::eval::read_eval;
use crate::fns::FnArity;
use crate::{def_builtin, def_raw_builtin};

pub(crate) fn install(spirit: &SpiritRef) -> Result<(), SpiritError> {
    def_builtin!(spirit, "core/print", FnArity::at_least(0), |args| {
        let parts: Vec<String> = args.iter().map(unquoted).collect();
        println!("{}", parts.join(" "));
        Ok(Value::Nil)
    });

    def_builtin!(spirit, "core/pprint", FnArity::at_least(0), |args| {
        let parts: Vec<String> = args.iter().map(|v| pretty(v, 0)).collect();
        println!("{}", parts.join(" "));
        Ok(Value::Nil)
    });

    def_builtin!(spirit, "core/printf", FnArity::at_least(1), |args| {
        let format = as_string(&args[0])?;
        print!("{}", format_verbs(format, &args[1..])?);
        std::io::stdout().flush().ok();
        Ok(Value::Nil)
    });

    def_builtin!(spirit, "core/read*", FnArity::exact(1), |args| {
        let prompt = as_string(&args[0])?;
        print!("{}", prompt);
        std::io::stdout().flush().ok();
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| SpiritError::os(e.to_string()))?;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Value::String(line))
    });

    def_builtin!(spirit, "core/read-file", FnArity::exact(1), |args| {
        let path = as_string(&args[0])?;
        std::fs::read_to_string(path)
            .map(Value::String)
            .map_err(|e| SpiritError::os(e.to_string()))
    });

    def_builtin!(spirit, "core/$", FnArity::exact(1), |args| {
        shell(as_string(&args[0])?)
    });

    def_builtin!(spirit, "core/random", FnArity::exact(1), |args| {
        let max = as_number(&args[0])? as i64;
        if max <= 0 {
            return err("random requires a positive bound");
        }
        let n = rand::thread_rng().gen_range(0..max);
        Ok(Value::Number(n as f64))
    });

    def_builtin!(spirit, "core/shuffle", FnArity::exact(1), |args| {
        let mut items = crate::seq::realize(&args[0])?;
        items.shuffle(&mut rand::thread_rng());
        Ok(Value::list(items, Default::default()))
    });

    def_builtin!(spirit, "core/sleep", FnArity::exact(1), |args| {
        let millis = as_number(&args[0])?;
        if millis > 0.0 {
            std::thread::sleep(std::time::Duration::from_millis(millis as u64));
        }
        Ok(Value::Nil)
    });

    def_builtin!(spirit, "core/parse-json", FnArity::exact(1), |args| {
        let raw = as_string(&args[0])?;
        let parsed: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| SpiritError::os(format!("invalid json: {}", e)))?;
        Ok(json_to_value(&parsed))
    });

    def_raw_builtin!(spirit, "core/import", |scope, args| {
        let vals = crate::fns::eval_value_list(scope, args)?;
        FnArity::exact(1).check("import", vals.len())?;
        let path = as_string(&vals[0])?.to_string();
        import_file(scope.spirit(), &path)
    });

    Ok(())
}

/// Idempotent file load: a path is evaluated once per process; later
/// imports of the same file return Nil.
fn import_file(spirit: &SpiritRef, path: &str) -> Result<Value, SpiritError> {
    let path_buf = PathBuf::from(path);
    let canonical = path_buf.canonicalize().unwrap_or_else(|_| path_buf.clone());
    if spirit.file_imported(&canonical) {
        return Ok(Value::Nil);
    }
    spirit.add_file(canonical.clone());

    let content = std::fs::read_to_string(&canonical)
        .map_err(|e| SpiritError::import(format!("{}: {}", path, e)))?;

    let cwd = std::env::current_dir().map_err(|e| SpiritError::os(e.to_string()))?;
    let dir = canonical
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| cwd.clone());
    spirit.bind("*cwd*", Value::String(dir.to_string_lossy().into_owned()))?;

    std::env::set_current_dir(&dir).map_err(|e| SpiritError::os(e.to_string()))?;
    let scope = crate::env::Scope::root(spirit.clone());
    let result = read_eval(&scope, &content, &canonical.to_string_lossy());
    std::env::set_current_dir(&cwd).map_err(|e| SpiritError::os(e.to_string()))?;
    result
}

fn shell(command: &str) -> Result<Value, SpiritError> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .map_err(|e| SpiritError::os(e.to_string()))?;
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let exit = output.status.code().unwrap_or(-1);
    let map = PersistentMap::new()
        .set(Value::Keyword("exit".into()), Value::Number(exit as f64))
        .set(Value::Keyword("out".into()), Value::String(stdout))
        .set(Value::Keyword("err".into()), Value::String(stderr));
    Ok(Value::Map(map))
}

fn json_to_value(v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            Value::Vector(items.iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(entries) => {
            let mut map = PersistentMap::new();
            for (k, v) in entries {
                map = map.set(Value::Keyword(k.clone()), json_to_value(v));
            }
            Value::Map(map)
        }
    }
}

/// Minimal Go-style verb substitution: %s, %d, %f, %v and %%.
fn format_verbs(format: &str, args: &[Value]) -> Result<String, SpiritError> {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut next = args.iter();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(verb @ ('s' | 'd' | 'f' | 'v')) => {
                let arg = next
                    .next()
                    .ok_or_else(|| SpiritError::runtime("printf: missing argument"))?;
                match verb {
                    'd' => out.push_str(&format!("{}", as_number(arg)? as i64)),
                    'f' => out.push_str(&format!("{:.6}", as_number(arg)?)),
                    _ => out.push_str(&unquoted(arg)),
                }
            }
            Some(other) => {
                return err(format!("printf: unsupported verb '%{}'", other));
            }
            None => return err("printf: trailing '%'"),
        }
    }
    Ok(out)
}

/// Indented rendering for nested collections; scalars fall back to
/// their printed form.
fn pretty(v: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent + 1);
    let close_pad = "  ".repeat(indent);
    match v {
        Value::Map(map) if !map.is_empty() => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, val)| format!("{}{} {}", pad, k, pretty(val, indent + 1)))
                .collect();
            format!("{{\n{}\n{}}}", entries.join(",\n"), close_pad)
        }
        Value::Vector(vec) if vec.size() > 4 => {
            let entries: Vec<String> = vec
                .iter()
                .map(|item| format!("{}{}", pad, pretty(item, indent + 1)))
                .collect();
            format!("[\n{}\n{}]", entries.join("\n"), close_pad)
        }
        Value::Object(obj) => format!(
            "#<{} {}>",
            obj.class.name,
            pretty(&Value::Map(obj.members.clone()), indent)
        ),
        other => other.to_string(),
    }
}
