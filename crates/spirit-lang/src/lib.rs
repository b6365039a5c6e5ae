pub mod repl;

use std::path::PathBuf;

use spirit_core::ast::Value;
use spirit_core::env::{ScopeRef, SpiritRef};
use spirit_core::error::SpiritError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interpreter plus root scope with the driver-conventional bindings
/// installed.
pub fn create_runtime() -> (SpiritRef, ScopeRef) {
    let (spirit, scope) = spirit_core::new_interpreter();
    spirit
        .bind("*version*", Value::String(VERSION.to_string()))
        .expect("binding *version* cannot fail");
    (spirit, scope)
}

/// `$HOME/.local/lib/spirit/core.st`
pub fn stdlib_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        let mut path = PathBuf::from(home);
        path.push(".local/lib/spirit/core.st");
        path
    })
}

pub fn history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        let mut path = PathBuf::from(home);
        path.push(".spirit_history");
        path
    })
}

pub fn eval_file(scope: &ScopeRef, path: &PathBuf) -> Result<Value, SpiritError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SpiritError::os(format!("{}: {}", path.display(), e))
    })?;
    spirit_core::eval::read_eval(scope, &content, &path.to_string_lossy())
}
