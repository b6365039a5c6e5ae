pub mod ast;
pub mod builtins;
pub mod collections;
pub mod concurrency;
pub mod env;
pub mod error;
pub mod eval;
pub mod fns;
pub mod oop;
pub mod reader;
pub mod seq;
pub mod specials;
pub mod stack;

use ast::Value;
use env::{ScopeRef, SpiritRef};
use error::SpiritError;

/// A fully bound interpreter plus its root scope.
pub fn new_interpreter() -> (SpiritRef, ScopeRef) {
    eval::new_interpreter()
}

/// Reads and evaluates source in a fresh interpreter; the common entry
/// point for embedding and tests.
pub fn eval_source(src: &str) -> Result<Value, SpiritError> {
    let (_, scope) = new_interpreter();
    eval::read_eval_str(&scope, src)
}

pub fn eval_source_in(scope: &ScopeRef, src: &str) -> Result<Value, SpiritError> {
    eval::read_eval_str(scope, src)
}
