use crate::ast::Value;
use crate::env::SpiritRef;
use crate::error::SpiritError;

mod core;
mod io;
mod math;
mod string;

pub use self::core::ns_switcher;

/// Installs a named built-in whose arguments arrive fully evaluated
/// and are checked against the declared arity.
#[macro_export]
macro_rules! def_builtin {
    ($spirit:expr, $name:expr, $arity:expr, |$args:ident| $body:block) => {
        $crate::def_builtin!($spirit, $name, $arity, |_scope, $args| $body);
    };
    ($spirit:expr, $name:expr, $arity:expr, |$scope:ident, $args:ident| $body:block) => {
        $spirit.bind(
            $name,
            $crate::ast::Value::Fn(std::sync::Arc::new($crate::fns::Lambda::native(
                $name,
                move |$scope: &$crate::env::ScopeRef,
                      $args: &[$crate::ast::Value]|
                      -> Result<$crate::ast::Value, $crate::error::SpiritError> {
                    $arity.check($name, $args.len())?;
                    let $args = $args.to_vec();
                    $body
                },
            ))),
        )?;
    };
}

/// Installs a named built-in that receives the raw, unevaluated forms;
/// used where evaluation must be selective (`case`, `time`, ...).
#[macro_export]
macro_rules! def_raw_builtin {
    ($spirit:expr, $name:expr, |$scope:ident, $args:ident| $body:block) => {
        $spirit.bind(
            $name,
            $crate::ast::Value::Fn(std::sync::Arc::new($crate::fns::Lambda::host_named(
                $name,
                move |$scope: &$crate::env::ScopeRef,
                      $args: &[$crate::ast::Value]|
                      -> Result<$crate::ast::Value, $crate::error::SpiritError> {
                    $body
                },
            ))),
        )?;
    };
}

pub use def_builtin;
pub use def_raw_builtin;

pub(crate) fn err<T>(msg: impl Into<String>) -> Result<T, SpiritError> {
    Err(SpiritError::runtime(msg))
}

pub(crate) fn as_number(v: &Value) -> Result<f64, SpiritError> {
    match v {
        Value::Number(n) => Ok(*n),
        other => Err(SpiritError::type_mismatch("Number", other.type_name())),
    }
}

pub(crate) fn as_string(v: &Value) -> Result<&str, SpiritError> {
    match v {
        Value::String(s) => Ok(s),
        other => Err(SpiritError::type_mismatch("String", other.type_name())),
    }
}

/// Binds every core function and special form; runs before the
/// namespace latch is set.
pub fn bind_all(spirit: &SpiritRef) -> Result<(), SpiritError> {
    use crate::specials;

    // special forms
    spirit.bind("core/do", Value::Special(specials::DO))?;
    spirit.bind("core/def", Value::Special(specials::DEF))?;
    spirit.bind("core/if", Value::Special(specials::IF))?;
    spirit.bind("core/fn*", Value::Special(specials::LAMBDA))?;
    spirit.bind("core/macro*", Value::Special(specials::MACRO))?;
    spirit.bind("core/let", Value::Special(specials::LET))?;
    spirit.bind("core/loop", Value::Special(specials::LOOP))?;
    spirit.bind("core/try", Value::Special(specials::TRY))?;
    spirit.bind("core/quote", Value::Special(specials::SIMPLE_QUOTE))?;
    spirit.bind("core/syntax-quote", Value::Special(specials::SYNTAX_QUOTE))?;
    spirit.bind("core/recur", Value::Special(specials::RECUR))?;

    math::install(spirit)?;
    string::install(spirit)?;
    io::install(spirit)?;
    core::install(spirit)?;
    Ok(())
}
