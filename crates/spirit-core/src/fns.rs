use std::fmt;
use std::sync::Arc;

use crate::ast::Value;
use crate::env::{Scope, ScopeRef};
use crate::error::SpiritError;
use crate::eval::{eval, eval_module};

/// Direct host callback; receives the caller's scope and the raw,
/// unevaluated argument forms.
pub type HostFn = Arc<dyn Fn(&ScopeRef, &[Value]) -> Result<Value, SpiritError> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FnArity {
    min: usize,
    max: Option<usize>,
}

impl FnArity {
    pub fn exact(count: usize) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }

    pub fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub fn check(&self, fn_name: &str, got: usize) -> Result<(), SpiritError> {
        let ok = got >= self.min && self.max.map_or(true, |max| got <= max);
        if ok {
            Ok(())
        } else {
            Err(SpiritError::arity(fn_name, got))
        }
    }
}

/// A single callable: positional argument names, a variadic flag, a
/// body evaluated against the captured scope, and an optional host
/// callback that bypasses the body entirely. A raw-args callback
/// receives the unevaluated forms and evaluates selectively; a native
/// callback receives fully evaluated values.
#[derive(Clone)]
pub struct Lambda {
    pub name: Option<String>,
    pub args: Vec<String>,
    pub variadic: bool,
    pub body: Vec<Value>,
    pub scope: Option<ScopeRef>,
    pub func: Option<HostFn>,
    pub raw_args: bool,
}

impl Lambda {
    pub fn host(
        func: impl Fn(&ScopeRef, &[Value]) -> Result<Value, SpiritError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: None,
            args: Vec::new(),
            variadic: false,
            body: Vec::new(),
            scope: None,
            func: Some(Arc::new(func)),
            raw_args: true,
        }
    }

    pub fn host_named(
        name: impl Into<String>,
        func: impl Fn(&ScopeRef, &[Value]) -> Result<Value, SpiritError> + Send + Sync + 'static,
    ) -> Self {
        let mut lambda = Self::host(func);
        lambda.name = Some(name.into());
        lambda
    }

    pub fn native(
        name: impl Into<String>,
        func: impl Fn(&ScopeRef, &[Value]) -> Result<Value, SpiritError> + Send + Sync + 'static,
    ) -> Self {
        let mut lambda = Self::host(func);
        lambda.name = Some(name.into());
        lambda.raw_args = false;
        lambda
    }

    pub fn new(body: Vec<Value>, scope: ScopeRef) -> Self {
        Self {
            name: None,
            args: Vec::new(),
            variadic: false,
            body,
            scope: Some(scope),
            func: None,
            raw_args: false,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("fn")
    }

    /// Parses `[a b]` or `[a & rest]`; the `&` marks the final name as
    /// the variadic tail.
    pub fn parse_arg_spec(&mut self, spec: &Value) -> Result<(), SpiritError> {
        let vec = match spec {
            Value::Vector(vec) => vec,
            other => {
                return Err(SpiritError::type_mismatch("Vector", other.type_name()));
            }
        };
        let mut names = Vec::with_capacity(vec.size());
        for item in vec.iter() {
            match item {
                Value::Symbol(sym) => names.push(sym.name.clone()),
                other => {
                    return Err(SpiritError::type_mismatch("Symbol", other.type_name()));
                }
            }
        }
        if let Some(idx) = names.iter().position(|n| n == "&") {
            if names.len() < 2 || idx != names.len() - 2 {
                return Err(SpiritError::runtime(
                    "'&' must come before the final argument name",
                ));
            }
            names.remove(idx);
            self.variadic = true;
        }
        self.args = names;
        Ok(())
    }

    pub fn check_arity(&self, got: usize) -> Result<(), SpiritError> {
        if self.variadic {
            if got < self.args.len().saturating_sub(1) {
                return Err(SpiritError::arity(self.label(), got));
            }
        } else if got != self.args.len() {
            return Err(SpiritError::arity(self.label(), got));
        }
        Ok(())
    }

    /// Entry point for list invocation: evaluates the argument forms in
    /// the caller's scope unless told otherwise (macros and raw host
    /// callbacks take the forms as-is), then applies.
    pub fn invoke(
        &self,
        scope: &ScopeRef,
        args: &[Value],
        eval_args: bool,
    ) -> Result<Value, SpiritError> {
        if self.raw_args {
            if let Some(func) = &self.func {
                return func(scope, args);
            }
        }
        let vals = if eval_args {
            eval_value_list(scope, args)?
        } else {
            args.to_vec()
        };
        self.invoke_values(scope, vals)
    }

    /// Applies to already-evaluated values.
    pub fn invoke_values(&self, caller: &ScopeRef, vals: Vec<Value>) -> Result<Value, SpiritError> {
        if let Some(func) = &self.func {
            return func(caller, &vals);
        }
        self.check_arity(vals.len())?;
        let parent = self.scope.clone().unwrap_or_else(|| caller.clone());
        let fn_scope = Scope::child(&parent);
        let positional = if self.variadic {
            self.args.len() - 1
        } else {
            self.args.len()
        };
        for (name, val) in self.args.iter().take(positional).zip(vals.iter()) {
            fn_scope.bind(name, val.clone())?;
        }
        if self.variadic {
            let rest: Vec<Value> = vals.iter().skip(positional).cloned().collect();
            let tail = Value::list(rest, Default::default());
            fn_scope.bind(&self.args[positional], tail)?;
        }
        eval_module(&fn_scope, &self.body)
    }
}

impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lambda")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("variadic", &self.variadic)
            .field("host", &self.func.is_some())
            .finish()
    }
}

/// Named callable dispatching across fixed-arity methods and at most
/// one variadic method.
#[derive(Clone, Debug)]
pub struct MultiFn {
    pub name: String,
    pub is_macro: bool,
    pub methods: Vec<Lambda>,
}

impl MultiFn {
    pub fn validate(&self) -> Result<(), SpiritError> {
        let variadic_count = self.methods.iter().filter(|m| m.variadic).count();
        if variadic_count > 1 {
            return Err(SpiritError::runtime(format!(
                "'{}' has multiple variadic methods",
                self.display_name()
            )));
        }
        for (i, a) in self.methods.iter().enumerate() {
            for b in self.methods.iter().skip(i + 1) {
                if !a.variadic && !b.variadic && a.args.len() == b.args.len() {
                    return Err(SpiritError::runtime(format!(
                        "'{}' has duplicate arity {}",
                        self.display_name(),
                        a.args.len()
                    )));
                }
            }
        }
        Ok(())
    }

    fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "fn"
        } else {
            &self.name
        }
    }

    pub fn select_method(&self, argc: usize) -> Result<&Lambda, SpiritError> {
        if let Some(method) = self
            .methods
            .iter()
            .find(|m| !m.variadic && m.args.len() == argc)
        {
            return Ok(method);
        }
        if let Some(method) = self
            .methods
            .iter()
            .find(|m| m.variadic && argc >= m.args.len() - 1)
        {
            return Ok(method);
        }
        Err(SpiritError::arity(self.display_name(), argc))
    }

    pub fn invoke(&self, scope: &ScopeRef, args: &[Value]) -> Result<Value, SpiritError> {
        let vals = if self.is_macro {
            args.to_vec()
        } else {
            eval_value_list(scope, args)?
        };
        self.invoke_values(scope, vals)
    }

    pub fn invoke_values(&self, scope: &ScopeRef, vals: Vec<Value>) -> Result<Value, SpiritError> {
        let method = self.select_method(vals.len())?;
        method.invoke_values(scope, vals)
    }
}

/// Evaluates each form in order; strict left-to-right.
pub fn eval_value_list(scope: &ScopeRef, forms: &[Value]) -> Result<Vec<Value>, SpiritError> {
    let mut out = Vec::with_capacity(forms.len());
    for form in forms {
        out.push(eval(scope, form)?);
    }
    Ok(out)
}
