use std::fmt;

use thiserror::Error;

use crate::ast::Position;
use crate::stack::{trace_string, Call};

pub const ERROR_TAG: &str = "\x1b[31m[ERROR]\x1b[0m";

/// Position and stack trace attached to an error on its way up. Both
/// fields are set at most once; the first decoration wins so the error
/// keeps citing the failing form, not an enclosing one.
#[derive(Clone, Debug, Default)]
pub struct ErrorContext {
    pub pos: Option<Position>,
    pub stack: Vec<Call>,
}

impl ErrorContext {
    fn set_pos(&mut self, pos: Position) {
        if self.pos.is_none() {
            self.pos = Some(pos);
        }
    }

    fn set_stack(&mut self, stack: Vec<Call>) {
        if self.stack.is_empty() && !stack.is_empty() {
            self.stack = stack;
        }
    }
}

#[derive(Clone, Debug)]
pub struct ErrorData {
    pub message: String,
    pub context: ErrorContext,
}

impl ErrorData {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }
}

impl fmt::Display for ErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Error, Debug, Clone)]
pub enum SpiritError {
    #[error("{0}")]
    Read(ErrorData),

    /// Sentinel for partial input; the REPL keeps reading more lines
    /// while the reader reports this.
    #[error("unexpected EOF while reading")]
    Eof(ErrorData),

    /// Wrapper added by the list evaluator; carries the failing form's
    /// text and position along with the cause.
    #[error("{cause}")]
    Eval {
        cause: Box<SpiritError>,
        form: String,
        data: ErrorData,
    },

    #[error("invalid type, expected '{expected}' got '{actual}'")]
    Type {
        expected: String,
        actual: String,
        context: ErrorContext,
    },

    #[error("invalid number of arguments ({got}) for '{fn_name}'")]
    Argument {
        fn_name: String,
        got: usize,
        context: ErrorContext,
    },

    #[error("unable to resolve symbol '{symbol}'")]
    Resolve {
        symbol: String,
        context: ErrorContext,
    },

    #[error("value of type '{actual}' does not implement '{interface}'")]
    Implement {
        interface: String,
        actual: String,
        context: ErrorContext,
    },

    #[error("import failed: {0}")]
    Import(ErrorData),

    #[error("{0}")]
    Os(ErrorData),

    /// Raised by `throw`; carries only the joined message string.
    #[error("{0}")]
    Thrown(ErrorData),
}

impl SpiritError {
    pub fn read(message: impl Into<String>) -> Self {
        SpiritError::Read(ErrorData::new(message))
    }

    pub fn eof() -> Self {
        SpiritError::Eof(ErrorData::new("unexpected EOF while reading"))
    }

    /// General runtime failures surface as thrown string errors, the
    /// same family `throw` produces.
    pub fn runtime(message: impl Into<String>) -> Self {
        SpiritError::Thrown(ErrorData::new(message))
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        SpiritError::Type {
            expected: expected.into(),
            actual: actual.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn arity(fn_name: impl Into<String>, got: usize) -> Self {
        SpiritError::Argument {
            fn_name: fn_name.into(),
            got,
            context: ErrorContext::default(),
        }
    }

    pub fn resolve(symbol: impl Into<String>) -> Self {
        SpiritError::Resolve {
            symbol: symbol.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn implement(interface: impl Into<String>, actual: impl Into<String>) -> Self {
        SpiritError::Implement {
            interface: interface.into(),
            actual: actual.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn import(message: impl Into<String>) -> Self {
        SpiritError::Import(ErrorData::new(message))
    }

    pub fn os(message: impl Into<String>) -> Self {
        SpiritError::Os(ErrorData::new(message))
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, SpiritError::Eof(_))
    }

    /// The variant tag `error-is` matches against.
    pub fn kind(&self) -> &'static str {
        match self {
            SpiritError::Read(_) | SpiritError::Eof(_) => "ReadError",
            SpiritError::Eval { .. } => "EvalError",
            SpiritError::Type { .. } => "TypeError",
            SpiritError::Argument { .. } => "ArgumentError",
            SpiritError::Resolve { .. } => "ResolveError",
            SpiritError::Implement { .. } => "ImplementError",
            SpiritError::Import(_) => "ImportError",
            SpiritError::Os(_) => "OSError",
            SpiritError::Thrown(_) => "Error",
        }
    }

    /// True when this error or any wrapped cause carries the tag.
    pub fn is_kind(&self, kind: &str) -> bool {
        if self.kind() == kind {
            return true;
        }
        match self {
            SpiritError::Eval { cause, .. } => cause.is_kind(kind),
            _ => false,
        }
    }

    pub fn with_pos(mut self, pos: Position) -> Self {
        if let Some(ctx) = self.context_mut() {
            ctx.set_pos(pos);
        }
        self
    }

    pub fn with_stack(mut self, stack: Vec<Call>) -> Self {
        if let Some(ctx) = self.context_mut() {
            ctx.set_stack(stack);
        }
        self
    }

    pub fn pos(&self) -> Option<Position> {
        self.context_ref().and_then(|ctx| ctx.pos.clone())
    }

    pub fn stack(&self) -> &[Call] {
        self.context_ref()
            .map(|ctx| ctx.stack.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_stack(&self) -> bool {
        !self.stack().is_empty()
    }

    fn context_ref(&self) -> Option<&ErrorContext> {
        match self {
            SpiritError::Read(data)
            | SpiritError::Eof(data)
            | SpiritError::Import(data)
            | SpiritError::Os(data)
            | SpiritError::Thrown(data) => Some(&data.context),
            SpiritError::Eval { data, .. } => Some(&data.context),
            SpiritError::Type { context, .. }
            | SpiritError::Argument { context, .. }
            | SpiritError::Resolve { context, .. }
            | SpiritError::Implement { context, .. } => Some(context),
        }
    }

    fn context_mut(&mut self) -> Option<&mut ErrorContext> {
        match self {
            SpiritError::Read(data)
            | SpiritError::Eof(data)
            | SpiritError::Import(data)
            | SpiritError::Os(data)
            | SpiritError::Thrown(data) => Some(&mut data.context),
            SpiritError::Eval { data, .. } => Some(&mut data.context),
            SpiritError::Type { context, .. }
            | SpiritError::Argument { context, .. }
            | SpiritError::Resolve { context, .. }
            | SpiritError::Implement { context, .. } => Some(context),
        }
    }
}

/// Report lines for the top level: the error, where it happened, and
/// the attached trace most recent first.
pub fn format_error(err: &SpiritError) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(format!("{} {}: {}", ERROR_TAG, err.kind(), err));
    if let SpiritError::Eval { form, .. } = err {
        lines.push(format!("  in '{}'", form));
    }
    if let Some(pos) = err.pos() {
        lines.push(format!("  at {}:{}:{}", pos.file, pos.line, pos.col));
    }
    let stack = err.stack();
    if !stack.is_empty() {
        for line in trace_string(stack).lines().filter(|l| !l.is_empty()) {
            lines.push(line.to_string());
        }
    }
    lines
}

impl From<String> for SpiritError {
    fn from(s: String) -> Self {
        SpiritError::runtime(s)
    }
}

impl From<&str> for SpiritError {
    fn from(s: &str) -> Self {
        SpiritError::runtime(s.to_string())
    }
}

impl From<std::io::Error> for SpiritError {
    fn from(err: std::io::Error) -> Self {
        SpiritError::os(err.to_string())
    }
}
