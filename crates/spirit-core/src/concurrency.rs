use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};

use crate::ast::Value;
use crate::env::ScopeRef;
use crate::error::SpiritError;
use crate::eval::{call_values, eval};

fn panic_payload_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic occurred".to_string()
    }
}

/// Thread-safe cell holding one fully evaluated value.
#[derive(Clone)]
pub struct AtomHandle {
    inner: Arc<AtomInner>,
}

struct AtomInner {
    value: RwLock<Value>,
}

impl AtomHandle {
    pub fn new(initial: Value) -> Self {
        Self {
            inner: Arc::new(AtomInner {
                value: RwLock::new(initial),
            }),
        }
    }

    pub fn deref(&self) -> Value {
        self.inner.value.read().unwrap().clone()
    }

    /// Applies `func` to the current value and stores the result. The
    /// write lock is held across the call, so the update function must
    /// not touch this atom again. An erroring update leaves the value
    /// untouched.
    pub fn swap(&self, scope: &ScopeRef, func: &Value) -> Result<Value, SpiritError> {
        let mut guard = self.inner.value.write().unwrap();
        let next = call_values(scope, func, vec![guard.clone()])?;
        *guard = next.clone();
        Ok(next)
    }

    pub fn ptr(&self) -> *const () {
        Arc::as_ptr(&self.inner) as *const ()
    }
}

/// One-shot async cell: a background task evaluates the body, writes
/// the value, then publishes the realized flag.
#[derive(Clone)]
pub struct FutureHandle {
    inner: Arc<FutureInner>,
}

struct FutureInner {
    value: RwLock<Value>,
    error: RwLock<Option<SpiritError>>,
    realized: AtomicBool,
    done: Receiver<()>,
}

impl FutureHandle {
    /// Spawns the evaluating task against the shared environment; each
    /// task carries its own call stack.
    pub fn spawn(scope: ScopeRef, form: Value) -> Self {
        let (tx, rx) = bounded::<()>(0);
        let inner = Arc::new(FutureInner {
            value: RwLock::new(Value::Nil),
            error: RwLock::new(None),
            realized: AtomicBool::new(false),
            done: rx,
        });
        let worker = inner.clone();
        thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| eval(&scope, &form)));
            match result {
                Ok(Ok(value)) => {
                    *worker.value.write().unwrap() = value;
                }
                Ok(Err(err)) => {
                    *worker.error.write().unwrap() = Some(err);
                }
                Err(payload) => {
                    *worker.error.write().unwrap() = Some(SpiritError::runtime(format!(
                        "panic in future: {}",
                        panic_payload_message(payload)
                    )));
                }
            }
            worker.realized.store(true, Ordering::Release);
            drop(tx);
        });
        Self { inner }
    }

    pub fn is_realized(&self) -> bool {
        self.inner.realized.load(Ordering::Acquire)
    }

    /// Blocks until realized. Futures are not cancellable; this waits
    /// indefinitely.
    pub fn deref(&self) -> Result<Value, SpiritError> {
        loop {
            if self.is_realized() {
                if let Some(err) = self.inner.error.read().unwrap().clone() {
                    return Err(err);
                }
                return Ok(self.inner.value.read().unwrap().clone());
            }
            let _ = self.inner.done.recv_timeout(Duration::from_millis(1));
        }
    }

    pub fn ptr(&self) -> *const () {
        Arc::as_ptr(&self.inner) as *const ()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Scope, Spirit};

    fn scope() -> ScopeRef {
        Scope::root(Spirit::bare())
    }

    #[test]
    fn atom_deref_returns_value() {
        let atom = AtomHandle::new(Value::Number(41.0));
        assert_eq!(atom.deref(), Value::Number(41.0));
    }

    #[test]
    fn atom_swap_applies_function() {
        let atom = AtomHandle::new(Value::Number(1.0));
        let inc = Value::Fn(Arc::new(crate::fns::Lambda::host(|_, args| {
            match &args[0] {
                Value::Number(n) => Ok(Value::Number(n + 1.0)),
                other => Err(SpiritError::type_mismatch("Number", other.type_name())),
            }
        })));
        let out = atom.swap(&scope(), &inc).unwrap();
        assert_eq!(out, Value::Number(2.0));
        assert_eq!(atom.deref(), Value::Number(2.0));
    }

    #[test]
    fn atom_failed_swap_leaves_value() {
        let atom = AtomHandle::new(Value::Number(1.0));
        let bad = Value::Fn(Arc::new(crate::fns::Lambda::host(|_, _| {
            Err(SpiritError::runtime("boom"))
        })));
        assert!(atom.swap(&scope(), &bad).is_err());
        assert_eq!(atom.deref(), Value::Number(1.0));
    }

    #[test]
    fn future_realizes_its_body() {
        let future = FutureHandle::spawn(scope(), Value::Number(7.0));
        assert_eq!(future.deref().unwrap(), Value::Number(7.0));
        assert!(future.is_realized());
    }
}
