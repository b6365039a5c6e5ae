use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::ast::{Symbol, Value};
use crate::error::SpiritError;

pub const NS_SEPARATOR: char = '/';
pub const DEFAULT_NS: &str = "user";
const CORE_NS: &str = "core";

/// Key of the root binding table: a `(namespace, name)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NsSymbol {
    pub ns: String,
    pub name: String,
}

impl NsSymbol {
    fn with_ns(&self, ns: &str) -> NsSymbol {
        NsSymbol {
            ns: ns.to_string(),
            name: self.name.clone(),
        }
    }
}

struct SpiritState {
    bindings: HashMap<NsSymbol, Value>,
    current_ns: String,
    check_ns: bool,
    files: HashSet<PathBuf>,
}

/// Process-wide root environment: the namespaced binding table, the
/// active namespace, and the set of already-imported files. Shared by
/// every task; resolve takes the read lock, bind and switch_ns the
/// write lock.
pub struct Spirit {
    state: RwLock<SpiritState>,
}

pub type SpiritRef = Arc<Spirit>;

impl Spirit {
    /// A root environment with nothing bound and the namespace check
    /// still open. `crate::builtins::bind_all` populates it and
    /// `seal` flips the latch.
    pub fn bare() -> SpiritRef {
        Arc::new(Spirit {
            state: RwLock::new(SpiritState {
                bindings: HashMap::new(),
                current_ns: CORE_NS.to_string(),
                check_ns: false,
                files: HashSet::new(),
            }),
        })
    }

    /// Once sealed, binds outside the current namespace are rejected.
    pub fn seal(&self) {
        self.state.write().unwrap().check_ns = true;
    }

    pub fn bind(&self, symbol: &str, value: Value) -> Result<(), SpiritError> {
        let mut state = self.state.write().unwrap();
        let ns_sym = split_symbol(&state.current_ns, symbol)?;
        if state.check_ns && ns_sym.ns != state.current_ns {
            return Err(SpiritError::runtime(
                "cannot bind outside current namespace",
            ));
        }
        state.bindings.insert(ns_sym, value);
        Ok(())
    }

    pub fn resolve(&self, symbol: &str) -> Result<Value, SpiritError> {
        // `ns` is installed by the driver under `user`, so the bare
        // name keeps working from any namespace.
        let symbol = if symbol == "ns" { "user/ns" } else { symbol };
        let state = self.state.read().unwrap();
        let ns_sym = split_symbol(&state.current_ns, symbol)?;
        if let Some(v) = state.bindings.get(&ns_sym) {
            return Ok(v.clone());
        }
        if let Some(v) = state.bindings.get(&ns_sym.with_ns(CORE_NS)) {
            return Ok(v.clone());
        }
        Err(SpiritError::resolve(symbol))
    }

    pub fn has(&self, symbol: &str) -> bool {
        let symbol = if symbol == "ns" { "user/ns" } else { symbol };
        let state = self.state.read().unwrap();
        match split_symbol(&state.current_ns, symbol) {
            Ok(ns_sym) => {
                state.bindings.contains_key(&ns_sym)
                    || state.bindings.contains_key(&ns_sym.with_ns(CORE_NS))
            }
            Err(_) => false,
        }
    }

    /// Sets the active namespace and binds `*ns*` in it.
    pub fn switch_ns(&self, sym: Symbol) -> Result<(), SpiritError> {
        {
            let mut state = self.state.write().unwrap();
            state.current_ns = sym.name.clone();
        }
        self.bind("*ns*", Value::Symbol(sym))
    }

    pub fn current_ns(&self) -> String {
        self.state.read().unwrap().current_ns.clone()
    }

    /// Records an imported file; returns false when it was seen before
    /// so `import` stays idempotent.
    pub fn add_file(&self, path: PathBuf) -> bool {
        self.state.write().unwrap().files.insert(path)
    }

    pub fn file_imported(&self, path: &PathBuf) -> bool {
        self.state.read().unwrap().files.contains(path)
    }
}

fn split_symbol(current_ns: &str, symbol: &str) -> Result<NsSymbol, SpiritError> {
    let sep = NS_SEPARATOR.to_string();
    if symbol == sep {
        return Ok(NsSymbol {
            ns: current_ns.to_string(),
            name: symbol.to_string(),
        });
    }
    match symbol.split_once(NS_SEPARATOR) {
        None => Ok(NsSymbol {
            ns: current_ns.to_string(),
            name: symbol.to_string(),
        }),
        Some((ns, name)) => {
            if name.contains(NS_SEPARATOR) && name != sep {
                return Err(SpiritError::runtime(format!(
                    "invalid qualified symbol: '{}'",
                    symbol
                )));
            }
            Ok(NsSymbol {
                ns: ns.to_string(),
                name: name.to_string(),
            })
        }
    }
}

/// Lexical scope. The parentless scope is the root view over the
/// namespaced table; children (let, fn calls, loop) hold their own
/// bindings, skip the namespace check, and delegate missed lookups
/// upward.
pub struct Scope {
    locals: RwLock<HashMap<String, Value>>,
    parent: Option<ScopeRef>,
    spirit: SpiritRef,
}

pub type ScopeRef = Arc<Scope>;

impl Scope {
    pub fn root(spirit: SpiritRef) -> ScopeRef {
        Arc::new(Scope {
            locals: RwLock::new(HashMap::new()),
            parent: None,
            spirit,
        })
    }

    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Arc::new(Scope {
            locals: RwLock::new(HashMap::new()),
            parent: Some(parent.clone()),
            spirit: parent.spirit.clone(),
        })
    }

    pub fn spirit(&self) -> &SpiritRef {
        &self.spirit
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn parent(&self) -> Option<ScopeRef> {
        self.parent.clone()
    }

    pub fn bind(&self, symbol: &str, value: Value) -> Result<(), SpiritError> {
        match self.parent {
            None => self.spirit.bind(symbol, value),
            Some(_) => {
                self.locals
                    .write()
                    .unwrap()
                    .insert(symbol.to_string(), value);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, symbol: &str) -> Result<Value, SpiritError> {
        if self.parent.is_some() {
            if let Some(v) = self.locals.read().unwrap().get(symbol) {
                return Ok(v.clone());
            }
        }
        match &self.parent {
            Some(parent) => parent.resolve(symbol),
            None => self.spirit.resolve(symbol),
        }
    }

    pub fn has(&self, symbol: &str) -> bool {
        if self.parent.is_some() && self.locals.read().unwrap().contains_key(symbol) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.has(symbol),
            None => self.spirit.has(symbol),
        }
    }
}

/// Walks up to the scope with no parent; `def` and `defclass` bind
/// there.
pub fn root_scope(scope: &ScopeRef) -> ScopeRef {
    let mut current = scope.clone();
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_rejects_foreign_namespace_after_seal() {
        let spirit = Spirit::bare();
        spirit.bind("core/x", Value::Number(1.0)).unwrap();
        spirit.seal();
        spirit.switch_ns(Symbol::new("user")).unwrap();
        let err = spirit.bind("other/y", Value::Nil).unwrap_err();
        assert!(err.to_string().contains("cannot bind outside"));
        assert!(spirit.bind("y", Value::Nil).is_ok());
    }

    #[test]
    fn resolve_falls_back_to_core() {
        let spirit = Spirit::bare();
        spirit.bind("core/f", Value::Number(2.0)).unwrap();
        spirit.seal();
        spirit.switch_ns(Symbol::new("user")).unwrap();
        assert_eq!(spirit.resolve("f").unwrap(), Value::Number(2.0));
        assert!(spirit.resolve("missing").is_err());
    }

    #[test]
    fn ns_symbol_rewrites_to_user() {
        let spirit = Spirit::bare();
        spirit.switch_ns(Symbol::new("user")).unwrap();
        spirit.bind("ns", Value::Number(3.0)).unwrap();
        spirit.seal();
        spirit.switch_ns(Symbol::new("elsewhere")).unwrap();
        assert_eq!(spirit.resolve("ns").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn child_scope_shadows_and_delegates() {
        let spirit = Spirit::bare();
        spirit.bind("core/x", Value::Number(1.0)).unwrap();
        spirit.seal();
        spirit.switch_ns(Symbol::new("user")).unwrap();
        let root = Scope::root(spirit);
        let child = Scope::child(&root);
        child.bind("x", Value::Number(9.0)).unwrap();
        assert_eq!(child.resolve("x").unwrap(), Value::Number(9.0));
        assert_eq!(root.resolve("x").unwrap(), Value::Number(1.0));
        assert_eq!(child.resolve("core/x").unwrap(), Value::Number(1.0));
    }

    #[test]
    fn invalid_qualified_symbol() {
        let spirit = Spirit::bare();
        assert!(spirit.bind("a/b/c", Value::Nil).is_err());
    }
}
