use std::sync::Arc;

use crate::ast::Value;
use crate::collections::PersistentMap;
use crate::error::SpiritError;

/// Nominal type with declared members, instance methods and static
/// methods; single inheritance through `parent`.
#[derive(Debug)]
pub struct Class {
    pub name: String,
    pub parent: Option<Arc<Class>>,
    pub members: PersistentMap,
    pub methods: PersistentMap,
    pub statics: PersistentMap,
}

impl Class {
    /// True when the key is declared on this class or an ancestor.
    pub fn declares(&self, key: &Value) -> bool {
        if self.members.contains_key(key) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.declares(key),
            None => false,
        }
    }

    pub fn method(&self, key: &Value) -> Option<Value> {
        if let Some(found) = self.methods.get(key) {
            return Some(found.clone());
        }
        self.parent.as_ref().and_then(|p| p.method(key))
    }

    pub fn static_method(&self, key: &Value) -> Option<Value> {
        if let Some(found) = self.statics.get(key) {
            return Some(found.clone());
        }
        self.parent.as_ref().and_then(|p| p.static_method(key))
    }

    /// The value declared for a member in the class chain; doubles as
    /// the default when an instance has no payload for it.
    pub fn declared_default(&self, key: &Value) -> Option<Value> {
        if let Some(found) = self.members.get(key) {
            return Some(found.clone());
        }
        self.parent.as_ref().and_then(|p| p.declared_default(key))
    }

    /// Builds an instance from an initializing map, rejecting keys not
    /// declared anywhere in the class chain.
    pub fn construct(self: &Arc<Self>, init: PersistentMap) -> Result<Object, SpiritError> {
        for (key, _) in init.iter() {
            if !matches!(key, Value::Keyword(_)) {
                return Err(SpiritError::type_mismatch("Keyword", key.type_name()));
            }
            if !self.declares(key) {
                return Err(SpiritError::runtime(format!(
                    "cannot find member or method {}",
                    key
                )));
            }
        }
        Ok(Object {
            class: self.clone(),
            members: init,
        })
    }

    pub fn is_descendant_of(&self, other: &Arc<Class>) -> bool {
        if std::ptr::eq(self, Arc::as_ptr(other)) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.is_descendant_of(other),
            None => false,
        }
    }
}

/// Instance of a class with per-instance member values.
#[derive(Clone, Debug)]
pub struct Object {
    pub class: Arc<Class>,
    pub members: PersistentMap,
}

impl Object {
    /// Member read order: instance payload, then instance method, then
    /// the class-declared default.
    pub fn member(&self, key: &Value) -> Result<Value, SpiritError> {
        if let Some(v) = self.members.get(key) {
            return Ok(v.clone());
        }
        if let Some(method) = self.class.method(key) {
            return Ok(method);
        }
        if let Some(default) = self.class.declared_default(key) {
            return Ok(default);
        }
        Err(SpiritError::runtime(format!(
            "cannot find member or method {}",
            key
        )))
    }

    /// Writes must target a declared key somewhere in the chain.
    pub fn assoc(&self, key: Value, value: Value) -> Result<Object, SpiritError> {
        if !matches!(key, Value::Keyword(_)) {
            return Err(SpiritError::runtime("object requires Keyword as key"));
        }
        if !self.class.declares(&key) {
            return Err(SpiritError::runtime(format!(
                "cannot find member or method {}",
                key
            )));
        }
        Ok(Object {
            class: self.class.clone(),
            members: self.members.set(key, value),
        })
    }

    pub fn instance_of(&self, class: &Arc<Class>) -> bool {
        self.class.is_descendant_of(class)
    }
}
