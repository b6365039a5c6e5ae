use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;

use crate::collections::{PersistentMap, PersistentVector, Set};
use crate::concurrency::{AtomHandle, FutureHandle};
use crate::error::SpiritError;
use crate::fns::{Lambda, MultiFn};
use crate::oop::{Class, Object};

/// Source location carried by symbols and lists from the reader through
/// macro expansion, so runtime errors can cite the original form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub file: String,
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(file: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            file: file.into(),
            line,
            col,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub pos: Position,
}

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pos: Position::default(),
        }
    }

    pub fn at(name: impl Into<String>, pos: Position) -> Self {
        Self {
            name: name.into(),
            pos,
        }
    }
}

/// An invocation form. The payload is interior-mutable: macro expansion
/// rewrites the form list to `(do <expanded>)` in place, and the parsed
/// special-form thunk is cached at most once.
pub struct List {
    forms: RwLock<Vec<Value>>,
    pub pos: Position,
    special: OnceCell<Arc<Lambda>>,
}

impl List {
    pub fn new(forms: Vec<Value>, pos: Position) -> Self {
        Self {
            forms: RwLock::new(forms),
            pos,
            special: OnceCell::new(),
        }
    }

    pub fn items(&self) -> Vec<Value> {
        self.forms.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.forms.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> Option<Value> {
        self.forms.read().unwrap().first().cloned()
    }

    /// Replaces the payload; used when macro expansion memoizes the
    /// expanded form on the source list.
    pub fn replace(&self, forms: Vec<Value>) {
        *self.forms.write().unwrap() = forms;
    }

    pub fn cached_special(&self) -> Option<Arc<Lambda>> {
        self.special.get().cloned()
    }

    pub fn cache_special(&self, parsed: Arc<Lambda>) {
        let _ = self.special.set(parsed);
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items()).finish()
    }
}

/// Finite arithmetic progression realized on demand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LazyRange {
    pub min: i64,
    pub max: i64,
    pub step: i64,
}

impl LazyRange {
    pub fn first(&self) -> Option<Value> {
        if self.step > 0 && self.min < self.max {
            Some(Value::Number(self.min as f64))
        } else if self.step < 0 && self.min > self.max {
            Some(Value::Number(self.min as f64))
        } else {
            None
        }
    }

    pub fn next(&self) -> Option<LazyRange> {
        self.first()?;
        Some(LazyRange {
            min: self.min + self.step,
            max: self.max,
            step: self.step,
        })
    }

    pub fn size(&self) -> usize {
        if self.step == 0 {
            return 0;
        }
        let span = self.max - self.min;
        if (self.step > 0) != (span > 0) {
            return 0;
        }
        ((span.abs() + self.step.abs() - 1) / self.step.abs()) as usize
    }
}

/// Opaque wrapper around a host value. Members are exposed through an
/// explicit table consulted by dotted-symbol access.
#[derive(Clone)]
pub struct HostValue {
    pub tag: String,
    pub data: Arc<dyn std::any::Any + Send + Sync>,
    pub members: PersistentMap,
}

impl HostValue {
    pub fn new(tag: impl Into<String>, data: Arc<dyn std::any::Any + Send + Sync>) -> Self {
        Self {
            tag: tag.into(),
            data,
            members: PersistentMap::new(),
        }
    }

    pub fn with_members(mut self, members: PersistentMap) -> Self {
        self.members = members;
        self
    }

    pub fn wrap_error(err: SpiritError) -> Self {
        let message = err.to_string();
        let members = PersistentMap::new()
            .set(Value::Keyword("message".into()), Value::String(message))
            .set(
                Value::Keyword("kind".into()),
                Value::String(err.kind().into()),
            );
        Self::new(err.kind(), Arc::new(err)).with_members(members)
    }

    pub fn error(&self) -> Option<&SpiritError> {
        self.data.downcast_ref::<SpiritError>()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Nil,
    Bool,
    Number,
    Char,
    String,
    Keyword,
    Symbol,
    List,
    Vector,
    Map,
    Set,
    Module,
    Fn,
    Special,
    Atom,
    Future,
    Class,
    Object,
    Type,
    LazySeq,
    Host,
    // interface tags used by `impl?`
    Seq,
    Invokable,
    Assoc,
}

impl TypeTag {
    pub fn name(&self) -> &'static str {
        match self {
            TypeTag::Nil => "Nil",
            TypeTag::Bool => "Bool",
            TypeTag::Number => "Number",
            TypeTag::Char => "Character",
            TypeTag::String => "String",
            TypeTag::Keyword => "Keyword",
            TypeTag::Symbol => "Symbol",
            TypeTag::List => "List",
            TypeTag::Vector => "Vector",
            TypeTag::Map => "HashMap",
            TypeTag::Set => "Set",
            TypeTag::Module => "Module",
            TypeTag::Fn => "Fn",
            TypeTag::Special => "SpecialForm",
            TypeTag::Atom => "Atom",
            TypeTag::Future => "Future",
            TypeTag::Class => "Class",
            TypeTag::Object => "Object",
            TypeTag::Type => "Type",
            TypeTag::LazySeq => "LazySeq",
            TypeTag::Host => "Host",
            TypeTag::Seq => "Seq",
            TypeTag::Invokable => "Invokable",
            TypeTag::Assoc => "Assoc",
        }
    }

    pub fn is_interface(&self) -> bool {
        matches!(self, TypeTag::Seq | TypeTag::Invokable | TypeTag::Assoc)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Runtime value. Every variant evaluates (see `eval`) and prints.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Char(char),
    String(String),
    Keyword(String),
    Symbol(Symbol),
    List(Arc<List>),
    Vector(PersistentVector),
    Map(PersistentMap),
    Set(Set),
    Module(Arc<Vec<Value>>),
    Fn(Arc<Lambda>),
    MultiFn(Arc<MultiFn>),
    Special(crate::specials::SpecialForm),
    Atom(AtomHandle),
    Future(FutureHandle),
    Class(Arc<Class>),
    Object(Object),
    Type(TypeTag),
    LazySeq(LazyRange),
    Host(HostValue),
}

impl Value {
    pub fn symbol(name: impl Into<String>) -> Self {
        Value::Symbol(Symbol::new(name))
    }

    pub fn symbol_at(name: impl Into<String>, pos: Position) -> Self {
        Value::Symbol(Symbol::at(name, pos))
    }

    pub fn list(items: Vec<Value>, pos: Position) -> Self {
        Value::List(Arc::new(List::new(items, pos)))
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Nil => TypeTag::Nil,
            Value::Bool(_) => TypeTag::Bool,
            Value::Number(_) => TypeTag::Number,
            Value::Char(_) => TypeTag::Char,
            Value::String(_) => TypeTag::String,
            Value::Keyword(_) => TypeTag::Keyword,
            Value::Symbol(_) => TypeTag::Symbol,
            Value::List(_) => TypeTag::List,
            Value::Vector(_) => TypeTag::Vector,
            Value::Map(_) => TypeTag::Map,
            Value::Set(_) => TypeTag::Set,
            Value::Module(_) => TypeTag::Module,
            Value::Fn(_) | Value::MultiFn(_) => TypeTag::Fn,
            Value::Special(_) => TypeTag::Special,
            Value::Atom(_) => TypeTag::Atom,
            Value::Future(_) => TypeTag::Future,
            Value::Class(_) => TypeTag::Class,
            Value::Object(_) => TypeTag::Object,
            Value::Type(_) => TypeTag::Type,
            Value::LazySeq(_) => TypeTag::LazySeq,
            Value::Host(_) => TypeTag::Host,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_tag().name()
    }

    /// Only `nil` and `false` are falsey.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Hashable values are the scalar variants; collection keys in map
    /// literals are restricted to these by the reader.
    pub fn is_hashable(&self) -> bool {
        matches!(
            self,
            Value::Nil
                | Value::Bool(_)
                | Value::Number(_)
                | Value::Char(_)
                | Value::String(_)
                | Value::Keyword(_)
                | Value::Symbol(_)
        )
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            Value::Symbol(sym) => Some(sym.pos.clone()),
            Value::List(list) => Some(list.pos.clone()),
            _ => None,
        }
    }

    /// True for values usable as the target of an invocation.
    pub fn is_invokable(&self) -> bool {
        matches!(
            self,
            Value::Fn(_)
                | Value::MultiFn(_)
                | Value::Keyword(_)
                | Value::Vector(_)
                | Value::Map(_)
                | Value::Class(_)
        )
    }

    pub fn implements(&self, tag: TypeTag) -> bool {
        match tag {
            TypeTag::Seq => matches!(
                self,
                Value::List(_)
                    | Value::Vector(_)
                    | Value::Map(_)
                    | Value::Set(_)
                    | Value::String(_)
                    | Value::LazySeq(_)
                    | Value::Module(_)
            ),
            TypeTag::Invokable => self.is_invokable(),
            TypeTag::Assoc => matches!(self, Value::Map(_) | Value::Vector(_) | Value::Object(_)),
            other => self.type_tag() == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Keyword(a), Value::Keyword(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a.name == b.name,
            (Value::List(a), Value::List(b)) => a.items() == b.items(),
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Module(a), Value::Module(b)) => a == b,
            (Value::Fn(a), Value::Fn(b)) => Arc::ptr_eq(a, b),
            (Value::MultiFn(a), Value::MultiFn(b)) => Arc::ptr_eq(a, b),
            (Value::Special(a), Value::Special(b)) => a.name == b.name,
            (Value::Atom(a), Value::Atom(b)) => a.ptr() == b.ptr(),
            (Value::Future(a), Value::Future(b)) => a.ptr() == b.ptr(),
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => {
                Arc::ptr_eq(&a.class, &b.class) && a.members == b.members
            }
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::LazySeq(a), Value::LazySeq(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => a.tag == b.tag && Arc::ptr_eq(&a.data, &b.data),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Nil => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => n.to_bits().hash(state),
            Value::Char(c) => c.hash(state),
            Value::String(s) => s.hash(state),
            Value::Keyword(k) => k.hash(state),
            Value::Symbol(sym) => sym.name.hash(state),
            Value::List(list) => {
                for item in list.items() {
                    item.hash(state);
                }
            }
            Value::Vector(vec) => {
                for item in vec.iter() {
                    item.hash(state);
                }
            }
            Value::Map(map) => {
                let combined = hash_unordered(
                    map.iter().map(|(k, v)| {
                        let mut hasher = DefaultHasher::new();
                        k.hash(&mut hasher);
                        v.hash(&mut hasher);
                        hasher.finish()
                    }),
                    map.len(),
                );
                combined.hash(state);
            }
            Value::Set(set) => {
                let combined = hash_unordered(
                    set.iter().map(|v| {
                        let mut hasher = DefaultHasher::new();
                        v.hash(&mut hasher);
                        hasher.finish()
                    }),
                    set.len(),
                );
                combined.hash(state);
            }
            Value::Module(forms) => {
                for form in forms.iter() {
                    form.hash(state);
                }
            }
            Value::Fn(f) => Arc::as_ptr(f).hash(state),
            Value::MultiFn(f) => Arc::as_ptr(f).hash(state),
            Value::Special(sf) => sf.name.hash(state),
            Value::Atom(handle) => (handle.ptr() as usize).hash(state),
            Value::Future(handle) => (handle.ptr() as usize).hash(state),
            Value::Class(class) => Arc::as_ptr(class).hash(state),
            Value::Object(obj) => {
                Arc::as_ptr(&obj.class).hash(state);
                Value::Map(obj.members.clone()).hash(state);
            }
            Value::Type(tag) => tag.hash(state),
            Value::LazySeq(range) => {
                range.min.hash(state);
                range.max.hash(state);
                range.step.hash(state);
            }
            Value::Host(hv) => {
                hv.tag.hash(state);
                Arc::as_ptr(&hv.data).hash(state);
            }
        }
    }
}

fn hash_unordered(values: impl Iterator<Item = u64>, len: usize) -> u64 {
    let mut acc = 0u64;
    for v in values {
        acc ^= mix_hash(v);
    }
    acc ^ mix_hash(len as u64)
}

fn mix_hash(mut value: u64) -> u64 {
    value = value.wrapping_add(0x9E3779B97F4A7C15);
    value = (value ^ (value >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94D049BB133111EB);
    value ^ (value >> 31)
}

pub fn escape_string_fragment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

pub fn container_string<'a>(
    vals: impl Iterator<Item = &'a Value>,
    begin: &str,
    end: &str,
    sep: &str,
) -> String {
    let parts: Vec<String> = vals.map(|v| v.to_string()).collect();
    format!("{}{}{}", begin, parts.join(sep), end)
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 {
            "+Inf".into()
        } else {
            "-Inf".into()
        }
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Char(c) => write!(f, "\\{}", c),
            Value::String(s) => write!(f, "\"{}\"", escape_string_fragment(s)),
            Value::Keyword(k) => write!(f, ":{}", k),
            Value::Symbol(sym) => write!(f, "{}", sym.name),
            Value::List(list) => {
                let items = list.items();
                write!(f, "{}", container_string(items.iter(), "(", ")", " "))
            }
            Value::Vector(vec) => write!(f, "{}", container_string(vec.iter(), "[", "]", " ")),
            Value::Map(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{} {}", k, v))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Set(set) => write!(f, "{}", container_string(set.iter(), "#{", "}", " ")),
            Value::Module(forms) => {
                write!(f, "{}", container_string(forms.iter(), "", "\n", "\n"))
            }
            Value::Fn(lambda) => match lambda.name() {
                Some(name) => write!(f, "#<fn {}>", name),
                None => write!(f, "#<fn>"),
            },
            Value::MultiFn(mf) => {
                if mf.name.is_empty() {
                    write!(f, "#<fn>")
                } else {
                    write!(f, "#<fn {}>", mf.name)
                }
            }
            Value::Special(sf) => write!(f, "#<special {}>", sf.name),
            Value::Atom(handle) => write!(f, "(atom {})", handle.deref()),
            Value::Future(handle) => {
                write!(f, "#<future realized={}>", handle.is_realized())
            }
            Value::Class(class) => write!(f, "#<class {}>", class.name),
            Value::Object(obj) => {
                write!(f, "#<{} {}>", obj.class.name, Value::Map(obj.members.clone()))
            }
            Value::Type(tag) => write!(f, "#<type {}>", tag),
            Value::LazySeq(range) => {
                write!(f, "#<lazy-range {} {} {}>", range.min, range.max, range.step)
            }
            Value::Host(hv) => {
                if let Some(err) = hv.error() {
                    write!(f, "#<error {}>", err)
                } else {
                    write!(f, "#<host {}>", hv.tag)
                }
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Structural equality; element order matters for lists and vectors but
/// not for maps and sets.
pub fn compare(a: &Value, b: &Value) -> bool {
    a == b
}
