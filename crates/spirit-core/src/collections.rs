use std::fmt;

use im::{HashMap as ImHashMap, Vector as ImVector};

use crate::ast::Value;
use crate::error::SpiritError;

/// Persistent vector; every update returns a new root that shares
/// interior nodes with the prior version.
#[derive(Clone, Default)]
pub struct PersistentVector(ImVector<Value>);

impl PersistentVector {
    pub fn new() -> Self {
        Self(ImVector::new())
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn index(&self, index: usize) -> Result<Value, SpiritError> {
        self.0
            .get(index)
            .cloned()
            .ok_or_else(|| SpiritError::runtime("index out of bounds"))
    }

    pub fn first(&self) -> Option<Value> {
        self.0.front().cloned()
    }

    /// The subvector [1..n), or None once empty.
    pub fn next(&self) -> Option<PersistentVector> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0.clone().skip(1)))
    }

    /// Prepend.
    pub fn cons(&self, value: Value) -> Self {
        let mut vec = self.0.clone();
        vec.push_front(value);
        Self(vec)
    }

    /// Append.
    pub fn conj(&self, value: Value) -> Self {
        let mut vec = self.0.clone();
        vec.push_back(value);
        Self(vec)
    }

    pub fn assoc(&self, index: usize, value: Value) -> Result<Self, SpiritError> {
        if index >= self.0.len() {
            return Err(SpiritError::runtime("vector out of bound"));
        }
        Ok(Self(self.0.update(index, value)))
    }

    pub fn sub_vector(&self, from: usize, to: usize) -> Result<Self, SpiritError> {
        if from > to || to > self.0.len() {
            return Err(SpiritError::runtime("subvector range out of bounds"));
        }
        Ok(Self(self.0.clone().skip(from).take(to - from)))
    }

    pub fn iter(&self) -> im::vector::Iter<'_, Value> {
        self.0.iter()
    }
}

impl FromIterator<Value> for PersistentVector {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(ImVector::from_iter(iter))
    }
}

impl From<Vec<Value>> for PersistentVector {
    fn from(items: Vec<Value>) -> Self {
        items.into_iter().collect()
    }
}

impl PartialEq for PersistentVector {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a == b)
    }
}

impl Eq for PersistentVector {}

impl fmt::Debug for PersistentVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// Persistent hash map keyed by runtime values; lookup order is
/// unstable, equality is structural.
#[derive(Clone, Default)]
pub struct PersistentMap(ImHashMap<Value, Value>);

impl PersistentMap {
    pub fn new() -> Self {
        Self(ImHashMap::new())
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.0.get(key)
    }

    /// Lookup with a default, the map's invocation behavior.
    pub fn get_or(&self, key: &Value, default: Value) -> Value {
        self.0.get(key).cloned().unwrap_or(default)
    }

    /// Returns a new map; the receiver is unchanged.
    pub fn set(&self, key: Value, value: Value) -> Self {
        Self(self.0.update(key, value))
    }

    pub fn delete(&self, key: &Value) -> Self {
        Self(self.0.without(key))
    }

    pub fn iter(&self) -> im::hashmap::Iter<'_, Value, Value> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.0.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }
}

impl FromIterator<(Value, Value)> for PersistentMap {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        Self(ImHashMap::from_iter(iter))
    }
}

impl PartialEq for PersistentMap {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        self.0
            .iter()
            .all(|(k, v)| other.0.get(k).map_or(false, |o| o == v))
    }
}

impl Eq for PersistentMap {}

impl fmt::Debug for PersistentMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

/// Deduplicated sequence, ordered by insertion. The reader enforces
/// element uniqueness for set literals; `conj` silently drops
/// duplicates.
#[derive(Clone, Default)]
pub struct Set(ImVector<Value>);

impl Set {
    pub fn new() -> Self {
        Self(ImVector::new())
    }

    pub fn size(&self) -> usize {
        self.0.len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.iter().any(|v| v == value)
    }

    pub fn conj(&self, value: Value) -> Self {
        if self.contains(&value) {
            return self.clone();
        }
        let mut items = self.0.clone();
        items.push_back(value);
        Self(items)
    }

    pub fn first(&self) -> Option<Value> {
        self.0.front().cloned()
    }

    pub fn next(&self) -> Option<Set> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0.clone().skip(1)))
    }

    pub fn iter(&self) -> im::vector::Iter<'_, Value> {
        self.0.iter()
    }
}

impl FromIterator<Value> for Set {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = Set::new();
        for v in iter {
            set = set.conj(v);
        }
        set
    }
}

impl PartialEq for Set {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|v| other.contains(v))
    }
}

impl Eq for Set {}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn vector_assoc_leaves_original_untouched() {
        let base: PersistentVector = vec![num(1.0), num(2.0), num(3.0)].into();
        let updated = base.assoc(1, num(9.0)).unwrap();
        assert_eq!(updated.get(1), Some(&num(9.0)));
        assert_eq!(base.get(1), Some(&num(2.0)));
        assert_eq!(updated.get(0), base.get(0));
        assert_eq!(updated.get(2), base.get(2));
    }

    #[test]
    fn vector_assoc_out_of_bounds() {
        let base: PersistentVector = vec![num(1.0)].into();
        assert!(base.assoc(3, num(0.0)).is_err());
    }

    #[test]
    fn vector_cons_conj_sub() {
        let base: PersistentVector = vec![num(2.0), num(3.0)].into();
        let front = base.cons(num(1.0));
        let back = base.conj(num(4.0));
        assert_eq!(front.first(), Some(num(1.0)));
        assert_eq!(back.get(2), Some(&num(4.0)));
        assert_eq!(base.size(), 2);
        let sub = front.sub_vector(1, 3).unwrap();
        assert_eq!(sub.first(), Some(num(2.0)));
        assert_eq!(sub.size(), 2);
    }

    #[test]
    fn vector_next_is_rest() {
        let base: PersistentVector = vec![num(1.0), num(2.0)].into();
        let rest = base.next().unwrap();
        assert_eq!(rest.first(), Some(num(2.0)));
        assert!(rest.next().unwrap().next().is_none());
    }

    #[test]
    fn map_set_get_delete() {
        let k = Value::Keyword("a".into());
        let map = PersistentMap::new().set(k.clone(), num(1.0));
        let grown = map.set(Value::Keyword("b".into()), num(2.0));
        assert_eq!(map.size(), 1);
        assert_eq!(grown.size(), 2);
        assert_eq!(grown.get(&k), Some(&num(1.0)));
        let shrunk = grown.delete(&k);
        assert_eq!(shrunk.get(&k), None);
        assert_eq!(grown.get(&k), Some(&num(1.0)));
    }

    #[test]
    fn set_dedupes_on_conj() {
        let set = Set::new().conj(num(1.0)).conj(num(1.0)).conj(num(2.0));
        assert_eq!(set.size(), 2);
        assert!(set.contains(&num(2.0)));
    }

    #[test]
    fn map_equality_ignores_order() {
        let a = PersistentMap::new()
            .set(Value::Keyword("x".into()), num(1.0))
            .set(Value::Keyword("y".into()), num(2.0));
        let b = PersistentMap::new()
            .set(Value::Keyword("y".into()), num(2.0))
            .set(Value::Keyword("x".into()), num(1.0));
        assert_eq!(a, b);
    }
}
