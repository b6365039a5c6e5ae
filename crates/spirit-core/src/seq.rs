use crate::ast::Value;
use crate::collections::PersistentVector;
use crate::error::SpiritError;

fn not_a_seq(v: &Value) -> SpiritError {
    SpiritError::implement("Seq", v.type_name())
}

/// First element, or Nil when the sequence is empty.
pub fn first(v: &Value) -> Result<Value, SpiritError> {
    match v {
        Value::List(list) => Ok(list.first().unwrap_or(Value::Nil)),
        Value::Vector(vec) => Ok(vec.first().unwrap_or(Value::Nil)),
        Value::Set(set) => Ok(set.first().unwrap_or(Value::Nil)),
        Value::String(s) => Ok(s.chars().next().map(Value::Char).unwrap_or(Value::Nil)),
        Value::Map(map) => Ok(map
            .iter()
            .next()
            .map(|(k, v)| entry_vector(k, v))
            .unwrap_or(Value::Nil)),
        Value::LazySeq(range) => Ok(range.first().unwrap_or(Value::Nil)),
        Value::Module(forms) => Ok(forms.first().cloned().unwrap_or(Value::Nil)),
        other => Err(not_a_seq(other)),
    }
}

/// The rest of the sequence, or None when exhausted.
pub fn next(v: &Value) -> Result<Option<Value>, SpiritError> {
    match v {
        Value::List(list) => {
            let items = list.items();
            if items.is_empty() {
                return Ok(None);
            }
            Ok(Some(Value::list(items[1..].to_vec(), list.pos.clone())))
        }
        Value::Vector(vec) => Ok(vec.next().map(Value::Vector)),
        Value::Set(set) => Ok(set.next().map(Value::Set)),
        Value::String(s) => {
            let mut chars = s.chars();
            if chars.next().is_none() {
                return Ok(None);
            }
            let rest: Vec<Value> = chars.map(Value::Char).collect();
            Ok(Some(Value::list(rest, Default::default())))
        }
        Value::Map(map) => {
            let key = match map.iter().next() {
                Some((k, _)) => k.clone(),
                None => return Ok(None),
            };
            Ok(Some(Value::Map(map.delete(&key))))
        }
        Value::LazySeq(range) => Ok(range.next().map(Value::LazySeq)),
        Value::Module(forms) => {
            if forms.is_empty() {
                return Ok(None);
            }
            Ok(Some(Value::Module(std::sync::Arc::new(
                forms[1..].to_vec(),
            ))))
        }
        other => Err(not_a_seq(other)),
    }
}

/// Prepend one value.
pub fn cons(v: &Value, item: Value) -> Result<Value, SpiritError> {
    match v {
        Value::List(list) => {
            let mut items = list.items();
            items.insert(0, item);
            Ok(Value::list(items, list.pos.clone()))
        }
        Value::Vector(vec) => Ok(Value::Vector(vec.cons(item))),
        Value::Set(set) => {
            let mut items: Vec<Value> = vec![item];
            items.extend(set.iter().cloned());
            Ok(Value::Set(items.into_iter().collect()))
        }
        Value::String(_) | Value::LazySeq(_) => {
            let mut items = vec![item];
            items.extend(realize(v)?);
            Ok(Value::list(items, Default::default()))
        }
        other => Err(not_a_seq(other)),
    }
}

/// Append values.
pub fn conj(v: &Value, vals: &[Value]) -> Result<Value, SpiritError> {
    match v {
        Value::List(list) => {
            let mut items = list.items();
            items.extend_from_slice(vals);
            Ok(Value::list(items, list.pos.clone()))
        }
        Value::Vector(vec) => {
            let mut out = vec.clone();
            for val in vals {
                out = out.conj(val.clone());
            }
            Ok(Value::Vector(out))
        }
        Value::Set(set) => {
            let mut out = set.clone();
            for val in vals {
                out = out.conj(val.clone());
            }
            Ok(Value::Set(out))
        }
        Value::String(_) | Value::LazySeq(_) => {
            let mut items = realize(v)?;
            items.extend_from_slice(vals);
            Ok(Value::list(items, Default::default()))
        }
        other => Err(not_a_seq(other)),
    }
}

pub fn size(v: &Value) -> Result<usize, SpiritError> {
    match v {
        Value::List(list) => Ok(list.len()),
        Value::Vector(vec) => Ok(vec.size()),
        Value::Set(set) => Ok(set.size()),
        Value::String(s) => Ok(s.chars().count()),
        Value::Map(map) => Ok(map.size()),
        Value::LazySeq(range) => Ok(range.size()),
        Value::Module(forms) => Ok(forms.len()),
        other => Err(not_a_seq(other)),
    }
}

pub fn is_seq(v: &Value) -> bool {
    matches!(
        v,
        Value::List(_)
            | Value::Vector(_)
            | Value::Set(_)
            | Value::String(_)
            | Value::Map(_)
            | Value::LazySeq(_)
            | Value::Module(_)
    )
}

/// Materializes any sequence into a plain element list. Maps realize
/// as `[k v]` pairs in unstable order.
pub fn realize(v: &Value) -> Result<Vec<Value>, SpiritError> {
    match v {
        Value::List(list) => Ok(list.items()),
        Value::Vector(vec) => Ok(vec.iter().cloned().collect()),
        Value::Set(set) => Ok(set.iter().cloned().collect()),
        Value::String(s) => Ok(s.chars().map(Value::Char).collect()),
        Value::Map(map) => Ok(map.iter().map(|(k, v)| entry_vector(k, v)).collect()),
        Value::Module(forms) => Ok(forms.as_ref().clone()),
        Value::LazySeq(range) => {
            let mut out = Vec::with_capacity(range.size());
            let mut current = *range;
            while let Some(value) = current.first() {
                out.push(value);
                current = match current.next() {
                    Some(rest) => rest,
                    None => break,
                };
            }
            Ok(out)
        }
        other => Err(not_a_seq(other)),
    }
}

fn entry_vector(k: &Value, v: &Value) -> Value {
    let pair: PersistentVector = vec![k.clone(), v.clone()].into();
    Value::Vector(pair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::LazyRange;

    #[test]
    fn lazy_range_realizes_progression() {
        let range = Value::LazySeq(LazyRange {
            min: 0,
            max: 6,
            step: 2,
        });
        let items = realize(&range).unwrap();
        assert_eq!(
            items,
            vec![Value::Number(0.0), Value::Number(2.0), Value::Number(4.0)]
        );
        assert_eq!(size(&range).unwrap(), 3);
    }

    #[test]
    fn string_is_a_seq_of_chars() {
        let s = Value::String("ab".into());
        assert_eq!(first(&s).unwrap(), Value::Char('a'));
        let rest = next(&s).unwrap().unwrap();
        assert_eq!(first(&rest).unwrap(), Value::Char('b'));
    }

    #[test]
    fn map_realizes_as_pairs() {
        let map = crate::collections::PersistentMap::new()
            .set(Value::Keyword("a".into()), Value::Number(1.0));
        let items = realize(&Value::Map(map)).unwrap();
        assert_eq!(items.len(), 1);
        match &items[0] {
            Value::Vector(pair) => {
                assert_eq!(pair.get(0), Some(&Value::Keyword("a".into())));
                assert_eq!(pair.get(1), Some(&Value::Number(1.0)));
            }
            other => panic!("expected pair vector, got {}", other),
        }
    }
}
