//! Raw (unobserved) data.
//!
//! Raw values are what callers hand to the engine. Objects and arrays are
//! shared handles, so a raw composite has an identity: cloning a
//! [`RawObject`] yields another handle to the *same* object, which is what the
//! identity cache in [`crate::reactive::wrap`] keys on.
//!
//! Each raw composite also owns the subscription registry of its wrapper.
//! Subscriptions therefore last as long as the raw data does, even when every
//! handle to the wrapper is dropped and a later wrap builds a new one.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::reactive::registry::Registry;

/// Largest integer magnitude an `f64` represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A caller-owned structured value.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(RawObject),
    Array(RawArray),
}

impl RawValue {
    /// Objects and arrays are composite; everything else is a scalar.
    pub fn is_composite(&self) -> bool {
        matches!(self, RawValue::Object(_) | RawValue::Array(_))
    }

    pub fn as_object(&self) -> Option<&RawObject> {
        match self {
            RawValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&RawArray> {
        match self {
            RawValue::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Parse a JSON document into freshly allocated raw values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Ok(value.into())
    }

    /// Snapshot this value as JSON.
    ///
    /// Fails with [`Error::CyclicValue`] if a composite contains itself.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut visiting = Vec::new();
        self.to_json_inner(&mut visiting)
    }

    fn to_json_inner(&self, visiting: &mut Vec<usize>) -> Result<serde_json::Value> {
        let json = match self {
            RawValue::Null => serde_json::Value::Null,
            RawValue::Bool(b) => serde_json::Value::Bool(*b),
            RawValue::Number(n) => number_to_json(*n),
            RawValue::String(s) => serde_json::Value::String(s.clone()),
            RawValue::Object(object) => {
                let addr = object.addr();
                if visiting.contains(&addr) {
                    return Err(Error::CyclicValue);
                }
                visiting.push(addr);
                let mut map = serde_json::Map::new();
                for (key, value) in object.entries() {
                    map.insert(key, value.to_json_inner(visiting)?);
                }
                visiting.pop();
                serde_json::Value::Object(map)
            }
            RawValue::Array(array) => {
                let addr = array.addr();
                if visiting.contains(&addr) {
                    return Err(Error::CyclicValue);
                }
                visiting.push(addr);
                let items = array
                    .to_vec()
                    .iter()
                    .map(|item| item.to_json_inner(visiting))
                    .collect::<Result<Vec<_>>>()?;
                visiting.pop();
                serde_json::Value::Array(items)
            }
        };
        Ok(json)
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawValue::Null,
            serde_json::Value::Bool(b) => RawValue::Bool(b),
            serde_json::Value::Number(n) => RawValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => RawValue::String(s),
            serde_json::Value::Array(items) => {
                RawValue::Array(items.into_iter().map(RawValue::from).collect())
            }
            serde_json::Value::Object(map) => RawValue::Object(map.into_iter().collect()),
        }
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        RawValue::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for RawValue {
                fn from(n: $ty) -> Self {
                    RawValue::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::String(s.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::String(s)
    }
}

impl From<RawObject> for RawValue {
    fn from(object: RawObject) -> Self {
        RawValue::Object(object)
    }
}

impl From<RawArray> for RawValue {
    fn from(array: RawArray) -> Self {
        RawValue::Array(array)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Null)
    }
}

#[derive(Default)]
struct RawObjectInner {
    fields: RefCell<IndexMap<String, RawValue>>,
    registry: Rc<Registry>,
}

/// A shared, insertion-ordered raw object.
#[derive(Clone, Default)]
pub struct RawObject(Rc<RawObjectInner>);

impl RawObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<RawValue>) -> Option<RawValue> {
        self.0.fields.borrow_mut().insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<RawValue> {
        self.0.fields.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.fields.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.fields.borrow().keys().cloned().collect()
    }

    /// Clone of every field, in insertion order.
    pub fn entries(&self) -> Vec<(String, RawValue)> {
        self.0
            .fields
            .borrow()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.fields.borrow().is_empty()
    }

    /// Whether both handles refer to the same object.
    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn registry(&self) -> Rc<Registry> {
        self.0.registry.clone()
    }
}

impl PartialEq for RawObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

// Keys only: raw graphs may be cyclic.
impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawObject")
            .field("addr", &Rc::as_ptr(&self.0))
            .field("keys", &self.keys())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for RawObject
where
    K: Into<String>,
    V: Into<RawValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self(Rc::new(RawObjectInner {
            fields: RefCell::new(map),
            registry: Rc::default(),
        }))
    }
}

#[derive(Default)]
struct RawArrayInner {
    items: RefCell<Vec<RawValue>>,
    registry: Rc<Registry>,
}

/// A shared raw array.
#[derive(Clone, Default)]
pub struct RawArray(Rc<RawArrayInner>);

impl RawArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: impl Into<RawValue>) {
        self.0.items.borrow_mut().push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<RawValue> {
        self.0.items.borrow().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<RawValue> {
        self.0.items.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    /// Whether both handles refer to the same array.
    pub fn ptr_eq(&self, other: &RawArray) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn registry(&self) -> Rc<Registry> {
        self.0.registry.clone()
    }

    pub(crate) fn set(&self, index: usize, value: RawValue) {
        if let Some(slot) = self.0.items.borrow_mut().get_mut(index) {
            *slot = value;
        }
    }

    pub(crate) fn replace_all(&self, items: Vec<RawValue>) {
        *self.0.items.borrow_mut() = items;
    }
}

impl PartialEq for RawArray {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for RawArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawArray")
            .field("addr", &Rc::as_ptr(&self.0))
            .field("len", &self.len())
            .finish()
    }
}

impl<V: Into<RawValue>> FromIterator<V> for RawArray {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let items = iter.into_iter().map(Into::into).collect();
        Self(Rc::new(RawArrayInner {
            items: RefCell::new(items),
            registry: Rc::default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_identity() {
        let a = RawObject::new().with("x", 1);
        let b = a.clone();
        let c = RawObject::new().with("x", 1);

        assert_eq!(a, b);
        assert_ne!(a, c);

        b.insert("x", 2);
        assert_eq!(a.get("x"), Some(RawValue::Number(2.0)));
    }

    #[test]
    fn object_keeps_insertion_order() {
        let object = RawObject::new().with("b", 1).with("a", 2).with("c", 3);
        assert_eq!(object.keys(), vec!["b", "a", "c"]);
    }

    #[test]
    fn from_json_builds_nested_values() {
        let raw = RawValue::from(json!({"a": {"b": [1, true, null, "s"]}}));
        let inner = raw
            .as_object()
            .and_then(|o| o.get("a"))
            .and_then(|a| a.as_object().and_then(|a| a.get("b")))
            .expect("nested array");
        let items = inner.as_array().expect("array").to_vec();
        assert_eq!(
            items,
            vec![
                RawValue::Number(1.0),
                RawValue::Bool(true),
                RawValue::Null,
                RawValue::String("s".into()),
            ]
        );
    }

    #[test]
    fn json_snapshot_round_trips_shape() {
        let raw = RawValue::from_json_str(r#"{"count": 3, "ratio": 0.5, "tags": ["a"]}"#).unwrap();
        assert_eq!(
            raw.to_json().unwrap(),
            json!({"count": 3, "ratio": 0.5, "tags": ["a"]})
        );
    }

    #[test]
    fn non_finite_numbers_snapshot_as_null() {
        assert_eq!(RawValue::Number(f64::NAN).to_json().unwrap(), json!(null));
        assert_eq!(RawValue::Number(f64::INFINITY).to_json().unwrap(), json!(null));
    }

    #[test]
    fn snapshot_detects_cycles() {
        let object = RawObject::new();
        object.insert("me", object.clone());
        let err = RawValue::from(object).to_json().unwrap_err();
        assert!(matches!(err, Error::CyclicValue));
    }

    #[test]
    fn shared_but_acyclic_values_snapshot() {
        let shared = RawObject::new().with("v", 1);
        let root = RawObject::new().with("a", shared.clone()).with("b", shared);
        assert_eq!(
            RawValue::from(root).to_json().unwrap(),
            json!({"a": {"v": 1}, "b": {"v": 1}})
        );
    }

    #[test]
    fn option_maps_to_null() {
        assert_eq!(RawValue::from(None::<i32>), RawValue::Null);
        assert_eq!(RawValue::from(Some("x")), RawValue::String("x".into()));
    }
}
