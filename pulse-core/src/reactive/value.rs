//! Wrapped values.

use super::array::ReactiveArray;
use super::object::ReactiveObject;
use crate::error::Result;
use crate::raw::RawValue;

/// The observable counterpart of a [`RawValue`].
///
/// Scalars are carried as-is. Composites are reactive handles; two `Value`s
/// holding composites compare equal only if they are the same container.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(ReactiveObject),
    Array(ReactiveArray),
}

impl Value {
    /// Check if this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Objects and arrays are composite; everything else is a scalar.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    /// Get the boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the number, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number, if it is integral and fits an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64()
            .filter(|n| n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64)
            .map(|n| n as i64)
    }

    /// Get the string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the wrapped object, if this is one.
    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Get the wrapped array, if this is one.
    pub fn as_array(&self) -> Option<&ReactiveArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// The raw value this wraps. Composites return the caller's own handle.
    pub fn to_raw(&self) -> RawValue {
        match self {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(*b),
            Value::Number(n) => RawValue::Number(*n),
            Value::String(s) => RawValue::String(s.clone()),
            Value::Object(object) => RawValue::Object(object.raw().clone()),
            Value::Array(array) => RawValue::Array(array.raw().clone()),
        }
    }

    /// Untracked JSON snapshot.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.to_raw().to_json()
    }

    /// Whether storing `raw` in place of `self` would change nothing.
    ///
    /// Scalars compare by value (so `NaN` is never the same), composites by
    /// identity.
    pub(crate) fn is_same_as(&self, raw: &RawValue) -> bool {
        match (self, raw) {
            (Value::Null, RawValue::Null) => true,
            (Value::Bool(a), RawValue::Bool(b)) => a == b,
            (Value::Number(a), RawValue::Number(b)) => a == b,
            (Value::String(a), RawValue::String(b)) => a == b,
            (Value::Object(a), RawValue::Object(b)) => a.raw().ptr_eq(b),
            (Value::Array(a), RawValue::Array(b)) => a.raw().ptr_eq(b),
            _ => false,
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        value.to_raw()
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        value.to_raw()
    }
}

impl From<ReactiveObject> for RawValue {
    fn from(object: ReactiveObject) -> Self {
        RawValue::Object(object.raw().clone())
    }
}

impl From<ReactiveArray> for RawValue {
    fn from(array: ReactiveArray) -> Self {
        RawValue::Array(array.raw().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawObject;
    use crate::reactive::wrap::wrap;

    #[test]
    fn scalar_sameness_is_by_value() {
        assert!(Value::Number(1.0).is_same_as(&RawValue::Number(1.0)));
        assert!(!Value::Number(1.0).is_same_as(&RawValue::Number(2.0)));
        assert!(!Value::Number(f64::NAN).is_same_as(&RawValue::Number(f64::NAN)));
        assert!(!Value::Number(0.0).is_same_as(&RawValue::Bool(false)));
        assert!(Value::String("a".into()).is_same_as(&RawValue::from("a")));
    }

    #[test]
    fn composite_sameness_is_by_identity() {
        let raw = RawObject::new().with("x", 1);
        let wrapped = wrap(&RawValue::from(raw.clone()));

        assert!(wrapped.is_same_as(&RawValue::from(raw)));
        assert!(!wrapped.is_same_as(&RawValue::from(RawObject::new().with("x", 1))));
    }

    #[test]
    fn to_raw_returns_the_callers_handle() {
        let raw = RawObject::new().with("x", 1);
        let wrapped = wrap(&RawValue::from(raw.clone()));
        assert_eq!(wrapped.to_raw(), RawValue::Object(raw));
    }

    #[test]
    fn integer_accessor_rejects_fractions() {
        assert_eq!(Value::Number(3.0).as_i64(), Some(3));
        assert_eq!(Value::Number(3.5).as_i64(), None);
        assert_eq!(Value::Null.as_i64(), None);
    }
}
