//! Reactive Objects
//!
//! A `ReactiveObject` exposes the fields of a raw object. Reading a field
//! inside a running effect subscribes that effect to the field; writing a
//! field with a different value re-runs every subscriber before returning.
//!
//! The set of recognized fields is fixed when the object is wrapped. Reading
//! an unrecognized field yields `None`; writing one is refused with
//! [`Error::UnknownField`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::debug;

use super::effect::Effect;
use super::registry::{track, FieldKey, Registry};
use super::runtime::Runtime;
use super::schema::Schema;
use super::value::Value;
use super::wrap::{wrap, wrap_object};
use crate::error::{Error, Result};
use crate::raw::{RawObject, RawValue};

pub(crate) struct ObjectInner {
    /// Accepted writes are mirrored here.
    raw: RawObject,
    fields: RefCell<IndexMap<String, Value>>,
    registry: Rc<Registry>,
}

/// An observable object. Clones share the same object.
#[derive(Clone)]
pub struct ReactiveObject {
    inner: Rc<ObjectInner>,
}

impl ReactiveObject {
    /// Wrap `raw`, or return its existing wrapper.
    pub fn new(raw: RawObject) -> Self {
        wrap_object(&raw)
    }

    /// Wrap `raw` after checking it carries exactly the fields of `schema`.
    pub fn with_schema(raw: RawObject, schema: &Schema) -> Result<Self> {
        schema.validate(&raw)?;
        Ok(wrap_object(&raw))
    }

    pub(crate) fn detached(raw: RawObject) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                fields: RefCell::new(IndexMap::new()),
                registry: raw.registry(),
                raw,
            }),
        }
    }

    pub(crate) fn attach(&self, fields: IndexMap<String, Value>) {
        *self.inner.fields.borrow_mut() = fields;
    }

    pub(crate) fn from_inner(inner: Rc<ObjectInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ObjectInner> {
        Rc::downgrade(&self.inner)
    }

    /// Read a field, subscribing the running effect to it.
    pub fn get(&self, key: &str) -> Option<Value> {
        let value = self.get_untracked(key)?;
        track(&self.inner.registry, FieldKey::from(key));
        Some(value)
    }

    /// Read a field without subscribing anything.
    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        self.inner.fields.borrow().get(key).cloned()
    }

    /// Write a field.
    ///
    /// Returns `Ok(false)` if the field already holds `value` (by value for
    /// scalars, by identity for composites); nothing is re-run in that case.
    /// Otherwise the deep-wrapped value is stored and every subscriber of the
    /// field is re-run, in subscription order, before this returns `Ok(true)`.
    pub fn set(&self, key: &str, value: impl Into<RawValue>) -> Result<bool> {
        let raw = value.into();
        {
            let fields = self.inner.fields.borrow();
            let current = fields
                .get(key)
                .ok_or_else(|| Error::UnknownField(FieldKey::from(key)))?;
            if current.is_same_as(&raw) {
                return Ok(false);
            }
        }

        let wrapped = wrap(&raw);
        let previous = self
            .inner
            .fields
            .borrow_mut()
            .get_mut(key)
            .map(|slot| std::mem::replace(slot, wrapped));
        drop(previous);
        self.inner.raw.insert(key, raw);

        let key = FieldKey::from(key);
        debug!(key = %key, "field changed");
        Runtime::propagate(self.inner.registry.subscribers(&key))?;
        Ok(true)
    }

    /// Write a field computed from its current value (read untracked).
    pub fn update<F, V>(&self, key: &str, f: F) -> Result<bool>
    where
        F: FnOnce(&Value) -> V,
        V: Into<RawValue>,
    {
        let current = self
            .get_untracked(key)
            .ok_or_else(|| Error::UnknownField(FieldKey::from(key)))?;
        self.set(key, f(&current))
    }

    /// Register an effect that depends on `keys` of this object on every run,
    /// in addition to whatever `callback` reads.
    ///
    /// Useful when the callback reads some fields only conditionally. Fails
    /// before anything runs if a key is not a field of this object.
    pub fn use_effect<F>(&self, keys: &[&str], callback: F) -> Result<Effect>
    where
        F: Fn() + 'static,
    {
        if let Some(unknown) = keys.iter().find(|key| !self.contains_key(key)) {
            return Err(Error::UnknownField(FieldKey::from(*unknown)));
        }

        let target = Rc::downgrade(&self.inner.registry);
        let keys: Vec<FieldKey> = keys.iter().map(|key| FieldKey::from(*key)).collect();
        Ok(Effect::new(move || {
            if let Some(registry) = target.upgrade() {
                for key in &keys {
                    track(&registry, key.clone());
                }
            }
            callback();
        }))
    }

    /// The recognized field names, in order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.fields.borrow().keys().cloned().collect()
    }

    /// Check if `key` is a recognized field. Not tracked.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.borrow().contains_key(key)
    }

    /// Number of recognized fields.
    pub fn len(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    /// Check if the object has no fields.
    pub fn is_empty(&self) -> bool {
        self.inner.fields.borrow().is_empty()
    }

    /// The caller's raw object backing this wrapper.
    pub fn raw(&self) -> &RawObject {
        &self.inner.raw
    }

    /// Number of effects subscribed to `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner.registry.subscriber_count(&FieldKey::from(key))
    }

    /// Whether both handles refer to the same wrapper.
    pub fn ptr_eq(&self, other: &ReactiveObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Untracked JSON snapshot.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        RawValue::Object(self.inner.raw.clone()).to_json()
    }
}

impl PartialEq for ReactiveObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("addr", &Rc::as_ptr(&self.inner))
            .field("keys", &self.keys())
            .finish()
    }
}
