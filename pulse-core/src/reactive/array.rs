//! Reactive Arrays
//!
//! Element reads and index writes behave like object fields, keyed by
//! [`FieldKey::Index`], and reading the length is tracked under
//! [`FieldKey::Length`].
//!
//! Structural mutations (`push`, `pop`, `shift`, `unshift`, `splice`,
//! `sort_by`, `reverse`) are coarse: after the mutation every effect
//! subscribed to *any* key of the array is re-run, whether or not the indices
//! it read actually moved. The re-run happens even when the mutation changed
//! nothing, such as popping an empty array.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::registry::{track, FieldKey, Registry};
use super::runtime::Runtime;
use super::value::Value;
use super::wrap::{wrap, wrap_array};
use crate::error::{Error, Result};
use crate::raw::{RawArray, RawValue};

pub(crate) struct ArrayInner {
    raw: RawArray,
    items: RefCell<Vec<Value>>,
    registry: Rc<Registry>,
}

/// An observable array. Clones share the same array.
#[derive(Clone)]
pub struct ReactiveArray {
    inner: Rc<ArrayInner>,
}

impl ReactiveArray {
    /// Wrap `raw`, or return its existing wrapper.
    pub fn new(raw: RawArray) -> Self {
        wrap_array(&raw)
    }

    pub(crate) fn detached(raw: RawArray) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                items: RefCell::new(Vec::new()),
                registry: raw.registry(),
                raw,
            }),
        }
    }

    pub(crate) fn attach(&self, items: Vec<Value>) {
        *self.inner.items.borrow_mut() = items;
    }

    pub(crate) fn from_inner(inner: Rc<ArrayInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ArrayInner> {
        Rc::downgrade(&self.inner)
    }

    /// Get the length, subscribing the running effect to it.
    pub fn len(&self) -> usize {
        track(&self.inner.registry, FieldKey::Length);
        self.inner.items.borrow().len()
    }

    /// Check if the array is empty. Tracked like [`ReactiveArray::len`].
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an element, subscribing the running effect to its index.
    ///
    /// Out-of-range reads return `None` but still subscribe, so a later
    /// structural change that fills the index re-runs the reader.
    pub fn get(&self, index: usize) -> Option<Value> {
        track(&self.inner.registry, FieldKey::Index(index));
        self.get_untracked(index)
    }

    /// Read an element without subscribing anything.
    pub fn get_untracked(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Every element, subscribing to the length and to each index.
    pub fn values(&self) -> Vec<Value> {
        let items = self.inner.items.borrow().clone();
        track(&self.inner.registry, FieldKey::Length);
        for index in 0..items.len() {
            track(&self.inner.registry, FieldKey::Index(index));
        }
        items
    }

    /// Assign one element. Only subscribers of that index are re-run.
    ///
    /// Out-of-range indices are refused with [`Error::UnknownField`]; use
    /// [`ReactiveArray::push`] or [`ReactiveArray::splice`] to grow the array.
    pub fn set(&self, index: usize, value: impl Into<RawValue>) -> Result<bool> {
        let raw = value.into();
        {
            let items = self.inner.items.borrow();
            let current = items
                .get(index)
                .ok_or(Error::UnknownField(FieldKey::Index(index)))?;
            if current.is_same_as(&raw) {
                return Ok(false);
            }
        }

        let wrapped = wrap(&raw);
        let previous = self
            .inner
            .items
            .borrow_mut()
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, wrapped));
        drop(previous);
        self.inner.raw.set(index, raw);

        debug!(index, "array element changed");
        Runtime::propagate(self.inner.registry.subscribers(&FieldKey::Index(index)))?;
        Ok(true)
    }

    /// Append an element, returning the new length.
    pub fn push(&self, value: impl Into<RawValue>) -> Result<usize> {
        let value = wrap(&value.into());
        self.mutate("push", move |items| {
            items.push(value);
            items.len()
        })
    }

    /// Remove the last element.
    pub fn pop(&self) -> Result<Option<Value>> {
        self.mutate("pop", Vec::pop)
    }

    /// Remove the first element.
    pub fn shift(&self) -> Result<Option<Value>> {
        self.mutate("shift", |items| {
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        })
    }

    /// Prepend an element, returning the new length.
    pub fn unshift(&self, value: impl Into<RawValue>) -> Result<usize> {
        let value = wrap(&value.into());
        self.mutate("unshift", move |items| {
            items.insert(0, value);
            items.len()
        })
    }

    /// Remove `delete_count` elements at `start` and insert `items` there,
    /// returning the removed elements.
    ///
    /// `start` past the end is clamped to the length, and `delete_count` to
    /// the number of elements after `start`.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Result<Vec<Value>>
    where
        I: IntoIterator,
        I::Item: Into<RawValue>,
    {
        let inserted: Vec<Value> = items.into_iter().map(|item| wrap(&item.into())).collect();
        self.mutate("splice", move |current| {
            let start = start.min(current.len());
            let end = start + delete_count.min(current.len() - start);
            current.splice(start..end, inserted).collect()
        })
    }

    /// Sort in place with `compare`.
    ///
    /// The comparator works on a copy of the elements, so it may read this
    /// array; those reads see the order from before the sort.
    pub fn sort_by<F>(&self, compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let mut sorted = self.inner.items.borrow().clone();
        sorted.sort_by(compare);
        self.mutate("sort", move |items| *items = sorted)
    }

    /// Reverse the elements in place.
    pub fn reverse(&self) -> Result<()> {
        self.mutate("reverse", |items| items.reverse())
    }

    /// The caller's raw array backing this wrapper.
    pub fn raw(&self) -> &RawArray {
        &self.inner.raw
    }

    /// Number of effects subscribed to `key`.
    pub fn subscriber_count(&self, key: impl Into<FieldKey>) -> usize {
        self.inner.registry.subscriber_count(&key.into())
    }

    /// Whether both handles refer to the same wrapper.
    pub fn ptr_eq(&self, other: &ReactiveArray) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Untracked JSON snapshot.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        RawValue::Array(self.inner.raw.clone()).to_json()
    }

    /// Apply a structural change, mirror it into the raw array, then re-run
    /// every subscriber of the array.
    fn mutate<R>(&self, op: &'static str, apply: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R> {
        let (result, raw_items) = {
            let mut items = self.inner.items.borrow_mut();
            let result = apply(&mut *items);
            (result, items.iter().map(Value::to_raw).collect::<Vec<_>>())
        };
        self.inner.raw.replace_all(raw_items);

        debug!(op, "array structure changed");
        Runtime::propagate(self.inner.registry.all_subscribers())?;
        Ok(result)
    }
}

impl PartialEq for ReactiveArray {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ReactiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveArray")
            .field("addr", &Rc::as_ptr(&self.inner))
            .field("len", &self.inner.items.borrow().len())
            .finish()
    }
}
