//! Deep Wrapping
//!
//! `wrap` turns raw data into reactive data, all the way down. Every nested
//! object and array element is wrapped eagerly, so a read of `a.b.c` is
//! tracked on `a.b`'s own registry without any wrapping at access time.
//!
//! # Identity
//!
//! A thread-local cache maps each raw composite (by address) to its wrapper,
//! held weakly. Wrapping the same raw value twice, even from two unrelated
//! `create` calls, yields the same wrapper for as long as that wrapper is
//! alive. Once it is dropped, the next wrap builds a new one over the same
//! raw data and the same subscription registry, so effects registered
//! through the old wrapper still re-run. A wrapper is cached before its
//! children are wrapped, so raw data that contains itself wraps to a wrapper
//! that contains itself.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Weak;

use tracing::trace;

use super::array::{ArrayInner, ReactiveArray};
use super::object::{ObjectInner, ReactiveObject};
use super::value::Value;
use crate::error::{Error, Result};
use crate::raw::{RawArray, RawObject, RawValue};

/// Dead entries are swept once the cache grows past this many entries.
const INITIAL_PRUNE_THRESHOLD: usize = 256;

enum Wrapper {
    Object(Weak<ObjectInner>),
    Array(Weak<ArrayInner>),
}

impl Wrapper {
    fn is_alive(&self) -> bool {
        match self {
            Wrapper::Object(weak) => weak.strong_count() > 0,
            Wrapper::Array(weak) => weak.strong_count() > 0,
        }
    }
}

struct IdentityCache {
    wrappers: HashMap<usize, Wrapper>,
    prune_at: usize,
}

impl IdentityCache {
    fn remember(&mut self, addr: usize, wrapper: Wrapper) {
        if self.wrappers.len() >= self.prune_at {
            self.wrappers.retain(|_, wrapper| wrapper.is_alive());
            self.prune_at = (self.wrappers.len() * 2).max(INITIAL_PRUNE_THRESHOLD);
        }
        self.wrappers.insert(addr, wrapper);
    }
}

thread_local! {
    static CACHE: RefCell<IdentityCache> = RefCell::new(IdentityCache {
        wrappers: HashMap::new(),
        prune_at: INITIAL_PRUNE_THRESHOLD,
    });
}

fn cached_object(raw: &RawObject) -> Option<ReactiveObject> {
    CACHE.with(|cache| match cache.borrow().wrappers.get(&raw.addr()) {
        Some(Wrapper::Object(weak)) => weak.upgrade().map(ReactiveObject::from_inner),
        _ => None,
    })
}

fn cached_array(raw: &RawArray) -> Option<ReactiveArray> {
    CACHE.with(|cache| match cache.borrow().wrappers.get(&raw.addr()) {
        Some(Wrapper::Array(weak)) => weak.upgrade().map(ReactiveArray::from_inner),
        _ => None,
    })
}

fn remember(addr: usize, wrapper: Wrapper) {
    CACHE.with(|cache| cache.borrow_mut().remember(addr, wrapper));
}

/// Wrap a raw value. Scalars are returned unchanged.
pub fn wrap(raw: &RawValue) -> Value {
    match raw {
        RawValue::Null => Value::Null,
        RawValue::Bool(b) => Value::Bool(*b),
        RawValue::Number(n) => Value::Number(*n),
        RawValue::String(s) => Value::String(s.clone()),
        RawValue::Object(object) => Value::Object(wrap_object(object)),
        RawValue::Array(array) => Value::Array(wrap_array(array)),
    }
}

/// Wrap a raw object, reusing its existing wrapper if there is one.
pub fn wrap_object(raw: &RawObject) -> ReactiveObject {
    if let Some(existing) = cached_object(raw) {
        return existing;
    }

    let object = ReactiveObject::detached(raw.clone());
    remember(raw.addr(), Wrapper::Object(object.downgrade()));

    let fields = raw
        .entries()
        .into_iter()
        .map(|(key, value)| (key, wrap(&value)))
        .collect();
    object.attach(fields);

    trace!(fields = raw.len(), "wrapped object");
    object
}

/// Wrap a raw array, reusing its existing wrapper if there is one.
pub fn wrap_array(raw: &RawArray) -> ReactiveArray {
    if let Some(existing) = cached_array(raw) {
        return existing;
    }

    let array = ReactiveArray::detached(raw.clone());
    remember(raw.addr(), Wrapper::Array(array.downgrade()));

    let items = raw.to_vec().iter().map(wrap).collect();
    array.attach(items);

    trace!(len = raw.len(), "wrapped array");
    array
}

/// Wrap caller data into a reactive container.
///
/// Fails with [`Error::NotComposite`] for scalars, which have nothing to
/// observe.
pub fn create(data: impl Into<RawValue>) -> Result<Value> {
    let raw = data.into();
    if !raw.is_composite() {
        return Err(Error::NotComposite);
    }
    Ok(wrap(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_pass_through() {
        assert_eq!(wrap(&RawValue::from(3)), Value::Number(3.0));
        assert_eq!(wrap(&RawValue::from("x")), Value::String("x".into()));
        assert_eq!(wrap(&RawValue::Null), Value::Null);
    }

    #[test]
    fn create_rejects_scalars() {
        assert!(matches!(create(5), Err(Error::NotComposite)));
        assert!(create(RawObject::new()).is_ok());
        assert!(create(RawArray::new()).is_ok());
    }

    #[test]
    fn wrapping_is_idempotent() {
        let raw = RawObject::new().with("count", 0);
        let first = wrap_object(&raw);
        let second = wrap_object(&raw);
        assert!(first.ptr_eq(&second));

        let array = RawArray::from_iter([1, 2]);
        assert!(wrap_array(&array).ptr_eq(&wrap_array(&array)));
    }

    #[test]
    fn shared_raw_resolves_to_one_wrapper() {
        let shared = RawObject::new().with("v", 1);
        let left = create(RawObject::new().with("child", shared.clone())).unwrap();
        let right = create(RawObject::new().with("child", shared)).unwrap();

        let left_child = left.as_object().and_then(|o| o.get("child")).unwrap();
        let right_child = right.as_object().and_then(|o| o.get("child")).unwrap();
        assert_eq!(left_child, right_child);
    }

    #[test]
    fn nested_values_are_wrapped_eagerly() {
        let inner = RawObject::new().with("b", 1);
        let outer = wrap_object(&RawObject::new().with("a", inner.clone()));

        // The nested wrapper already exists in the cache.
        let cached = cached_object(&inner).expect("nested object wrapped");
        let read = outer.get("a").unwrap();
        assert!(read.as_object().unwrap().ptr_eq(&cached));
    }

    #[test]
    fn self_referencing_raw_wraps() {
        let raw = RawObject::new().with("n", 1);
        raw.insert("me", raw.clone());

        let object = wrap_object(&raw);
        let me = object.get("me").unwrap();
        assert!(me.as_object().unwrap().ptr_eq(&object));
    }

    #[test]
    fn dropped_wrapper_is_rebuilt() {
        let raw = RawObject::new().with("x", 1);
        let first = wrap_object(&raw);
        first.set("x", 2).unwrap();
        drop(first);

        let second = wrap_object(&raw);
        assert_eq!(second.get("x"), Some(Value::Number(2.0)));
    }

    #[test]
    fn rebuilt_wrapper_keeps_subscribers() {
        use crate::reactive::run_effect_with_deps;
        use std::cell::Cell;
        use std::rc::Rc;

        let raw = RawObject::new().with("text", "a");
        let runs = Rc::new(Cell::new(0));
        {
            let state = wrap_object(&raw);
            let counter = runs.clone();
            run_effect_with_deps(&state, &["text"], move || counter.set(counter.get() + 1)).unwrap();
        }
        assert_eq!(runs.get(), 1);

        let state = wrap_object(&raw);
        assert!(state.set("text", "b").unwrap());
        assert_eq!(runs.get(), 2);
        assert_eq!(state.subscriber_count("text"), 1);
    }

    #[test]
    fn rebuilt_array_wrapper_keeps_subscribers() {
        use crate::reactive::run_effect;
        use std::cell::Cell;
        use std::rc::Rc;

        let raw = RawArray::from_iter([1, 2]);
        let seen = Rc::new(Cell::new(0));
        let (reader, out) = (raw.clone(), seen.clone());
        run_effect(move || out.set(wrap_array(&reader).len()));
        assert_eq!(seen.get(), 2);

        wrap_array(&raw).push(3).unwrap();
        assert_eq!(seen.get(), 3);
    }
}
