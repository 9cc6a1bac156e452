//! Subscription Registry
//!
//! Every raw composite owns one registry, shared by its wrapper, mapping each
//! field key to the effects that read that field on their latest run.
//! Subscribers are kept in the order they first subscribed, which is the
//! order they are re-run in. An effect that reads a field again on a later
//! run keeps its place.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use super::context::ReactiveContext;
use super::effect::{Effect, EffectId};

/// The name or position under which a value sits in its container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// A named object field.
    Name(String),
    /// An array element.
    Index(usize),
    /// The length of an array.
    Length,
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Name(name) => f.write_str(name),
            FieldKey::Index(index) => write!(f, "[{index}]"),
            FieldKey::Length => f.write_str("length"),
        }
    }
}

impl From<&str> for FieldKey {
    fn from(name: &str) -> Self {
        FieldKey::Name(name.to_owned())
    }
}

impl From<String> for FieldKey {
    fn from(name: String) -> Self {
        FieldKey::Name(name)
    }
}

impl From<usize> for FieldKey {
    fn from(index: usize) -> Self {
        FieldKey::Index(index)
    }
}

/// Per-container map from field key to subscribed effects.
#[derive(Default)]
pub(crate) struct Registry {
    subscribers: RefCell<IndexMap<FieldKey, IndexMap<EffectId, Effect>>>,
}

impl Registry {
    /// Subscribe `effect` to `key`. Returns false if it already was.
    pub(crate) fn subscribe(&self, key: FieldKey, effect: &Effect) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let effects = subscribers.entry(key).or_default();
        if effects.contains_key(&effect.id()) {
            return false;
        }
        effects.insert(effect.id(), effect.clone());
        true
    }

    pub(crate) fn unsubscribe(&self, key: &FieldKey, id: EffectId) {
        if let Some(effects) = self.subscribers.borrow_mut().get_mut(key) {
            effects.shift_remove(&id);
        }
    }

    /// Snapshot of the effects subscribed to `key`, in insertion order.
    pub(crate) fn subscribers(&self, key: &FieldKey) -> Vec<Effect> {
        self.subscribers
            .borrow()
            .get(key)
            .map(|effects| effects.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of every effect subscribed to any key, each listed once.
    pub(crate) fn all_subscribers(&self) -> Vec<Effect> {
        let subscribers = self.subscribers.borrow();
        let mut seen = IndexSet::new();
        let mut all = Vec::new();
        for effect in subscribers.values().flat_map(|effects| effects.values()) {
            if seen.insert(effect.id()) {
                all.push(effect.clone());
            }
        }
        all
    }

    pub(crate) fn subscriber_count(&self, key: &FieldKey) -> usize {
        self.subscribers
            .borrow()
            .get(key)
            .map(IndexMap::len)
            .unwrap_or(0)
    }
}

/// Record a read of `key` on the container owning `registry`.
pub(crate) fn track(registry: &Rc<Registry>, key: FieldKey) {
    let Some(effect) = ReactiveContext::current_effect() else {
        return;
    };
    if effect.record(registry, key.clone()) {
        trace!(effect = effect.id().raw(), key = %key, "tracked read");
        // Already subscribed from the previous run: keeps its position.
        registry.subscribe(key, &effect);
    }
}
