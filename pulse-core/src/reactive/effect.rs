//! Effect Implementation
//!
//! An Effect is a side-effecting callback that re-runs whenever a field it
//! read on its previous run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs immediately to establish its initial
//!    subscriptions.
//!
//! 2. When a subscribed field changes, the writer re-runs the effect
//!    synchronously, before the write returns.
//!
//! 3. After each run, the effect removes itself from every field it did not
//!    read this time, so a field read only by an earlier run stops triggering
//!    it. Fields it read again keep the effect's place among their
//!    subscribers.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use tracing::trace;

use super::context::ReactiveContext;
use super::object::ReactiveObject;
use super::registry::{FieldKey, Registry};
use crate::error::Result;

/// Unique identifier for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// One (container, field) pair an effect is subscribed to.
struct Subscription {
    registry: Weak<Registry>,
    key: FieldKey,
}

impl Subscription {
    fn is(&self, registry: &Weak<Registry>, key: &FieldKey) -> bool {
        Weak::ptr_eq(&self.registry, registry) && self.key == *key
    }
}

type Subscriptions = SmallVec<[Subscription; 4]>;

/// Unsubscribes an effect from the fields its last run did not read again.
///
/// Runs on drop so a panicking effect is cleaned up too.
struct StaleSubscriptions<'a> {
    effect: &'a Effect,
    previous: Subscriptions,
}

impl Drop for StaleSubscriptions<'_> {
    fn drop(&mut self) {
        let stale: Vec<Subscription> = {
            let current = self.effect.inner.subscriptions.borrow();
            self.previous
                .drain(..)
                .filter(|old| !current.iter().any(|s| s.is(&old.registry, &old.key)))
                .collect()
        };
        for subscription in stale {
            if let Some(registry) = subscription.registry.upgrade() {
                registry.unsubscribe(&subscription.key, self.effect.id());
            }
        }
    }
}

struct EffectInner {
    id: EffectId,
    run: Box<dyn Fn()>,
    subscriptions: RefCell<Subscriptions>,
    run_count: Cell<usize>,
}

/// A callback re-run automatically when a field it read changes.
///
/// Cloning an `Effect` yields another handle to the same effect.
///
/// # Example
///
/// ```rust,ignore
/// let state = create(RawObject::new().with("count", 0))?;
/// let state = state.as_object().unwrap().clone();
///
/// let reader = state.clone();
/// Effect::new(move || {
///     println!("count is {:?}", reader.get("count"));
/// });
///
/// state.set("count", 5)?; // prints "count is Some(Number(5.0))"
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it once to establish its subscriptions.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it.
    ///
    /// It subscribes to nothing until [`Effect::execute`] is called.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            inner: Rc::new(EffectInner {
                id: EffectId::next(),
                run: Box::new(run),
                subscriptions: RefCell::new(SmallVec::new()),
                run_count: Cell::new(0),
            }),
        }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Run the effect, rebuilding its subscriptions from the reads it makes.
    pub fn execute(&self) {
        let _stale = StaleSubscriptions {
            effect: self,
            previous: std::mem::take(&mut *self.inner.subscriptions.borrow_mut()),
        };

        trace!(effect = self.id().raw(), "running effect");
        {
            let _ctx = ReactiveContext::enter(self.clone());
            (self.inner.run)();
        }

        self.inner.run_count.set(self.inner.run_count.get() + 1);
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of (container, field) pairs the effect is subscribed to.
    pub fn subscription_count(&self) -> usize {
        self.inner
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| s.registry.strong_count() > 0)
            .count()
    }

    /// Check if two handles refer to the same effect.
    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Note a read of `key` on `registry` during the current run. Returns
    /// false if this run already read it.
    pub(crate) fn record(&self, registry: &Rc<Registry>, key: FieldKey) -> bool {
        let registry = Rc::downgrade(registry);
        let mut subscriptions = self.inner.subscriptions.borrow_mut();
        if subscriptions.iter().any(|s| s.is(&registry, &key)) {
            return false;
        }
        subscriptions.push(Subscription { registry, key });
        true
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("subscription_count", &self.subscription_count())
            .finish()
    }
}

/// Register `callback` as an effect and run it immediately.
pub fn run_effect<F>(callback: F) -> Effect
where
    F: Fn() + 'static,
{
    Effect::new(callback)
}

/// Like [`run_effect`], but the effect is also subscribed to `keys` of
/// `target` on every run, whether or not the callback reads them.
///
/// Fails with [`crate::Error::UnknownField`] before anything runs if a key is
/// not a field of `target`.
pub fn run_effect_with_deps<F>(target: &ReactiveObject, keys: &[&str], callback: F) -> Result<Effect>
where
    F: Fn() + 'static,
{
    target.use_effect(keys, callback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::registry::track;

    #[test]
    fn effect_runs_on_creation() {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();

        let _effect = Effect::new(move || counter.set(counter.get() + 1));

        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();

        let effect = Effect::new_lazy(move || counter.set(counter.get() + 1));
        assert_eq!(runs.get(), 0);
        assert_eq!(effect.run_count(), 0);

        effect.execute();
        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        assert!(effect1.ptr_eq(&effect2));

        effect1.execute();
        assert_eq!(effect2.run_count(), 2);
    }

    #[test]
    fn effect_ids_are_unique() {
        let a = Effect::new_lazy(|| {});
        let b = Effect::new_lazy(|| {});
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn reads_subscribe_the_running_effect() {
        let registry = Rc::new(Registry::default());
        let reader = registry.clone();

        let effect = Effect::new(move || {
            track(&reader, FieldKey::from("a"));
            track(&reader, FieldKey::from("b"));
            track(&reader, FieldKey::from("a"));
        });

        assert_eq!(effect.subscription_count(), 2);
        assert_eq!(registry.subscriber_count(&FieldKey::from("a")), 1);
        assert_eq!(registry.subscriber_count(&FieldKey::from("b")), 1);
    }

    #[test]
    fn rerun_drops_fields_no_longer_read() {
        let registry = Rc::new(Registry::default());
        let reader = registry.clone();
        let read_b = Rc::new(Cell::new(true));
        let flag = read_b.clone();

        let effect = Effect::new(move || {
            track(&reader, FieldKey::from("a"));
            if flag.get() {
                track(&reader, FieldKey::from("b"));
            }
        });
        assert_eq!(registry.subscriber_count(&FieldKey::from("b")), 1);

        read_b.set(false);
        effect.execute();

        assert_eq!(registry.subscriber_count(&FieldKey::from("a")), 1);
        assert_eq!(registry.subscriber_count(&FieldKey::from("b")), 0);
        assert_eq!(effect.subscription_count(), 1);
    }

    #[test]
    fn rerun_keeps_position_on_fields_read_again() {
        let registry = Rc::new(Registry::default());
        let count = FieldKey::from("count");

        let reader = registry.clone();
        let first = Effect::new(move || {
            track(&reader, FieldKey::from("count"));
            track(&reader, FieldKey::from("x"));
        });
        let reader = registry.clone();
        let second = Effect::new(move || track(&reader, FieldKey::from("count")));

        first.execute();

        let order: Vec<EffectId> = registry.subscribers(&count).iter().map(Effect::id).collect();
        assert_eq!(order, vec![first.id(), second.id()]);
        assert_eq!(first.subscription_count(), 2);
    }

    #[test]
    fn reads_outside_an_effect_are_not_tracked() {
        let registry = Rc::new(Registry::default());
        track(&registry, FieldKey::from("a"));
        assert_eq!(registry.subscriber_count(&FieldKey::from("a")), 0);
    }
}
