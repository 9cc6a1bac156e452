//! Reactive Context
//!
//! The reactive context tracks which effect is currently running, so that
//! field reads can be attributed to it.
//!
//! # Implementation
//!
//! We use a thread-local stack of active effects. Running an effect pushes it
//! onto the stack; the returned guard pops it again when dropped, even if the
//! effect panicked. Reads always attribute to the top of the stack, so an
//! effect that (directly or through a write's propagation) runs another effect
//! keeps tracking its own reads once the inner run has finished.

use std::cell::RefCell;

use super::effect::{Effect, EffectId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Effect>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    effect_id: EffectId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given effect.
    ///
    /// While the returned guard is alive, tracked reads subscribe `effect`.
    pub fn enter(effect: Effect) -> Self {
        let effect_id = effect.id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(effect));
        Self { effect_id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The innermost running effect, if any.
    pub fn current_effect() -> Option<Effect> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Number of effects currently on the stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(effect) = popped {
                debug_assert_eq!(
                    effect.id(),
                    self.effect_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.effect_id,
                    effect.id()
                );
            }
        });
    }
}
