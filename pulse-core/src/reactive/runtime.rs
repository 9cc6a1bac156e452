//! Reactive Runtime
//!
//! The runtime connects writes to the effects they invalidate. Propagation is
//! synchronous: a write re-runs every affected effect to completion before it
//! returns, and an effect may itself write, which propagates recursively.
//!
//! # Propagation depth
//!
//! An effect that writes a field it also reads re-triggers itself without
//! end. Rather than let that exhaust the stack, the runtime refuses to nest
//! propagation deeper than [`RuntimeConfig::max_propagation_depth`]. The write
//! that hits the limit does not re-run anything and returns
//! [`Error::PropagationDepthExceeded`]; writes further out are unaffected.

use std::cell::Cell;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::context::ReactiveContext;
use super::effect::{Effect, EffectId};
use crate::error::{Error, Result};

/// Process-wide engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How many propagations may be nested inside one another.
    pub max_propagation_depth: usize,
}

impl RuntimeConfig {
    /// The settings used until [`Runtime::configure`] is called.
    pub const DEFAULT: Self = Self {
        max_propagation_depth: 64,
    };

    /// Parse a config from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

static CONFIG: RwLock<RuntimeConfig> = parking_lot::const_rwlock(RuntimeConfig::DEFAULT);

thread_local! {
    static PROPAGATION_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Decrements the propagation depth when dropped.
struct DepthGuard;

impl DepthGuard {
    fn enter(limit: usize) -> Result<Self> {
        PROPAGATION_DEPTH.with(|depth| {
            if depth.get() >= limit {
                return Err(Error::PropagationDepthExceeded { limit });
            }
            depth.set(depth.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        PROPAGATION_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Entry point for engine-wide state.
pub struct Runtime;

impl Runtime {
    /// Replace the process-wide configuration.
    pub fn configure(config: RuntimeConfig) {
        *CONFIG.write() = config;
    }

    /// Get a copy of the current configuration.
    pub fn config() -> RuntimeConfig {
        *CONFIG.read()
    }

    /// Check if we're inside a running effect.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// The innermost running effect, if any.
    pub fn current_effect() -> Option<EffectId> {
        ReactiveContext::current_effect().map(|effect| effect.id())
    }

    /// How many propagations are currently nested on this thread.
    pub fn propagation_depth() -> usize {
        PROPAGATION_DEPTH.with(Cell::get)
    }

    /// Re-run `effects` in order.
    ///
    /// Callers pass a snapshot, so effects that re-subscribe while running
    /// are not visited twice.
    pub(crate) fn propagate(effects: Vec<Effect>) -> Result<()> {
        if effects.is_empty() {
            return Ok(());
        }

        let limit = Self::config().max_propagation_depth;
        let _depth = DepthGuard::enter(limit).inspect_err(|_| {
            warn!(limit, "propagation depth limit reached, not re-running effects");
        })?;

        debug!(
            effects = effects.len(),
            depth = Self::propagation_depth(),
            "propagating change"
        );
        for effect in effects {
            effect.execute();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config = RuntimeConfig::from_json("{}").unwrap();
        assert_eq!(config, RuntimeConfig::DEFAULT);

        let config = RuntimeConfig::from_json(r#"{"max_propagation_depth": 8}"#).unwrap();
        assert_eq!(config.max_propagation_depth, 8);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let err = RuntimeConfig::from_json(r#"{"max_propagation_depth": "deep"}"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn propagate_runs_effects_in_order() {
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let effects: Vec<Effect> = (0..3)
            .map(|i| {
                let order = order.clone();
                Effect::new_lazy(move || order.borrow_mut().push(i))
            })
            .collect();

        Runtime::propagate(effects).unwrap();

        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn depth_is_restored_after_propagation() {
        let seen = Rc::new(Cell::new(0));
        let recorder = seen.clone();
        let effect = Effect::new_lazy(move || recorder.set(Runtime::propagation_depth()));

        assert_eq!(Runtime::propagation_depth(), 0);
        Runtime::propagate(vec![effect]).unwrap();

        assert_eq!(seen.get(), 1);
        assert_eq!(Runtime::propagation_depth(), 0);
    }

    #[test]
    fn tracking_reflects_running_effect() {
        assert!(!Runtime::is_tracking());
        let seen = Rc::new(Cell::new(None));
        let recorder = seen.clone();
        let effect = Effect::new(move || recorder.set(Runtime::current_effect()));
        assert_eq!(seen.get(), Some(effect.id()));
        assert!(Runtime::current_effect().is_none());
    }
}
