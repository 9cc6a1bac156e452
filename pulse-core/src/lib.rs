//! Pulse Core
//!
//! This crate provides the reactive engine behind Pulse: it wraps plain
//! structured data, records which effects read which fields, and re-runs
//! exactly those effects when the fields are written.
//!
//! It implements:
//!
//! - Raw data values with identity ([`RawValue`], [`RawObject`], [`RawArray`])
//! - Deep, identity-preserving wrapping into reactive containers
//! - Per-field dependency tracking and synchronous change propagation
//! - Coarse invalidation for structural array mutations
//!
//! # Architecture
//!
//! - `raw`: Caller-owned data, JSON conversion and snapshots
//! - `reactive`: Wrapping, tracking context, subscription registries, effects
//! - `error`: The crate's error type
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use pulse_core::{create, run_effect, RawObject};
//!
//! let state = create(RawObject::new().with("count", 0)).unwrap();
//! let state = state.as_object().unwrap().clone();
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let (reader, log) = (state.clone(), seen.clone());
//! run_effect(move || {
//!     let count = reader.get("count").and_then(|v| v.as_i64());
//!     log.borrow_mut().push(count);
//! });
//!
//! state.set("count", 0).unwrap();
//! state.set("count", 1).unwrap();
//! state.set("count", 1).unwrap();
//!
//! assert_eq!(*seen.borrow(), vec![Some(0), Some(1)]);
//! ```

pub mod error;
pub mod raw;
pub mod reactive;

pub use error::{Error, Result};
pub use raw::{RawArray, RawObject, RawValue};
pub use reactive::{
    create, run_effect, run_effect_with_deps, wrap, wrap_array, wrap_object, Effect, EffectId,
    FieldKey, ReactiveArray, ReactiveContext, ReactiveObject, Runtime, RuntimeConfig, Schema, Value,
};
