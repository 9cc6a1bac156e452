//! Reactive Data
//!
//! This module wraps plain structured data so that effects reading it are
//! re-run automatically when the fields they read change.
//!
//! # Concepts
//!
//! ## Wrapping
//!
//! [`wrap`] (or [`create`]) turns a [`RawValue`](crate::RawValue) into a
//! [`Value`]. Objects become [`ReactiveObject`]s and arrays become
//! [`ReactiveArray`]s, recursively and eagerly. Each raw composite has at most
//! one live wrapper, so wrapping is reference-stable.
//!
//! ## Effects
//!
//! An [`Effect`] is a callback run once on creation and again whenever a
//! field it read on its latest run is written with a different value. Reads
//! are attributed through a thread-local stack of running effects
//! ([`ReactiveContext`]), so effects started from inside other effects track
//! correctly.
//!
//! ## Propagation
//!
//! Every container has its own subscription registry, one entry per field.
//! The registry belongs to the raw composite, so effects stay subscribed even
//! if the wrapper is dropped and rebuilt.
//! A write re-runs the field's subscribers synchronously before returning.
//! Structural array mutations re-run every subscriber of the array.
//!
//! # Implementation Notes
//!
//! Everything is single-threaded: handles are `Rc`-based and never cross
//! threads. After each run an effect drops the subscriptions it did not make
//! again, so a field read only by earlier runs stops re-running it.

mod array;
mod context;
mod effect;
mod object;
pub(crate) mod registry;
mod runtime;
mod schema;
mod value;
pub mod wrap;

pub use array::ReactiveArray;
pub use context::ReactiveContext;
pub use effect::{run_effect, run_effect_with_deps, Effect, EffectId};
pub use object::ReactiveObject;
pub use registry::FieldKey;
pub use runtime::{Runtime, RuntimeConfig};
pub use schema::Schema;
pub use value::Value;
pub use wrap::{create, wrap, wrap_array, wrap_object};
