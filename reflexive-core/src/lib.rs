//! Reflexive Core
//!
//! This crate provides the engine behind the Reflexive store. It takes an
//! arbitrary nested model and turns every leaf into an independently
//! observable, independently settable cell, while keeping the model's shape
//! for access. It implements:
//!
//! - Reactive cells with get/set/subscribe
//! - Operator pipelines on change subscriptions (map, skip, debounce, ...)
//! - A recursive model walker with explicit leaf classification
//! - A store engine with a re-entrant init/dispose lifecycle
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: cells, subscriptions, pipelines and the disposal signal
//! - `store`: the value model, the walker, the cell builder and the engine
//!
//! # Example
//!
//! ```rust,ignore
//! use reflexive_core::{Model, ReflexiveStore, Value};
//!
//! let store = ReflexiveStore::new();
//! store.init_store(Model::new().with("counter", 0).with("name", ""))?;
//!
//! let counter = store.cell("counter")?;
//! counter.on_change(|v| println!("counter: {v:?}"));
//!
//! counter.update(|v| Value::Int(v.as_i64().unwrap_or(0) + 1))?;
//! // Prints: "counter: Int(1)"
//!
//! store.dispose_store();
//! // Every subscription is closed.
//! ```

pub mod error;
pub mod reactive;
pub mod store;

pub use error::{Result, StoreError};
pub use reactive::{CellValue, DisposeSignal, Pipeline, SetValue, StoreContext, Subscription};
pub use store::{DetachedValue, InitStoreConfig, Model, ReflexiveStore, StoreTree, Value};
