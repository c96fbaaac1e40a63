//! Reactive Primitives
//!
//! This module implements the cell-level reactive machinery: the cell
//! itself, its subscriptions, operator pipelines, and the disposal signal
//! that ends them.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A `StoreContext` holds one value. Setting it pushes the new value to every
//! subscriber synchronously, in subscription order, before `set_value`
//! returns.
//!
//! ## Pipelines
//!
//! A `Pipeline` sits between a cell and a callback and can transform, filter
//! or delay what the callback sees.
//!
//! ## Disposal
//!
//! Subscriptions are never cancelled one by one. Every cell is bound to a
//! `DisposeSignal`; when it fires, every subscription against every cell
//! bound to it closes. Forgetting a subscription therefore cannot leak it
//! past its store.
//!
//! # Implementation Notes
//!
//! Publishing is a plain loop over subscriber closures. The only deferred
//! work comes from `delay`/`debounce` stages, which schedule on the host
//! (tokio if a runtime is entered, a thread otherwise).

mod context;
mod dispose;
mod pipeline;
mod subscriber;
mod timer;

pub use context::{CellValue, SetValue, StoreContext};
pub use dispose::DisposeSignal;
pub use pipeline::{Pipeline, Sink};
pub use subscriber::{SubscriberId, Subscription};
