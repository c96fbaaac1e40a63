//! The Store
//!
//! This module turns a nested model into a tree of independently observable
//! cells and manages that tree's lifecycle.
//!
//! # Concepts
//!
//! ## Model
//!
//! A `Model` is a plain, fully populated nested map of `Value`s. Maps with
//! keys are structure; everything else is a leaf.
//!
//! ## DetachedValue
//!
//! Functions, class instances and `undefined` cannot be leaves on their own.
//! Wrapping them in `DetachedValue` opts them out of decomposition and makes
//! them a single cell. The same wrapper keeps a map from being walked.
//!
//! ## ReflexiveStore
//!
//! The engine. It builds the cell tree, hands out cells by dot-path, creates
//! ad-hoc cells bound to the same lifetime, and disposes everything at once.
//!
//! # Implementation Notes
//!
//! The leaf/interior decision is a `match` over the `Value` tagged union,
//! not a runtime type probe, and `DetachedValue` is its own variant.

mod builder;
mod engine;
mod model;
mod value;
mod walker;

pub use engine::{InitStoreConfig, ReflexiveStore, StoreTree};
pub use model::Model;
pub use value::{Callable, CallableFn, DetachedValue, Instance, Value};
pub use walker::{is_addressable_key, join_path, split_path, walk, Tree, TreeNode, PATH_SEPARATOR};
