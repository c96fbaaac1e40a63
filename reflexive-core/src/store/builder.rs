//! Cell Builder
//!
//! Turns one raw model leaf into a `StoreContext` bound to the owning store's
//! disposal signal.

use tracing::warn;

use super::value::Value;
use crate::error::{Result, StoreError};
use crate::reactive::{CellValue, DisposeSignal, Pipeline, StoreContext};

/// Builds cells for one store generation.
pub(crate) struct CellBuilder<'a> {
    dispose: &'a DisposeSignal,
}

impl<'a> CellBuilder<'a> {
    pub(crate) fn new(dispose: &'a DisposeSignal) -> Self {
        Self { dispose }
    }

    /// Build the cell for the leaf at `path`.
    ///
    /// Bare functions, class instances and `undefined` fail with
    /// `DetachedValueRequired`; a `Detached` leaf is unwrapped.
    pub(crate) fn build(&self, key: &str, path: &str, raw: &Value) -> Result<StoreContext<Value>> {
        if let Some(kind) = raw.requires_detaching() {
            warn!(target: "reflexive::store", key, path, kind, "leaf must be wrapped in DetachedValue");
            return Err(StoreError::DetachedValueRequired {
                key: key.to_string(),
                path: path.to_string(),
                kind,
            });
        }

        Ok(StoreContext::new(raw.clone().unwrap_detached(), self.dispose))
    }

    /// Build a standalone cell, optionally with a default pipeline.
    pub(crate) fn build_detached<T: CellValue>(&self, value: T, pipeline: Option<Pipeline<T, T>>) -> StoreContext<T> {
        match pipeline {
            Some(pipeline) => StoreContext::with_pipeline(value, self.dispose, pipeline),
            None => StoreContext::new(value, self.dispose),
        }
    }
}
