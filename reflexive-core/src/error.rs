//! Error types for the store engine.
//!
//! Every variant is a contract violation raised synchronously at the call
//! that caused it. Nothing here is retried or recovered internally.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by the store engine and its cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// `init_store` was called with a missing or empty model.
    #[error("invalid props: {reason}")]
    InvalidProps {
        /// What was wrong with the supplied model.
        reason: String,
    },

    /// The cell tree was accessed before `init_store` or after `dispose_store`.
    #[error("the store is inaccessible because you must first invoke the `init_store` method")]
    NotInitialized,

    /// A leaf held a bare function, class instance or `undefined`.
    #[error(
        "the value of `{key}` (at `{path}`) is a bare {kind}; wrap it with `DetachedValue` to store it"
    )]
    DetachedValueRequired {
        /// The key of the offending leaf.
        key: String,
        /// The full dot-path of the offending leaf.
        path: String,
        /// Which kind of value was found.
        kind: &'static str,
    },

    /// A dot-path did not resolve to a cell.
    #[error("no store context found at path `{path}`")]
    PathNotFound {
        /// The path as requested.
        path: String,
    },

    /// `init_store_with` was given a disposal signal that has already fired.
    ///
    /// A store bound to it would be disposed before its first use.
    #[error("the supplied dispose signal has already fired; pass a fresh `DisposeSignal`")]
    DisposeSignalFired,

    /// A bare callable was passed to `set_value` as a literal replacement.
    #[error("a bare function cannot be passed to `set_value`; wrap it with `DetachedValue` or use the update form")]
    InvalidSetValueSignature,
}

impl StoreError {
    pub(crate) fn invalid_props(reason: impl Into<String>) -> Self {
        StoreError::InvalidProps {
            reason: reason.into(),
        }
    }

    pub(crate) fn path_not_found(path: impl Into<String>) -> Self {
        StoreError::PathNotFound { path: path.into() }
    }
}
