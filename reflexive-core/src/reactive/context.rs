//! Store Context (the Cell)
//!
//! A `StoreContext` is the atomic reactive unit: one value, one change
//! stream, and get/set/subscribe operations over them.
//!
//! # How Cells Work
//!
//! 1. `set_value` computes the next value (literal, update closure, or
//!    unwrapped `DetachedValue`), stores it, then pushes it synchronously to
//!    every live subscriber in registration order.
//!
//! 2. `on_change` subscribes to transitions strictly after the current one;
//!    the value present at subscription time is never replayed.
//!
//! 3. Every subscription registers a teardown on the owning store's disposal
//!    signal. When the signal fires the subscriber is removed and its
//!    subscription closed. A subscription made after the signal fired closes
//!    immediately without its callback ever running.
//!
//! Cells do not de-duplicate: equal values are published like any other.
//!
//! # Thread Safety
//!
//! The value lives behind a `parking_lot::RwLock`; the subscriber list
//! behind a `Mutex`. Writes to one cell are serialized by a per-cell
//! `ReentrantMutex` held from computing the next value until every
//! synchronous subscriber has been notified, so concurrent `update` calls
//! never lose a write and subscribers see values in the order they were
//! stored. The value and subscriber locks are never held while callbacks
//! run, and the write lock is re-entrant, so a callback may read or write
//! the cell that notified it.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{trace, warn};

use super::dispose::DisposeSignal;
use super::pipeline::{Pipeline, Sink};
use super::subscriber::Subscription;
use crate::error::{Result, StoreError};
use crate::store::{DetachedValue, Value};

/// Counter for generating unique cell IDs.
static CELL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_cell_id() -> u64 {
    CELL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Types that can live in a cell.
pub trait CellValue: Clone + Send + Sync + 'static {
    /// Whether the value is itself a function.
    ///
    /// A callable value cannot be passed to `set_value` as a bare
    /// replacement; it must arrive wrapped in `DetachedValue`.
    fn is_callable(&self) -> bool {
        false
    }

    /// Strip an in-band detached wrapper, if the type has one.
    fn unwrap_detached(self) -> Self {
        self
    }
}

macro_rules! plain_cell_value {
    ($($ty:ty),* $(,)?) => {
        $(impl CellValue for $ty {})*
    };
}

plain_cell_value!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &'static str,
);

impl<T: CellValue> CellValue for Vec<T> {}

impl<T: CellValue> CellValue for Option<T> {
    fn is_callable(&self) -> bool {
        self.as_ref().is_some_and(CellValue::is_callable)
    }
}

/// The payload of a `set_value` call.
pub enum SetValue<T> {
    /// Use the value as-is.
    Replace(T),
    /// Compute the next value from the current one.
    Update(Box<dyn FnOnce(&T) -> T + Send>),
    /// Unwrap and use the inner value. Required for callables.
    Detached(DetachedValue<T>),
}

impl<T> SetValue<T> {
    /// Build the update form from a closure.
    pub fn update<F>(f: F) -> Self
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        SetValue::Update(Box::new(f))
    }
}

impl<T: Debug> Debug for SetValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetValue::Replace(v) => f.debug_tuple("Replace").field(v).finish(),
            SetValue::Update(_) => f.write_str("Update(..)"),
            SetValue::Detached(d) => f.debug_tuple("Detached").field(d).finish(),
        }
    }
}

struct Entry<T> {
    subscription: Subscription,
    sink: Sink<T>,
}

struct CellInner<T> {
    id: u64,
    value: RwLock<T>,
    writer: ReentrantMutex<()>,
    subscribers: Mutex<Vec<Entry<T>>>,
    dispose: DisposeSignal,
    pipeline: Option<Pipeline<T, T>>,
}

/// A reactive cell holding a value of type `T`.
///
/// Clones share state: they are handles to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let counter = store.cell("counter")?;
///
/// counter.on_change(|v| println!("counter is now {v:?}"));
///
/// counter.update(|v| Value::Int(v.as_i64().unwrap_or(0) + 1))?;
/// assert_eq!(counter.get_value(), Value::Int(1));
/// ```
pub struct StoreContext<T: CellValue = Value> {
    inner: Arc<CellInner<T>>,
}

impl<T: CellValue> StoreContext<T> {
    /// Create a cell bound to `dispose`.
    pub(crate) fn new(value: T, dispose: &DisposeSignal) -> Self {
        Self::build(value, dispose, None)
    }

    /// Create a cell whose subscriptions all run through `pipeline` first.
    pub(crate) fn with_pipeline(value: T, dispose: &DisposeSignal, pipeline: Pipeline<T, T>) -> Self {
        Self::build(value, dispose, Some(pipeline))
    }

    fn build(value: T, dispose: &DisposeSignal, pipeline: Option<Pipeline<T, T>>) -> Self {
        Self {
            inner: Arc::new(CellInner {
                id: next_cell_id(),
                value: RwLock::new(value.unwrap_detached()),
                writer: ReentrantMutex::new(()),
                subscribers: Mutex::new(Vec::new()),
                dispose: dispose.clone(),
                pipeline,
            }),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the current value.
    pub fn get_value(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Apply `payload`, publish the result, and return the now-current value.
    pub fn set_value(&self, payload: SetValue<T>) -> Result<T> {
        let _writer = self.inner.writer.lock();
        let next = match payload {
            SetValue::Replace(value) => {
                if value.is_callable() {
                    warn!(target: "reflexive::cell", cell = self.inner.id, "bare function passed to set_value");
                    return Err(StoreError::InvalidSetValueSignature);
                }
                value.unwrap_detached()
            }
            SetValue::Update(f) => {
                let current = self.get_value();
                f(&current)
            }
            SetValue::Detached(detached) => detached.into_inner(),
        };

        *self.inner.value.write() = next.clone();
        self.publish(next);

        Ok(self.get_value())
    }

    /// Replace the value.
    pub fn set(&self, value: T) -> Result<T> {
        self.set_value(SetValue::Replace(value))
    }

    /// Compute the next value from the current one.
    pub fn update<F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        self.set_value(SetValue::update(f))
    }

    /// Replace the value with the contents of a `DetachedValue`.
    pub fn set_detached(&self, value: DetachedValue<T>) -> Result<T> {
        self.set_value(SetValue::Detached(value))
    }

    /// Subscribe to every value set after this call.
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on_change_with(Pipeline::new(), callback)
    }

    /// Subscribe through an operator pipeline.
    ///
    /// The subscription ends when the store is disposed; there is no
    /// per-subscription cancellation.
    pub fn on_change_with<U, F>(&self, pipeline: Pipeline<T, U>, callback: F) -> Subscription
    where
        U: Send + 'static,
        F: Fn(U) + Send + Sync + 'static,
    {
        let subscription = Subscription::new();

        let guard = subscription.clone();
        let sink: Sink<U> = Arc::new(move |value: U| {
            if !guard.is_closed() {
                callback(value);
            }
        });

        let pipeline = match &self.inner.pipeline {
            Some(default) => default.clone().then(pipeline),
            None => pipeline,
        };
        let head = pipeline.attach(sink, &subscription);

        self.inner.subscribers.lock().push(Entry {
            subscription: subscription.clone(),
            sink: head,
        });

        let cell = Arc::downgrade(&self.inner);
        let teardown = subscription.clone();
        self.inner.dispose.on_fire(move || {
            if let Some(cell) = cell.upgrade() {
                let id = teardown.id();
                cell.subscribers.lock().retain(|e| e.subscription.id() != id);
            }
            teardown.close();
        });

        trace!(
            target: "reflexive::cell",
            cell = self.inner.id,
            subscription = ?subscription.id(),
            closed = subscription.is_closed(),
            "subscribed"
        );
        subscription
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .iter()
            .filter(|e| !e.subscription.is_closed())
            .count()
    }

    /// Whether the owning store's disposal signal has fired.
    pub fn is_terminated(&self) -> bool {
        self.inner.dispose.is_fired()
    }

    /// Whether two handles refer to the same cell.
    pub fn ptr_eq(&self, other: &StoreContext<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Push `value` to every live subscriber.
    fn publish(&self, value: T) {
        let sinks: Vec<(Subscription, Sink<T>)> = {
            let mut subscribers = self.inner.subscribers.lock();
            subscribers.retain(|e| !e.subscription.is_closed());
            subscribers
                .iter()
                .map(|e| (e.subscription.clone(), Arc::clone(&e.sink)))
                .collect()
        };

        trace!(
            target: "reflexive::cell",
            cell = self.inner.id,
            subscribers = sinks.len(),
            "value published"
        );

        for (subscription, sink) in sinks {
            // An earlier callback may have closed this one.
            if !subscription.is_closed() {
                sink(value.clone());
            }
        }
    }
}

impl<T: CellValue> Clone for StoreContext<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for StoreContext<T>
where
    T: CellValue + Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContext")
            .field("id", &self.inner.id)
            .field("value", &self.get_value())
            .field("subscriber_count", &self.subscriber_count())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
