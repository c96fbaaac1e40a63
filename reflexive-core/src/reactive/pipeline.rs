//! Operator Pipelines
//!
//! A `Pipeline<T, U>` is an ordered chain of stages interposed between a
//! cell's raw value transitions (`T`) and a subscriber callback (`U`).
//!
//! # How Pipelines Work
//!
//! A pipeline is a recipe, not a running thing. Each `on_change` call
//! instantiates it against one subscription: the stages are wired back to
//! front around the callback, producing the head sink the cell pushes into.
//! Per-subscription state (the `skip` counter, the `debounce` generation,
//! the last value seen by `distinct_until_changed`) therefore never leaks
//! between subscribers, and one pipeline can be reused for many of them.
//!
//! Stages fall in three groups:
//!
//! - Transform/filter: `map`, `filter`, `filter_map`, `tap`, `skip`, `take`,
//!   `distinct_until_changed`
//! - Timing: `delay`, `debounce` (see `timer`)
//! - Lifecycle: `finalize`, which runs once when the subscription closes

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::subscriber::Subscription;
use super::timer::Timer;

/// Push-side end of a pipeline stage.
pub type Sink<T> = Arc<dyn Fn(T) + Send + Sync>;

type Stage<T, U> = Arc<dyn Fn(Sink<U>, &Subscription) -> Sink<T> + Send + Sync>;

/// A reusable chain of operators from `T` to `U`.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::new()
///     .skip(3)
///     .map(|v: i64| v * 2)
///     .debounce(Duration::from_millis(50));
///
/// counter.on_change_with(pipeline, |doubled| println!("{doubled}"));
/// ```
pub struct Pipeline<T, U = T> {
    stage: Stage<T, U>,
}

impl<T> Pipeline<T, T>
where
    T: Send + 'static,
{
    /// Create the identity pipeline.
    pub fn new() -> Self {
        Self {
            stage: Arc::new(|sink: Sink<T>, _: &Subscription| sink),
        }
    }
}

impl<T> Default for Pipeline<T, T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, U> Clone for Pipeline<T, U> {
    fn clone(&self) -> Self {
        Self {
            stage: Arc::clone(&self.stage),
        }
    }
}

impl<T, U> fmt::Debug for Pipeline<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

impl<T, U> Pipeline<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    /// Append a raw stage.
    fn push<V, S>(self, stage: S) -> Pipeline<T, V>
    where
        V: Send + 'static,
        S: Fn(Sink<V>, &Subscription) -> Sink<U> + Send + Sync + 'static,
    {
        let prev = self.stage;
        Pipeline {
            stage: Arc::new(move |sink: Sink<V>, sub: &Subscription| {
                let mid = stage(sink, sub);
                prev(mid, sub)
            }),
        }
    }

    /// Wire the pipeline around `sink` for one subscription.
    pub(crate) fn attach(&self, sink: Sink<U>, sub: &Subscription) -> Sink<T> {
        (self.stage)(sink, sub)
    }

    /// Append every stage of `next`.
    pub fn then<V>(self, next: Pipeline<U, V>) -> Pipeline<T, V>
    where
        V: Send + 'static,
    {
        let next_stage = next.stage;
        self.push(move |sink: Sink<V>, sub: &Subscription| next_stage(sink, sub))
    }

    /// Transform every value.
    pub fn map<V, F>(self, f: F) -> Pipeline<T, V>
    where
        V: Send + 'static,
        F: Fn(U) -> V + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.push(move |sink: Sink<V>, _: &Subscription| {
            let f = Arc::clone(&f);
            let out: Sink<U> = Arc::new(move |value: U| sink(f(value)));
            out
        })
    }

    /// Drop values that fail `predicate`.
    pub fn filter<F>(self, predicate: F) -> Pipeline<T, U>
    where
        F: Fn(&U) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        self.push(move |sink: Sink<U>, _: &Subscription| {
            let predicate = Arc::clone(&predicate);
            let out: Sink<U> = Arc::new(move |value: U| {
                if predicate(&value) {
                    sink(value);
                }
            });
            out
        })
    }

    /// Transform and filter in one step.
    pub fn filter_map<V, F>(self, f: F) -> Pipeline<T, V>
    where
        V: Send + 'static,
        F: Fn(U) -> Option<V> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.push(move |sink: Sink<V>, _: &Subscription| {
            let f = Arc::clone(&f);
            let out: Sink<U> = Arc::new(move |value: U| {
                if let Some(next) = f(value) {
                    sink(next);
                }
            });
            out
        })
    }

    /// Observe values without changing them.
    pub fn tap<F>(self, f: F) -> Pipeline<T, U>
    where
        F: Fn(&U) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.push(move |sink: Sink<U>, _: &Subscription| {
            let f = Arc::clone(&f);
            let out: Sink<U> = Arc::new(move |value: U| {
                f(&value);
                sink(value);
            });
            out
        })
    }

    /// Ignore the first `count` values.
    pub fn skip(self, count: usize) -> Pipeline<T, U> {
        self.push(move |sink: Sink<U>, _: &Subscription| {
            let remaining = AtomicUsize::new(count);
            let out: Sink<U> = Arc::new(move |value: U| {
                let skipped = remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(1))
                    .is_ok();
                if !skipped {
                    sink(value);
                }
            });
            out
        })
    }

    /// Forward the first `count` values, then complete the subscription.
    ///
    /// Completion waits for values still travelling through later timing
    /// stages; anything arriving after the `count`-th value is dropped here.
    pub fn take(self, count: usize) -> Pipeline<T, U> {
        self.push(move |sink: Sink<U>, sub: &Subscription| {
            if count == 0 {
                sub.complete();
            }
            let remaining = AtomicUsize::new(count);
            let sub = sub.clone();
            let out: Sink<U> = Arc::new(move |value: U| {
                if let Ok(before) =
                    remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(1))
                {
                    sink(value);
                    if before == 1 {
                        sub.complete();
                    }
                }
            });
            out
        })
    }

    /// Drop values equal to the previously forwarded one.
    pub fn distinct_until_changed(self) -> Pipeline<T, U>
    where
        U: PartialEq + Clone,
    {
        self.push(move |sink: Sink<U>, _: &Subscription| {
            let last: Mutex<Option<U>> = Mutex::new(None);
            let out: Sink<U> = Arc::new(move |value: U| {
                {
                    let mut last = last.lock();
                    if last.as_ref() == Some(&value) {
                        return;
                    }
                    *last = Some(value.clone());
                }
                sink(value);
            });
            out
        })
    }

    /// Shift every value forward in time by `after`.
    pub fn delay(self, after: Duration) -> Pipeline<T, U> {
        self.push(move |sink: Sink<U>, sub: &Subscription| {
            let timer = Timer::current();
            let sub = sub.clone();
            let out: Sink<U> = Arc::new(move |value: U| {
                let sink = Arc::clone(&sink);
                let sub = sub.clone();
                let hold = sub.hold();
                timer.schedule(after, move || {
                    let _hold = hold;
                    if !sub.is_closed() {
                        sink(value);
                    }
                });
            });
            out
        })
    }

    /// Forward a value only once `quiet` has passed without a newer one.
    pub fn debounce(self, quiet: Duration) -> Pipeline<T, U> {
        self.push(move |sink: Sink<U>, sub: &Subscription| {
            let timer = Timer::current();
            let generation = Arc::new(AtomicU64::new(0));
            let sub = sub.clone();
            let out: Sink<U> = Arc::new(move |value: U| {
                let current = generation.fetch_add(1, Ordering::SeqCst) + 1;
                let generation = Arc::clone(&generation);
                let sink = Arc::clone(&sink);
                let sub = sub.clone();
                let hold = sub.hold();
                timer.schedule(quiet, move || {
                    let _hold = hold;
                    if generation.load(Ordering::SeqCst) == current && !sub.is_closed() {
                        sink(value);
                    }
                });
            });
            out
        })
    }

    /// Run `f` once when the subscription closes.
    pub fn finalize<F>(self, f: F) -> Pipeline<T, U>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.push(move |sink: Sink<U>, sub: &Subscription| {
            let f = Arc::clone(&f);
            sub.add_finalizer(move || f());
            sink
        })
    }
}
