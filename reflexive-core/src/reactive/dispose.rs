//! Disposal Signal
//!
//! The single store-wide event whose firing terminates every subscription
//! created against the store's cells.
//!
//! # How It Works
//!
//! The signal holds a list of teardown closures. Each cell subscription
//! registers one. Firing the signal flips it to "fired" and drains the list,
//! invoking every teardown exactly once in registration order. A teardown
//! registered after the signal has fired runs immediately, so a late
//! subscriber completes without its callback ever being called.
//!
//! Handles are cheap to clone and all clones share the same state, which lets
//! an external owner hand one signal to several stores and dispose them in
//! lock-step.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

type Teardown = Box<dyn FnOnce() + Send>;

struct SignalInner {
    id: u64,
    fired: AtomicBool,
    teardowns: Mutex<Vec<Teardown>>,
}

/// A one-shot, multi-listener disposal event.
#[derive(Clone)]
pub struct DisposeSignal {
    inner: Arc<SignalInner>,
}

impl DisposeSignal {
    /// Create a new signal that has not fired yet.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
                fired: AtomicBool::new(false),
                teardowns: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether the signal has already fired.
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    /// Register a teardown to run when the signal fires.
    ///
    /// If the signal already fired, the teardown runs before this returns.
    pub fn on_fire<F>(&self, teardown: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut teardowns = self.inner.teardowns.lock();
            if !self.is_fired() {
                teardowns.push(Box::new(teardown));
                return;
            }
        }
        teardown();
    }

    /// Fire the signal.
    ///
    /// Returns `true` if this call performed the firing, `false` if the
    /// signal had already fired (in which case nothing runs).
    pub fn fire(&self) -> bool {
        if self.inner.fired.swap(true, Ordering::SeqCst) {
            return false;
        }

        // Take the list first so teardowns may register or fire re-entrantly.
        let teardowns = std::mem::take(&mut *self.inner.teardowns.lock());
        trace!(
            target: "reflexive::store",
            signal = self.inner.id,
            teardowns = teardowns.len(),
            "disposal signal fired"
        );
        for teardown in teardowns {
            teardown();
        }
        true
    }

    /// Number of teardowns waiting for the signal.
    pub fn pending(&self) -> usize {
        self.inner.teardowns.lock().len()
    }

    /// Whether two handles refer to the same signal.
    pub fn ptr_eq(&self, other: &DisposeSignal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for DisposeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DisposeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeSignal")
            .field("id", &self.inner.id)
            .field("fired", &self.is_fired())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn fire_runs_teardowns_in_order_once() {
        let signal = DisposeSignal::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            signal.on_fire(move || order.lock().push(i));
        }

        assert_eq!(signal.pending(), 3);
        assert!(signal.fire());
        assert!(!signal.fire());
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(signal.pending(), 0);
    }

    #[test]
    fn late_teardown_runs_immediately() {
        let signal = DisposeSignal::new();
        signal.fire();

        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        signal.on_fire(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.pending(), 0);
    }

    #[test]
    fn clones_share_state() {
        let signal = DisposeSignal::new();
        let clone = signal.clone();

        clone.fire();
        assert!(signal.is_fired());
        assert!(signal.ptr_eq(&clone));
        assert!(!signal.ptr_eq(&DisposeSignal::new()));
    }

    #[test]
    fn teardown_may_fire_reentrantly() {
        let signal = DisposeSignal::new();
        let inner = signal.clone();
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();

        signal.on_fire(move || {
            // Already fired: must be a no-op rather than a deadlock.
            assert!(!inner.fire());
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.fire();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
