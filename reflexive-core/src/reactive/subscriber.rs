//! Subscriber types for the reactive system.
//!
//! A Subscription represents one `on_change` registration against a cell.
//! It carries no unsubscribe operation: every subscription lives until the
//! owning store's disposal signal fires (or until a `take` stage completes it).

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Unique identifier for a subscriber.
///
/// Each subscription gets a unique ID when created. The cell uses it to drop
/// the subscriber from its notification list on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Finalizer = Box<dyn FnOnce() + Send>;

struct SubscriptionInner {
    id: SubscriberId,
    closed: AtomicBool,
    completing: AtomicBool,
    pending: AtomicUsize,
    finalizers: Mutex<Vec<Finalizer>>,
}

/// Read-only handle to a live (or finished) change subscription.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                id: SubscriberId::new(),
                closed: AtomicBool::new(false),
                completing: AtomicBool::new(false),
                pending: AtomicUsize::new(0),
                finalizers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Get the subscription's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Whether the subscription has terminated.
    ///
    /// A closed subscription never invokes its callback again.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Register a hook to run when the subscription closes.
    ///
    /// Runs immediately if the subscription is already closed.
    pub(crate) fn add_finalizer<F>(&self, finalizer: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut finalizers = self.inner.finalizers.lock();
            if !self.is_closed() {
                finalizers.push(Box::new(finalizer));
                return;
            }
        }
        finalizer();
    }

    /// Keep the subscription open until the returned guard drops.
    ///
    /// Timing stages hold one guard per scheduled emission so that a
    /// completion requested upstream waits for the emission to land.
    pub(crate) fn hold(&self) -> Hold {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        Hold {
            subscription: self.clone(),
        }
    }

    /// Close once every outstanding `Hold` has dropped.
    ///
    /// Unlike `close`, values already in flight still reach the callback.
    pub(crate) fn complete(&self) {
        self.inner.completing.store(true, Ordering::SeqCst);
        if self.inner.pending.load(Ordering::SeqCst) == 0 {
            self.close();
        }
    }

    /// Whether `complete` was called, whether or not it has closed yet.
    pub(crate) fn is_completing(&self) -> bool {
        self.inner.completing.load(Ordering::SeqCst)
    }

    /// Close the subscription and run its finalizers.
    ///
    /// Returns `false` if it was already closed.
    pub(crate) fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let finalizers = std::mem::take(&mut *self.inner.finalizers.lock());
        for finalizer in finalizers {
            finalizer();
        }
        true
    }
}

/// An in-flight emission on a subscription. See `Subscription::hold`.
pub(crate) struct Hold {
    subscription: Subscription,
}

impl Drop for Hold {
    fn drop(&mut self) {
        let inner = &self.subscription.inner;
        if inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 && inner.completing.load(Ordering::SeqCst) {
            self.subscription.close();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
