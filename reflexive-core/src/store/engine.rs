//! Store Engine
//!
//! `ReflexiveStore` owns the cell tree built from a model and drives its
//! lifecycle.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --init_store--> Ready --dispose_store--> Disposed
//!                                 ^                         |
//!                                 +-------init_store--------+
//! ```
//!
//! 1. `init_store` validates the model, walks it with the cell builder,
//!    marks the store ready, then drains the on-init callbacks.
//!
//! 2. `dispose_store` drains the on-dispose callbacks while the tree is still
//!    live, drops the tree, marks the store disposed, and fires the disposal
//!    signal once. Firing the signal terminates every subscription made
//!    against the store's cells, ad-hoc cells included. While the callbacks
//!    run the store is disposing: further `dispose_store` calls return at once.
//!
//! `ready_context` exposes the ready flag as a cell. It publishes `true` once
//! the on-init callbacks have run and `false` at disposal, after which its
//! subscriptions end; the next cycle gets a fresh cell.
//!
//! Callbacks are one-shot per cycle: each list is cleared as it is drained,
//! and a callback registered after its transition waits for the next one.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::builder::CellBuilder;
use super::model::Model;
use super::value::{DetachedValue, Value};
use super::walker::{self, Tree, TreeNode};
use crate::error::{Result, StoreError};
use crate::reactive::{CellValue, DisposeSignal, Pipeline, StoreContext};

type LifecycleCallback = Box<dyn FnOnce(&ReflexiveStore) + Send>;

/// Options for `init_store_with`.
#[derive(Clone, Debug, Default)]
pub struct InitStoreConfig {
    /// Use this disposal signal instead of creating one.
    ///
    /// Sharing one signal between stores disposes them in lock-step: firing
    /// it disposes every store bound to it, and disposing any of them fires it.
    pub dispose_signal: Option<DisposeSignal>,
}

impl InitStoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dispose_signal(mut self, signal: DisposeSignal) -> Self {
        self.dispose_signal = Some(signal);
        self
    }
}

/// A snapshot handle on a ready store's cell tree.
///
/// Cheap to clone. Cells reached through a `StoreTree` kept past disposal
/// still read and write, but no longer notify anyone.
#[derive(Clone)]
pub struct StoreTree {
    tree: Arc<Tree<StoreContext>>,
}

impl StoreTree {
    /// The cell at `path`.
    pub fn cell(&self, path: &str) -> Result<StoreContext> {
        self.tree
            .leaf(path)
            .cloned()
            .ok_or_else(|| StoreError::path_not_found(path))
    }

    /// The node (cell or subtree) at `path`.
    pub fn node(&self, path: &str) -> Result<&TreeNode<StoreContext>> {
        self.tree
            .resolve(path)
            .ok_or_else(|| StoreError::path_not_found(path))
    }

    /// Direct child by key.
    pub fn get(&self, key: &str) -> Option<&TreeNode<StoreContext>> {
        self.tree.get(key)
    }

    /// Top-level keys, in model order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tree.keys()
    }

    /// Every leaf dot-path, depth-first in model order.
    pub fn paths(&self) -> Vec<String> {
        self.tree.leaves().into_iter().map(|(path, _)| path).collect()
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Number of cells in the tree.
    pub fn leaf_count(&self) -> usize {
        self.tree.leaf_count()
    }

    /// Current values as a model.
    ///
    /// Values that would not survive a second walk as a single leaf (bare
    /// functions, instances, `undefined`, non-empty maps) come back wrapped in
    /// `DetachedValue`, so the snapshot can seed another `init_store`.
    pub fn snapshot(&self) -> Model {
        snapshot_tree(&self.tree)
    }
}

fn snapshot_tree(tree: &Tree<StoreContext>) -> Model {
    tree.iter()
        .map(|(key, node)| {
            let value = match node {
                TreeNode::Node(inner) => Value::Map(snapshot_tree(inner)),
                TreeNode::Leaf(cell) => {
                    let value = cell.get_value();
                    if value.requires_detaching().is_some() || value.is_interior() {
                        Value::Detached(DetachedValue::new(value))
                    } else {
                        value
                    }
                }
            };
            (key, value)
        })
        .collect()
}

impl fmt::Debug for StoreTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreTree")
            .field("paths", &self.paths())
            .finish()
    }
}

/// The ready-flag cell of one cycle, with its own terminating signal.
struct Readiness {
    cell: StoreContext<bool>,
    signal: DisposeSignal,
}

impl Readiness {
    fn new(ready: bool) -> Self {
        let signal = DisposeSignal::new();
        Self {
            cell: StoreContext::new(ready, &signal),
            signal,
        }
    }
}

#[derive(Default)]
struct StoreState {
    tree: Option<StoreTree>,
    dispose: Option<DisposeSignal>,
    ready: bool,
    disposing: bool,
    disposed: bool,
    readiness: Option<Readiness>,
    on_init: Vec<LifecycleCallback>,
    on_dispose: Vec<LifecycleCallback>,
}

/// The reactive store engine.
///
/// Clones are handles to the same store.
///
/// # Example
///
/// ```rust,ignore
/// let store = ReflexiveStore::new();
/// store.init_store(Model::new().with("counter", 0).with("name", ""))?;
///
/// let [counter, name] = <[_; 2]>::try_from(store.reduce_store(&["counter", "name"])?).unwrap();
/// counter.update(|v| Value::Int(v.as_i64().unwrap_or(0) + 1))?;
/// name.set("Nora".into())?;
///
/// store.dispose_store();
/// ```
#[derive(Clone, Default)]
pub struct ReflexiveStore {
    state: Arc<Mutex<StoreState>>,
}

impl ReflexiveStore {
    /// Create an uninitialized store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the cell tree from `props`.
    ///
    /// A no-op if the store is already ready.
    pub fn init_store(&self, props: Model) -> Result<&Self> {
        self.init_store_with(props, InitStoreConfig::default())
    }

    /// Build the cell tree from a JSON object.
    pub fn init_store_from_json(&self, props: serde_json::Value) -> Result<&Self> {
        if self.is_ready() {
            return Ok(self);
        }
        self.init_store(Model::try_from(props)?)
    }

    /// Build the cell tree from `props` with explicit options.
    ///
    /// Fails with `DisposeSignalFired` if `config` carries a signal that has
    /// already fired.
    pub fn init_store_with(&self, props: Model, config: InitStoreConfig) -> Result<&Self> {
        if self.is_ready() {
            return Ok(self);
        }

        if props.is_empty() {
            warn!(target: "reflexive::store", "init_store called with an empty model");
            return Err(StoreError::invalid_props("the model has no keys"));
        }

        if let Some(signal) = &config.dispose_signal {
            if signal.is_fired() {
                warn!(target: "reflexive::store", signal = signal.id(), "init_store given a fired dispose signal");
                return Err(StoreError::DisposeSignalFired);
            }
        }

        let external = config.dispose_signal.is_some();
        let dispose = config.dispose_signal.unwrap_or_default();
        let builder = CellBuilder::new(&dispose);
        let tree = walker::walk(&props, &mut |key, value, _, path| builder.build(key, path, value))?;
        let leaves = tree.leaf_count();

        let (callbacks, readiness) = {
            let mut state = self.state.lock();
            if state.ready {
                return Ok(self);
            }
            state.tree = Some(StoreTree {
                tree: Arc::new(tree),
            });
            state.dispose = Some(dispose.clone());
            state.ready = true;
            state.disposed = false;
            let readiness = state.readiness.as_ref().map(|r| r.cell.clone());
            (std::mem::take(&mut state.on_init), readiness)
        };

        if external {
            let store = Arc::downgrade(&self.state);
            dispose.on_fire(move || {
                if let Some(state) = store.upgrade() {
                    ReflexiveStore { state }.dispose_store();
                }
            });
        }

        debug!(
            target: "reflexive::store",
            leaves,
            signal = dispose.id(),
            external,
            callbacks = callbacks.len(),
            "store initialized"
        );

        for callback in callbacks {
            callback(self);
        }

        if let Some(cell) = readiness {
            if self.is_ready() {
                cell.set(true)?;
            }
        }

        Ok(self)
    }

    /// The cell tree.
    pub fn store(&self) -> Result<StoreTree> {
        let state = self.state.lock();
        match (&state.tree, state.ready) {
            (Some(tree), true) => Ok(tree.clone()),
            _ => Err(StoreError::NotInitialized),
        }
    }

    /// Whether the tree is built and not yet disposed.
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    /// Whether the most recent cycle ended in `dispose_store`.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// The ready flag as a cell.
    ///
    /// Subscriptions see `true` when the coming (or current) cycle finishes
    /// initializing and `false` when it is disposed, then end. Asked for
    /// after disposal, it returns the cell for the next cycle.
    pub fn ready_context(&self) -> StoreContext<bool> {
        let mut state = self.state.lock();
        let ready = state.ready;
        state
            .readiness
            .get_or_insert_with(|| Readiness::new(ready))
            .cell
            .clone()
    }

    /// The disposal signal of the current (or most recent) cycle.
    pub fn dispose_signal(&self) -> Option<DisposeSignal> {
        self.state.lock().dispose.clone()
    }

    /// Run `callback` after the next initialization.
    pub fn on_store_init<F>(&self, callback: F)
    where
        F: FnOnce(&ReflexiveStore) + Send + 'static,
    {
        self.state.lock().on_init.push(Box::new(callback));
    }

    /// Run `callback` at the start of the next disposal, while the tree is
    /// still accessible.
    pub fn on_store_dispose<F>(&self, callback: F)
    where
        F: FnOnce(&ReflexiveStore) + Send + 'static,
    {
        self.state.lock().on_dispose.push(Box::new(callback));
    }

    /// The cell at `path`.
    pub fn cell(&self, path: &str) -> Result<StoreContext> {
        self.store()?.cell(path)
    }

    /// The cells at `paths`, in the requested order.
    pub fn reduce_store(&self, paths: &[&str]) -> Result<Vec<StoreContext>> {
        let tree = self.store()?;
        paths.iter().map(|path| tree.cell(path)).collect()
    }

    /// Create a cell outside the tree, bound to this store's disposal signal.
    pub fn store_context_factory<T: CellValue>(&self, value: T) -> Result<StoreContext<T>> {
        self.context_factory(value, None)
    }

    /// Like `store_context_factory`, with `pipeline` applied ahead of every
    /// subscription's own pipeline.
    pub fn store_context_factory_with<T: CellValue>(
        &self,
        value: T,
        pipeline: Pipeline<T, T>,
    ) -> Result<StoreContext<T>> {
        self.context_factory(value, Some(pipeline))
    }

    fn context_factory<T: CellValue>(&self, value: T, pipeline: Option<Pipeline<T, T>>) -> Result<StoreContext<T>> {
        let dispose = {
            let state = self.state.lock();
            match (&state.dispose, state.ready) {
                (Some(dispose), true) => dispose.clone(),
                _ => return Err(StoreError::NotInitialized),
            }
        };
        Ok(CellBuilder::new(&dispose).build_detached(value, pipeline))
    }

    /// Tear the store down.
    ///
    /// A no-op unless the store is ready and not already disposing.
    pub fn dispose_store(&self) {
        let callbacks = {
            let mut state = self.state.lock();
            if !state.ready || state.disposing {
                return;
            }
            state.disposing = true;
            std::mem::take(&mut state.on_dispose)
        };

        for callback in callbacks {
            callback(self);
        }

        let (signal, readiness, leaves) = {
            let mut state = self.state.lock();
            let leaves = state.tree.take().map_or(0, |tree| tree.leaf_count());
            state.ready = false;
            state.disposing = false;
            state.disposed = true;
            (state.dispose.clone(), state.readiness.take(), leaves)
        };

        debug!(target: "reflexive::store", leaves, "store disposed");

        if let Some(readiness) = readiness {
            // A bool is never callable, so this cannot fail.
            let _ = readiness.cell.set(false);
            readiness.signal.fire();
        }
        if let Some(signal) = signal {
            signal.fire();
        }
    }
}

impl fmt::Debug for ReflexiveStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ReflexiveStore")
            .field("ready", &state.ready)
            .field("disposing", &state.disposing)
            .field("disposed", &state.disposed)
            .field("leaves", &state.tree.as_ref().map(StoreTree::leaf_count))
            .field("on_init", &state.on_init.len())
            .field("on_dispose", &state.on_dispose.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn model() -> Model {
        Model::new()
            .with("counter", 0)
            .with("name", "")
            .with("user", Model::new().with("first", "Ezio").with("last", ""))
    }

    #[test]
    fn store_before_init_fails() {
        let store = ReflexiveStore::new();
        assert_eq!(store.store().unwrap_err(), StoreError::NotInitialized);
        assert!(!store.is_ready());
        assert!(!store.is_disposed());
    }

    #[test]
    fn init_builds_tree() {
        let store = ReflexiveStore::new();
        store.init_store(model()).unwrap();

        let tree = store.store().unwrap();
        assert!(store.is_ready());
        assert_eq!(tree.paths(), vec!["counter", "name", "user.first", "user.last"]);
        assert_eq!(tree.cell("user.first").unwrap().get_value(), Value::from("Ezio"));
    }

    #[test]
    fn empty_model_is_invalid() {
        let store = ReflexiveStore::new();
        assert!(matches!(
            store.init_store(Model::new()),
            Err(StoreError::InvalidProps { .. })
        ));
        assert!(!store.is_ready());
    }

    #[test]
    fn failed_init_leaves_store_unchanged() {
        let store = ReflexiveStore::new();
        let bad = model().with("greet", Value::function(|_| Value::Null));

        assert!(matches!(
            store.init_store(bad),
            Err(StoreError::DetachedValueRequired { .. })
        ));
        assert!(!store.is_ready());
        assert!(store.dispose_signal().is_none());
    }

    #[test]
    fn second_init_is_noop() {
        let store = ReflexiveStore::new();
        store.init_store(model()).unwrap();
        let first = store.cell("counter").unwrap();

        store.init_store(Model::new().with("other", 1)).unwrap();
        assert!(store.cell("counter").unwrap().ptr_eq(&first));
        assert!(store.cell("other").is_err());
    }

    #[test]
    fn init_callbacks_run_once_in_order() {
        let store = ReflexiveStore::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            store.on_store_init(move |s| {
                assert!(s.is_ready());
                order.lock().push(i);
            });
        }

        store.init_store(model()).unwrap();
        assert_eq!(*order.lock(), vec![0, 1, 2]);

        store.dispose_store();
        store.init_store(model()).unwrap();
        assert_eq!(order.lock().len(), 3);
    }

    #[test]
    fn dispose_callbacks_see_live_tree() {
        let store = ReflexiveStore::new();
        store.init_store(model()).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        store.on_store_dispose(move |s| {
            *seen_clone.lock() = Some(s.cell("user.first").map(|c| c.get_value()));
        });

        store.dispose_store();
        assert_eq!(*seen.lock(), Some(Ok(Value::from("Ezio"))));
        assert!(store.is_disposed());
        assert_eq!(store.store().unwrap_err(), StoreError::NotInitialized);
    }

    #[test]
    fn dispose_is_idempotent() {
        let store = ReflexiveStore::new();
        store.dispose_store();

        store.init_store(model()).unwrap();
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        store.on_store_dispose(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        store.dispose_store();
        store.dispose_store();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(store.dispose_signal().unwrap().is_fired());
    }

    #[test]
    fn reduce_store_resolves_in_order() {
        let store = ReflexiveStore::new();
        store.init_store(model()).unwrap();

        let cells = store.reduce_store(&["user.last", "counter"]).unwrap();
        assert_eq!(cells.len(), 2);
        assert!(cells[0].ptr_eq(&store.cell("user.last").unwrap()));
        assert!(cells[1].ptr_eq(&store.cell("counter").unwrap()));
    }

    #[test]
    fn reduce_store_rejects_unknown_and_interior_paths() {
        let store = ReflexiveStore::new();
        store.init_store(model()).unwrap();

        assert_eq!(
            store.reduce_store(&["counter", "user.middle"]).unwrap_err(),
            StoreError::PathNotFound {
                path: "user.middle".to_string()
            }
        );
        assert!(matches!(
            store.reduce_store(&["user"]),
            Err(StoreError::PathNotFound { .. })
        ));
        assert!(store.store().unwrap().node("user").unwrap().as_node().is_some());
    }

    #[test]
    fn factory_requires_ready_store() {
        let store = ReflexiveStore::new();
        assert_eq!(
            store.store_context_factory(1i64).unwrap_err(),
            StoreError::NotInitialized
        );

        store.init_store(model()).unwrap();
        let cell = store.store_context_factory(1i64).unwrap();
        let sub = cell.on_change(|_| {});

        store.dispose_store();
        assert!(sub.is_closed());
        assert!(cell.is_terminated());
    }

    #[test]
    fn factory_pipeline_applies_to_every_subscription() {
        let store = ReflexiveStore::new();
        store.init_store(model()).unwrap();

        let cell = store
            .store_context_factory_with(String::new(), Pipeline::new().map(|s: String| s.to_uppercase()))
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..2 {
            let seen = seen.clone();
            cell.on_change(move |s| seen.lock().push(s));
        }

        cell.set("nora".to_string()).unwrap();
        assert_eq!(*seen.lock(), vec!["NORA".to_string(), "NORA".to_string()]);
    }

    #[test]
    fn external_signal_disposes_in_lock_step() {
        let signal = DisposeSignal::new();
        let a = ReflexiveStore::new();
        let b = ReflexiveStore::new();
        a.init_store_with(model(), InitStoreConfig::new().with_dispose_signal(signal.clone()))
            .unwrap();
        b.init_store_with(model(), InitStoreConfig::new().with_dispose_signal(signal.clone()))
            .unwrap();

        let disposed = Arc::new(AtomicI32::new(0));
        for store in [&a, &b] {
            let disposed = disposed.clone();
            store.on_store_dispose(move |_| {
                disposed.fetch_add(1, Ordering::SeqCst);
            });
        }

        a.dispose_store();
        assert!(signal.is_fired());
        assert!(a.is_disposed());
        assert!(b.is_disposed());
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn firing_external_signal_disposes_store() {
        let signal = DisposeSignal::new();
        let store = ReflexiveStore::new();
        store
            .init_store_with(model(), InitStoreConfig::new().with_dispose_signal(signal.clone()))
            .unwrap();

        signal.fire();
        assert!(store.is_disposed());
        assert!(store.store().is_err());
    }

    #[test]
    fn init_from_json() {
        let store = ReflexiveStore::new();
        store
            .init_store_from_json(serde_json::json!({ "counter": 0, "nested": { "flag": true } }))
            .unwrap();
        assert_eq!(store.cell("nested.flag").unwrap().get_value(), Value::Bool(true));

        let other = ReflexiveStore::new();
        assert!(matches!(
            other.init_store_from_json(serde_json::Value::Null),
            Err(StoreError::InvalidProps { .. })
        ));
        assert!(matches!(
            other.init_store_from_json(serde_json::json!({})),
            Err(StoreError::InvalidProps { .. })
        ));
    }

    #[test]
    fn snapshot_reseeds_a_store() {
        let store = ReflexiveStore::new();
        store
            .init_store(
                model()
                    .with("greet", Value::detached(Value::function(|_| Value::from("hi"))))
                    .with("config", Value::detached(Model::new().with("a", 1))),
            )
            .unwrap();
        store.cell("counter").unwrap().set(Value::from(5)).unwrap();

        let snapshot = store.store().unwrap().snapshot();
        let copy = ReflexiveStore::new();
        copy.init_store(snapshot).unwrap();

        assert_eq!(copy.cell("counter").unwrap().get_value(), Value::Int(5));
        assert_eq!(
            copy.cell("greet").unwrap().get_value().call(&[]),
            Some(Value::from("hi"))
        );
        assert_eq!(
            copy.cell("config").unwrap().get_value(),
            Value::Map(Model::new().with("a", 1))
        );
    }

    #[test]
    fn unaddressable_keys_fail_init() {
        let store = ReflexiveStore::new();
        for bad in [
            Model::new().with("", 1),
            Model::new().with("a.b", 2),
            model().with("user", Model::new().with("first.name", "Ezio")),
        ] {
            assert!(matches!(
                store.init_store(bad),
                Err(StoreError::InvalidProps { .. })
            ));
            assert!(!store.is_ready());
        }
    }

    #[test]
    fn every_listed_path_resolves() {
        let store = ReflexiveStore::new();
        store
            .init_store_from_json(serde_json::json!({
                "with space": 1,
                "user": { "name": "Ezio", "tags": [], "meta": {} }
            }))
            .unwrap();

        let tree = store.store().unwrap();
        let paths = tree.paths();
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        assert_eq!(store.reduce_store(&refs).unwrap().len(), paths.len());
    }

    #[test]
    fn fired_external_signal_is_rejected() {
        let signal = DisposeSignal::new();
        let store = ReflexiveStore::new();
        store
            .init_store_with(model(), InitStoreConfig::new().with_dispose_signal(signal.clone()))
            .unwrap();
        signal.fire();
        assert!(store.is_disposed());

        let inits = Arc::new(AtomicI32::new(0));
        let inits_clone = inits.clone();
        store.on_store_init(move |_| {
            inits_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(
            store
                .init_store_with(model(), InitStoreConfig::new().with_dispose_signal(signal.clone()))
                .unwrap_err(),
            StoreError::DisposeSignalFired
        );
        assert!(!store.is_ready());
        assert!(store.is_disposed());
        assert_eq!(inits.load(Ordering::SeqCst), 0);

        store
            .init_store_with(model(), InitStoreConfig::new().with_dispose_signal(DisposeSignal::new()))
            .unwrap();
        assert!(store.is_ready());
        assert_eq!(inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_dispose_waits_for_running_callbacks() {
        use std::sync::mpsc;

        let store = ReflexiveStore::new();
        store.init_store(model()).unwrap();

        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let saw_live_tree = Arc::new(Mutex::new(None));
        let saw_live_tree_clone = saw_live_tree.clone();
        store.on_store_dispose(move |s| {
            entered_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            *saw_live_tree_clone.lock() = Some(s.cell("user.first").is_ok());
        });

        let first = {
            let store = store.clone();
            std::thread::spawn(move || store.dispose_store())
        };
        entered_rx.recv().unwrap();

        store.dispose_store();
        assert!(store.is_ready());
        assert!(store.store().is_ok());
        assert!(!store.dispose_signal().unwrap().is_fired());

        release_tx.send(()).unwrap();
        first.join().unwrap();

        assert_eq!(*saw_live_tree.lock(), Some(true));
        assert!(store.is_disposed());
        assert!(store.dispose_signal().unwrap().is_fired());
    }

    #[test]
    fn dispose_callback_may_call_dispose() {
        let store = ReflexiveStore::new();
        store.init_store(model()).unwrap();

        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        store.on_store_dispose(move |s| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            s.dispose_store();
            assert!(s.is_ready());
        });

        store.dispose_store();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.is_disposed());
    }

    #[test]
    fn ready_context_follows_the_lifecycle() {
        let store = ReflexiveStore::new();
        let ready = store.ready_context();
        assert!(!ready.get_value());

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        let sub = ready.on_change(move |v| events_clone.lock().push(if v { "ready" } else { "not ready" }));

        let events_clone = events.clone();
        store.on_store_init(move |_| events_clone.lock().push("init"));

        store.init_store(model()).unwrap();
        assert!(ready.get_value());
        assert!(store.ready_context().ptr_eq(&ready));
        assert_eq!(*events.lock(), vec!["init", "ready"]);

        store.dispose_store();
        assert_eq!(*events.lock(), vec!["init", "ready", "not ready"]);
        assert!(sub.is_closed());
        assert!(ready.is_terminated());

        let next = store.ready_context();
        assert!(!next.ptr_eq(&ready));
        assert!(!next.get_value());
        store.init_store(model()).unwrap();
        assert!(next.get_value());
    }

    #[test]
    fn ready_context_taken_while_ready_starts_true() {
        let store = ReflexiveStore::new();
        store.init_store(model()).unwrap();

        let ready = store.ready_context();
        assert!(ready.get_value());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        ready.on_change(move |v| seen_clone.lock().push(v));

        store.dispose_store();
        assert_eq!(*seen.lock(), vec![false]);
    }
}
