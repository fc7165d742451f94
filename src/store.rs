//! The shared value store.
//!
//! [`PrefStore`] is a cheap clonable handle to one shared map of key →
//! [`Value`]. All reads and writes go through a single mutex; public
//! mutation goes through [`Editor`] batches only, so concurrent readers
//! never observe a half-applied batch.
//!
//! The store is built empty or pre-seeded from a [`SeedSource`] consulted
//! once at construction. Hosts that want one shared instance reachable from
//! anywhere use [`PrefStore::global`]; everyone else constructs a store and
//! passes clones around.

use crate::dispatch::{ChangeListener, Dispatcher, ListenerRegistry};
use crate::editor::{apply_batch, Batch, Editor};
use crate::error::{Error, Result};
use crate::seed::SeedSource;
use crate::value::{Value, ValueKind};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

static GLOBAL: OnceCell<PrefStore> = OnceCell::new();

pub(crate) struct Shared {
    pub(crate) map: Mutex<HashMap<String, Value>>,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) dispatcher: Dispatcher,
}

/// A thread-safe, in-memory preferences store with batched atomic commits.
///
/// Cloning is cheap and every clone sees the same data. The store lives as
/// long as any handle (or any in-flight notification) does; its dispatch
/// thread winds down when the last handle is dropped.
///
/// # Reading
///
/// The typed getters are total: a missing key resolves to the caller's
/// default, and so does a stored value of a different tag (the mismatch is a
/// caller contract violation and is logged at `warn`). Callers that want the
/// mismatch surfaced use [`PrefStore::require`]; [`PrefStore::get`] exposes
/// the raw tagged value.
///
/// # Writing
///
/// All public mutation goes through [`PrefStore::edit`]: stage a batch, then
/// [`Editor::commit`] or [`Editor::apply`] it atomically.
///
/// # Example
///
/// ```
/// use prefstore::PrefStore;
///
/// let store = PrefStore::new()?;
/// store.edit().put("theme", "dark").commit();
///
/// assert_eq!(store.get_string("theme", "light"), "dark");
/// assert_eq!(store.get_string("font", "mono"), "mono");
/// # Ok::<(), prefstore::Error>(())
/// ```
#[derive(Clone)]
pub struct PrefStore {
    inner: Arc<Shared>,
}

impl PrefStore {
    /// Create an empty store.
    ///
    /// Spawns the store's dispatch thread; the only failure mode is the
    /// spawn itself.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a builder, for seeding the store at construction.
    pub fn builder() -> PrefStoreBuilder {
        PrefStoreBuilder::new()
    }

    /// The process-wide shared instance, created empty on first access.
    ///
    /// Repeated calls return the same store. Use this only when the host
    /// genuinely needs single-instance-per-process semantics; otherwise
    /// construct a store at startup and inject clones.
    pub fn global() -> Result<&'static PrefStore> {
        GLOBAL.get_or_try_init(PrefStore::new)
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.inner
    }

    /// Open a new editor against this store.
    ///
    /// Editors stage privately; nothing is visible to readers or to other
    /// editors until commit.
    pub fn edit(&self) -> Editor {
        Editor::new(self.clone())
    }

    /// Seeding primitive: write a value directly, bypassing the editor path.
    /// Used only during construction and migration.
    pub(crate) fn put(&self, key: String, value: Value) {
        self.inner.map.lock().insert(key, value);
    }

    /// Whether the store holds a value for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.map.lock().contains_key(key)
    }

    /// Point-in-time copy of every entry.
    ///
    /// Mutating the returned map never affects the store.
    pub fn all(&self) -> HashMap<String, Value> {
        self.inner.map.lock().clone()
    }

    /// The raw tagged value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.map.lock().get(key).cloned()
    }

    /// Strict read: the value for `key` if present and of the given tag.
    ///
    /// Unlike the defaulting getters this reports a tag mismatch as
    /// [`Error::WrongType`] instead of falling back. A missing key is still
    /// not an error.
    pub fn require(&self, key: &str, kind: ValueKind) -> Result<Option<Value>> {
        match self.inner.map.lock().get(key) {
            None => Ok(None),
            Some(v) if v.kind() == kind => Ok(Some(v.clone())),
            Some(v) => Err(Error::WrongType {
                key: key.to_owned(),
                expected: kind,
                actual: v.kind(),
            }),
        }
    }

    /// The string stored under `key`, or `default` if the key is absent or
    /// holds a different tag.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        match self.inner.map.lock().get(key) {
            Some(Value::String(v)) => v.clone(),
            Some(other) => mismatched(key, ValueKind::String, other, default.to_owned()),
            None => default.to_owned(),
        }
    }

    /// The string set stored under `key`, or `default` if the key is absent
    /// or holds a different tag.
    pub fn get_string_set(&self, key: &str, default: HashSet<String>) -> HashSet<String> {
        match self.inner.map.lock().get(key) {
            Some(Value::StringSet(v)) => v.clone(),
            Some(other) => mismatched(key, ValueKind::StringSet, other, default),
            None => default,
        }
    }

    /// The i32 stored under `key`, or `default` if the key is absent or
    /// holds a different tag.
    pub fn get_i32(&self, key: &str, default: i32) -> i32 {
        match self.inner.map.lock().get(key) {
            Some(Value::Int32(v)) => *v,
            Some(other) => mismatched(key, ValueKind::Int32, other, default),
            None => default,
        }
    }

    /// The i64 stored under `key`, or `default` if the key is absent or
    /// holds a different tag.
    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.inner.map.lock().get(key) {
            Some(Value::Int64(v)) => *v,
            Some(other) => mismatched(key, ValueKind::Int64, other, default),
            None => default,
        }
    }

    /// The f32 stored under `key`, or `default` if the key is absent or
    /// holds a different tag.
    pub fn get_f32(&self, key: &str, default: f32) -> f32 {
        match self.inner.map.lock().get(key) {
            Some(Value::Float32(v)) => *v,
            Some(other) => mismatched(key, ValueKind::Float32, other, default),
            None => default,
        }
    }

    /// The f64 stored under `key`, or `default` if the key is absent or
    /// holds a different tag.
    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        match self.inner.map.lock().get(key) {
            Some(Value::Float64(v)) => *v,
            Some(other) => mismatched(key, ValueKind::Float64, other, default),
            None => default,
        }
    }

    /// The bool stored under `key`, or `default` if the key is absent or
    /// holds a different tag.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.inner.map.lock().get(key) {
            Some(Value::Bool(v)) => *v,
            Some(other) => mismatched(key, ValueKind::Bool, other, default),
            None => default,
        }
    }

    /// The blob stored under `key`, or `default` if the key is absent or
    /// holds a different tag.
    pub fn get_blob(&self, key: &str, default: Vec<u8>) -> Vec<u8> {
        match self.inner.map.lock().get(key) {
            Some(Value::Blob(v)) => v.clone(),
            Some(other) => mismatched(key, ValueKind::Blob, other, default),
            None => default,
        }
    }

    /// Register a listener for change notifications.
    ///
    /// The registry holds the listener weakly: it receives notifications
    /// only while the caller keeps the `Arc` alive, and silently drops out
    /// once the last strong reference is gone. Registering the same
    /// listener twice has no additional effect.
    pub fn register_listener<L>(&self, listener: &Arc<L>)
    where
        L: ChangeListener + 'static,
    {
        let listener: Arc<dyn ChangeListener> = listener.clone();
        self.inner.listeners.register(&listener);
    }

    /// Unregister a previously registered listener.
    ///
    /// Removal racing an in-flight dispatch is safe: a listener removed
    /// after a commit snapshotted the registry still sees that commit's
    /// notifications.
    pub fn unregister_listener<L>(&self, listener: &Arc<L>)
    where
        L: ChangeListener + 'static,
    {
        let listener: Arc<dyn ChangeListener> = listener.clone();
        self.inner.listeners.unregister(&listener);
    }

    /// Block until every notification and async apply enqueued before this
    /// call has been processed.
    ///
    /// Inline no-op when called on the dispatch context itself.
    pub fn flush(&self) {
        self.inner.dispatcher.flush();
    }

    /// Apply a drained batch on the dispatch context and deliver inline.
    /// The worker half of [`Editor::apply`].
    pub(crate) fn apply_batch_and_notify(&self, mut batch: Batch) {
        let listeners = self.inner.listeners.snapshot();
        let result = {
            let mut map = self.inner.map.lock();
            apply_batch(&mut map, &mut batch, listeners)
        };
        tracing::debug!(changed = result.changes_made, "applied async editor batch");
        self.inner.dispatcher.notify(self, result);
    }
}

fn mismatched<T>(key: &str, expected: ValueKind, actual: &Value, default: T) -> T {
    tracing::warn!(
        key,
        expected = expected.name(),
        actual = actual.type_name(),
        "type mismatch on read, returning default"
    );
    default
}

/// Builder for a [`PrefStore`], for hosts that seed from external storage.
///
/// # Example
///
/// ```
/// use prefstore::{MapSeed, PrefStore};
///
/// let store = PrefStore::builder()
///     .seed(MapSeed::new([("theme", "dark")]))
///     .build()?;
/// assert!(store.contains("theme"));
/// # Ok::<(), prefstore::Error>(())
/// ```
pub struct PrefStoreBuilder {
    seed: Option<Box<dyn SeedSource>>,
}

impl PrefStoreBuilder {
    /// Create a builder with no seed.
    pub fn new() -> Self {
        Self { seed: None }
    }

    /// Seed the store from `source` at construction.
    ///
    /// The source is consulted exactly once, in `build`; its values are
    /// copied into the store.
    pub fn seed(mut self, source: impl SeedSource + 'static) -> Self {
        self.seed = Some(Box::new(source));
        self
    }

    /// Build the store, spawning its dispatch thread and loading the seed.
    pub fn build(self) -> Result<PrefStore> {
        let store = PrefStore {
            inner: Arc::new(Shared {
                map: Mutex::new(HashMap::new()),
                listeners: ListenerRegistry::new(),
                dispatcher: Dispatcher::spawn()?,
            }),
        };
        if let Some(seed) = self.seed {
            let entries = seed.entries()?;
            tracing::debug!(count = entries.len(), "seeding store");
            for (key, value) in entries {
                store.put(key, value);
            }
        }
        Ok(store)
    }
}

impl Default for PrefStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
