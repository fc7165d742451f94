//! Batched mutation staging and the commit-to-memory path.
//!
//! An [`Editor`] is a private staging buffer: puts, removals and a clear-all
//! flag accumulate locally and touch the store only on commit. Editors open
//! against the same store are independent; none sees another's uncommitted
//! mutations.
//!
//! ## Commit sequence
//!
//! 1. Snapshot the listener registry (its own lock, nothing else held)
//! 2. Acquire the store lock, then the editor's staging lock
//! 3. Apply: clear-all first, then staged mutations in insertion order,
//!    recording each key whose effective value changed
//! 4. Release both locks, hand the changed-key list to the dispatcher
//!
//! The lock order in step 2 is fixed (store before staging, everywhere), so
//! commits on different editors cannot deadlock. Listener code never runs
//! under either lock.

use crate::dispatch::ChangeListener;
use crate::store::PrefStore;
use crate::value::Value;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One staged mutation for a key.
///
/// Removal is its own variant rather than a put of some sentinel value, so a
/// later `put` for the same key cleanly overrides an earlier `remove` and
/// vice versa.
pub(crate) enum Mutation {
    /// Store this value on commit.
    Put(Value),
    /// Erase the key on commit; a no-op if the key is absent.
    Remove,
}

/// An editor's staged mutations: per-key entries in first-staging order plus
/// the store-wide clear flag.
#[derive(Default)]
pub(crate) struct Batch {
    pub(crate) clear_all: bool,
    pub(crate) entries: Vec<(String, Mutation)>,
}

impl Batch {
    /// Stage a mutation. The last staged operation per key wins; a restaged
    /// key keeps its original position.
    fn stage(&mut self, key: String, mutation: Mutation) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = mutation;
        } else {
            self.entries.push((key, mutation));
        }
    }
}

/// Outcome of applying a batch to the store map.
///
/// `keys_modified` holds changed keys in staging order; delivery reverses it.
/// Both optional fields are `None` when no listeners were registered at
/// snapshot time, skipping the bookkeeping entirely.
pub(crate) struct CommitResult {
    pub(crate) changes_made: bool,
    pub(crate) keys_modified: Option<Vec<String>>,
    pub(crate) listeners: Option<Vec<Arc<dyn ChangeListener>>>,
}

/// Apply a batch to the store map, draining it so the owning editor starts
/// its next batch empty. Must be called with the store map locked.
pub(crate) fn apply_batch(
    map: &mut HashMap<String, Value>,
    batch: &mut Batch,
    listeners: Option<Vec<Arc<dyn ChangeListener>>>,
) -> CommitResult {
    let mut keys_modified = listeners.is_some().then(Vec::new);
    let mut changes_made = false;

    if batch.clear_all {
        if !map.is_empty() {
            changes_made = true;
            map.clear();
        }
        batch.clear_all = false;
    }

    for (key, mutation) in batch.entries.drain(..) {
        match mutation {
            Mutation::Remove => {
                if map.remove(&key).is_none() {
                    continue;
                }
            }
            Mutation::Put(value) => {
                if map.get(&key) == Some(&value) {
                    // idempotent write, no spurious notification
                    continue;
                }
                map.insert(key.clone(), value);
            }
        }
        changes_made = true;
        if let Some(keys) = keys_modified.as_mut() {
            keys.push(key);
        }
    }

    CommitResult {
        changes_made,
        keys_modified,
        listeners,
    }
}

/// A staging buffer for batched mutations, applied atomically on commit.
///
/// Obtained from [`PrefStore::edit`]. Mutation methods return `&Self` so
/// calls can be chained. The staging buffer is behind its own lock, so a
/// single editor instance may be shared across threads; staged operations
/// land in program order.
///
/// A successful commit clears the buffer: reusing the editor stages a fresh
/// batch.
///
/// # Example
///
/// ```
/// use prefstore::PrefStore;
///
/// let store = PrefStore::new()?;
/// store.edit()
///     .put("volume", 11_i32)
///     .put("muted", false)
///     .commit();
/// assert_eq!(store.get_i32("volume", 0), 11);
/// # Ok::<(), prefstore::Error>(())
/// ```
pub struct Editor {
    store: PrefStore,
    staged: Mutex<Batch>,
}

impl Editor {
    pub(crate) fn new(store: PrefStore) -> Self {
        Self {
            store,
            staged: Mutex::new(Batch::default()),
        }
    }

    /// Stage a value for a key, to be written on commit.
    ///
    /// Accepts anything convertible to [`Value`]. Overrides any mutation
    /// staged earlier for the same key in this batch, including a removal.
    pub fn put(&self, key: impl Into<String>, value: impl Into<Value>) -> &Self {
        self.staged
            .lock()
            .stage(key.into(), Mutation::Put(value.into()));
        self
    }

    /// Stage a string value for a key.
    pub fn put_string(&self, key: impl Into<String>, value: impl Into<String>) -> &Self {
        self.put(key, Value::String(value.into()))
    }

    /// Stage a string-set value for a key.
    pub fn put_string_set(&self, key: impl Into<String>, value: HashSet<String>) -> &Self {
        self.put(key, Value::StringSet(value))
    }

    /// Stage an i32 value for a key.
    pub fn put_i32(&self, key: impl Into<String>, value: i32) -> &Self {
        self.put(key, Value::Int32(value))
    }

    /// Stage an i64 value for a key.
    pub fn put_i64(&self, key: impl Into<String>, value: i64) -> &Self {
        self.put(key, Value::Int64(value))
    }

    /// Stage an f32 value for a key.
    pub fn put_f32(&self, key: impl Into<String>, value: f32) -> &Self {
        self.put(key, Value::Float32(value))
    }

    /// Stage an f64 value for a key.
    pub fn put_f64(&self, key: impl Into<String>, value: f64) -> &Self {
        self.put(key, Value::Float64(value))
    }

    /// Stage a bool value for a key.
    pub fn put_bool(&self, key: impl Into<String>, value: bool) -> &Self {
        self.put(key, Value::Bool(value))
    }

    /// Stage a binary blob for a key.
    pub fn put_blob(&self, key: impl Into<String>, value: Vec<u8>) -> &Self {
        self.put(key, Value::Blob(value))
    }

    /// Stage removal of a key.
    ///
    /// Overrides a put staged earlier for the same key in this batch.
    /// Removing a key the store does not hold is a no-op at commit time.
    pub fn remove(&self, key: impl Into<String>) -> &Self {
        self.staged.lock().stage(key.into(), Mutation::Remove);
        self
    }

    /// Stage removal of every key in the store.
    ///
    /// On commit the clear is applied first, regardless of when `clear` was
    /// called relative to the batch's puts; the batch's own mutations then
    /// apply on top of the emptied store.
    pub fn clear(&self) -> &Self {
        self.staged.lock().clear_all = true;
        self
    }

    /// Commit the staged batch synchronously.
    ///
    /// Blocks until the batch is applied to memory and the notification
    /// hand-off is enqueued; when called on the dispatch context itself,
    /// listener delivery completes inline before this returns. In-memory
    /// application cannot fail, so this always returns `true`.
    pub fn commit(&self) -> bool {
        let result = self.commit_to_memory();
        tracing::debug!(changed = result.changes_made, "committed editor batch");
        self.store.shared().dispatcher.notify(&self.store, result);
        true
    }

    /// Commit the staged batch asynchronously.
    ///
    /// Drains the staged mutations and returns immediately; application and
    /// listener delivery happen on the dispatch context with no feedback
    /// channel. Mutations staged after `apply` returns belong to the next
    /// batch. Callers that need confirmation use [`Editor::commit`].
    pub fn apply(&self) {
        let batch = std::mem::take(&mut *self.staged.lock());
        tracing::trace!("scheduling editor batch for async apply");
        self.store.shared().dispatcher.schedule_apply(&self.store, batch);
    }

    fn commit_to_memory(&self) -> CommitResult {
        let shared = self.store.shared();
        let listeners = shared.listeners.snapshot();
        let mut map = shared.map.lock();
        let mut staged = self.staged.lock();
        apply_batch(&mut map, &mut staged, listeners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn staged_put(v: i32) -> Mutation {
        Mutation::Put(Value::Int32(v))
    }

    #[test]
    fn stage_keeps_first_position_on_restage() {
        let mut batch = Batch::default();
        batch.stage("a".into(), staged_put(1));
        batch.stage("b".into(), staged_put(2));
        batch.stage("a".into(), staged_put(3));

        let keys: Vec<_> = batch.entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["a", "b"], "restaged key keeps its original slot");
        assert!(matches!(
            batch.entries[0].1,
            Mutation::Put(Value::Int32(3))
        ));
    }

    #[test]
    fn put_overrides_remove_and_vice_versa() {
        let mut batch = Batch::default();
        batch.stage("k".into(), Mutation::Remove);
        batch.stage("k".into(), staged_put(5));
        assert!(matches!(batch.entries[0].1, Mutation::Put(_)));

        batch.stage("k".into(), Mutation::Remove);
        assert!(matches!(batch.entries[0].1, Mutation::Remove));
        assert_eq!(batch.entries.len(), 1);
    }

    #[test]
    fn apply_batch_clears_before_staged_mutations() {
        let mut map = HashMap::new();
        map.insert("old".to_owned(), Value::Int32(1));

        let mut batch = Batch::default();
        batch.stage("new".into(), staged_put(2));
        batch.clear_all = true;

        let result = apply_batch(&mut map, &mut batch, None);
        assert!(result.changes_made);
        assert!(!batch.clear_all, "clear flag resets after application");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("new"), Some(&Value::Int32(2)));
    }

    #[test]
    fn apply_batch_skips_bookkeeping_without_listeners() {
        let mut map = HashMap::new();
        let mut batch = Batch::default();
        batch.stage("k".into(), staged_put(1));

        let result = apply_batch(&mut map, &mut batch, None);
        assert!(result.changes_made);
        assert!(result.keys_modified.is_none());
        assert!(result.listeners.is_none());
    }

    #[test]
    fn apply_batch_treats_equal_put_as_noop() {
        let mut map = HashMap::new();
        map.insert("k".to_owned(), Value::Int32(1));

        let mut batch = Batch::default();
        batch.stage("k".into(), staged_put(1));

        let result = apply_batch(&mut map, &mut batch, None);
        assert!(!result.changes_made, "equal-value write is not a change");
    }

    #[test]
    fn apply_batch_treats_missing_remove_as_noop() {
        let mut map: HashMap<String, Value> = HashMap::new();
        let mut batch = Batch::default();
        batch.stage("ghost".into(), Mutation::Remove);

        let result = apply_batch(&mut map, &mut batch, None);
        assert!(!result.changes_made);
    }

    proptest! {
        // Model check: staging is a LinkedHashMap — last write per key wins,
        // keys keep first-staging order.
        #[test]
        fn staging_is_last_write_wins_in_first_staged_order(
            ops in prop::collection::vec((0usize..4, prop::option::of(0i32..100)), 0..32)
        ) {
            let mut batch = Batch::default();
            let mut model: Vec<(String, Option<i32>)> = Vec::new();

            for (slot, op) in ops {
                let key = format!("k{slot}");
                match op {
                    Some(v) => batch.stage(key.clone(), staged_put(v)),
                    None => batch.stage(key.clone(), Mutation::Remove),
                }
                if let Some(entry) = model.iter_mut().find(|(k, _)| *k == key) {
                    entry.1 = op;
                } else {
                    model.push((key, op));
                }
            }

            prop_assert_eq!(batch.entries.len(), model.len());
            for ((key, mutation), (model_key, model_op)) in batch.entries.iter().zip(&model) {
                prop_assert_eq!(key, model_key);
                match (mutation, model_op) {
                    (Mutation::Put(Value::Int32(v)), Some(m)) => prop_assert_eq!(v, m),
                    (Mutation::Remove, None) => {}
                    _ => prop_assert!(false, "staged mutation diverged from model"),
                }
            }
        }
    }
}
