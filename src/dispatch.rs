//! Change notification fan-out.
//!
//! All listener callbacks are delivered on one designated context: a single
//! worker thread owned by the [`Dispatcher`]. A commit that happens on any
//! other thread hands its whole notification batch to the worker as one
//! deferred unit; a commit that is already running on the worker (e.g. from
//! inside a listener) delivers inline. Either way no store lock is held while
//! listener code runs, so listeners are free to read the store or open their
//! own editors.
//!
//! Listeners are held weakly. Dropping the last `Arc` to a listener silently
//! removes it from the registry; explicit unregistration is still available
//! for deterministic teardown.

use crate::editor::{Batch, CommitResult};
use crate::store::PrefStore;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

/// Callback invoked when a committed batch changed a key.
///
/// Called once per effectively-changed key, on the dispatcher's worker
/// thread. A key is "changed" when it was removed, or written with a value
/// not equal to the stored one; idempotent writes produce no callback.
pub trait ChangeListener: Send + Sync {
    /// Called with the store that changed and the affected key.
    ///
    /// The key may no longer be present by the time the callback runs if a
    /// later commit removed it; read the store for current state.
    fn on_change(&self, store: &PrefStore, key: &str);
}

/// Weakly-held set of registered listeners.
///
/// The registry never keeps a listener alive: entries are `Weak`, and dead
/// handles are pruned on every touch. Registration and unregistration are
/// synchronized independently of the store lock and may race safely with an
/// in-flight dispatch.
pub(crate) struct ListenerRegistry {
    entries: Mutex<Vec<Weak<dyn ChangeListener>>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn register(&self, listener: &Arc<dyn ChangeListener>) {
        let target = Arc::as_ptr(listener) as *const ();
        let mut entries = self.entries.lock();
        entries.retain(|w| w.strong_count() > 0);
        if !entries.iter().any(|w| Weak::as_ptr(w) as *const () == target) {
            entries.push(Arc::downgrade(listener));
        }
    }

    pub(crate) fn unregister(&self, listener: &Arc<dyn ChangeListener>) {
        let target = Arc::as_ptr(listener) as *const ();
        self.entries
            .lock()
            .retain(|w| w.strong_count() > 0 && Weak::as_ptr(w) as *const () != target);
    }

    /// Upgrade the live listeners, pruning dead ones.
    ///
    /// Returns `None` when nobody is listening, so commit can skip changed-key
    /// bookkeeping entirely.
    pub(crate) fn snapshot(&self) -> Option<Vec<Arc<dyn ChangeListener>>> {
        let mut entries = self.entries.lock();
        entries.retain(|w| w.strong_count() > 0);
        let live: Vec<_> = entries.iter().filter_map(Weak::upgrade).collect();
        if live.is_empty() {
            None
        } else {
            Some(live)
        }
    }
}

/// One unit of deferred work for the worker thread.
pub(crate) enum Job {
    /// Deliver a commit's notifications.
    Notify(NotifyUnit),
    /// Apply an editor's drained batch to the store, then notify.
    Apply {
        /// Store the batch belongs to
        store: PrefStore,
        /// The drained staging buffer
        batch: Batch,
    },
    /// Acknowledge once every job enqueued earlier has been processed.
    Flush(Sender<()>),
}

/// A commit's full notification payload: changed keys plus the listener
/// snapshot taken when the commit started. Delivered as one unit, never
/// split across contexts.
pub(crate) struct NotifyUnit {
    store: PrefStore,
    keys: Vec<String>,
    listeners: Vec<Arc<dyn ChangeListener>>,
}

impl NotifyUnit {
    /// Invoke every listener for every changed key, most recent staging
    /// first. A panicking listener is contained and logged; the remaining
    /// listeners still run.
    fn deliver(self) {
        for key in self.keys.iter().rev() {
            for listener in &self.listeners {
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| listener.on_change(&self.store, key)));
                if outcome.is_err() {
                    tracing::error!(key = %key, "change listener panicked during delivery");
                }
            }
        }
    }
}

/// Owns the designated callback context.
///
/// One worker thread per store. The thread parks on its channel and exits
/// when the store (and with it the sending half) is dropped.
pub(crate) struct Dispatcher {
    tx: Sender<Job>,
    worker: ThreadId,
}

impl Dispatcher {
    pub(crate) fn spawn() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name("prefstore-notify".to_owned())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    match job {
                        Job::Notify(unit) => unit.deliver(),
                        Job::Apply { store, batch } => store.apply_batch_and_notify(batch),
                        Job::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            })?;
        Ok(Self {
            tx,
            worker: handle.thread().id(),
        })
    }

    fn on_worker(&self) -> bool {
        thread::current().id() == self.worker
    }

    /// Hand a commit result off for delivery.
    ///
    /// No-op fast path: nothing is enqueued when the commit recorded no
    /// listeners or no changed keys. Inline when already on the worker, so a
    /// synchronous commit made from a listener completes delivery before it
    /// returns.
    pub(crate) fn notify(&self, store: &PrefStore, result: CommitResult) {
        let (Some(keys), Some(listeners)) = (result.keys_modified, result.listeners) else {
            return;
        };
        if keys.is_empty() {
            return;
        }
        let unit = NotifyUnit {
            store: store.clone(),
            keys,
            listeners,
        };
        if self.on_worker() {
            unit.deliver();
        } else if let Err(e) = self.tx.send(Job::Notify(unit)) {
            tracing::error!(error = %e, "notification dispatcher is gone, dropping batch");
        }
    }

    /// Schedule a drained batch for application off the caller's thread.
    ///
    /// The async commit path: application and delivery happen on the worker,
    /// with no feedback channel to the caller.
    pub(crate) fn schedule_apply(&self, store: &PrefStore, batch: Batch) {
        if let Err(e) = self.tx.send(Job::Apply {
            store: store.clone(),
            batch,
        }) {
            tracing::error!(error = %e, "notification dispatcher is gone, dropping apply");
        }
    }

    /// Block until every job enqueued before this call has been processed.
    ///
    /// Inline no-op on the worker itself: earlier jobs have already run.
    pub(crate) fn flush(&self) {
        if self.on_worker() {
            return;
        }
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.tx.send(Job::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}
