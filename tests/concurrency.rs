//! Concurrent readers, writers, and listeners against one store.

use parking_lot::Mutex;
use prefstore::{ChangeListener, PrefStore};
use std::sync::Arc;
use std::thread;

#[derive(Default)]
struct Recorder {
    keys: Mutex<Vec<String>>,
}

impl ChangeListener for Recorder {
    fn on_change(&self, _store: &PrefStore, key: &str) {
        self.keys.lock().push(key.to_owned());
    }
}

#[test]
fn concurrent_commits_on_distinct_keys_all_land() {
    let store = PrefStore::new().unwrap();
    let threads = 8;
    let per_thread = 200;

    thread::scope(|scope| {
        for t in 0..threads {
            let store = store.clone();
            scope.spawn(move || {
                for i in 0..per_thread {
                    store
                        .edit()
                        .put(format!("t{t}-k{i}"), (t * per_thread + i) as i32)
                        .commit();
                }
            });
        }
    });

    assert_eq!(store.all().len(), (threads * per_thread) as usize);
    assert_eq!(store.get_i32("t0-k0", -1), 0);
    assert_eq!(
        store.get_i32("t7-k199", -1),
        7 * per_thread + 199,
        "every thread's writes are visible after join"
    );
}

#[test]
fn concurrent_commits_on_one_key_serialize_to_a_single_winner() {
    let store = PrefStore::new().unwrap();
    let writers = 16;

    thread::scope(|scope| {
        for value in 0..writers {
            let store = store.clone();
            scope.spawn(move || {
                store.edit().put("contested", value).commit();
            });
        }
    });

    let winner = store.get_i32("contested", -1);
    assert!(
        (0..writers).contains(&winner),
        "stored value must be one of the committed ones, got {winner}"
    );
}

#[test]
fn one_notification_per_changed_key_under_concurrent_commits() {
    let store = PrefStore::new().unwrap();
    let listener = Arc::new(Recorder::default());
    store.register_listener(&listener);

    let threads = 4;
    let per_thread = 50;

    thread::scope(|scope| {
        for t in 0..threads {
            let store = store.clone();
            scope.spawn(move || {
                for i in 0..per_thread {
                    store.edit().put(format!("t{t}-k{i}"), 1_i32).commit();
                }
            });
        }
    });
    store.flush();

    let mut keys = listener.keys.lock().clone();
    assert_eq!(keys.len(), (threads * per_thread) as usize);
    keys.sort();
    keys.dedup();
    assert_eq!(
        keys.len(),
        (threads * per_thread) as usize,
        "no key may be notified twice"
    );
}

#[test]
fn readers_race_writers_without_tearing() {
    let store = PrefStore::new().unwrap();
    store.edit().put("k", 0_i32).commit();

    thread::scope(|scope| {
        let writer = store.clone();
        scope.spawn(move || {
            for i in 1..500 {
                writer.edit().put("k", i).commit();
            }
        });

        let reader = store.clone();
        scope.spawn(move || {
            for _ in 0..500 {
                let v = reader.get_i32("k", -1);
                assert!((0..500).contains(&v), "observed impossible value {v}");
                let snapshot = reader.all();
                assert!(snapshot.len() <= 1);
            }
        });
    });
}

#[test]
fn same_editor_shared_across_threads_stages_everything() {
    let store = PrefStore::new().unwrap();
    let editor = Arc::new(store.edit());

    thread::scope(|scope| {
        for t in 0..4 {
            let editor = editor.clone();
            scope.spawn(move || {
                for i in 0..25 {
                    editor.put(format!("t{t}-k{i}"), 1_i32);
                }
            });
        }
    });

    editor.commit();
    assert_eq!(store.all().len(), 100, "all staged puts commit together");
}
