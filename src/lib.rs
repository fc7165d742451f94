//! # prefstore
//!
//! An in-memory, thread-safe preferences store with batched atomic commits
//! and asynchronous change notification.
//!
//! Writers stage mutations privately on [`Editor`] batches and commit them
//! atomically; readers never see a half-applied batch. Registered
//! [`ChangeListener`]s are notified once per effectively-changed key, on a
//! single dedicated dispatch thread, never under the store lock.
//!
//! ## Quick Start
//!
//! ```
//! use prefstore::PrefStore;
//!
//! let store = PrefStore::new()?;
//!
//! // Stage a batch, commit it atomically.
//! store.edit()
//!     .put("theme", "dark")
//!     .put("volume", 11_i32)
//!     .commit();
//!
//! // Reads are total: missing keys resolve to the default.
//! assert_eq!(store.get_string("theme", "light"), "dark");
//! assert_eq!(store.get_i32("brightness", 50), 50);
//! # Ok::<(), prefstore::Error>(())
//! ```
//!
//! ## Commit variants
//!
//! - [`Editor::commit`] blocks until the batch is applied to memory.
//! - [`Editor::apply`] returns immediately; application and delivery happen
//!   on the dispatch thread with no feedback channel.
//!
//! ## What this is not
//!
//! The store is a memory-resident cache: no durability, no crash recovery,
//! no cross-process synchronization. Hosts that persist preferences seed the
//! store at construction (see [`SeedSource`]) and flush however they like.

#![warn(missing_docs)]

mod dispatch;
mod download;
mod editor;
mod error;
mod seed;
mod store;
mod value;

pub mod prelude;

pub use dispatch::ChangeListener;
pub use download::DownloadStatus;
pub use editor::Editor;
pub use error::{Error, Result};
pub use seed::{MapSeed, SeedSource};
pub use store::{PrefStore, PrefStoreBuilder};
pub use value::{Value, ValueKind};
