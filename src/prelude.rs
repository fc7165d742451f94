//! Convenient imports for common usage.
//!
//! ```
//! use prefstore::prelude::*;
//!
//! let store = PrefStore::new()?;
//! store.edit().put("ready", true).commit();
//! assert!(store.get_bool("ready", false));
//! # Ok::<(), prefstore::Error>(())
//! ```

pub use crate::dispatch::ChangeListener;
pub use crate::editor::Editor;
pub use crate::error::{Error, Result};
pub use crate::seed::{MapSeed, SeedSource};
pub use crate::store::{PrefStore, PrefStoreBuilder};
pub use crate::value::{Value, ValueKind};
