//! Seeding from external storage.
//!
//! The store itself has no persistence; a host that keeps preferences on
//! disk (or in a platform settings service) loads them once at startup and
//! hands them over through a [`SeedSource`].

use crate::error::Result;
use crate::value::Value;

/// An external key → value enumeration consulted once at store construction.
///
/// Values are copied into the store, never referenced. Enumeration is
/// fallible so adapters over real storage can surface read errors through
/// [`crate::PrefStoreBuilder::build`].
pub trait SeedSource {
    /// Enumerate the entries to pre-populate the store with.
    fn entries(&self) -> Result<Vec<(String, Value)>>;
}

/// A [`SeedSource`] over an in-memory collection.
///
/// Useful for tests and for hosts that have already deserialized their
/// preferences elsewhere.
pub struct MapSeed {
    entries: Vec<(String, Value)>,
}

impl MapSeed {
    /// Build a seed from any iterable of key/value pairs.
    pub fn new<K, V, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl SeedSource for MapSeed {
    fn entries(&self) -> Result<Vec<(String, Value)>> {
        Ok(self.entries.clone())
    }
}
