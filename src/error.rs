//! Unified error types for the preferences store.
//!
//! Reads are total functions: a missing key resolves to the caller-supplied
//! default and is never an error. The variants here cover the two places a
//! caller can actually observe a failure: the strict read path and seed
//! loading at construction.

use crate::value::ValueKind;
use thiserror::Error;

/// All prefstore errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A stored value's tag differs from the requested tag.
    ///
    /// Only the strict read path reports this; the defaulting getters fall
    /// back to the caller-supplied default instead.
    #[error("wrong type for key {key:?}: expected {expected}, got {actual}")]
    WrongType {
        /// Key whose value was read
        key: String,
        /// Tag requested by the caller
        expected: ValueKind,
        /// Tag actually stored
        actual: ValueKind,
    },

    /// Seed source failed to enumerate its entries.
    #[error("seed source failed: {0}")]
    Seed(String),

    /// I/O error (dispatcher thread could not be spawned).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for prefstore operations.
pub type Result<T> = std::result::Result<T, Error>;
