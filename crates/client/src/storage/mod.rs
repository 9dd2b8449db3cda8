//! Durable key-value storage backends for the local cart.
//!
//! The local cart only needs a synchronous get/set/remove primitive scoped
//! to one origin (a browser's `localStorage`, a per-user directory on
//! disk). [`KeyValueStorage`] is that primitive; [`LocalCartStore`] builds
//! the cart document on top of it.
//!
//! # Backends
//!
//! - [`MemoryStorage`] - in-process map, for tests and ephemeral sessions
//! - [`DirectoryStorage`] - one file per key, written atomically via rename
//!
//! Both accept an optional byte quota so quota exhaustion can be exercised
//! the same way a browser would refuse an oversized write.
//!
//! [`LocalCartStore`]: crate::local::LocalCartStore

mod directory;
mod memory;

pub use directory::DirectoryStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

/// Errors that can occur when reading or writing local storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write would exceed the storage quota.
    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded {
        /// Bytes the store would hold after the write.
        needed: usize,
        /// Configured quota in bytes.
        quota: usize,
    },

    /// The key cannot be used by this backend.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Filesystem operation failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A synchronous, origin-scoped key-value store.
///
/// `set` replaces the value atomically from the caller's point of view: on
/// error, the previous value is left intact.
pub trait KeyValueStorage: Send + Sync {
    /// Get the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::QuotaExceeded` if the write would exceed the
    /// quota, or another `StorageError` if the backend fails.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`. Removing a missing key is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend fails.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: KeyValueStorage + ?Sized> KeyValueStorage for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}
