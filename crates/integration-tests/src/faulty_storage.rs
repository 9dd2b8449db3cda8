//! Local storage whose writes can be switched off.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cartsync_client::{KeyValueStorage, MemoryStorage, StorageError};

/// [`MemoryStorage`] that fails every `set` and `remove` while writes are
/// switched off. Reads keep working.
///
/// Clones share the map and the switch.
#[derive(Debug, Clone, Default)]
pub struct FaultyStorage {
    inner: MemoryStorage,
    writes_fail: Arc<AtomicBool>,
}

impl FaultyStorage {
    /// Healthy storage over an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail.
    pub fn fail_writes(&self) {
        self.writes_fail.store(true, Ordering::SeqCst);
    }

    /// Accept writes again.
    pub fn heal(&self) {
        self.writes_fail.store(false, Ordering::SeqCst);
    }

    /// The map behind the switch.
    #[must_use]
    pub const fn inner(&self) -> &MemoryStorage {
        &self.inner
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.writes_fail.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "storage is read-only",
            )));
        }
        Ok(())
    }
}

impl KeyValueStorage for FaultyStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.inner.remove(key)
    }
}
