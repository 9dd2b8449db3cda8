//! Browser-local cart persistence.
//!
//! The local cart is stored as one versioned JSON document under a single
//! key. Every line carries a `pending_sync` flag: guest lines are pending
//! until the server acknowledges them during a merge, when they are removed.
//! Lines mirrored from an authenticated cart during a degraded write are not
//! pending.
//!
//! The store never fails its caller. Read errors (missing key, corrupt or
//! unknown-version document) read as an empty cart; write errors are logged
//! and leave the previous document in place. Writes still return the error
//! so the synchronizer can tell when neither store accepted a mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cartsync_core::{Cart, LineItem, ProductRef};

use crate::storage::{KeyValueStorage, StorageError};

/// Current version of the stored document.
const DOCUMENT_VERSION: u32 = 1;

/// Whether lines written to the local store still need to reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingSync {
    /// Not yet acknowledged by the server.
    Pending,
    /// Already on the server (or deliberately never sent).
    Synced,
}

/// A cart line as persisted locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalLine {
    /// The line itself.
    pub line: LineItem,
    /// Set while the server has not acknowledged this line.
    #[serde(default)]
    pub pending_sync: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCart {
    version: u32,
    updated_at: DateTime<Utc>,
    lines: Vec<LocalLine>,
}

/// Durable local cart storage on top of a [`KeyValueStorage`].
#[derive(Debug, Clone)]
pub struct LocalCartStore<S> {
    storage: S,
    key: String,
}

impl<S: KeyValueStorage> LocalCartStore<S> {
    /// Create a store keeping its document under `key`.
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// The underlying storage.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Read the stored cart. Empty if nothing was ever written or the
    /// document cannot be read.
    pub fn read(&self) -> Cart {
        self.read_entries().into_iter().map(|e| e.line).collect()
    }

    /// Read the stored lines with their sync flags.
    ///
    /// Duplicate product references in the document are summed into the
    /// first occurrence, which stays pending if any duplicate was.
    pub fn read_entries(&self) -> Vec<LocalLine> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read local cart");
                return Vec::new();
            }
        };

        let stored: StoredCart = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Discarding unreadable local cart");
                return Vec::new();
            }
        };

        if stored.version != DOCUMENT_VERSION {
            warn!(
                key = %self.key,
                version = stored.version,
                "Discarding local cart with unknown document version"
            );
            return Vec::new();
        }

        normalize(stored.lines)
    }

    /// Lines not yet acknowledged by the server.
    pub fn pending(&self) -> Cart {
        self.read_entries()
            .into_iter()
            .filter(|e| e.pending_sync)
            .map(|e| e.line)
            .collect()
    }

    /// Whether any stored line still needs to reach the server.
    pub fn has_pending(&self) -> bool {
        self.read_entries().iter().any(|e| e.pending_sync)
    }

    /// Replace the stored cart, flagging every line the same way.
    ///
    /// # Errors
    ///
    /// Returns the storage error after logging it; the previous document is
    /// left intact.
    pub fn write(&self, cart: &Cart, pending: PendingSync) -> Result<(), StorageError> {
        let entries: Vec<LocalLine> = cart
            .lines()
            .iter()
            .map(|line| LocalLine {
                line: line.clone(),
                pending_sync: pending == PendingSync::Pending,
            })
            .collect();
        self.write_entries(&entries)
    }

    /// Replace the stored lines. Writing no lines removes the document.
    ///
    /// # Errors
    ///
    /// Returns the storage error after logging it; the previous document is
    /// left intact.
    pub fn write_entries(&self, entries: &[LocalLine]) -> Result<(), StorageError> {
        if entries.is_empty() {
            return self.clear();
        }

        let document = StoredCart {
            version: DOCUMENT_VERSION,
            updated_at: Utc::now(),
            lines: entries.to_vec(),
        };

        let result = serde_json::to_string(&document)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.set(&self.key, &json));

        match &result {
            Ok(()) => debug!(key = %self.key, lines = entries.len(), "Local cart written"),
            Err(e) => warn!(key = %self.key, error = %e, "Failed to write local cart"),
        }
        result
    }

    /// Replace the stored cart with `cart`, keeping the pending flag of every
    /// line that was already stored. Lines not previously stored are written
    /// as synced.
    ///
    /// # Errors
    ///
    /// Returns the storage error after logging it.
    pub fn write_preserving_pending(&self, cart: &Cart) -> Result<(), StorageError> {
        let previous = self.read_entries();
        let entries: Vec<LocalLine> = cart
            .lines()
            .iter()
            .map(|line| LocalLine {
                pending_sync: previous
                    .iter()
                    .any(|e| e.pending_sync && e.line.product_ref == line.product_ref),
                line: line.clone(),
            })
            .collect();
        self.write_entries(&entries)
    }

    /// Remove the pending line for `product_ref` once a merge no longer needs
    /// it, either because the server took it or because it was refused.
    ///
    /// The document only shrinks, so a quota the guest cart fit in is never
    /// exceeded here.
    ///
    /// # Errors
    ///
    /// Returns the storage error after logging it.
    pub fn acknowledge(&self, product_ref: &ProductRef) -> Result<(), StorageError> {
        let mut entries = self.read_entries();
        let before = entries.len();
        entries.retain(|e| !(e.pending_sync && &e.line.product_ref == product_ref));
        if entries.len() == before {
            return Ok(());
        }
        self.write_entries(&entries)
    }

    /// Remove every line that is not pending, keeping pending guest lines.
    ///
    /// # Errors
    ///
    /// Returns the storage error after logging it.
    pub fn drop_synced(&self) -> Result<(), StorageError> {
        let entries = self.read_entries();
        let pending: Vec<LocalLine> = entries.iter().filter(|e| e.pending_sync).cloned().collect();
        if pending.len() == entries.len() {
            return Ok(());
        }
        self.write_entries(&pending)
    }

    /// Remove the stored cart.
    ///
    /// # Errors
    ///
    /// Returns the storage error after logging it.
    pub fn clear(&self) -> Result<(), StorageError> {
        let result = self.storage.remove(&self.key);
        match &result {
            Ok(()) => debug!(key = %self.key, "Local cart cleared"),
            Err(e) => warn!(key = %self.key, error = %e, "Failed to clear local cart"),
        }
        result
    }
}

fn normalize(lines: Vec<LocalLine>) -> Vec<LocalLine> {
    let mut out: Vec<LocalLine> = Vec::with_capacity(lines.len());
    for entry in lines {
        match out
            .iter_mut()
            .find(|e| e.line.product_ref == entry.line.product_ref)
        {
            Some(existing) => {
                existing.line.quantity = existing.line.quantity.saturating_add(entry.line.quantity);
                existing.pending_sync |= entry.pending_sync;
            }
            None => out.push(entry),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use cartsync_core::Quantity;

    use super::*;
    use crate::storage::MemoryStorage;

    fn line(r: &str, quantity: u32) -> LineItem {
        LineItem {
            product_ref: ProductRef::parse(r).unwrap(),
            name: format!("Product {r}"),
            unit_price: Decimal::new(500, 2),
            quantity: Quantity::new(quantity).unwrap(),
            display_ref: None,
        }
    }

    fn store() -> LocalCartStore<MemoryStorage> {
        LocalCartStore::new(MemoryStorage::new(), "cart")
    }

    #[test]
    fn test_read_never_written() {
        assert!(store().read().is_empty());
        assert!(!store().has_pending());
    }

    #[test]
    fn test_write_then_read() {
        let store = store();
        let cart = Cart::from_lines(vec![line("A", 2), line("B", 1)]);
        store.write(&cart, PendingSync::Pending).unwrap();

        assert_eq!(store.read(), cart);
        assert_eq!(store.pending(), cart);
    }

    #[test]
    fn test_write_is_idempotent() {
        let store = store();
        let cart = Cart::from_lines(vec![line("A", 2)]);
        store.write(&cart, PendingSync::Pending).unwrap();
        store.write(&cart, PendingSync::Pending).unwrap();
        assert_eq!(store.read(), cart);
    }

    #[test]
    fn test_corrupt_document_reads_empty() {
        let storage = MemoryStorage::new();
        storage.set("cart", "{not json").unwrap();
        let store = LocalCartStore::new(storage, "cart");
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_unknown_version_reads_empty() {
        let storage = MemoryStorage::new();
        storage
            .set(
                "cart",
                r#"{"version":99,"updated_at":"2026-01-01T00:00:00Z","lines":[]}"#,
            )
            .unwrap();
        let store = LocalCartStore::new(storage, "cart");
        assert!(store.read_entries().is_empty());
    }

    #[test]
    fn test_quota_failure_keeps_previous_value() {
        let store = LocalCartStore::new(MemoryStorage::with_quota(400), "cart");
        let small = Cart::from_lines(vec![line("A", 1)]);
        store.write(&small, PendingSync::Pending).unwrap();

        let big: Cart = (0..20).map(|i| line(&format!("sku-{i}"), 1)).collect();
        assert!(matches!(
            store.write(&big, PendingSync::Pending),
            Err(StorageError::QuotaExceeded { .. })
        ));
        assert_eq!(store.read(), small);
    }

    #[test]
    fn test_acknowledge_and_drop_synced() {
        let store = store();
        let cart = Cart::from_lines(vec![line("A", 1), line("B", 1)]);
        store.write(&cart, PendingSync::Pending).unwrap();
        store
            .write_preserving_pending(&Cart::from_lines(vec![
                line("A", 1),
                line("B", 1),
                line("M", 1),
            ]))
            .unwrap();

        store.acknowledge(&ProductRef::parse("A").unwrap()).unwrap();
        store.acknowledge(&ProductRef::parse("A").unwrap()).unwrap();
        assert_eq!(store.pending(), Cart::from_lines(vec![line("B", 1)]));
        assert_eq!(
            store.read(),
            Cart::from_lines(vec![line("B", 1), line("M", 1)])
        );

        store.drop_synced().unwrap();
        assert_eq!(store.read(), Cart::from_lines(vec![line("B", 1)]));
    }

    #[test]
    fn test_acknowledge_fits_in_a_full_quota() {
        let storage = MemoryStorage::new();
        let store = LocalCartStore::new(storage.clone(), "cart");
        let cart = Cart::from_lines(vec![line("A", 1), line("B", 1)]);
        store.write(&cart, PendingSync::Pending).unwrap();
        let document = storage.get("cart").unwrap().unwrap();

        let full = MemoryStorage::with_quota(document.len());
        full.set("cart", &document).unwrap();
        let store = LocalCartStore::new(full.clone(), "cart");

        store.acknowledge(&ProductRef::parse("A").unwrap()).unwrap();
        assert_eq!(store.pending(), Cart::from_lines(vec![line("B", 1)]));
        store.acknowledge(&ProductRef::parse("B").unwrap()).unwrap();
        assert_eq!(full.get("cart").unwrap(), None);
    }

    #[test]
    fn test_write_preserving_pending() {
        let store = store();
        store
            .write(&Cart::from_lines(vec![line("A", 1)]), PendingSync::Pending)
            .unwrap();

        let mirror = Cart::from_lines(vec![line("A", 3), line("C", 1)]);
        store.write_preserving_pending(&mirror).unwrap();

        let entries = store.read_entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].pending_sync);
        assert!(!entries[1].pending_sync);
    }

    #[test]
    fn test_duplicate_lines_are_summed() {
        let storage = MemoryStorage::new();
        let store = LocalCartStore::new(storage, "cart");
        store
            .write_entries(&[
                LocalLine {
                    line: line("A", 1),
                    pending_sync: false,
                },
                LocalLine {
                    line: line("A", 2),
                    pending_sync: true,
                },
            ])
            .unwrap();

        let entries = store.read_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].line.quantity.get(), 3);
        assert!(entries[0].pending_sync);
    }

    #[test]
    fn test_clear_twice() {
        let store = store();
        store
            .write(&Cart::from_lines(vec![line("A", 1)]), PendingSync::Pending)
            .unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_writing_empty_cart_removes_document() {
        let storage = MemoryStorage::new();
        let store = LocalCartStore::new(storage.clone(), "cart");
        store
            .write(&Cart::from_lines(vec![line("A", 1)]), PendingSync::Pending)
            .unwrap();
        store.write(&Cart::new(), PendingSync::Pending).unwrap();
        assert_eq!(storage.get("cart").unwrap(), None);
    }
}
