//! Shared test data and service builders.

use std::time::Duration;

use rust_decimal::Decimal;

use cartsync_client::{CartService, Credential, LocalCartStore, MemoryStorage};
use cartsync_core::{CatalogItem, LineItem, ProductRef, Quantity};

use crate::fake_remote::{InMemoryRemote, VALID_TOKEN};

/// Storage key used by every fixture service.
pub const CART_KEY: &str = "cart";

/// Remote timeout used by every fixture service.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(2);

/// Parse a product reference, panicking on invalid fixture data.
///
/// # Panics
///
/// If `value` is not a valid product reference.
#[must_use]
pub fn product(value: &str) -> ProductRef {
    ProductRef::parse(value).unwrap_or_else(|e| panic!("invalid fixture ref {value:?}: {e}"))
}

/// Catalog entry priced at 2.50 per unit.
#[must_use]
pub fn catalog_item(value: &str) -> CatalogItem {
    CatalogItem {
        product_ref: product(value),
        name: format!("Product {value}"),
        unit_price: Decimal::new(250, 2),
        display_ref: Some(format!("/images/{value}.webp")),
    }
}

/// Cart line for [`catalog_item`] with the given quantity.
///
/// # Panics
///
/// If `quantity` is zero.
#[must_use]
pub fn line(value: &str, quantity: u32) -> LineItem {
    let quantity =
        Quantity::new(quantity).unwrap_or_else(|e| panic!("invalid fixture quantity: {e}"));
    catalog_item(value).into_line(quantity)
}

/// `(product_ref, quantity)` pairs of a cart, in order.
#[must_use]
pub fn quantities(cart: &cartsync_core::Cart) -> Vec<(String, u32)> {
    cart.lines()
        .iter()
        .map(|l| (l.product_ref.to_string(), l.quantity.get()))
        .collect()
}

/// The credential [`InMemoryRemote`] accepts.
#[must_use]
pub fn valid_credential() -> Credential {
    Credential::new(VALID_TOKEN)
}

/// Service over fresh in-memory storage and the given remote.
#[must_use]
pub fn service(remote: InMemoryRemote) -> CartService<MemoryStorage, InMemoryRemote> {
    service_with_storage(MemoryStorage::new(), remote)
}

/// Service over the given storage and remote. `MemoryStorage` clones share
/// their map, so a test can keep a handle to inspect it.
#[must_use]
pub fn service_with_storage(
    storage: MemoryStorage,
    remote: InMemoryRemote,
) -> CartService<MemoryStorage, InMemoryRemote> {
    CartService::from_parts(LocalCartStore::new(storage, CART_KEY), remote, REMOTE_TIMEOUT)
}

/// The local store a fixture service writes to.
#[must_use]
pub fn local_store(storage: &MemoryStorage) -> LocalCartStore<MemoryStorage> {
    LocalCartStore::new(storage.clone(), CART_KEY)
}
