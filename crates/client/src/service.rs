//! Cart service: the operations UI code calls.
//!
//! A `CartService` is constructed once per session and passed to whatever
//! renders the cart. It forwards each operation to its
//! [`CartSynchronizer`] and then publishes a [`CartSnapshot`] on a
//! `tokio::sync::watch` channel, so views re-render only after the store
//! call they triggered has completed.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut cart = CartService::from_parts(local, remote, config.remote.timeout);
//! let mut updates = cart.subscribe();
//!
//! cart.load().await?;
//! cart.add_item(catalog_item, 2).await?;
//! assert_eq!(updates.borrow_and_update().item_count, 2);
//! ```

use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::instrument;

use cartsync_core::{Cart, CatalogItem, ProductRef, Quantity};

use crate::credential::Credential;
use crate::error::Result;
use crate::local::LocalCartStore;
use crate::remote::RemoteCartStore;
use crate::storage::KeyValueStorage;
use crate::sync::{CartSynchronizer, SyncPhase};

/// What the UI renders: the cart and its derived totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    /// Current cart lines.
    pub cart: Cart,
    /// Sum of line quantities.
    pub item_count: u64,
    /// Sum of `unit_price * quantity`.
    pub subtotal: Decimal,
    /// Which store backs the cart.
    pub phase: SyncPhase,
    /// Guest lines the server refused when they were merged at login. The
    /// UI should tell the customer these did not make it into their cart.
    pub dropped: Vec<ProductRef>,
}

impl CartSnapshot {
    fn of(cart: &Cart, phase: SyncPhase, dropped: &[ProductRef]) -> Self {
        Self {
            cart: cart.clone(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal(),
            phase,
            dropped: dropped.to_vec(),
        }
    }
}

/// Public facade over the cart synchronizer.
pub struct CartService<S, R> {
    sync: CartSynchronizer<S, R>,
    snapshot: watch::Sender<CartSnapshot>,
}

impl<S: KeyValueStorage, R: RemoteCartStore> CartService<S, R> {
    /// Wrap a synchronizer.
    pub fn new(sync: CartSynchronizer<S, R>) -> Self {
        let (snapshot, _) = watch::channel(CartSnapshot::of(
            sync.cart(),
            sync.phase(),
            sync.dropped_lines(),
        ));
        Self { sync, snapshot }
    }

    /// Build the synchronizer and wrap it.
    pub fn from_parts(local: LocalCartStore<S>, remote: R, remote_timeout: Duration) -> Self {
        Self::new(CartSynchronizer::new(local, remote, remote_timeout))
    }

    /// Receive a snapshot after every operation.
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.snapshot.subscribe()
    }

    /// The synchronizer behind this service.
    pub const fn synchronizer(&self) -> &CartSynchronizer<S, R> {
        &self.sync
    }

    /// The current cart.
    pub const fn cart(&self) -> &Cart {
        self.sync.cart()
    }

    /// Sum of line quantities in the current cart.
    pub fn item_count(&self) -> u64 {
        self.sync.cart().item_count()
    }

    /// Sum of `unit_price * quantity` over the current cart.
    pub fn subtotal(&self) -> Decimal {
        self.sync.cart().subtotal()
    }

    /// Which store backs the cart.
    pub const fn phase(&self) -> SyncPhase {
        self.sync.phase()
    }

    /// Load the cart from the authoritative store.
    ///
    /// # Errors
    ///
    /// See [`CartSynchronizer::load`].
    pub async fn load(&mut self) -> Result<()> {
        let result = self.sync.load().await;
        self.publish();
        result
    }

    /// Add `quantity` units of a catalog item. The catalog name and price
    /// are snapshotted into the line.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidQuantity` for 0 or an out-of-range value,
    /// or `SyncError::Cart` if the line would grow past the per-line limit.
    #[instrument(skip(self, item), fields(product_ref = %item.product_ref))]
    pub async fn add_item(&mut self, item: CatalogItem, quantity: u32) -> Result<()> {
        let quantity = Quantity::new(quantity)?;
        let result = self.sync.add(item.into_line(quantity)).await;
        self.publish();
        result
    }

    /// Set the quantity of a line. Zero is rejected; use
    /// [`remove_item`](Self::remove_item) to delete a line.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidQuantity` for 0 (the line is left
    /// untouched) or `SyncError::Cart` if the line does not exist.
    #[instrument(skip(self), fields(product_ref = %product_ref))]
    pub async fn set_quantity(
        &mut self,
        product_ref: &ProductRef,
        quantity: u32,
    ) -> Result<()> {
        let quantity = Quantity::new(quantity)?;
        let result = self.sync.set_quantity(product_ref.clone(), quantity).await;
        self.publish();
        result
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// See [`CartSynchronizer::remove`].
    #[instrument(skip(self), fields(product_ref = %product_ref))]
    pub async fn remove_item(&mut self, product_ref: &ProductRef) -> Result<()> {
        let result = self.sync.remove(product_ref.clone()).await;
        self.publish();
        result
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// See [`CartSynchronizer::clear`].
    pub async fn clear(&mut self) -> Result<()> {
        let result = self.sync.clear().await;
        self.publish();
        result
    }

    /// Notify the cart that the customer authenticated.
    ///
    /// # Errors
    ///
    /// See [`CartSynchronizer::login`].
    pub async fn login(&mut self, credential: Credential) -> Result<()> {
        if self.sync.has_pending_local() {
            self.snapshot.send_replace(CartSnapshot::of(
                self.sync.cart(),
                SyncPhase::Merging,
                &[],
            ));
        }
        let result = self.sync.login(credential).await;
        self.publish();
        result
    }

    /// Notify the cart that the customer logged out.
    pub fn logout(&mut self) {
        self.sync.logout();
        self.publish();
    }

    fn publish(&self) {
        self.snapshot.send_replace(CartSnapshot::of(
            self.sync.cart(),
            self.sync.phase(),
            self.sync.dropped_lines(),
        ));
    }
}
