//! Cart synchronization between the local and remote stores.
//!
//! # States
//!
//! ```text
//!              login (no pending lines)
//!   Anonymous ─────────────────────────────────────► Authenticated
//!       │                                                ▲   │
//!       │ login (pending guest lines)                    │   │ logout /
//!       ▼                                                │   │ credential rejected
//!    Merging ───── merge complete, aborted or interrupted┘   ▼
//!                                                        Anonymous
//! ```
//!
//! - **Anonymous** - every read and write goes to the local store. Lines
//!   are written as pending-sync.
//! - **Merging** - transient, inside [`CartSynchronizer::login`]. Pending
//!   guest lines are reconciled into the server cart: lines the server
//!   already has get their quantity raised to the sum, new lines are added.
//!   Each line is removed from the local store as soon as the server
//!   acknowledges it, and remembered for the rest of the session in case that
//!   write fails, so an interrupted merge is resumed without counting a line
//!   twice. Lines the server refuses are dropped and reported through
//!   [`CartSynchronizer::dropped_lines`].
//! - **Authenticated** - mutations go to the remote store first. A
//!   transient failure (network, timeout, server) replays the mutation on
//!   the local store so the caller still sees it applied. A rejected
//!   credential drops back to Anonymous and is reported to the caller.
//!
//! # Concurrency
//!
//! Operations take `&mut self` and complete in the order they are awaited.
//! Nothing here queues or coalesces calls across sessions: two sessions
//! (tabs, devices) writing the same remote cart race, and the last write
//! wins.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use cartsync_core::{Cart, CartError, LineItem, ProductRef, Quantity, ReconcileStep};

use crate::credential::Credential;
use crate::error::{Result, SyncError};
use crate::local::{LocalCartStore, PendingSync};
use crate::remote::{RemoteCartStore, RemoteError};
use crate::storage::{KeyValueStorage, StorageError};

/// Which store currently backs the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    /// Guest session; local store only.
    Anonymous,
    /// Guest cart being merged into the customer cart.
    Merging,
    /// Customer session; remote store first, local fallback.
    Authenticated,
}

#[derive(Debug)]
enum SessionState {
    Anonymous,
    Merging { credential: Credential },
    Authenticated { credential: Credential },
}

impl SessionState {
    const fn phase(&self) -> SyncPhase {
        match self {
            Self::Anonymous => SyncPhase::Anonymous,
            Self::Merging { .. } => SyncPhase::Merging,
            Self::Authenticated { .. } => SyncPhase::Authenticated,
        }
    }

    const fn credential(&self) -> Option<&Credential> {
        match self {
            Self::Anonymous => None,
            Self::Merging { credential } | Self::Authenticated { credential } => Some(credential),
        }
    }
}

#[derive(Debug, Clone)]
enum Mutation {
    Add(LineItem),
    SetQuantity(ProductRef, Quantity),
    Remove(ProductRef),
    Clear,
}

impl Mutation {
    const fn name(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::SetQuantity(..) => "set_quantity",
            Self::Remove(_) => "remove",
            Self::Clear => "clear",
        }
    }

    fn apply_to(&self, cart: &mut Cart) -> Result<(), CartError> {
        match self {
            Self::Add(line) => cart.add(line.clone())?,
            Self::SetQuantity(product_ref, quantity) => cart.set_quantity(product_ref, *quantity)?,
            Self::Remove(product_ref) => {
                cart.remove(product_ref);
            }
            Self::Clear => cart.clear(),
        }
        Ok(())
    }
}

/// How a reconciliation of pending guest lines ended.
#[derive(Debug)]
enum ReconcileOutcome {
    /// Every pending line reached the server; the local cart is gone.
    Complete,
    /// The remote failed part-way; unacknowledged lines stay pending.
    Interrupted(RemoteError),
    /// The local store could not record a settled line. The remote is
    /// reachable; the remaining lines are merged on the next call.
    Stalled,
}

/// Keeps one logical cart consistent across the local and remote stores.
///
/// The synchronizer is the only writer of the cart it holds. It is created
/// once per session and owned by a [`CartService`](crate::service::CartService).
pub struct CartSynchronizer<S, R> {
    local: LocalCartStore<S>,
    remote: R,
    state: SessionState,
    cart: Cart,
    remote_timeout: Duration,
    /// Guest lines the server has taken or refused in this session.
    acknowledged: HashSet<ProductRef>,
    /// Guest lines refused during the last merge.
    dropped: Vec<ProductRef>,
}

impl<S: KeyValueStorage, R: RemoteCartStore> CartSynchronizer<S, R> {
    /// Create a synchronizer for a guest session, showing whatever the local
    /// store holds.
    pub fn new(local: LocalCartStore<S>, remote: R, remote_timeout: Duration) -> Self {
        let cart = local.read();
        Self {
            local,
            remote,
            state: SessionState::Anonymous,
            cart,
            remote_timeout,
            acknowledged: HashSet::new(),
            dropped: Vec::new(),
        }
    }

    /// The current cart.
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Which store currently backs the cart.
    pub const fn phase(&self) -> SyncPhase {
        self.state.phase()
    }

    /// The local store.
    pub const fn local(&self) -> &LocalCartStore<S> {
        &self.local
    }

    /// The remote store.
    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Whether guest lines are still waiting to reach the server.
    pub fn has_pending_local(&self) -> bool {
        !self.unmerged().is_empty()
    }

    /// Guest lines dropped because the server refused them during the merge
    /// that followed the last login.
    pub fn dropped_lines(&self) -> &[ProductRef] {
        &self.dropped
    }

    /// Refresh the cart from the authoritative store.
    ///
    /// When authenticated with pending guest lines, this resumes their
    /// merge. If the remote is unreachable the local copy is shown instead.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Unauthenticated` if the credential was rejected,
    /// or `SyncError::Rejected` if the server refused the request.
    #[instrument(skip(self), fields(phase = ?self.phase()))]
    pub async fn load(&mut self) -> Result<()> {
        let Some(credential) = self.state.credential().cloned() else {
            self.cart = self.local.read();
            debug!(lines = self.cart.len(), "Loaded guest cart");
            return Ok(());
        };

        if self.has_pending_local() {
            self.reconcile(&credential).await?;
            return Ok(());
        }

        let result = self.remote_call(self.remote.fetch(&credential)).await;
        match result {
            Ok(cart) => {
                debug!(lines = cart.len(), "Loaded customer cart");
                self.adopt_remote(cart);
                Ok(())
            }
            Err(RemoteError::Unauthenticated) => Err(self.expire_credential()),
            Err(RemoteError::Rejected { status, message }) => {
                Err(SyncError::Rejected { status, message })
            }
            Err(e) => {
                let local = self.local_view();
                warn!(error = %e, local_lines = local.len(), "Remote cart unavailable on load");
                if !local.is_empty() {
                    self.cart = local;
                }
                Ok(())
            }
        }
    }

    /// Switch to the customer cart after authentication, merging any pending
    /// guest lines into it.
    ///
    /// A merge that cannot reach the server is not an error: the guest lines
    /// stay pending and the next load or mutation retries them.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Unauthenticated` if the new credential is
    /// rejected; the session stays anonymous.
    #[instrument(skip(self, credential))]
    pub async fn login(&mut self, credential: Credential) -> Result<()> {
        self.dropped.clear();
        if !self.has_pending_local() {
            info!("Customer authenticated");
            self.state = SessionState::Authenticated { credential };
            return self.load().await;
        }

        info!("Customer authenticated with a guest cart, merging");
        self.state = SessionState::Merging {
            credential: credential.clone(),
        };

        let result = self.reconcile(&credential).await;

        if matches!(self.state, SessionState::Merging { .. }) {
            self.state = SessionState::Authenticated { credential };
        }
        result.map(|_| ())
    }

    /// Return to the guest cart.
    ///
    /// The customer cart is not copied into local storage. Pending guest
    /// lines from before the login are kept; local mirrors of the customer
    /// cart are dropped.
    pub fn logout(&mut self) {
        if self.state.credential().is_none() {
            return;
        }
        info!("Customer logged out");
        self.end_session();
    }

    /// Add a line, summing with an existing line for the same product.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Cart` if the summed quantity would exceed the
    /// per-line limit, or another [`SyncError`]; transient remote failures
    /// are not errors.
    pub async fn add(&mut self, line: LineItem) -> Result<()> {
        self.dispatch(Mutation::Add(line)).await
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Cart` if the line does not exist, or another
    /// [`SyncError`]; transient remote failures are not errors.
    pub async fn set_quantity(
        &mut self,
        product_ref: ProductRef,
        quantity: Quantity,
    ) -> Result<()> {
        self.dispatch(Mutation::SetQuantity(product_ref, quantity))
            .await
    }

    /// Remove a line. Removing an absent line is a no-op.
    ///
    /// # Errors
    ///
    /// See [`SyncError`]; transient remote failures are not errors.
    pub async fn remove(&mut self, product_ref: ProductRef) -> Result<()> {
        self.dispatch(Mutation::Remove(product_ref)).await
    }

    /// Empty the cart in every store it has touched.
    ///
    /// # Errors
    ///
    /// See [`SyncError`]; transient remote failures are not errors.
    pub async fn clear(&mut self) -> Result<()> {
        self.dispatch(Mutation::Clear).await
    }

    /// Route a mutation to the store the current state selects.
    #[instrument(skip(self, mutation), fields(mutation = mutation.name(), phase = ?self.phase()))]
    async fn dispatch(&mut self, mutation: Mutation) -> Result<()> {
        let Some(credential) = self.state.credential().cloned() else {
            return self.apply_local(&mutation);
        };

        if let Mutation::Add(line) = &mutation {
            self.cart.check_add(line)?;
        }

        if self.has_pending_local()
            && let ReconcileOutcome::Interrupted(e) = self.reconcile(&credential).await?
        {
            return self.degrade(&mutation, e);
        }

        let result = match &mutation {
            Mutation::Add(line) => {
                self.remote_call(self.remote.add_line(&credential, line))
                    .await
            }
            Mutation::SetQuantity(product_ref, quantity) => {
                self.remote_call(self.remote.set_quantity(&credential, product_ref, *quantity))
                    .await
            }
            Mutation::Remove(product_ref) => {
                self.remote_call(self.remote.remove_line(&credential, product_ref))
                    .await
            }
            Mutation::Clear => self
                .remote_call(self.remote.clear(&credential))
                .await
                .map(|()| Cart::new()),
        };

        match result {
            Ok(cart) => {
                self.adopt_remote(cart);
                Ok(())
            }
            Err(RemoteError::Unauthenticated) => Err(self.expire_credential()),
            Err(RemoteError::Rejected { status, message }) => {
                Err(SyncError::Rejected { status, message })
            }
            Err(e) => self.degrade(&mutation, e),
        }
    }

    /// Apply a guest mutation. A local write failure leaves the change in
    /// memory only; there is no other store to report against.
    fn apply_local(&mut self, mutation: &Mutation) -> Result<()> {
        let mut next = self.cart.clone();
        mutation.apply_to(&mut next)?;

        if let Err(e) = self.local.write(&next, PendingSync::Pending) {
            warn!(error = %e, mutation = mutation.name(), "Guest cart change kept in memory only");
        }
        self.cart = next;
        Ok(())
    }

    /// Replay a mutation on the local store after a transient remote
    /// failure.
    fn degrade(&mut self, mutation: &Mutation, remote: RemoteError) -> Result<()> {
        warn!(
            error = %remote,
            mutation = mutation.name(),
            "Remote cart unavailable, applying change locally"
        );

        let mut next = self.cart.clone();
        mutation.apply_to(&mut next)?;

        match self.local.write_preserving_pending(&next) {
            Ok(()) => {
                self.cart = next;
                Ok(())
            }
            Err(local) => {
                error!(error = %local, "Cart change lost: both stores failed");
                Err(SyncError::StoresUnavailable { remote, local })
            }
        }
    }

    /// Push pending guest lines to the server.
    ///
    /// Exactly one server call is made per pending line: a quantity update
    /// for lines the server already holds, an add for the rest. A line is
    /// settled once the server answers for it and is never sent again in
    /// this session.
    async fn reconcile(&mut self, credential: &Credential) -> Result<ReconcileOutcome> {
        let fetched = self.remote_call(self.remote.fetch(credential)).await;
        let mut server_cart = match fetched {
            Ok(cart) => cart,
            Err(RemoteError::Unauthenticated) => return Err(self.expire_credential()),
            Err(e) => {
                warn!(error = %e, "Cart merge aborted, guest lines kept for retry");
                self.cart = self.local_view();
                return Ok(ReconcileOutcome::Interrupted(e));
            }
        };

        let pending = self.unmerged();
        let plan = Cart::plan_merge(&server_cart, &pending);
        debug!(
            server_lines = server_cart.len(),
            pending_lines = pending.len(),
            steps = plan.steps.len(),
            refused = plan.refused.len(),
            "Reconciling guest cart"
        );

        for refused in &plan.refused {
            error!(
                product_ref = %refused.product_ref(),
                error = %refused,
                "Guest cart line cannot be merged, dropping it"
            );
            self.dropped.push(refused.product_ref().clone());
            if let Err(e) = self.settle(refused.product_ref()) {
                return Ok(self.stall(&e, &server_cart));
            }
        }

        for step in &plan.steps {
            let result = match step {
                ReconcileStep::Increase {
                    product_ref,
                    quantity,
                } => {
                    self.remote_call(self.remote.set_quantity(credential, product_ref, *quantity))
                        .await
                }
                ReconcileStep::Append(line) => {
                    self.remote_call(self.remote.add_line(credential, line))
                        .await
                }
            };

            let settled = match result {
                Ok(cart) => {
                    server_cart = cart;
                    self.settle(step.product_ref())
                }
                Err(RemoteError::Unauthenticated) => return Err(self.expire_credential()),
                Err(RemoteError::Rejected { status, message }) => {
                    error!(
                        product_ref = %step.product_ref(),
                        status,
                        message = %message,
                        "Server refused guest cart line, dropping it"
                    );
                    self.dropped.push(step.product_ref().clone());
                    self.settle(step.product_ref())
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        product_ref = %step.product_ref(),
                        "Cart merge interrupted, remaining guest lines kept for retry"
                    );
                    self.cart = self.partial_view(&server_cart);
                    return Ok(ReconcileOutcome::Interrupted(e));
                }
            };

            if let Err(e) = settled {
                return Ok(self.stall(&e, &server_cart));
            }
        }

        if let Err(e) = self.local.clear() {
            warn!(error = %e, "Merged guest lines left in local storage");
        }
        info!(
            lines = server_cart.len(),
            dropped = self.dropped.len(),
            "Guest cart merged"
        );
        self.cart = server_cart;
        Ok(ReconcileOutcome::Complete)
    }

    /// Record that a pending guest line needs no further server call.
    ///
    /// The line is remembered in memory first, so it is skipped for the rest
    /// of the session even when the local store cannot drop it.
    fn settle(&mut self, product_ref: &ProductRef) -> Result<(), StorageError> {
        self.acknowledged.insert(product_ref.clone());
        self.local.acknowledge(product_ref)
    }

    fn stall(&mut self, error: &StorageError, server_cart: &Cart) -> ReconcileOutcome {
        warn!(error = %error, "Cart merge paused, local store could not record progress");
        self.cart = self.partial_view(server_cart);
        ReconcileOutcome::Stalled
    }

    /// Pending guest lines not yet settled in this session.
    fn unmerged(&self) -> Cart {
        self.local
            .pending()
            .into_lines()
            .into_iter()
            .filter(|l| !self.acknowledged.contains(&l.product_ref))
            .collect()
    }

    /// The local cart without lines already settled in this session.
    fn local_view(&self) -> Cart {
        self.local
            .read()
            .into_lines()
            .into_iter()
            .filter(|l| !self.acknowledged.contains(&l.product_ref))
            .collect()
    }

    /// The cart to show while a merge is unfinished: the server cart, with
    /// each unmerged guest line standing in for the server line of the same
    /// product and the remaining guest lines appended.
    fn partial_view(&self, server_cart: &Cart) -> Cart {
        let unmerged = self.unmerged();
        let mut lines: Vec<LineItem> = server_cart
            .lines()
            .iter()
            .map(|l| unmerged.get(&l.product_ref).unwrap_or(l).clone())
            .collect();
        lines.extend(
            unmerged
                .into_lines()
                .into_iter()
                .filter(|l| !server_cart.contains(&l.product_ref)),
        );
        Cart::from_lines(lines)
    }

    /// Take a successful remote response as the truth. Any local mirror
    /// written by an earlier degraded call is superseded.
    fn adopt_remote(&mut self, cart: Cart) {
        self.cart = cart;
        let _ = self.local.drop_synced();
    }

    /// Drop a rejected credential and fall back to the guest cart.
    fn expire_credential(&mut self) -> SyncError {
        warn!("Credential rejected by remote cart, returning to guest cart");
        self.end_session();
        SyncError::Unauthenticated
    }

    /// Return to the guest cart. Settled guest lines get one more chance to
    /// leave the local store, so they are not merged again at the next login.
    /// Storage failures are logged by the store.
    fn end_session(&mut self) {
        self.state = SessionState::Anonymous;
        for product_ref in std::mem::take(&mut self.acknowledged) {
            let _ = self.local.acknowledge(&product_ref);
        }
        self.dropped.clear();
        let _ = self.local.drop_synced();
        self.cart = self.local.read();
    }

    /// Bound a remote call by the configured timeout.
    async fn remote_call<T>(
        &self,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        tokio::time::timeout(self.remote_timeout, call)
            .await
            .unwrap_or_else(|_| Err(RemoteError::Timeout(self.remote_timeout)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::MemoryStorage;

    /// Minimal remote: one server cart, optional injected failure, optional
    /// delay before answering.
    #[derive(Clone, Default)]
    struct StubRemote {
        cart: Arc<Mutex<Cart>>,
        fail_with: Arc<Mutex<Option<RemoteError>>>,
        delay: Option<Duration>,
    }

    impl StubRemote {
        async fn respond(&self, op: impl FnOnce(&mut Cart)) -> Result<Cart, RemoteError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(e) = self.fail_with.lock().unwrap().clone() {
                return Err(e);
            }
            let mut cart = self.cart.lock().unwrap();
            op(&mut cart);
            Ok(cart.clone())
        }
    }

    impl RemoteCartStore for StubRemote {
        async fn fetch(&self, _: &Credential) -> Result<Cart, RemoteError> {
            self.respond(|_| {}).await
        }

        async fn add_line(&self, _: &Credential, line: &LineItem) -> Result<Cart, RemoteError> {
            let line = line.clone();
            self.respond(move |c| {
                let _ = c.add(line);
            })
            .await
        }

        async fn set_quantity(
            &self,
            _: &Credential,
            product_ref: &ProductRef,
            quantity: Quantity,
        ) -> Result<Cart, RemoteError> {
            let product_ref = product_ref.clone();
            self.respond(move |c| {
                let _ = c.set_quantity(&product_ref, quantity);
            })
            .await
        }

        async fn remove_line(
            &self,
            _: &Credential,
            product_ref: &ProductRef,
        ) -> Result<Cart, RemoteError> {
            let product_ref = product_ref.clone();
            self.respond(move |c| {
                c.remove(&product_ref);
            })
            .await
        }

        async fn clear(&self, _: &Credential) -> Result<(), RemoteError> {
            self.respond(Cart::clear).await.map(|_| ())
        }
    }

    fn line(r: &str, quantity: u32) -> LineItem {
        LineItem {
            product_ref: ProductRef::parse(r).unwrap(),
            name: format!("Product {r}"),
            unit_price: Decimal::new(300, 2),
            quantity: Quantity::new(quantity).unwrap(),
            display_ref: None,
        }
    }

    fn synchronizer(remote: StubRemote) -> CartSynchronizer<MemoryStorage, StubRemote> {
        CartSynchronizer::new(
            LocalCartStore::new(MemoryStorage::new(), "cart"),
            remote,
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_guest_mutations_stay_local() {
        let remote = StubRemote::default();
        let mut sync = synchronizer(remote.clone());

        sync.add(line("A", 1)).await.unwrap();
        sync.add(line("A", 2)).await.unwrap();

        assert_eq!(sync.phase(), SyncPhase::Anonymous);
        assert_eq!(sync.cart().item_count(), 3);
        assert_eq!(sync.local().pending(), *sync.cart());
        assert!(remote.cart.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_guest_set_quantity_on_missing_line_is_caller_error() {
        let mut sync = synchronizer(StubRemote::default());
        let err = sync
            .set_quantity(ProductRef::parse("A").unwrap(), Quantity::ONE)
            .await
            .unwrap_err();
        assert!(err.is_caller_error());
    }

    #[tokio::test]
    async fn test_guest_quota_failure_keeps_change_in_memory() {
        let local = LocalCartStore::new(MemoryStorage::with_quota(10), "cart");
        let mut sync = CartSynchronizer::new(local, StubRemote::default(), Duration::from_secs(2));

        sync.add(line("A", 1)).await.unwrap();

        assert_eq!(sync.cart().len(), 1);
        assert!(sync.local().read().is_empty());
    }

    #[tokio::test]
    async fn test_login_without_guest_cart_loads_remote() {
        let remote = StubRemote::default();
        remote.cart.lock().unwrap().add(line("S", 2)).unwrap();
        let mut sync = synchronizer(remote);

        sync.login(Credential::new("token")).await.unwrap();

        assert_eq!(sync.phase(), SyncPhase::Authenticated);
        assert_eq!(sync.cart().item_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_remote_times_out_and_degrades() {
        let remote = StubRemote {
            delay: Some(Duration::from_secs(30)),
            ..StubRemote::default()
        };
        let mut sync = synchronizer(remote);
        sync.state = SessionState::Authenticated {
            credential: Credential::new("token"),
        };

        sync.add(line("A", 1)).await.unwrap();

        assert_eq!(sync.cart().item_count(), 1);
        assert_eq!(sync.local().read().item_count(), 1);
        assert!(!sync.local().has_pending());
    }

    #[tokio::test]
    async fn test_rejected_credential_returns_to_guest() {
        let remote = StubRemote::default();
        let mut sync = synchronizer(remote.clone());
        sync.login(Credential::new("token")).await.unwrap();

        *remote.fail_with.lock().unwrap() = Some(RemoteError::Unauthenticated);
        let err = sync.add(line("A", 1)).await.unwrap_err();

        assert!(matches!(err, SyncError::Unauthenticated));
        assert_eq!(sync.phase(), SyncPhase::Anonymous);
        assert!(sync.cart().is_empty());
    }

    #[tokio::test]
    async fn test_server_rejection_is_propagated_without_fallback() {
        let remote = StubRemote::default();
        let mut sync = synchronizer(remote.clone());
        sync.login(Credential::new("token")).await.unwrap();

        *remote.fail_with.lock().unwrap() = Some(RemoteError::Rejected {
            status: 422,
            message: "unknown product".to_string(),
        });
        let err = sync.add(line("A", 1)).await.unwrap_err();

        assert!(err.is_caller_error());
        assert!(sync.cart().is_empty());
        assert!(sync.local().read().is_empty());
    }
}
