//! In-memory remote cart.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cartsync_client::{Credential, RemoteCartStore, RemoteError};
use cartsync_core::{Cart, LineItem, ProductRef, Quantity};

/// Token the fake accepts.
pub const VALID_TOKEN: &str = "customer-token";

/// Remote operation kinds, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Fetch,
    AddLine,
    SetQuantity,
    RemoveLine,
    Clear,
}

/// One call received by the fake, whether it succeeded or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Fetch,
    AddLine {
        product_ref: ProductRef,
        quantity: Quantity,
    },
    SetQuantity {
        product_ref: ProductRef,
        quantity: Quantity,
    },
    RemoveLine {
        product_ref: ProductRef,
    },
    Clear,
}

impl RemoteCall {
    /// The kind of this call.
    #[must_use]
    pub const fn op(&self) -> RemoteOp {
        match self {
            Self::Fetch => RemoteOp::Fetch,
            Self::AddLine { .. } => RemoteOp::AddLine,
            Self::SetQuantity { .. } => RemoteOp::SetQuantity,
            Self::RemoveLine { .. } => RemoteOp::RemoveLine,
            Self::Clear => RemoteOp::Clear,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    cart: Cart,
    calls: Vec<RemoteCall>,
    failures: HashMap<RemoteOp, RemoteError>,
    offline: bool,
}

/// Server cart held in memory.
///
/// Behaves like the real API: `add_line` increments an existing line
/// (rejected with 422 past the per-line limit),
/// `set_quantity` on a missing line is rejected with 404, `remove_line` on a
/// missing line is a no-op. Only [`VALID_TOKEN`] is accepted.
///
/// Clones share state, so a test can keep a handle after moving one into a
/// service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRemote {
    state: Arc<Mutex<State>>,
}

impl InMemoryRemote {
    /// Empty server cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Server cart pre-filled with `lines`.
    #[must_use]
    pub fn with_lines(lines: impl IntoIterator<Item = LineItem>) -> Self {
        let remote = Self::new();
        remote.lock().cart = Cart::from_lines(lines);
        remote
    }

    /// Snapshot of the server cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.lock().cart.clone()
    }

    /// Replace the server cart, e.g. to simulate another device.
    pub fn set_cart(&self, cart: Cart) {
        self.lock().cart = cart;
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Number of calls of one kind received so far.
    #[must_use]
    pub fn count(&self, op: RemoteOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    /// Forget the call log.
    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make every call of kind `op` fail with `error` until restored.
    pub fn fail(&self, op: RemoteOp, error: RemoteError) {
        self.lock().failures.insert(op, error);
    }

    /// Make every call fail with a network error until restored.
    pub fn go_offline(&self) {
        self.lock().offline = true;
    }

    /// Clear injected failures and come back online.
    pub fn restore(&self) {
        let mut state = self.lock();
        state.failures.clear();
        state.offline = false;
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log the call, apply injected failures and auth, then run `apply`
    /// against the server cart.
    fn handle(
        &self,
        credential: &Credential,
        call: RemoteCall,
        apply: impl FnOnce(&mut Cart) -> Result<(), RemoteError>,
    ) -> Result<Cart, RemoteError> {
        let mut state = self.lock();
        let op = call.op();
        state.calls.push(call);

        if state.offline {
            return Err(RemoteError::Network("connection refused".to_string()));
        }
        if let Some(e) = state.failures.get(&op) {
            return Err(e.clone());
        }
        if credential.expose() != VALID_TOKEN {
            return Err(RemoteError::Unauthenticated);
        }

        apply(&mut state.cart)?;
        Ok(state.cart.clone())
    }
}

impl RemoteCartStore for InMemoryRemote {
    fn fetch(&self, credential: &Credential) -> impl Future<Output = Result<Cart, RemoteError>> + Send {
        let result = self.handle(credential, RemoteCall::Fetch, |_| Ok(()));
        async move { result }
    }

    fn add_line(
        &self,
        credential: &Credential,
        line: &LineItem,
    ) -> impl Future<Output = Result<Cart, RemoteError>> + Send {
        let call = RemoteCall::AddLine {
            product_ref: line.product_ref.clone(),
            quantity: line.quantity,
        };
        let result = self.handle(credential, call, |cart| {
            cart.add(line.clone()).map_err(|e| RemoteError::Rejected {
                status: 422,
                message: e.to_string(),
            })
        });
        async move { result }
    }

    fn set_quantity(
        &self,
        credential: &Credential,
        product_ref: &ProductRef,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Cart, RemoteError>> + Send {
        let call = RemoteCall::SetQuantity {
            product_ref: product_ref.clone(),
            quantity,
        };
        let result = self.handle(credential, call, |cart| {
            cart.set_quantity(product_ref, quantity)
                .map_err(|e| RemoteError::Rejected {
                    status: 404,
                    message: e.to_string(),
                })
        });
        async move { result }
    }

    fn remove_line(
        &self,
        credential: &Credential,
        product_ref: &ProductRef,
    ) -> impl Future<Output = Result<Cart, RemoteError>> + Send {
        let call = RemoteCall::RemoveLine {
            product_ref: product_ref.clone(),
        };
        let result = self.handle(credential, call, |cart| {
            cart.remove(product_ref);
            Ok(())
        });
        async move { result }
    }

    fn clear(&self, credential: &Credential) -> impl Future<Output = Result<(), RemoteError>> + Send {
        let result = self
            .handle(credential, RemoteCall::Clear, |cart| {
                cart.clear();
                Ok(())
            })
            .map(|_| ());
        async move { result }
    }
}
