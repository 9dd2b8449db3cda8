//! Authenticated server-side cart.
//!
//! # Architecture
//!
//! - [`RemoteCartStore`] is the seam the synchronizer talks to; every call
//!   takes the session [`Credential`] and returns the full resulting cart
//! - [`HttpRemoteCart`] implements it over JSON/HTTP with `reqwest`
//! - [`wire`] holds the request/response bodies shared with servers and
//!   test doubles
//!
//! # Errors
//!
//! [`RemoteError::is_transient`] is the only predicate the synchronizer uses
//! to decide between degrading to the local store and propagating.

mod http;
pub mod wire;

pub use http::HttpRemoteCart;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use cartsync_core::{Cart, LineItem, ProductRef, Quantity};

use crate::credential::Credential;

/// Errors returned by a remote cart.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The credential is missing, expired or rejected.
    #[error("not authenticated")]
    Unauthenticated,

    /// The server could not be reached or the connection failed mid-call.
    #[error("network error: {0}")]
    Network(String),

    /// The call did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server failed or answered with something unusable.
    #[error("server error (HTTP {status}): {message}")]
    Server {
        /// HTTP status, or 0 if the failure was not tied to a status.
        status: u16,
        /// Truncated response body or decode error.
        message: String,
    },

    /// The server refused the request as invalid.
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Truncated response body.
        message: String,
    },
}

impl RemoteError {
    /// Whether the failure is transient and the mutation should be replayed
    /// against the local store instead.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Server { .. }
        )
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Server {
                status: e.status().map_or(0, |s| s.as_u16()),
                message: e.to_string(),
            }
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// The server-side cart of the authenticated identity.
///
/// Implementations must be cheap to share across calls; the synchronizer
/// holds one for the lifetime of the session.
pub trait RemoteCartStore: Send + Sync {
    /// Fetch the current server cart.
    fn fetch(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Cart, RemoteError>> + Send;

    /// Add a line. The server increments an existing line for the same
    /// product or creates a new one.
    fn add_line(
        &self,
        credential: &Credential,
        line: &LineItem,
    ) -> impl Future<Output = Result<Cart, RemoteError>> + Send;

    /// Set the quantity of an existing line.
    fn set_quantity(
        &self,
        credential: &Credential,
        product_ref: &ProductRef,
        quantity: Quantity,
    ) -> impl Future<Output = Result<Cart, RemoteError>> + Send;

    /// Remove a line. Removing a product the server cart does not hold is a
    /// no-op that returns the current cart.
    fn remove_line(
        &self,
        credential: &Credential,
        product_ref: &ProductRef,
    ) -> impl Future<Output = Result<Cart, RemoteError>> + Send;

    /// Remove every line.
    fn clear(&self, credential: &Credential) -> impl Future<Output = Result<(), RemoteError>> + Send;
}
