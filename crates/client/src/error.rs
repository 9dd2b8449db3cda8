//! Errors surfaced by cart operations.
//!
//! Transient remote failures never appear here: they are absorbed by the
//! degrade-to-local policy. What remains is either the caller's fault
//! (invalid quantity, unknown line, a request the server refused), a
//! credential problem, or the case where neither store accepted a mutation.

use thiserror::Error;

use cartsync_core::{CartError, QuantityError};

use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Error returned by [`CartService`](crate::service::CartService) and
/// [`CartSynchronizer`](crate::sync::CartSynchronizer) operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Quantity outside the allowed range (zero included).
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// The mutation does not apply to the current cart.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The server refused the request as invalid.
    #[error("request rejected by server (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Server message.
        message: String,
    },

    /// The credential was rejected; the session is back to the guest cart.
    #[error("not authenticated")]
    Unauthenticated,

    /// The remote store was unavailable and the local fallback failed too.
    #[error("cart could not be saved: remote unavailable ({remote}), local storage failed")]
    StoresUnavailable {
        /// Why the remote call failed.
        remote: RemoteError,
        /// Why the local write failed.
        #[source]
        local: StorageError,
    },
}

impl SyncError {
    /// Whether the error was caused by an invalid argument. Caller errors
    /// never trigger a fallback.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuantity(_) | Self::Cart(_) | Self::Rejected { .. }
        )
    }
}

/// Result type alias for `SyncError`. The error type can be overridden for
/// helpers that report a store-level error instead.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
