//! JSON bodies of the remote cart API.
//!
//! ```text
//! GET    {base}/cart                      -> CartPayload
//! POST   {base}/cart/lines                (LineItem)           -> CartPayload
//! PUT    {base}/cart/lines/{product_ref}  (SetQuantityRequest) -> CartPayload
//! DELETE {base}/cart/lines/{product_ref}  -> CartPayload
//! DELETE {base}/cart                      -> 204 No Content
//! ```
//!
//! Every request carries `Authorization: Bearer <credential>` and an
//! `x-request-id` header.

use serde::{Deserialize, Serialize};

use cartsync_core::{Cart, Quantity};

/// The HTTP header carrying the per-call request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// A full cart as returned by every cart endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartPayload {
    /// Cart lines in server order.
    pub lines: Cart,
}

/// Body of the set-quantity call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetQuantityRequest {
    /// New quantity of the line.
    pub quantity: Quantity,
}
