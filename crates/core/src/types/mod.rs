//! Core types for cart synchronization.
//!
//! This module provides type-safe wrappers for the cart domain: product
//! references, quantities, line items and the cart itself.

pub mod cart;
pub mod line_item;
pub mod product_ref;
pub mod quantity;

pub use cart::{Cart, CartError, MergePlan, ReconcileStep};
pub use line_item::{CatalogItem, LineItem};
pub use product_ref::{ProductRef, ProductRefError};
pub use quantity::{Quantity, QuantityError};
