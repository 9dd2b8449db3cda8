//! Cart Sync Core - Shared cart types.
//!
//! This crate provides the value types moved between the local and remote
//! cart stores:
//! - `ProductRef` - opaque catalog product reference
//! - `Quantity` - a line quantity that is never zero
//! - `LineItem` / `CatalogItem` - a cart line and the catalog snapshot it came from
//! - `Cart` - ordered lines, unique by product, with merge planning
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! storage access, no HTTP clients. The synchronization engine lives in
//! `cartsync-client`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
