//! Integration tests for Cart Sync.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartsync-integration-tests
//! ```
//!
//! No external services are needed: the HTTP tests start an axum mock cart
//! server on an ephemeral localhost port.
//!
//! # Test Support
//!
//! - [`fake_remote::InMemoryRemote`] - remote cart with a call log and
//!   failure injection, for synchronizer scenarios
//! - [`mock_server::MockCartServer`] - the cart HTTP API, for exercising
//!   `HttpRemoteCart` over a real socket
//! - [`faulty_storage::FaultyStorage`] - local storage whose writes can be
//!   switched off mid-test
//! - [`fixtures`] - catalog items, lines and ready-made services

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod fake_remote;
pub mod faulty_storage;
pub mod fixtures;
pub mod mock_server;
