//! Cart Sync Client - keeps a shopping cart consistent across a durable
//! local store and an authoritative server-side store.
//!
//! # Modules
//!
//! - `storage` - key/value storage backends (in-memory, directory)
//! - `local` - the guest cart document kept in local storage
//! - `remote` - the server-side cart API and its HTTP client
//! - `sync` - the session state machine, merge and degrade-to-local policy
//! - `service` - the facade UI code calls, publishing cart snapshots
//! - `config` - environment-driven configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use cartsync_client::{CartService, CartSyncConfig, DirectoryStorage, HttpRemoteCart, LocalCartStore};
//!
//! let config = CartSyncConfig::from_env()?;
//! let storage = DirectoryStorage::new(&config.storage.dir).with_quota(config.storage.quota_bytes);
//! let remote = HttpRemoteCart::new(&config.remote)?;
//! let mut cart = CartService::from_parts(
//!     LocalCartStore::new(storage, config.storage.key.clone()),
//!     remote,
//!     config.remote.timeout,
//! );
//! cart.load().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod credential;
pub mod error;
pub mod local;
pub mod remote;
pub mod service;
pub mod storage;
pub mod sync;

pub use config::{CartSyncConfig, ConfigError, RemoteConfig, StorageConfig};
pub use credential::Credential;
pub use error::SyncError;
pub use local::{LocalCartStore, PendingSync};
pub use remote::{HttpRemoteCart, RemoteCartStore, RemoteError};
pub use service::{CartService, CartSnapshot};
pub use storage::{DirectoryStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use sync::{CartSynchronizer, SyncPhase};
