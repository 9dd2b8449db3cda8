//! Cart sync configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_API_BASE_URL` - Root URL of the server-side cart API
//!
//! ## Optional
//! - `CART_API_TIMEOUT_MS` - Timeout for each remote cart call (default: 8000)
//! - `CART_API_TOKEN` - Customer bearer token; its presence means the session is authenticated
//! - `CART_STORAGE_DIR` - Directory for the durable local cart (default: .cart)
//! - `CART_STORAGE_KEY` - Key the local cart is stored under (default: cart)
//! - `CART_STORAGE_QUOTA_BYTES` - Byte quota for local storage (default: unlimited)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::credential::Credential;

const DEFAULT_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_STORAGE_DIR: &str = ".cart";
const DEFAULT_STORAGE_KEY: &str = "cart";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart sync configuration.
#[derive(Debug, Clone)]
pub struct CartSyncConfig {
    /// Remote cart API configuration
    pub remote: RemoteConfig,
    /// Local cart storage configuration
    pub storage: StorageConfig,
    /// Customer credential, if the session starts authenticated
    pub credential: Option<Credential>,
}

/// Remote cart API configuration.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Root URL of the cart API (e.g., <https://shop.example.com/api>)
    pub base_url: Url,
    /// Upper bound for a single remote call; exceeding it counts as a network error
    pub timeout: Duration,
}

/// Local cart storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the stored cart
    pub dir: PathBuf,
    /// Key the cart document is stored under
    pub key: String,
    /// Byte quota, emulating a browser storage limit
    pub quota_bytes: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            key: DEFAULT_STORAGE_KEY.to_string(),
            quota_bytes: None,
        }
    }
}

impl CartSyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            remote: RemoteConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            credential: get_optional_env("CART_API_TOKEN")
                .filter(|token| !token.trim().is_empty())
                .map(|token| Credential::from(SecretString::from(token))),
        })
    }
}

impl RemoteConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url(&get_required_env("CART_API_BASE_URL")?)?;
        let timeout_ms = get_env_or_default("CART_API_TIMEOUT_MS", &DEFAULT_TIMEOUT_MS.to_string())
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar("CART_API_TIMEOUT_MS".to_string(), e.to_string()))?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "CART_API_TIMEOUT_MS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let quota_bytes = get_optional_env("CART_STORAGE_QUOTA_BYTES")
            .map(|v| {
                v.parse::<usize>().map_err(|e| {
                    ConfigError::InvalidEnvVar("CART_STORAGE_QUOTA_BYTES".to_string(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            dir: PathBuf::from(get_env_or_default("CART_STORAGE_DIR", DEFAULT_STORAGE_DIR)),
            key: get_env_or_default("CART_STORAGE_KEY", DEFAULT_STORAGE_KEY),
            quota_bytes,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse and validate the API base URL.
fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar("CART_API_BASE_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "CART_API_BASE_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_valid() {
        let url = parse_base_url("https://shop.example.com/api").unwrap();
        assert_eq!(url.host_str(), Some("shop.example.com"));
    }

    #[test]
    fn test_parse_base_url_rejects_scheme() {
        let err = parse_base_url("ftp://shop.example.com").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_parse_base_url_rejects_garbage() {
        assert!(parse_base_url("not a url").is_err());
    }

    #[test]
    fn test_storage_defaults() {
        let storage = StorageConfig::default();
        assert_eq!(storage.dir, PathBuf::from(".cart"));
        assert_eq!(storage.key, "cart");
        assert_eq!(storage.quota_bytes, None);
    }

    #[test]
    fn test_config_debug_redacts_credential() {
        let config = CartSyncConfig {
            remote: RemoteConfig {
                base_url: Url::parse("https://shop.example.com").unwrap(),
                timeout: Duration::from_secs(8),
            },
            storage: StorageConfig::default(),
            credential: Some(Credential::new("super_secret_customer_token")),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("shop.example.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_customer_token"));
    }
}
