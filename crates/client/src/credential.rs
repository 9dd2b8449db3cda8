//! Session credential.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// A bearer token proving the session belongs to an identified customer.
///
/// Issued by the authentication collaborator; the cart only forwards it.
/// `Debug` never prints the token.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    /// Wrap a bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// The raw token, for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<SecretString> for Credential {
    fn from(secret: SecretString) -> Self {
        Self(secret)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}
