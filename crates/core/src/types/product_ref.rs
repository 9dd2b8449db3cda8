//! Product reference type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`ProductRef`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductRefError {
    /// The input string is empty.
    #[error("product reference cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("product reference must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input has leading or trailing whitespace.
    #[error("product reference cannot start or end with whitespace")]
    SurroundingWhitespace,
    /// The input contains a path separator.
    #[error("product reference cannot contain '/'")]
    ContainsSlash,
}

/// An opaque reference to a catalog product.
///
/// The cart never interprets the value; it only compares references for
/// equality. The same reference identifies a product in the local store, on
/// the server and in the catalog.
///
/// ## Constraints
///
/// - Length: 1-255 characters
/// - No leading or trailing whitespace
/// - No `/` (the reference is used as a URL path segment)
///
/// ## Examples
///
/// ```
/// use cartsync_core::ProductRef;
///
/// assert!(ProductRef::parse("sku-1042").is_ok());
/// assert!(ProductRef::parse("gid:shopify:ProductVariant:42").is_ok());
///
/// assert!(ProductRef::parse("").is_err());
/// assert!(ProductRef::parse(" sku").is_err());
/// assert!(ProductRef::parse("a/b").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ProductRef(String);

impl ProductRef {
    /// Maximum length of a product reference, in characters.
    pub const MAX_LENGTH: usize = 255;

    /// Parse a `ProductRef` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than 255 characters,
    /// has surrounding whitespace, or contains `/`.
    pub fn parse(s: &str) -> Result<Self, ProductRefError> {
        if s.is_empty() {
            return Err(ProductRefError::Empty);
        }

        if s.chars().count() > Self::MAX_LENGTH {
            return Err(ProductRefError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if s.trim() != s {
            return Err(ProductRefError::SurroundingWhitespace);
        }

        if s.contains('/') {
            return Err(ProductRefError::ContainsSlash);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the reference and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ProductRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl core::str::FromStr for ProductRef {
    type Err = ProductRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProductRef {
    type Error = ProductRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductRef> for String {
    fn from(value: ProductRef) -> Self {
        value.0
    }
}
