//! Line quantity type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    /// Zero is not a quantity; remove the line instead.
    #[error("quantity must be at least 1")]
    Zero,
    /// The value exceeds the per-line maximum.
    #[error("quantity must be at most {max}")]
    TooLarge {
        /// Maximum allowed quantity.
        max: u32,
    },
}

/// The quantity of a cart line.
///
/// Never zero: a line that would drop to zero is removed from the cart
/// instead. [`Quantity::MAX`] bounds what a customer may ask for through
/// [`Quantity::new`] and [`Quantity::checked_add`]. Deserialized values are
/// only checked for zero, since the server cart is authoritative and may
/// hold larger lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// A quantity of one.
    pub const ONE: Self = Self(1);

    /// Largest quantity a customer may put on a single line.
    pub const MAX: u32 = 9_999;

    /// Create a quantity.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Zero` for 0 and `QuantityError::TooLarge`
    /// above [`Quantity::MAX`].
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 {
            Err(QuantityError::Zero)
        } else if value > Self::MAX {
            Err(QuantityError::TooLarge { max: Self::MAX })
        } else {
            Ok(Self(value))
        }
    }

    /// Get the underlying value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Add a customer's quantity to this one.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::TooLarge` if the sum exceeds
    /// [`Quantity::MAX`].
    pub const fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        match self.0.checked_add(other.0) {
            Some(sum) if sum <= Self::MAX => Ok(Self(sum)),
            _ => Err(QuantityError::TooLarge { max: Self::MAX }),
        }
    }

    /// Add two stored quantities without applying the per-line limit.
    ///
    /// Only for collapsing duplicate lines read back from a document.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(QuantityError::Zero)
        } else {
            Ok(Self(value))
        }
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rejected() {
        assert_eq!(Quantity::new(0), Err(QuantityError::Zero));
    }

    #[test]
    fn test_bounds() {
        assert_eq!(Quantity::new(1).unwrap().get(), 1);
        assert_eq!(Quantity::new(Quantity::MAX).unwrap().get(), Quantity::MAX);
        assert!(matches!(
            Quantity::new(Quantity::MAX + 1),
            Err(QuantityError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_checked_add() {
        let a = Quantity::new(2).unwrap();
        let b = Quantity::new(3).unwrap();
        assert_eq!(a.checked_add(b).unwrap().get(), 5);

        let full = Quantity::new(Quantity::MAX).unwrap();
        assert_eq!(
            full.checked_add(Quantity::ONE),
            Err(QuantityError::TooLarge { max: Quantity::MAX })
        );
        let near = Quantity::new(Quantity::MAX - 1).unwrap();
        assert_eq!(near.checked_add(Quantity::ONE).unwrap().get(), Quantity::MAX);
    }

    #[test]
    fn test_saturating_add_ignores_limit() {
        let full = Quantity::new(Quantity::MAX).unwrap();
        assert_eq!(full.saturating_add(Quantity::ONE).get(), Quantity::MAX + 1);
    }

    #[test]
    fn test_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("4").unwrap().get(), 4);
    }

    #[test]
    fn test_deserialize_accepts_server_quantity_above_limit() {
        let q: Quantity = serde_json::from_str("20000").unwrap();
        assert_eq!(q.get(), 20_000);
        assert!(q.checked_add(Quantity::ONE).is_err());
    }
}
