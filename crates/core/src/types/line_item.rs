//! Cart line and catalog snapshot types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::product_ref::ProductRef;
use super::quantity::Quantity;

/// One product-plus-quantity entry in a cart.
///
/// `name` and `unit_price` are a snapshot taken when the product was added
/// and are never refreshed from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Catalog product reference, unique within a cart.
    pub product_ref: ProductRef,
    /// Product name at the time of add.
    pub name: String,
    /// Unit price at the time of add.
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_price: Decimal,
    /// Number of units.
    pub quantity: Quantity,
    /// Image URL or slug, cosmetic only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_ref: Option<String>,
}

impl LineItem {
    /// Price of the whole line (`unit_price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity.get())
    }

    /// The catalog snapshot this line was created from.
    #[must_use]
    pub fn catalog_item(&self) -> CatalogItem {
        CatalogItem {
            product_ref: self.product_ref.clone(),
            name: self.name.clone(),
            unit_price: self.unit_price,
            display_ref: self.display_ref.clone(),
        }
    }
}

/// Product data supplied by the catalog when an item is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Catalog product reference.
    pub product_ref: ProductRef,
    /// Display name.
    pub name: String,
    /// Current unit price.
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_price: Decimal,
    /// Image URL or slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_ref: Option<String>,
}

impl CatalogItem {
    /// Turn the snapshot into a cart line.
    #[must_use]
    pub fn into_line(self, quantity: Quantity) -> LineItem {
        LineItem {
            product_ref: self.product_ref,
            name: self.name,
            unit_price: self.unit_price,
            quantity,
            display_ref: self.display_ref,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(price: &str, quantity: u32) -> LineItem {
        CatalogItem {
            product_ref: ProductRef::parse("sku-1").unwrap(),
            name: "Dried Pineapple".to_string(),
            unit_price: price.parse().unwrap(),
            display_ref: None,
        }
        .into_line(Quantity::new(quantity).unwrap())
    }

    #[test]
    fn test_line_total() {
        assert_eq!(item("4.25", 3).line_total(), Decimal::new(1275, 2));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(item("4.25", 2)).unwrap();
        assert_eq!(json["product_ref"], "sku-1");
        assert_eq!(json["unit_price"], "4.25");
        assert_eq!(json["quantity"], 2);
        assert!(json.get("display_ref").is_none());
    }

    #[test]
    fn test_catalog_item_roundtrip_keeps_snapshot() {
        let line = item("1.00", 1);
        let catalog = line.catalog_item();
        assert_eq!(catalog.into_line(Quantity::ONE), line);
    }
}
