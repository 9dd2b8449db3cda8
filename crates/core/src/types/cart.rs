//! The cart value type.
//!
//! A [`Cart`] is an ordered list of [`LineItem`]s with at most one line per
//! [`ProductRef`]. Every constructor and mutator preserves that invariant:
//! adding a product that is already present sums the quantities, and a line
//! never drops to zero (it is removed instead). A sum past
//! [`Quantity::MAX`] is an error, never a silent cap.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::line_item::LineItem;
use super::product_ref::ProductRef;
use super::quantity::{Quantity, QuantityError};

/// Errors returned by cart mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// The cart has no line for this product.
    #[error("no cart line for product {0}")]
    LineNotFound(ProductRef),

    /// Adding would take the line past the per-line limit.
    #[error("cannot add to product {product_ref}: {source}")]
    Quantity {
        /// Product whose line would overflow.
        product_ref: ProductRef,
        /// Why the quantity was refused.
        #[source]
        source: QuantityError,
    },
}

impl CartError {
    /// The product the error concerns.
    #[must_use]
    pub const fn product_ref(&self) -> &ProductRef {
        match self {
            Self::LineNotFound(product_ref) | Self::Quantity { product_ref, .. } => product_ref,
        }
    }
}

/// An ordered collection of line items, unique by product reference.
///
/// Serializes as a plain JSON array of lines. Deserializing collapses
/// duplicate references by summing their quantities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<LineItem>", into = "Vec<LineItem>")]
pub struct Cart {
    lines: Vec<LineItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from lines in order, summing duplicates into the first
    /// occurrence.
    ///
    /// This is how stored and server documents are read, so duplicates are
    /// summed without the per-line limit.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = LineItem>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            match cart.line_mut(&line.product_ref) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                }
                None => cart.lines.push(line),
            }
        }
        cart
    }

    /// The lines in display order.
    #[must_use]
    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    /// Consume the cart and return its lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<LineItem> {
        self.lines
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn get(&self, product_ref: &ProductRef) -> Option<&LineItem> {
        self.lines.iter().find(|l| &l.product_ref == product_ref)
    }

    /// Whether the cart holds a line for this product.
    #[must_use]
    pub fn contains(&self, product_ref: &ProductRef) -> bool {
        self.get(product_ref).is_some()
    }

    /// Number of distinct lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add a line. If the product is already in the cart the quantities are
    /// summed and the existing snapshot (name, price) is kept.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Quantity` if the summed quantity would exceed
    /// [`Quantity::MAX`]. The cart is unchanged in that case.
    pub fn add(&mut self, line: LineItem) -> Result<(), CartError> {
        let product_ref = line.product_ref.clone();
        match self.line_mut(&product_ref) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(line.quantity)
                    .map_err(|source| CartError::Quantity {
                        product_ref,
                        source,
                    })?;
            }
            None => self.lines.push(line),
        }
        Ok(())
    }

    /// Check that [`Cart::add`] would succeed, without changing the cart.
    ///
    /// # Errors
    ///
    /// Same as [`Cart::add`].
    pub fn check_add(&self, line: &LineItem) -> Result<(), CartError> {
        if let Some(existing) = self.get(&line.product_ref) {
            existing
                .quantity
                .checked_add(line.quantity)
                .map_err(|source| CartError::Quantity {
                    product_ref: line.product_ref.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    fn line_mut(&mut self, product_ref: &ProductRef) -> Option<&mut LineItem> {
        self.lines.iter_mut().find(|l| &l.product_ref == product_ref)
    }

    /// Replace the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the product is not in the cart.
    pub fn set_quantity(
        &mut self,
        product_ref: &ProductRef,
        quantity: Quantity,
    ) -> Result<(), CartError> {
        let line = self
            .line_mut(product_ref)
            .ok_or_else(|| CartError::LineNotFound(product_ref.clone()))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove the line for a product, returning it if it was present.
    pub fn remove(&mut self, product_ref: &ProductRef) -> Option<LineItem> {
        let index = self
            .lines
            .iter()
            .position(|l| &l.product_ref == product_ref)?;
        Some(self.lines.remove(index))
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity.get())).sum()
    }

    /// Sum of `unit_price * quantity` over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(LineItem::line_total).sum()
    }

    /// Plan the merge of a guest's local lines into a server cart.
    ///
    /// The merged cart keeps the server lines in server order with local
    /// quantities summed in, followed by local lines the server did not have.
    /// Each local line yields exactly one reconciliation step: an
    /// [`ReconcileStep::Increase`] when it was summed into an existing server
    /// line, or an [`ReconcileStep::Append`] when it is new to the server.
    /// A local line whose sum with the server line would exceed
    /// [`Quantity::MAX`] yields no step and is listed in
    /// [`MergePlan::refused`] with its error instead.
    #[must_use]
    pub fn plan_merge(server: &Self, local: &Self) -> MergePlan {
        let mut merged = server.clone();
        let mut steps = Vec::with_capacity(local.len());
        let mut refused = Vec::new();

        for line in &local.lines {
            if let Some(existing) = server.get(&line.product_ref) {
                match existing.quantity.checked_add(line.quantity) {
                    Ok(quantity) => {
                        if let Some(target) = merged.line_mut(&line.product_ref) {
                            target.quantity = quantity;
                        }
                        steps.push(ReconcileStep::Increase {
                            product_ref: line.product_ref.clone(),
                            quantity,
                        });
                    }
                    Err(source) => refused.push(CartError::Quantity {
                        product_ref: line.product_ref.clone(),
                        source,
                    }),
                }
            } else {
                merged.lines.push(line.clone());
                steps.push(ReconcileStep::Append(line.clone()));
            }
        }

        MergePlan {
            merged,
            steps,
            refused,
        }
    }
}

impl From<Vec<LineItem>> for Cart {
    fn from(lines: Vec<LineItem>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<Cart> for Vec<LineItem> {
    fn from(cart: Cart) -> Self {
        cart.lines
    }
}

impl FromIterator<LineItem> for Cart {
    fn from_iter<I: IntoIterator<Item = LineItem>>(iter: I) -> Self {
        Self::from_lines(iter)
    }
}

/// The outcome of [`Cart::plan_merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    /// What the cart looks like once every step has been applied.
    pub merged: Cart,
    /// Server calls needed to make the server cart equal `merged`, one per
    /// local line, in local order.
    pub steps: Vec<ReconcileStep>,
    /// Local lines that cannot be merged without exceeding the per-line limit.
    pub refused: Vec<CartError>,
}

/// One server call needed to reconcile a local line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileStep {
    /// The server already has this product; set its quantity to the summed
    /// total. Never sent as an add, which would count the server quantity
    /// twice.
    Increase {
        /// Product whose server line grows.
        product_ref: ProductRef,
        /// Summed quantity (server + local).
        quantity: Quantity,
    },
    /// The server does not have this product; add the line as-is.
    Append(LineItem),
}

impl ReconcileStep {
    /// The product this step reconciles.
    #[must_use]
    pub const fn product_ref(&self) -> &ProductRef {
        match self {
            Self::Increase { product_ref, .. } => product_ref,
            Self::Append(line) => &line.product_ref,
        }
    }
}
