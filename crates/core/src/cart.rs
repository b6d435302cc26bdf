//! Shopping cart rules.
//!
//! A [`Cart`] holds the lines the shopper intends to buy (`items`) and lines
//! parked for later (`saved_for_later`). A product appears at most once in each
//! list: adding it again grows the existing line.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pricing::{PriceBreakdown, PricingPolicy};
use crate::types::ProductId;

/// Most units of one product a cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Errors from cart operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Quantities must lie in `1..=MAX_LINE_QUANTITY`.
    #[error("Quantity must be between 1 and {max}", max = MAX_LINE_QUANTITY)]
    InvalidQuantity,
    /// The product is not in the list the operation targets.
    #[error("item {0} not found in cart")]
    ItemNotFound(ProductId),
}

/// One product in a cart, with title, price and image captured when it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub title: String,
    pub price: Decimal,
    pub image: String,
    pub quantity: u32,
}

impl CartLine {
    /// Price of the line (`price * quantity`), unrounded.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// A shopper's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartLine>,
    #[serde(default)]
    pub saved_for_later: Vec<CartLine>,
}

const fn valid_quantity(quantity: u32) -> bool {
    quantity >= 1 && quantity <= MAX_LINE_QUANTITY
}

/// Insert `line` into `lines`, growing an existing line for the same product.
///
/// The grown quantity is capped at [`MAX_LINE_QUANTITY`].
fn merge_line(lines: &mut Vec<CartLine>, line: CartLine) {
    if let Some(existing) = lines.iter_mut().find(|l| l.product_id == line.product_id) {
        existing.quantity = existing
            .quantity
            .saturating_add(line.quantity)
            .min(MAX_LINE_QUANTITY);
    } else {
        lines.push(line);
    }
}

fn take_line(lines: &mut Vec<CartLine>, product_id: ProductId) -> Result<CartLine, CartError> {
    let index = lines
        .iter()
        .position(|l| l.product_id == product_id)
        .ok_or(CartError::ItemNotFound(product_id))?;
    Ok(lines.remove(index))
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            saved_for_later: Vec::new(),
        }
    }

    /// Whether there is nothing to check out.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add a line, merging with an existing line for the same product.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] if the line's quantity is zero
    /// or above [`MAX_LINE_QUANTITY`].
    pub fn add(&mut self, line: CartLine) -> Result<(), CartError> {
        if !valid_quantity(line.quantity) {
            return Err(CartError::InvalidQuantity);
        }
        merge_line(&mut self.items, line);
        Ok(())
    }

    /// Replace the quantity of a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for a quantity outside
    /// `1..=MAX_LINE_QUANTITY` and [`CartError::ItemNotFound`] if the product
    /// is not in the cart.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if !valid_quantity(quantity) {
            return Err(CartError::InvalidQuantity);
        }
        let line = self
            .items
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or(CartError::ItemNotFound(product_id))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if the product is not in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> Result<CartLine, CartError> {
        take_line(&mut self.items, product_id)
    }

    /// Empty the cart. Saved-for-later lines are kept.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Move a line from the cart to the saved-for-later list.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if the product is not in the cart.
    pub fn save_for_later(&mut self, product_id: ProductId) -> Result<(), CartError> {
        let line = take_line(&mut self.items, product_id)?;
        merge_line(&mut self.saved_for_later, line);
        Ok(())
    }

    /// Move a saved line back into the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if the product is not saved.
    pub fn move_to_cart(&mut self, product_id: ProductId) -> Result<(), CartError> {
        let line = take_line(&mut self.saved_for_later, product_id)?;
        merge_line(&mut self.items, line);
        Ok(())
    }

    /// Merge guest lines into the cart with [`Cart::add`] semantics.
    ///
    /// Lines with an out-of-range quantity are ignored. Returns the number of lines merged.
    pub fn merge<I>(&mut self, lines: I) -> usize
    where
        I: IntoIterator<Item = CartLine>,
    {
        let mut merged = 0;
        for line in lines {
            if self.add(line).is_ok() {
                merged += 1;
            }
        }
        merged
    }

    /// Total number of units in the cart.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |count, l| count.saturating_add(l.quantity))
    }

    /// Price the cart's items under `policy`.
    #[must_use]
    pub fn totals(&self, policy: &PricingPolicy) -> PriceBreakdown {
        policy.quote(
            self.items.iter().map(|l| (l.price, l.quantity)),
            Decimal::ZERO,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, price: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            title: format!("Product {id}"),
            price: price.parse().unwrap(),
            image: format!("https://img.example.com/{id}.jpg"),
            quantity,
        }
    }

    #[test]
    fn test_add_existing_product_increments_quantity() {
        let mut cart = Cart::new();
        cart.add(line(1, "10.00", 1)).unwrap();
        cart.add(line(1, "10.00", 2)).unwrap();

        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
    }

    #[test]
    fn test_add_keeps_original_snapshot() {
        let mut cart = Cart::new();
        cart.add(line(1, "10.00", 1)).unwrap();
        cart.add(line(1, "12.00", 1)).unwrap();
        assert_eq!(cart.items[0].price, "10.00".parse().unwrap());
    }

    #[test]
    fn test_add_rejects_zero_quantity() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, "1.00", 0)), Err(CartError::InvalidQuantity));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_accumulated_quantity_is_capped() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(line(1, "1.00", 1000)), Err(CartError::InvalidQuantity));

        for _ in 0..3 {
            cart.add(line(1, "1.00", MAX_LINE_QUANTITY)).unwrap();
        }
        assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY);

        let merged = cart.merge([line(1, "1.00", 500), line(2, "1.00", u32::MAX)]);
        assert_eq!(merged, 1);
        assert_eq!(cart.item_count(), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_set_quantity() {
        let mut cart = Cart::new();
        cart.add(line(1, "10.00", 1)).unwrap();
        cart.set_quantity(ProductId::new(1), 5).unwrap();
        assert_eq!(cart.item_count(), 5);

        assert_eq!(
            cart.set_quantity(ProductId::new(1), 0),
            Err(CartError::InvalidQuantity)
        );
        assert_eq!(
            cart.set_quantity(ProductId::new(2), 1),
            Err(CartError::ItemNotFound(ProductId::new(2)))
        );
    }

    #[test]
    fn test_remove_missing_item() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.remove(ProductId::new(9)),
            Err(CartError::ItemNotFound(ProductId::new(9)))
        );
    }

    #[test]
    fn test_clear_keeps_saved_items() {
        let mut cart = Cart::new();
        cart.add(line(1, "1.00", 1)).unwrap();
        cart.add(line(2, "1.00", 1)).unwrap();
        cart.save_for_later(ProductId::new(2)).unwrap();

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.saved_for_later.len(), 1);
    }

    #[test]
    fn test_save_and_move_back_merge_quantities() {
        let mut cart = Cart::new();
        cart.add(line(1, "5.00", 2)).unwrap();
        cart.save_for_later(ProductId::new(1)).unwrap();
        assert!(cart.items.is_empty());

        cart.add(line(1, "5.00", 1)).unwrap();
        cart.move_to_cart(ProductId::new(1)).unwrap();

        assert!(cart.saved_for_later.is_empty());
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
    }

    #[test]
    fn test_move_to_cart_requires_saved_line() {
        let mut cart = Cart::new();
        cart.add(line(1, "5.00", 1)).unwrap();
        assert!(cart.move_to_cart(ProductId::new(1)).is_err());
    }

    #[test]
    fn test_merge_guest_cart() {
        let mut cart = Cart::new();
        cart.add(line(1, "10.00", 1)).unwrap();

        let merged = cart.merge(vec![line(1, "10.00", 2), line(2, "3.00", 1), line(3, "1.00", 0)]);

        assert_eq!(merged, 2);
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].quantity, 3);
    }

    #[test]
    fn test_totals_use_items_only() {
        let mut cart = Cart::new();
        cart.add(line(1, "20.00", 2)).unwrap();
        cart.add(line(2, "100.00", 1)).unwrap();
        cart.save_for_later(ProductId::new(2)).unwrap();

        let totals = cart.totals(&PricingPolicy::default());
        assert_eq!(totals.subtotal, "40.00".parse().unwrap());
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.tax, "3.20".parse().unwrap());
        assert_eq!(totals.total, "43.20".parse().unwrap());
    }
}
