use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Errors raised by cart mutations and checkout validation.
///
/// All of these are user-correctable: the buyer fixes the cart or the
/// address form and retries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("cart has no items")]
    EmptyCart,

    #[error("quantity {quantity} is not valid for product {product_id}")]
    InvalidQuantity { product_id: Uuid, quantity: i32 },

    #[error("requested {requested} of product {product_id} but only {available} in stock")]
    StockExceeded {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("shipping address is missing required fields: {}", missing.join(", "))]
    IncompleteAddress { missing: Vec<String> },
}

impl From<CheckoutError> for ServiceError {
    fn from(err: CheckoutError) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

/// One line of the client-held cart. Price and stock ceiling are snapshots
/// taken when the buyer added the product; the server re-checks both at
/// order creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    /// Advisory stock ceiling observed when the item was added.
    pub stock: i32,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The client-held shopping cart: a plain value object with explicit
/// mutation operations. Mutations that would push a quantity past the stock
/// ceiling are rejected, never clamped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Adds an item, merging quantities when the product is already present.
    pub fn add_item(&mut self, item: CartItem) -> Result<(), CheckoutError> {
        if item.quantity <= 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|line| line.product_id == item.product_id)
        {
            let merged = existing.quantity + item.quantity;
            if merged > existing.stock {
                return Err(CheckoutError::StockExceeded {
                    product_id: item.product_id,
                    requested: merged,
                    available: existing.stock,
                });
            }
            existing.quantity = merged;
            return Ok(());
        }

        if item.quantity > item.stock {
            return Err(CheckoutError::StockExceeded {
                product_id: item.product_id,
                requested: item.quantity,
                available: item.stock,
            });
        }

        self.items.push(item);
        Ok(())
    }

    /// Sets the quantity of an existing line. Use [`Cart::remove_item`] to
    /// drop a line; zero and negative quantities are rejected here.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: i32) -> Result<(), CheckoutError> {
        if quantity <= 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id,
                quantity,
            });
        }

        let line = self
            .items
            .iter_mut()
            .find(|line| line.product_id == product_id)
            .ok_or(CheckoutError::InvalidQuantity {
                product_id,
                quantity,
            })?;

        if quantity > line.stock {
            return Err(CheckoutError::StockExceeded {
                product_id,
                requested: quantity,
                available: line.stock,
            });
        }

        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: Uuid) {
        self.items.retain(|line| line.product_id != product_id);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of line totals at the snapshot prices.
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(price: Decimal, quantity: i32, stock: i32) -> CartItem {
        CartItem {
            product_id: Uuid::new_v4(),
            name: "Argan Repair Shampoo".to_string(),
            unit_price: price,
            quantity,
            stock,
            image_url: None,
        }
    }

    #[test]
    fn add_and_total() {
        let mut cart = Cart::new();
        cart.add_item(item(dec!(500.00), 2, 5)).unwrap();
        cart.add_item(item(dec!(250.00), 1, 3)).unwrap();

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.subtotal(), dec!(1250.00));
    }

    #[test]
    fn add_rejects_zero_and_negative_quantities() {
        let mut cart = Cart::new();
        let err = cart.add_item(item(dec!(500.00), 0, 5)).unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidQuantity { .. }));

        let err = cart.add_item(item(dec!(500.00), -2, 5)).unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidQuantity { .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn add_rejects_quantity_above_stock_ceiling() {
        let mut cart = Cart::new();
        let err = cart.add_item(item(dec!(500.00), 6, 5)).unwrap_err();
        assert_eq!(
            err,
            CheckoutError::StockExceeded {
                product_id: match err {
                    CheckoutError::StockExceeded { product_id, .. } => product_id,
                    _ => unreachable!(),
                },
                requested: 6,
                available: 5,
            }
        );
    }

    #[test]
    fn merging_an_existing_line_respects_the_ceiling() {
        let mut cart = Cart::new();
        let line = item(dec!(500.00), 3, 5);
        let product_id = line.product_id;
        cart.add_item(line.clone()).unwrap();

        // 3 + 3 exceeds the ceiling of 5
        let mut second = line;
        second.quantity = 3;
        let err = cart.add_item(second).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::StockExceeded {
                requested: 6,
                available: 5,
                ..
            }
        ));

        // quantity is unchanged, not clamped
        assert_eq!(cart.items()[0].product_id, product_id);
        assert_eq!(cart.items()[0].quantity, 3);
    }

    #[test]
    fn update_quantity_within_ceiling() {
        let mut cart = Cart::new();
        let line = item(dec!(500.00), 1, 5);
        let product_id = line.product_id;
        cart.add_item(line).unwrap();

        cart.update_quantity(product_id, 5).unwrap();
        assert_eq!(cart.items()[0].quantity, 5);

        let err = cart.update_quantity(product_id, 6).unwrap_err();
        assert!(matches!(err, CheckoutError::StockExceeded { .. }));
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn remove_and_clear() {
        let mut cart = Cart::new();
        let line = item(dec!(500.00), 1, 5);
        let product_id = line.product_id;
        cart.add_item(line).unwrap();
        cart.add_item(item(dec!(100.00), 1, 5)).unwrap();

        cart.remove_item(product_id);
        assert_eq!(cart.len(), 1);

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal(), Decimal::ZERO);
    }
}
