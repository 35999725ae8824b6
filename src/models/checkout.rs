use crate::models::address::ShippingAddress;
use crate::models::cart::{Cart, CheckoutError};

/// Validates a cart snapshot and shipping address before submission.
///
/// Pure function of its inputs, no side effects. The stock check here is
/// advisory (against the client-observed ceiling); the authoritative check
/// happens inside the order-creation transaction.
pub fn validate_checkout(cart: &Cart, address: &ShippingAddress) -> Result<(), CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    for line in cart.items() {
        if line.quantity <= 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        if line.quantity > line.stock {
            return Err(CheckoutError::StockExceeded {
                product_id: line.product_id,
                requested: line.quantity,
                available: line.stock,
            });
        }
    }

    let missing = address.missing_required_fields();
    if !missing.is_empty() {
        return Err(CheckoutError::IncompleteAddress {
            missing: missing.into_iter().map(str::to_string).collect(),
        });
    }

    Ok(())
}
