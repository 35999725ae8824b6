//! Property-based tests for the pure checkout core.

use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use tressa_api::models::{validate_checkout, Cart, CartItem, CheckoutError, ShippingAddress};
use tressa_api::services::order_status::is_valid_transition;
use tressa_api::entities::order::OrderStatus;

fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Asha Nair".to_string(),
        phone: "+91 98450 12345".to_string(),
        street: "14 Brigade Road".to_string(),
        city: "Bengaluru".to_string(),
        state: None,
        postal_code: "560001".to_string(),
        country: None,
    }
}

prop_compose! {
    fn arb_line(max_stock: i32)(
        price_paise in 100i64..100_000,
        stock in 1i32..max_stock,
    )(
        quantity in 1i32..=stock,
        price_paise in Just(price_paise),
        stock in Just(stock),
    ) -> CartItem {
        CartItem {
            product_id: Uuid::new_v4(),
            name: "Product".to_string(),
            unit_price: Decimal::new(price_paise, 2),
            quantity,
            stock,
            image_url: None,
        }
    }
}

proptest! {
    /// Any cart whose quantities sit within their ceilings, paired with a
    /// complete address, validates.
    #[test]
    fn carts_within_ceilings_validate(lines in prop::collection::vec(arb_line(50), 1..8)) {
        let cart = Cart::from_items(lines);
        prop_assert!(validate_checkout(&cart, &address()).is_ok());
    }

    /// Pushing any single line past its ceiling fails validation with a
    /// stock error naming that line.
    #[test]
    fn exceeding_any_ceiling_fails(
        lines in prop::collection::vec(arb_line(50), 1..8),
        victim in 0usize..8,
        excess in 1i32..10,
    ) {
        let mut lines = lines;
        let victim = victim % lines.len();
        let product_id = lines[victim].product_id;
        lines[victim].quantity = lines[victim].stock + excess;

        let cart = Cart::from_items(lines);
        match validate_checkout(&cart, &address()) {
            Err(CheckoutError::StockExceeded { product_id: reported, .. }) => {
                prop_assert_eq!(reported, product_id);
            }
            other => prop_assert!(false, "expected StockExceeded, got {:?}", other),
        }
    }

    /// The cart subtotal is exactly the sum of price x quantity, in exact
    /// decimal arithmetic.
    #[test]
    fn subtotal_is_sum_of_line_totals(lines in prop::collection::vec(arb_line(50), 1..8)) {
        let expected: Decimal = lines
            .iter()
            .map(|l| l.unit_price * Decimal::from(l.quantity))
            .sum();
        let cart = Cart::from_items(lines);
        prop_assert_eq!(cart.subtotal(), expected);
    }

    /// The state machine never allows an escape from a terminal state.
    #[test]
    fn terminal_states_are_absorbing(to in prop::sample::select(vec![
        OrderStatus::Pending,
        OrderStatus::PaymentPendingConfirmation,
        OrderStatus::Paid,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ])) {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled, OrderStatus::Refunded] {
            prop_assert!(!is_valid_transition(&terminal, &to));
        }
    }
}
