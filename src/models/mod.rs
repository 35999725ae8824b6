pub mod address;
pub mod cart;
pub mod checkout;

pub use address::ShippingAddress;
pub use cart::{Cart, CartItem, CheckoutError};
pub use checkout::validate_checkout;
