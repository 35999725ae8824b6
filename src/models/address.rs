use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Shipping address captured per checkout. Only persisted as a snapshot on
/// the order; state and country are optional, everything else is required
/// before an order can be created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    #[serde(default)]
    pub country: Option<String>,
}

impl ShippingAddress {
    /// Names of the mandatory fields that are empty or blank.
    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.phone.trim().is_empty() {
            missing.push("phone");
        }
        if self.street.trim().is_empty() {
            missing.push("street");
        }
        if self.city.trim().is_empty() {
            missing.push("city");
        }
        if self.postal_code.trim().is_empty() {
            missing.push("postal_code");
        }
        missing
    }
}
