use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The closed set of order statuses. These exact strings are the only legal
/// values in the `status` column.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(40))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[sea_orm(string_value = "PENDING")]
    #[strum(serialize = "PENDING")]
    Pending,
    #[sea_orm(string_value = "PAYMENT_PENDING_CONFIRMATION")]
    #[strum(serialize = "PAYMENT_PENDING_CONFIRMATION")]
    PaymentPendingConfirmation,
    #[sea_orm(string_value = "PAID")]
    #[strum(serialize = "PAID")]
    Paid,
    #[sea_orm(string_value = "CONFIRMED")]
    #[strum(serialize = "CONFIRMED")]
    Confirmed,
    #[sea_orm(string_value = "PROCESSING")]
    #[strum(serialize = "PROCESSING")]
    Processing,
    #[sea_orm(string_value = "SHIPPED")]
    #[strum(serialize = "SHIPPED")]
    Shipped,
    #[sea_orm(string_value = "DELIVERED")]
    #[strum(serialize = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "CANCELLED")]
    #[strum(serialize = "CANCELLED")]
    Cancelled,
    #[sea_orm(string_value = "REFUNDED")]
    #[strum(serialize = "REFUNDED")]
    Refunded,
}

impl OrderStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Refunded
        )
    }

    /// Lowercase slug used for per-status notification event names.
    pub fn as_slug(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PaymentPendingConfirmation => "payment-pending-confirmation",
            OrderStatus::Paid => "paid",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

/// How the buyer chose to settle the order.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "COD")]
    #[strum(serialize = "COD")]
    Cod,
    #[sea_orm(string_value = "UPI")]
    #[strum(serialize = "UPI")]
    Upi,
}

/// Settlement state tracked alongside the order status.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "PENDING")]
    #[strum(serialize = "PENDING")]
    Pending,
    #[sea_orm(string_value = "AWAITING_CONFIRMATION")]
    #[strum(serialize = "AWAITING_CONFIRMATION")]
    AwaitingConfirmation,
    #[sea_orm(string_value = "PAID")]
    #[strum(serialize = "PAID")]
    Paid,
    #[sea_orm(string_value = "REFUNDED")]
    #[strum(serialize = "REFUNDED")]
    Refunded,
}

/// The `orders` table. Item composition is immutable after creation; only
/// status, payment status, updated_at and version ever change.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Public, human-readable order number (unique, stable).
    pub order_number: String,

    /// The buyer who placed the order.
    pub customer_id: Uuid,
    pub customer_name: String,
    #[sea_orm(nullable)]
    pub customer_email: Option<String>,

    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,

    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_amount: Decimal,
    pub currency: String,

    /// Shipping address snapshot, serialized as JSON.
    pub shipping_address: String,

    pub created_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_matches_persisted_values() {
        assert_eq!(OrderStatus::Pending.to_string(), "PENDING");
        assert_eq!(
            OrderStatus::PaymentPendingConfirmation.to_string(),
            "PAYMENT_PENDING_CONFIRMATION"
        );
        assert_eq!(OrderStatus::Refunded.to_string(), "REFUNDED");
    }

    #[test]
    fn status_json_round_trip() {
        let json = serde_json::to_string(&OrderStatus::PaymentPendingConfirmation).unwrap();
        assert_eq!(json, "\"PAYMENT_PENDING_CONFIRMATION\"");
        let back: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrderStatus::PaymentPendingConfirmation);
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn payment_method_display() {
        assert_eq!(PaymentMethod::Cod.to_string(), "COD");
        assert_eq!(PaymentMethod::Upi.to_string(), "UPI");
    }
}
