use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        order::{
            self, Entity as OrderEntity, Model as OrderModel, OrderStatus, PaymentMethod,
            PaymentStatus,
        },
        order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
        product::{self, Entity as ProductEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::{ORDER_CREATIONS, ORDER_CREATION_FAILURES},
    models::{validate_checkout, Cart, ShippingAddress},
};

/// Everything needed to turn a validated cart into a durable order.
#[derive(Debug, Clone)]
pub struct CreateOrderInput {
    pub customer_id: Uuid,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub cart: Cart,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    /// Client-echoed total; verified against the server-side computation,
    /// never trusted.
    pub expected_total: Option<Decimal>,
}

/// A freshly created order with its line items.
#[derive(Debug)]
pub struct CreatedOrder {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

/// Service owning the orders and order_items tables.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    currency: String,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            currency,
        }
    }

    /// Creates exactly one order from a validated cart, all-or-nothing.
    ///
    /// The stock check here is authoritative: each line decrements the
    /// product row with `stock_quantity >= quantity` as a condition, so two
    /// checkouts racing for the last unit cannot both succeed. Any failure
    /// rolls the whole transaction back; no partial order survives.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id, lines = input.cart.len()))]
    pub async fn create_order(&self, input: CreateOrderInput) -> Result<CreatedOrder, ServiceError> {
        validate_checkout(&input.cart, &input.shipping_address).map_err(|e| {
            ORDER_CREATION_FAILURES.inc();
            ServiceError::from(e)
        })?;

        let shipping_json = serde_json::to_string(&input.shipping_address)
            .map_err(|e| ServiceError::InternalError(format!("address serialization: {}", e)))?;

        let db = &*self.db;
        let customer_id = input.customer_id;
        let customer_name = input.customer_name.clone();
        let customer_email = input.customer_email.clone();
        let cart = input.cart.clone();
        let payment_method = input.payment_method.clone();
        let expected_total = input.expected_total;
        let currency = self.currency.clone();

        let created = db
            .transaction::<_, (OrderModel, Vec<OrderItemModel>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let order_id = Uuid::new_v4();
                    let mut total = Decimal::ZERO;
                    let mut item_rows = Vec::with_capacity(cart.len());

                    for line in cart.items() {
                        let product = ProductEntity::find_by_id(line.product_id)
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            .filter(|p| p.is_active)
                            .ok_or_else(|| {
                                ServiceError::ValidationError(format!(
                                    "Cart references an unknown product ({})",
                                    line.product_id
                                ))
                            })?;

                        // The cart carries an add-time price snapshot. If the
                        // catalog price moved since, the buyer must revisit
                        // the cart rather than be charged an amount they
                        // never saw.
                        if line.unit_price != product.price {
                            return Err(ServiceError::ValidationError(format!(
                                "Price of {} changed from {} to {}; please review your cart",
                                product.name, line.unit_price, product.price
                            )));
                        }

                        // Authoritative stock decrement: zero rows affected
                        // means the remaining stock cannot cover this line.
                        let decrement = ProductEntity::update_many()
                            .col_expr(
                                product::Column::StockQuantity,
                                Expr::col(product::Column::StockQuantity).sub(line.quantity),
                            )
                            .col_expr(product::Column::UpdatedAt, Expr::value(now))
                            .filter(product::Column::Id.eq(line.product_id))
                            .filter(product::Column::StockQuantity.gte(line.quantity))
                            .exec(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                        if decrement.rows_affected == 0 {
                            return Err(ServiceError::InsufficientStock(format!(
                                "Only {} of {} left in stock",
                                product.stock_quantity, product.name
                            )));
                        }

                        let line_total = product.price * Decimal::from(line.quantity);
                        total += line_total;

                        item_rows.push(order_item::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            order_id: Set(order_id),
                            product_id: Set(product.id),
                            name: Set(product.name.clone()),
                            image_url: Set(product.image_url.clone()),
                            quantity: Set(line.quantity),
                            unit_price: Set(product.price),
                            total_price: Set(line_total),
                            created_at: Set(now),
                        });
                    }

                    if let Some(expected) = expected_total {
                        if expected != total {
                            return Err(ServiceError::ValidationError(format!(
                                "Submitted total {} does not match computed total {}",
                                expected, total
                            )));
                        }
                    }

                    let (status, payment_status) = match payment_method {
                        PaymentMethod::Cod => (OrderStatus::Pending, PaymentStatus::Pending),
                        PaymentMethod::Upi => (
                            OrderStatus::PaymentPendingConfirmation,
                            PaymentStatus::AwaitingConfirmation,
                        ),
                    };

                    let order_row = order::ActiveModel {
                        id: Set(order_id),
                        order_number: Set(generate_order_number(order_id)),
                        customer_id: Set(customer_id),
                        customer_name: Set(customer_name),
                        customer_email: Set(customer_email),
                        status: Set(status),
                        payment_method: Set(payment_method),
                        payment_status: Set(payment_status),
                        total_amount: Set(total),
                        currency: Set(currency),
                        shipping_address: Set(shipping_json),
                        created_at: Set(now),
                        updated_at: Set(Some(now)),
                        version: Set(1),
                    };

                    use sea_orm::ActiveModelTrait;

                    let saved_order = order_row.insert(txn).await.map_err(|e| {
                        error!("Failed to insert order {}: {}", order_id, e);
                        ServiceError::db_error(e)
                    })?;

                    let mut saved_items = Vec::with_capacity(item_rows.len());
                    for item in item_rows {
                        let saved = item.insert(txn).await.map_err(|e| {
                            error!("Failed to insert order item for order {}: {}", order_id, e);
                            ServiceError::db_error(e)
                        })?;
                        saved_items.push(saved);
                    }

                    Ok((saved_order, saved_items))
                })
            })
            .await
            .map_err(|e| {
                ORDER_CREATION_FAILURES.inc();
                match e {
                    TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                    TransactionError::Transaction(service_err) => service_err,
                }
            })?;

        let (order, items) = created;
        ORDER_CREATIONS.inc();
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            status = %order.status,
            total = %order.total_amount,
            "Order created"
        );

        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: order.id,
                order_number: order.order_number.clone(),
                status: order.status.clone(),
                customer_id: order.customer_id,
                customer_name: order.customer_name.clone(),
                customer_email: order.customer_email.clone(),
                total: order.total_amount,
                currency: order.currency.clone(),
            })
            .await;

        Ok(CreatedOrder { order, items })
    }

    /// Fetches an order with its items.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<(OrderModel, Vec<OrderItemModel>)>, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        match order {
            Some(order) => {
                let items = self.get_order_items(order.id).await?;
                Ok(Some((order, items)))
            }
            None => Ok(None),
        }
    }

    /// Fetches an order by its public order number.
    pub async fn get_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<(OrderModel, Vec<OrderItemModel>)>, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        match order {
            Some(order) => {
                let items = self.get_order_items(order.id).await?;
                Ok(Some((order, items)))
            }
            None => Ok(None),
        }
    }

    pub async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderItemModel>, ServiceError> {
        OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists orders for the admin console, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        limit: u64,
        status: Option<OrderStatus>,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query.paginate(&*self.db, limit.max(1));
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((orders, total))
    }
}

/// Public order number derived from the order id: stable, unique, readable.
fn generate_order_number(order_id: Uuid) -> String {
    format!(
        "ORD-{}",
        order_id.simple().to_string()[..8].to_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_format_is_stable() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(generate_order_number(id), "ORD-550E8400");
    }

    #[test]
    fn order_numbers_differ_for_different_orders() {
        let a = generate_order_number(Uuid::new_v4());
        let b = generate_order_number(Uuid::new_v4());
        assert!(a.starts_with("ORD-"));
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }
}
