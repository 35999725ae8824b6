use std::sync::Arc;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::order::{
        self, Entity as OrderEntity, Model as OrderModel, OrderStatus, PaymentStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::{ORDER_STATUS_REJECTIONS, ORDER_STATUS_UPDATES},
};

/// Who is asking for a transition. Admins may drive any legal transition;
/// buyers get exactly one: reporting their own UPI payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionActor {
    Admin,
    Buyer(Uuid),
}

/// The authoritative transition table. Anything not listed here is illegal;
/// re-applying the current status is handled as a no-op by the service, not
/// by this table.
pub fn is_valid_transition(from: &OrderStatus, to: &OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (PaymentPendingConfirmation, Paid)
            | (Pending, Confirmed)
            | (Pending, Cancelled)
            | (Paid, Processing)
            | (Confirmed, Processing)
            | (Processing, Shipped)
            | (Shipped, Delivered)
            | (Confirmed, Refunded)
            | (Processing, Refunded)
            | (Shipped, Refunded)
    )
}

/// Payment status that must accompany a given order status, if any.
fn payment_status_for(status: &OrderStatus) -> Option<PaymentStatus> {
    match status {
        OrderStatus::Paid => Some(PaymentStatus::Paid),
        OrderStatus::Refunded => Some(PaymentStatus::Refunded),
        _ => None,
    }
}

#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Applies a status transition on behalf of the given actor.
    ///
    /// Legality is checked against the transition table, the actor's role is
    /// enforced, and the write itself is a compare-and-set on the expected
    /// current status so concurrent transitions cannot both win. Re-applying
    /// the status an order already holds is a no-op, not an error.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn transition(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        actor: TransitionActor,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db;

        let current = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        self.check_actor(&current, &new_status, &actor)?;

        let old_status = current.status.clone();

        if old_status == new_status {
            info!(order_id = %order_id, status = %new_status, "Status already applied; no-op");
            return Ok(current);
        }

        if !is_valid_transition(&old_status, &new_status) {
            ORDER_STATUS_REJECTIONS.inc();
            warn!(
                order_id = %order_id,
                from = %old_status,
                to = %new_status,
                "Rejected illegal status transition"
            );
            return Err(ServiceError::IllegalTransition {
                from: old_status,
                to: new_status,
            });
        }

        // Compare-and-set on the expected current status. Zero rows affected
        // means a concurrent transition got there first.
        let mut update = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(new_status.clone()))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .col_expr(
                order::Column::Version,
                Expr::col(order::Column::Version).add(1),
            )
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(old_status.clone()));

        if let Some(payment_status) = payment_status_for(&new_status) {
            update = update.col_expr(order::Column::PaymentStatus, Expr::value(payment_status));
        }

        let result = update.exec(db).await.map_err(|e| {
            error!(order_id = %order_id, "Failed to update order status: {}", e);
            ServiceError::db_error(e)
        })?;

        if result.rows_affected == 0 {
            ORDER_STATUS_REJECTIONS.inc();
            return Err(ServiceError::Conflict(format!(
                "Order {} was modified concurrently; status is no longer {}",
                order_id, old_status
            )));
        }

        let updated = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        ORDER_STATUS_UPDATES.inc();
        info!(
            order_id = %order_id,
            from = %old_status,
            to = %updated.status,
            "Order status updated"
        );

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: updated.id,
                order_number: updated.order_number.clone(),
                old_status,
                new_status: updated.status.clone(),
                customer_id: updated.customer_id,
                customer_name: updated.customer_name.clone(),
                customer_email: updated.customer_email.clone(),
                total: updated.total_amount,
                currency: updated.currency.clone(),
            })
            .await;

        Ok(updated)
    }

    fn check_actor(
        &self,
        order: &OrderModel,
        new_status: &OrderStatus,
        actor: &TransitionActor,
    ) -> Result<(), ServiceError> {
        match actor {
            TransitionActor::Admin => Ok(()),
            TransitionActor::Buyer(customer_id) => {
                if order.customer_id != *customer_id {
                    return Err(ServiceError::Forbidden(
                        "Order belongs to a different customer".to_string(),
                    ));
                }
                // A retried self-report on an order that already reached the
                // target status falls through to the no-op path.
                if order.status == *new_status {
                    return Ok(());
                }
                // The single buyer-driven transition: "I've paid".
                if *new_status != OrderStatus::Paid
                    || order.status != OrderStatus::PaymentPendingConfirmation
                {
                    return Err(ServiceError::Forbidden(
                        "Buyers may only confirm payment on an order awaiting it".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}
