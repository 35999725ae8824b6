use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::metrics::PUBLISH_FAILURES;
use crate::notifications::{order_created_email, status_changed_email, Mailer};
use crate::pubsub::{
    ChannelEvent, OrderEventPayload, Publisher, EVENT_NEW_ORDER, EVENT_ORDER_STATUS_UPDATED,
};

/// Domain events emitted by the order engine.
///
/// Events carry everything the fan-out needs so the processing loop never
/// has to read the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        status: OrderStatus,
        customer_id: Uuid,
        customer_name: String,
        customer_email: Option<String>,
        total: Decimal,
        currency: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        order_number: String,
        old_status: OrderStatus,
        new_status: OrderStatus,
        customer_id: Uuid,
        customer_name: String,
        customer_email: Option<String>,
        total: Decimal,
        currency: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Fan-out is fire-and-forget; a lost event must never fail the write
    /// that produced it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping order event: {}", e);
        }
    }
}

fn payload_for(event: &Event) -> OrderEventPayload {
    match event {
        Event::OrderCreated {
            order_id,
            order_number,
            status,
            customer_name,
            total,
            currency,
            ..
        } => OrderEventPayload {
            order_id: *order_id,
            order_number: order_number.clone(),
            status: status.clone(),
            customer_name: customer_name.clone(),
            total: *total,
            currency: currency.clone(),
        },
        Event::OrderStatusChanged {
            order_id,
            order_number,
            new_status,
            customer_name,
            total,
            currency,
            ..
        } => OrderEventPayload {
            order_id: *order_id,
            order_number: order_number.clone(),
            status: new_status.clone(),
            customer_name: customer_name.clone(),
            total: *total,
            currency: currency.clone(),
        },
    }
}

async fn publish_or_log(publisher: &dyn Publisher, event: ChannelEvent) {
    if let Err(e) = publisher.publish(&event).await {
        PUBLISH_FAILURES.inc();
        warn!(event = %event.event, order_id = %event.data.order_id, "Failed to publish order event: {}", e);
    }
}

/// Processes domain events: publishes to the order channel and sends
/// best-effort emails. Failures on either path are logged and swallowed.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    publisher: Arc<dyn Publisher>,
    mailer: Arc<dyn Mailer>,
) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        let payload = payload_for(&event);

        match &event {
            Event::OrderCreated { customer_email, .. } => {
                info!(
                    order_id = %payload.order_id,
                    order_number = %payload.order_number,
                    status = %payload.status,
                    "Fanning out order creation"
                );

                publish_or_log(
                    publisher.as_ref(),
                    ChannelEvent::new(EVENT_NEW_ORDER, payload.clone()),
                )
                .await;

                if let Some(message) = order_created_email(&payload, customer_email.as_deref()) {
                    if let Err(e) = mailer.send(&message).await {
                        warn!(order_id = %payload.order_id, "Order confirmation email failed: {}", e);
                    }
                }
            }
            Event::OrderStatusChanged {
                old_status,
                customer_email,
                ..
            } => {
                info!(
                    order_id = %payload.order_id,
                    old_status = %old_status,
                    new_status = %payload.status,
                    "Fanning out status change"
                );

                publish_or_log(
                    publisher.as_ref(),
                    ChannelEvent::new(EVENT_ORDER_STATUS_UPDATED, payload.clone()),
                )
                .await;
                publish_or_log(
                    publisher.as_ref(),
                    ChannelEvent::new(
                        ChannelEvent::status_event_name(&payload.status),
                        payload.clone(),
                    ),
                )
                .await;

                if let Some(message) = status_changed_email(&payload, customer_email.as_deref()) {
                    if let Err(e) = mailer.send(&message).await {
                        warn!(order_id = %payload.order_id, "Status email failed: {}", e);
                    }
                }
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NoopMailer;
    use crate::pubsub::InMemoryPublisher;
    use rust_decimal_macros::dec;

    fn created_event(order_id: Uuid) -> Event {
        Event::OrderCreated {
            order_id,
            order_number: "ORD-AB12CD34".to_string(),
            status: OrderStatus::Pending,
            customer_id: Uuid::new_v4(),
            customer_name: "Asha Nair".to_string(),
            customer_email: None,
            total: dec!(1000.00),
            currency: "INR".to_string(),
        }
    }

    #[tokio::test]
    async fn creation_event_publishes_new_order() {
        let publisher = Arc::new(InMemoryPublisher::default());
        let mut channel = publisher.subscribe();
        let (tx, rx) = mpsc::channel(8);

        let loop_handle = tokio::spawn(process_events(
            rx,
            publisher.clone(),
            Arc::new(NoopMailer),
        ));

        let order_id = Uuid::new_v4();
        EventSender::new(tx.clone())
            .send(created_event(order_id))
            .await
            .unwrap();

        let event = channel.recv().await.unwrap();
        assert_eq!(event.event, EVENT_NEW_ORDER);
        assert_eq!(event.data.order_id, order_id);
        assert_eq!(event.data.status, OrderStatus::Pending);

        drop(tx);
        loop_handle.await.unwrap();
    }

    #[tokio::test]
    async fn status_change_publishes_update_and_per_status_events() {
        let publisher = Arc::new(InMemoryPublisher::default());
        let mut channel = publisher.subscribe();
        let (tx, rx) = mpsc::channel(8);

        let loop_handle = tokio::spawn(process_events(
            rx,
            publisher.clone(),
            Arc::new(NoopMailer),
        ));

        let order_id = Uuid::new_v4();
        tx.send(Event::OrderStatusChanged {
            order_id,
            order_number: "ORD-AB12CD34".to_string(),
            old_status: OrderStatus::PaymentPendingConfirmation,
            new_status: OrderStatus::Paid,
            customer_id: Uuid::new_v4(),
            customer_name: "Asha Nair".to_string(),
            customer_email: None,
            total: dec!(1000.00),
            currency: "INR".to_string(),
        })
        .await
        .unwrap();

        let first = channel.recv().await.unwrap();
        assert_eq!(first.event, EVENT_ORDER_STATUS_UPDATED);
        assert_eq!(first.data.status, OrderStatus::Paid);

        let second = channel.recv().await.unwrap();
        assert_eq!(second.event, "order-paid");
        assert_eq!(second.data.order_id, order_id);

        drop(tx);
        loop_handle.await.unwrap();
    }
}
