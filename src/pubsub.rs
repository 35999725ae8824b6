//! Pub/sub contract for the admin order console.
//!
//! Every order creation and accepted status transition is published to one
//! fixed channel. The engine only depends on [`Publisher::publish`]; the
//! transport behind it is swappable (hosted Redis in production, an
//! in-process broadcast bus in tests).
//!
//! Delivery is at-least-once and may arrive out of order. Consumers must
//! treat the payload's embedded status as authoritative and overwrite their
//! local row for that order id; deriving state from event ordering is not
//! safe. [`OrderStatusCache`] implements that rule for in-process consumers.

use async_trait::async_trait;
use redis::AsyncCommands;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::entities::order::OrderStatus;

/// The one channel all order events go out on.
pub const ORDER_EVENTS_CHANNEL: &str = "tressa-orders";

/// Event name for order creation.
pub const EVENT_NEW_ORDER: &str = "new-order";
/// Event name for any accepted status transition.
pub const EVENT_ORDER_STATUS_UPDATED: &str = "order-status-updated";

#[derive(Debug, Error)]
pub enum PubSubError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Minimal order facts a console needs to render a toast and update its
/// table row: id, number, authoritative status, buyer display name, total.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderEventPayload {
    pub order_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub customer_name: String,
    pub total: Decimal,
    pub currency: String,
}

/// A named event on the order channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub event: String,
    pub data: OrderEventPayload,
}

impl ChannelEvent {
    pub fn new(event: impl Into<String>, data: OrderEventPayload) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Per-status convenience event, e.g. `order-paid`, `order-shipped`.
    pub fn status_event_name(status: &OrderStatus) -> String {
        format!("order-{}", status.as_slug())
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, event: &ChannelEvent) -> Result<(), PubSubError>;
}

/// Publishes to a hosted Redis channel.
pub struct RedisPublisher {
    client: Arc<redis::Client>,
    channel: String,
}

impl RedisPublisher {
    pub fn new(client: Arc<redis::Client>) -> Self {
        Self {
            client,
            channel: ORDER_EVENTS_CHANNEL.to_string(),
        }
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, event: &ChannelEvent) -> Result<(), PubSubError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| PubSubError::Serialization(e.to_string()))?;

        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| PubSubError::Transport(e.to_string()))?;

        conn.publish::<_, _, ()>(&self.channel, payload)
            .await
            .map_err(|e| PubSubError::Transport(e.to_string()))?;

        debug!(event = %event.event, order_id = %event.data.order_id, "published order event");
        Ok(())
    }
}

/// In-process broadcast bus used by tests and single-node deployments.
pub struct InMemoryPublisher {
    tx: broadcast::Sender<ChannelEvent>,
}

impl InMemoryPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.tx.subscribe()
    }
}

impl Default for InMemoryPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, event: &ChannelEvent) -> Result<(), PubSubError> {
        // A send error only means nobody is subscribed right now.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

/// Local order view maintained by a channel consumer.
///
/// `apply` overwrites the cached row with the event's embedded status, so
/// re-delivery and out-of-order arrival both converge on the latest payload
/// the transport handed over.
#[derive(Debug, Default)]
pub struct OrderStatusCache {
    orders: HashMap<Uuid, OrderEventPayload>,
}

impl OrderStatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &ChannelEvent) {
        self.orders
            .insert(event.data.order_id, event.data.clone());
    }

    pub fn get(&self, order_id: Uuid) -> Option<&OrderEventPayload> {
        self.orders.get(&order_id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
