//! Best-effort email notifications.
//!
//! Emails are sent after the durable write commits and their failure is
//! logged, never surfaced to the caller or allowed to roll anything back.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::entities::order::OrderStatus;
use crate::pubsub::OrderEventPayload;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("email transport error: {0}")]
    Transport(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Posts messages to a transactional email HTTP endpoint.
pub struct HttpMailer {
    http: reqwest::Client,
    endpoint: String,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, from: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint,
            from,
        }
    }
}

#[derive(Serialize)]
struct OutboundEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let outbound = OutboundEmail {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            body: &message.body,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&outbound)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Transport(format!(
                "email endpoint returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Drops every message; used in tests and when no email endpoint is set.
#[derive(Default)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        debug!(to = %message.to, subject = %message.subject, "email sending disabled; dropping message");
        Ok(())
    }
}

/// Builds the order-confirmation email, or `None` when no address is known.
pub fn order_created_email(
    payload: &OrderEventPayload,
    to: Option<&str>,
) -> Option<EmailMessage> {
    let to = to?;
    Some(EmailMessage {
        to: to.to_string(),
        subject: format!("Your Tressa order {} is in", payload.order_number),
        body: format!(
            "Hi {},\n\nThanks for shopping with Tressa! We received your order {} \
             for {} {:.2}. We'll let you know as soon as it moves.\n\nThe Tressa Hair Care team",
            payload.customer_name, payload.order_number, payload.currency, payload.total
        ),
    })
}

/// Builds the status-update email, or `None` when no address is known.
pub fn status_changed_email(
    payload: &OrderEventPayload,
    to: Option<&str>,
) -> Option<EmailMessage> {
    let to = to?;
    let line = match payload.status {
        OrderStatus::Paid => "We received your payment confirmation.",
        OrderStatus::Confirmed => "Your order is confirmed.",
        OrderStatus::Processing => "Your order is being prepared.",
        OrderStatus::Shipped => "Your order is on its way.",
        OrderStatus::Delivered => "Your order was delivered.",
        OrderStatus::Cancelled => "Your order was cancelled.",
        OrderStatus::Refunded => "Your order was refunded.",
        OrderStatus::Pending | OrderStatus::PaymentPendingConfirmation => {
            "Your order was received."
        }
    };

    Some(EmailMessage {
        to: to.to_string(),
        subject: format!("Order {}: {}", payload.order_number, payload.status),
        body: format!(
            "Hi {},\n\n{} (order {}, total {} {:.2})\n\nThe Tressa Hair Care team",
            payload.customer_name, line, payload.order_number, payload.currency, payload.total
        ),
    })
}
