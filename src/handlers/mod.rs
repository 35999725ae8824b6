pub mod orders;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{OrderService, OrderStatusService, UpiService};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub order: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub upi: Arc<UpiService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let order = Arc::new(OrderService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.default_currency.clone(),
        ));
        let order_status = Arc::new(OrderStatusService::new(db_pool, event_sender));
        let upi = Arc::new(UpiService::new(config));

        Self {
            order,
            order_status,
            upi,
        }
    }
}
