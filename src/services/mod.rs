pub mod order_status;
pub mod orders;
pub mod payments;

pub use order_status::{OrderStatusService, TransitionActor};
pub use orders::OrderService;
pub use payments::UpiService;
