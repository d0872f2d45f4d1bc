//! Order aggregate and its state machine.

mod aggregate;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use events::{OrderEvent, OrderPlacedData};
pub use service::OrderService;
pub use state::{OrderStatus, PaymentStatus};
pub use value_objects::{DeliveryAddress, OrderNumber};

use common::{StoreId, UserId};
use thiserror::Error;

use crate::actor::ActorRole;
use crate::geo::GeoPoint;
use crate::value_objects::{LineItem, Money};

/// Input for placing an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub customer: UserId,
    pub store: StoreId,
    pub items: Vec<LineItem>,
    pub delivery_fee: Money,
    pub discount: Money,
    pub coupon: Option<String>,
    pub delivery_address: DeliveryAddress,
    pub pickup: Option<GeoPoint>,
    pub note: Option<String>,
    pub payment_method: String,
}

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The order document was already initialized.
    #[error("Order already placed")]
    AlreadyPlaced,

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// The requested status change isn't allowed from the current status.
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The requested payment status change isn't allowed.
    #[error("Invalid payment transition from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// The actor does not own, serve or deliver this order.
    #[error("{actor} is not allowed to perform this action on the order")]
    Unauthorized { actor: ActorRole },

    /// The order is not ready or already bound to an agent.
    #[error("Order is not available for claiming")]
    NotAvailable,

    /// The order is not past its payment deadline.
    #[error("Order is not past its payment deadline")]
    NotExpired,
}
