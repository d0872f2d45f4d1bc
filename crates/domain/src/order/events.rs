//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, StoreId, UserId};
use serde::{Deserialize, Serialize};

use crate::actor::ActorRole;
use crate::aggregate::DomainEvent;
use crate::geo::GeoPoint;
use crate::value_objects::{LineItem, Money};

use super::{DeliveryAddress, OrderNumber, OrderStatus};

/// Events that can occur on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was created from a cart.
    Placed(Box<OrderPlacedData>),

    /// The payment gateway reported success.
    PaymentConfirmed {
        at: DateTime<Utc>,
        /// Whether the order moved from pending to confirmed with it.
        confirmed: bool,
    },

    /// The payment gateway reported failure.
    PaymentFailed { at: DateTime<Utc> },

    /// Order moved one step along the happy path.
    StatusAdvanced {
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    },

    /// A delivery agent claimed the order.
    AgentAssigned {
        agent: UserId,
        at: DateTime<Utc>,
        estimated_delivery: DateTime<Utc>,
    },

    /// Order was cancelled by a caller or by the payment deadline.
    Cancelled {
        by: ActorRole,
        reason: Option<String>,
        at: DateTime<Utc>,
        /// Whether the writer of this event must return the stock.
        release_inventory: bool,
    },

    /// Order was refunded.
    Refunded {
        by: ActorRole,
        at: DateTime<Utc>,
        release_inventory: bool,
    },
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Placed(_) => "OrderPlaced",
            OrderEvent::PaymentConfirmed { .. } => "PaymentConfirmed",
            OrderEvent::PaymentFailed { .. } => "PaymentFailed",
            OrderEvent::StatusAdvanced { .. } => "StatusAdvanced",
            OrderEvent::AgentAssigned { .. } => "AgentAssigned",
            OrderEvent::Cancelled { .. } => "OrderCancelled",
            OrderEvent::Refunded { .. } => "OrderRefunded",
        }
    }
}

impl OrderEvent {
    /// Returns the order status this event moved the order into, if it moved.
    pub fn new_status(&self) -> Option<OrderStatus> {
        match self {
            OrderEvent::Placed(_) => Some(OrderStatus::Pending),
            OrderEvent::PaymentConfirmed { confirmed: true, .. } => Some(OrderStatus::Confirmed),
            OrderEvent::PaymentConfirmed { .. } | OrderEvent::PaymentFailed { .. } => None,
            OrderEvent::StatusAdvanced { to, .. } => Some(*to),
            OrderEvent::AgentAssigned { .. } => Some(OrderStatus::Delivering),
            OrderEvent::Cancelled { .. } => Some(OrderStatus::Cancelled),
            OrderEvent::Refunded { .. } => Some(OrderStatus::Refunded),
        }
    }

    /// Returns true if this event obliges its writer to return the order's stock.
    pub fn releases_inventory(&self) -> bool {
        matches!(
            self,
            OrderEvent::Cancelled {
                release_inventory: true,
                ..
            } | OrderEvent::Refunded {
                release_inventory: true,
                ..
            }
        )
    }
}

/// Data for the Placed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub order_number: OrderNumber,
    pub customer: UserId,
    pub store: StoreId,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub discount: Money,
    pub coupon: Option<String>,
    pub delivery_address: DeliveryAddress,
    pub pickup: Option<GeoPoint>,
    pub note: Option<String>,
    pub payment_method: String,
    pub placed_at: DateTime<Utc>,
}
