//! Cart domain events.

use common::{AggregateId, StoreId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::LineItem;

/// Events that can occur on a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// Cart was created on the customer's first add.
    Opened { cart_id: AggregateId, customer: UserId },

    /// A new line was appended.
    LineAdded { store: StoreId, line: LineItem },

    /// An existing line was replaced (quantity and/or price changed).
    LineUpdated { line: LineItem },

    /// A line was removed.
    LineRemoved { product: AggregateId },
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::Opened { .. } => "CartOpened",
            CartEvent::LineAdded { .. } => "CartLineAdded",
            CartEvent::LineUpdated { .. } => "CartLineUpdated",
            CartEvent::LineRemoved { .. } => "CartLineRemoved",
        }
    }
}
