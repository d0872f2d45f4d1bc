//! Product domain events.

use common::{AggregateId, StoreId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::Money;

/// Events that can occur on a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    /// Product was put on sale.
    Listed(ProductListedData),

    /// Stock moved to the sold counter.
    StockReserved { quantity: u32 },

    /// Previously sold stock was returned.
    StockReleased { quantity: u32 },

    /// New stock arrived.
    Restocked { quantity: u32 },

    /// Unit price changed.
    PriceChanged { price: Money },

    /// Product was taken off or put back on sale.
    AvailabilityChanged { available: bool },
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::Listed(_) => "ProductListed",
            ProductEvent::StockReserved { .. } => "StockReserved",
            ProductEvent::StockReleased { .. } => "StockReleased",
            ProductEvent::Restocked { .. } => "Restocked",
            ProductEvent::PriceChanged { .. } => "PriceChanged",
            ProductEvent::AvailabilityChanged { .. } => "AvailabilityChanged",
        }
    }
}

/// Data for the Listed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListedData {
    pub product_id: AggregateId,
    pub store: StoreId,
    pub name: String,
    pub image: Option<String>,
    pub unit: String,
    pub price: Money,
    pub stock: u32,
}
