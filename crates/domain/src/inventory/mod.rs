//! Inventory Ledger: per-product stock and sold counters.

mod aggregate;
mod events;
mod service;

pub use aggregate::{NewProduct, Product};
pub use events::{ProductEvent, ProductListedData};
pub use service::{InventoryLedger, Reservation};

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Quantity must be at least 1.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Not enough stock to reserve the requested quantity.
    #[error("Insufficient stock for {product}: requested {requested}, available {available}")]
    InsufficientStock {
        product: AggregateId,
        requested: u32,
        available: u32,
    },

    /// The product is not currently offered.
    #[error("Product {product} is unavailable")]
    Unavailable { product: AggregateId },

    /// Prices can't be negative.
    #[error("Invalid price: {price} cents")]
    InvalidPrice { price: i64 },

    /// The product document was already initialized.
    #[error("Product already listed")]
    AlreadyListed,
}
