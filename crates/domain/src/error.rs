//! Domain error types.

use common::AggregateId;
use document_store::DocumentStoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::coupon::CouponError;
use crate::inventory::InventoryError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] DocumentStoreError),

    /// The addressed document does not exist.
    #[error("Not found: {collection}/{id}")]
    NotFound {
        collection: &'static str,
        id: AggregateId,
    },

    /// An inventory guard rejected the command.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// A cart guard rejected the command.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// A coupon guard rejected the command.
    #[error("Coupon error: {0}")]
    Coupon(#[from] CouponError),

    /// An order guard rejected the command.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Every attempt lost its write race to a concurrent writer.
    #[error("Gave up on {collection}/{id} after {attempts} conflicting writes")]
    ContentionExhausted {
        collection: &'static str,
        id: AggregateId,
        attempts: u32,
    },
}

impl DomainError {
    /// Returns true if the error is a `NotFound` for the given collection.
    pub fn is_not_found_in(&self, collection: &str) -> bool {
        matches!(self, DomainError::NotFound { collection: c, .. } if *c == collection)
    }
}
