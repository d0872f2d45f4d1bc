//! Cart Store: one staging cart per customer, bound to one store.

mod aggregate;
mod events;
mod service;

pub use aggregate::Cart;
pub use events::CartEvent;
pub use service::CartService;

use common::{AggregateId, StoreId};
use thiserror::Error;

use crate::inventory::InventoryError;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The cart already holds items from another store.
    #[error("Cart holds items from store {cart_store}, product belongs to {product_store}")]
    StoreMismatch {
        cart_store: StoreId,
        product_store: StoreId,
    },

    /// Quantity must be at least 1 when adding.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// The product is not in the cart.
    #[error("Item not found in cart: {product}")]
    ItemNotFound { product: AggregateId },

    /// The product can't supply the requested quantity.
    #[error(transparent)]
    Stock(#[from] InventoryError),
}
