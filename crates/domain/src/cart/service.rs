//! Cart service providing the Cart Store operations.

use common::{AggregateId, UserId};
use document_store::{DocumentStore, Version};

use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::inventory::InventoryLedger;

use super::{Cart, CartError};

/// Service for managing customer carts.
///
/// Products are read through the inventory ledger at add/update time so the
/// cart always prices lines from the current catalogue.
#[derive(Clone)]
pub struct CartService<S: DocumentStore> {
    handler: CommandHandler<S, Cart>,
    inventory: InventoryLedger<S>,
}

impl<S: DocumentStore + Clone> CartService<S> {
    /// Creates a new cart service with the given document store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store.clone()),
            inventory: InventoryLedger::new(store),
        }
    }

    /// Overrides how many conflicting writes a command tolerates.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.handler = self.handler.with_max_attempts(max_attempts);
        self.inventory = self.inventory.with_max_attempts(max_attempts);
        self
    }

    /// Returns the customer's cart; an absent cart is an empty one.
    pub async fn get_cart(&self, customer: UserId) -> Result<Cart, DomainError> {
        Ok(self
            .handler
            .load(AggregateId::from(customer))
            .await?
            .unwrap_or_else(|| Cart::empty(customer)))
    }

    /// Adds a product, creating the cart on first use.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        customer: UserId,
        product: AggregateId,
        quantity: u32,
    ) -> Result<Cart, DomainError> {
        let product = self.inventory.product(product).await?;

        let result = self
            .handler
            .execute_or_create(AggregateId::from(customer), |cart| {
                cart.add_item(customer, &product, quantity)
            })
            .await?;
        Ok(result.aggregate)
    }

    /// Sets a line's quantity; zero or less removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        customer: UserId,
        product: AggregateId,
        quantity: i64,
    ) -> Result<Cart, DomainError> {
        if quantity <= 0 {
            return self.remove_item(customer, product).await;
        }
        let quantity = u32::try_from(quantity).map_err(|_| CartError::InvalidQuantity { quantity })?;
        let product = self.inventory.product(product).await?;

        let result = self
            .handler
            .execute(AggregateId::from(customer), |cart| {
                cart.update_item(&product, quantity)
            })
            .await?;
        Ok(result.aggregate)
    }

    /// Removes a line from the cart.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        customer: UserId,
        product: AggregateId,
    ) -> Result<Cart, DomainError> {
        let result = self
            .handler
            .execute(AggregateId::from(customer), |cart| cart.remove_item(product))
            .await?;
        Ok(result.aggregate)
    }

    /// Destroys the customer's cart. Returns whether there was one.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, customer: UserId) -> Result<bool, DomainError> {
        self.handler.delete(AggregateId::from(customer), None).await
    }

    /// Destroys the cart only if it is still at `expected`.
    ///
    /// Used by checkout: a cart modified or consumed since it was read is
    /// left alone and `false` is returned.
    pub async fn discard(&self, customer: UserId, expected: Version) -> Result<bool, DomainError> {
        self.handler
            .delete(AggregateId::from(customer), Some(expected))
            .await
    }
}
