//! Inventory Ledger service.

use std::time::Duration;

use common::{AggregateId, StoreId};
use document_store::{DocumentQuery, DocumentStore};

use crate::aggregate::Aggregate;
use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::value_objects::Money;

use super::{NewProduct, Product};

/// Pause before the first retry of a failed release; grows linearly.
const RELEASE_BACKOFF: Duration = Duration::from_millis(50);

/// Stock taken for one line of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub product: AggregateId,
    pub quantity: u32,
}

/// Service for atomic stock movements.
///
/// Every method is a single conditional write on one product document, so
/// concurrent reservations on the same product are linearizable.
#[derive(Clone)]
pub struct InventoryLedger<S: DocumentStore> {
    handler: CommandHandler<S, Product>,
}

impl<S: DocumentStore> InventoryLedger<S> {
    /// Creates a new ledger over the given document store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Overrides how many conflicting writes a command tolerates.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.handler = self.handler.with_max_attempts(max_attempts);
        self
    }

    /// Puts a new product on sale.
    #[tracing::instrument(skip(self, input), fields(store = %input.store, name = %input.name))]
    pub async fn list_product(&self, input: NewProduct) -> Result<Product, DomainError> {
        let id = AggregateId::new();
        let result = self
            .handler
            .create(id, move |product| product.list(id, input))
            .await?;
        Ok(result.aggregate)
    }

    /// Returns a product, if it exists.
    pub async fn get(&self, id: AggregateId) -> Result<Option<Product>, DomainError> {
        self.handler.load(id).await
    }

    /// Returns a product, failing with `NotFound` if it doesn't exist.
    pub async fn product(&self, id: AggregateId) -> Result<Product, DomainError> {
        self.handler.load_existing(id).await
    }

    /// Returns every product of a store.
    pub async fn products_for_store(&self, store: StoreId) -> Result<Vec<Product>, DomainError> {
        self.handler
            .find(DocumentQuery::collection(Product::collection()).field_eq("store", store.to_string()))
            .await
    }

    /// Atomically checks `stock >= quantity` and moves `quantity` to sold.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, id: AggregateId, quantity: u32) -> Result<Product, DomainError> {
        let result = self
            .handler
            .execute(id, |product| product.reserve(quantity))
            .await?;
        Ok(result.aggregate)
    }

    /// Atomically returns `quantity` from sold to stock.
    ///
    /// Not idempotent on its own: callers guard it with the reversal flag on
    /// the order that took the stock.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, id: AggregateId, quantity: u32) -> Result<Product, DomainError> {
        let result = self
            .handler
            .execute(id, |product| product.release(quantity))
            .await?;
        Ok(result.aggregate)
    }

    /// Reserves every line or none of them.
    ///
    /// Lines are reserved in order; when one fails, the lines already taken
    /// are released in reverse order before the error is returned.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn reserve_all(&self, lines: &[Reservation]) -> Result<Vec<Reservation>, DomainError> {
        let mut taken = Vec::with_capacity(lines.len());

        for line in lines {
            match self.reserve(line.product, line.quantity).await {
                Ok(_) => taken.push(*line),
                Err(e) => {
                    tracing::debug!(product = %line.product, error = %e, "reservation failed, rolling back");
                    self.release_all(&taken).await;
                    return Err(e);
                }
            }
        }

        Ok(taken)
    }

    /// Releases reservations in reverse order.
    ///
    /// Failures are logged and skipped so one broken product can't block the
    /// rest; returns the reservations that could not be released.
    pub async fn release_all(&self, reservations: &[Reservation]) -> Vec<Reservation> {
        let mut failed = Vec::new();
        for reservation in reservations.iter().rev() {
            if let Err(e) = self.release(reservation.product, reservation.quantity).await {
                tracing::warn!(
                    product = %reservation.product,
                    quantity = reservation.quantity,
                    error = %e,
                    "failed to release reserved stock"
                );
                failed.push(*reservation);
            }
        }
        failed.reverse();
        failed
    }

    /// Like [`release_all`](Self::release_all), but retries failed lines for
    /// up to `rounds` rounds, pausing a little longer before each one.
    ///
    /// Returns the reservations still unreleased after the last round.
    pub async fn release_all_retrying(
        &self,
        reservations: &[Reservation],
        rounds: u32,
    ) -> Vec<Reservation> {
        let mut pending = self.release_all(reservations).await;
        for round in 1..rounds {
            if pending.is_empty() {
                break;
            }
            tokio::time::sleep(RELEASE_BACKOFF * round).await;
            tracing::debug!(round, lines = pending.len(), "retrying stock release");
            pending = self.release_all(&pending).await;
        }
        pending
    }

    /// Adds fresh stock.
    #[tracing::instrument(skip(self))]
    pub async fn restock(&self, id: AggregateId, quantity: u32) -> Result<Product, DomainError> {
        let result = self
            .handler
            .execute(id, |product| product.restock(quantity))
            .await?;
        Ok(result.aggregate)
    }

    /// Changes the unit price. Carts re-read it on the next add.
    #[tracing::instrument(skip(self))]
    pub async fn change_price(&self, id: AggregateId, price: Money) -> Result<Product, DomainError> {
        let result = self
            .handler
            .execute(id, |product| product.change_price(price))
            .await?;
        Ok(result.aggregate)
    }

    /// Takes a product off sale or puts it back.
    #[tracing::instrument(skip(self))]
    pub async fn set_available(&self, id: AggregateId, available: bool) -> Result<Product, DomainError> {
        let result = self
            .handler
            .execute(id, |product| product.set_available(available))
            .await?;
        Ok(result.aggregate)
    }
}
