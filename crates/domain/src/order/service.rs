//! Order service providing a simplified API for order operations.

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, UserId};
use document_store::{DocumentQuery, DocumentStore, Version};

use crate::actor::Actor;
use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{Order, OrderNumber, OrderStatus, PaymentStatus, PlaceOrder};

/// Service for managing orders.
///
/// Each method is one guarded conditional write on the order document; the
/// returned events tell the caller what changed (and whether it now owes an
/// inventory release).
#[derive(Clone)]
pub struct OrderService<S: DocumentStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: DocumentStore> OrderService<S> {
    /// Creates a new order service with the given document store.
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

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    /// Creates an order under the id derived from its number.
    #[tracing::instrument(skip(self, input), fields(customer = %input.customer, store = %input.store))]
    pub async fn place(
        &self,
        order_number: &OrderNumber,
        input: PlaceOrder,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        let id = order_number.order_id();
        let number = order_number.clone();
        self.handler
            .create(id, move |order| order.place(id, number, input, now))
            .await
    }

    /// Returns an order, if it exists.
    pub async fn get(&self, id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load(id).await
    }

    /// Returns an order, failing with `NotFound` if it doesn't exist.
    pub async fn order(&self, id: AggregateId) -> Result<Order, DomainError> {
        self.handler.load_existing(id).await
    }

    /// Records a successful payment.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(id, |order| order.confirm_payment(now))
            .await
    }

    /// Records a failed payment.
    #[tracing::instrument(skip(self))]
    pub async fn record_payment_failure(
        &self,
        id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(id, |order| order.record_payment_failure(now))
            .await
    }

    /// Moves an order one step along the happy path.
    #[tracing::instrument(skip(self))]
    pub async fn advance(
        &self,
        id: AggregateId,
        actor: Actor,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(id, |order| order.advance(&actor, next, now))
            .await
    }

    /// Binds an agent to a ready, unbound order.
    #[tracing::instrument(skip(self))]
    pub async fn assign_agent(
        &self,
        id: AggregateId,
        agent: UserId,
        now: DateTime<Utc>,
        estimated_delivery: Duration,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(id, |order| order.assign_agent(agent, now, estimated_delivery))
            .await
    }

    /// Cancels an order.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        id: AggregateId,
        actor: Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(id, |order| order.cancel(&actor, reason.clone(), now))
            .await
    }

    /// Cancels an order whose payment deadline has passed.
    #[tracing::instrument(skip(self))]
    pub async fn expire(
        &self,
        id: AggregateId,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(id, |order| order.expire(now, timeout))
            .await
    }

    /// Refunds a paid order.
    #[tracing::instrument(skip(self))]
    pub async fn refund(
        &self,
        id: AggregateId,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(id, |order| order.refund(&actor, now))
            .await
    }

    /// Deletes an order, optionally only if it is still at `expected`.
    pub async fn delete(&self, id: AggregateId, expected: Option<Version>) -> Result<bool, DomainError> {
        self.handler.delete(id, expected).await
    }

    /// Orders in `ready` with no agent, oldest first.
    pub async fn claimable(&self, limit: Option<usize>) -> Result<Vec<Order>, DomainError> {
        let mut query = Self::query()
            .field_eq("status", OrderStatus::Ready.as_str())
            .field_eq("agent", serde_json::Value::Null);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        self.handler.find(query).await
    }

    /// Every order of a customer, oldest first.
    pub async fn for_customer(&self, customer: UserId) -> Result<Vec<Order>, DomainError> {
        self.handler
            .find(Self::query().field_eq("customer", customer.to_string()))
            .await
    }

    /// Delivered orders bound to an agent.
    pub async fn delivered_by(&self, agent: UserId) -> Result<Vec<Order>, DomainError> {
        self.handler
            .find(
                Self::query()
                    .field_eq("status", OrderStatus::Delivered.as_str())
                    .field_eq("agent", agent.to_string()),
            )
            .await
    }

    /// Pending, unpaid orders created before `cutoff`.
    pub async fn unpaid_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, DomainError> {
        self.handler
            .find(
                Self::query()
                    .field_eq("status", OrderStatus::Pending.as_str())
                    .field_eq("payment_status", PaymentStatus::Pending.as_str())
                    .created_before(cutoff),
            )
            .await
    }

    /// Cancelled orders last written before `cutoff`.
    pub async fn cancelled_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, DomainError> {
        self.handler
            .find(
                Self::query()
                    .field_eq("status", OrderStatus::Cancelled.as_str())
                    .updated_before(cutoff),
            )
            .await
    }

    fn query() -> DocumentQuery {
        DocumentQuery::collection(Order::collection())
    }
}
