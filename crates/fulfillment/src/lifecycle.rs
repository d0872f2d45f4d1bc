//! Order lifecycle: cancellation, status changes, payment and reads.
//!
//! Every mutation is a single guarded write on the order. When that write
//! flips the order's reversal flag, the caller that made it, and only that
//! caller, returns the order's stock.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, UserId};
use document_store::DocumentStore;
use domain::inventory::Reservation;
use domain::{
    Actor, Aggregate, CommandResult, InventoryLedger, Order, OrderError, OrderService, OrderStatus,
};

use crate::broadcast::{StatusBroadcaster, StatusEvent, Topic};
use crate::checkout::RELEASE_ROUNDS;
use crate::error::Result;
use crate::notify::{Notification, Notifier, send_best_effort};

/// One page of a customer's order history.
#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl OrderPage {
    pub fn pages(&self) -> usize {
        self.total.div_ceil(self.limit.max(1))
    }
}

/// Drives orders through their state machine after checkout.
#[derive(Clone)]
pub struct OrderLifecycle<S: DocumentStore> {
    orders: OrderService<S>,
    inventory: InventoryLedger<S>,
    broadcaster: StatusBroadcaster,
    notifier: Arc<dyn Notifier>,
}

impl<S: DocumentStore + Clone> OrderLifecycle<S> {
    pub fn new(
        orders: OrderService<S>,
        inventory: InventoryLedger<S>,
        broadcaster: StatusBroadcaster,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orders,
            inventory,
            broadcaster,
            notifier,
        }
    }

    /// Cancels a `pending` or `confirmed` order and returns its stock.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        id: AggregateId,
        actor: Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let result = self.orders.cancel(id, actor, reason, now).await?;
        metrics::counter!("orders_cancelled_total", "source" => actor.role().as_str()).increment(1);
        Ok(self.settle(result, now).await)
    }

    /// Cancels an order whose payment deadline has passed.
    #[tracing::instrument(skip(self))]
    pub async fn expire(
        &self,
        id: AggregateId,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<Order> {
        let result = self.orders.expire(id, now, timeout).await?;
        metrics::counter!("orders_cancelled_total", "source" => "expired").increment(1);
        Ok(self.settle(result, now).await)
    }

    /// Moves an order one step along `confirmed → preparing → ready` or
    /// `delivering → delivered`.
    #[tracing::instrument(skip(self))]
    pub async fn advance(
        &self,
        id: AggregateId,
        actor: Actor,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let result = self.orders.advance(id, actor, next, now).await?;
        Ok(self.settle(result, now).await)
    }

    /// Accepts the payment gateway's confirmation.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_payment(&self, id: AggregateId, now: DateTime<Utc>) -> Result<Order> {
        let result = self.orders.confirm_payment(id, now).await?;
        Ok(self.settle(result, now).await)
    }

    /// Records a failed payment attempt.
    #[tracing::instrument(skip(self))]
    pub async fn record_payment_failure(
        &self,
        id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let result = self.orders.record_payment_failure(id, now).await?;
        Ok(self.settle(result, now).await)
    }

    /// Refunds a paid order that hasn't left the store and returns its stock.
    #[tracing::instrument(skip(self))]
    pub async fn refund(&self, id: AggregateId, actor: Actor, now: DateTime<Utc>) -> Result<Order> {
        let result = self.orders.refund(id, actor, now).await?;
        Ok(self.settle(result, now).await)
    }

    /// Returns an order the actor is allowed to see.
    pub async fn get_order(&self, actor: Actor, id: AggregateId) -> Result<Order> {
        let order = self.orders.order(id).await?;
        if !order.can_view(&actor) {
            return Err(domain::DomainError::from(OrderError::Unauthorized {
                actor: actor.role(),
            })
            .into());
        }
        Ok(order)
    }

    /// Lists a customer's orders, newest first. `page` starts at 1.
    pub async fn list_customer_orders(
        &self,
        customer: UserId,
        status: Option<OrderStatus>,
        page: usize,
        limit: usize,
    ) -> Result<OrderPage> {
        let page = page.max(1);
        let limit = limit.max(1);

        let mut orders: Vec<Order> = self
            .orders
            .for_customer(customer)
            .await?
            .into_iter()
            .filter(|o| status.is_none_or(|s| o.status() == s))
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        let total = orders.len();
        let orders = orders
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();

        Ok(OrderPage {
            orders,
            total,
            page,
            limit,
        })
    }

    /// Applies the side effects of a committed order write.
    async fn settle(&self, result: CommandResult<Order>, now: DateTime<Utc>) -> Order {
        let order = result.aggregate;

        for event in &result.events {
            if event.releases_inventory() {
                self.release_stock(&order).await;
            }
            if let Some(status) = event.new_status() {
                self.announce(&order, status, now).await;
            }
        }

        order
    }

    async fn release_stock(&self, order: &Order) {
        let reservations: Vec<Reservation> = order
            .items()
            .iter()
            .map(|line| Reservation {
                product: line.product,
                quantity: line.quantity,
            })
            .collect();

        let stuck = self
            .inventory
            .release_all_retrying(&reservations, RELEASE_ROUNDS)
            .await;
        if !stuck.is_empty() {
            metrics::counter!("stock_release_failures_total").increment(stuck.len() as u64);
            tracing::error!(
                order_id = ?order.id(),
                ?stuck,
                "order reversed but some stock could not be returned"
            );
        } else {
            tracing::info!(order_id = ?order.id(), lines = reservations.len(), "stock returned");
        }
    }

    async fn announce(&self, order: &Order, status: OrderStatus, now: DateTime<Utc>) {
        let (Some(order_id), Some(customer), Some(number)) =
            (order.id(), order.customer(), order.order_number())
        else {
            return;
        };

        self.broadcaster.publish(
            Topic::Customer(customer),
            StatusEvent::status(order_id, number.as_str(), status, now),
        );

        if let Some(notification) = Notification::for_status(customer, number.as_str(), status) {
            send_best_effort(self.notifier.as_ref(), notification).await;
        }
    }
}
