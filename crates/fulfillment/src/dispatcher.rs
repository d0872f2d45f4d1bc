//! Fulfillment Dispatcher: agents racing for ready orders.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, UserId};
use document_store::DocumentStore;
use domain::{Aggregate, DomainError, GeoPoint, Money, Order, OrderError, OrderService, OrderStatus};

use crate::broadcast::{StatusBroadcaster, StatusEvent, Topic};
use crate::error::{FulfillmentError, Result};
use crate::location::{AgentLocation, LocationStore};
use crate::notify::{Notification, Notifier, send_best_effort};

/// A ready order with its distance from the asking agent.
#[derive(Debug, Clone)]
pub struct ClaimableOrder {
    pub order: Order,
    /// Kilometres from the agent to the pickup point, when both are known.
    pub distance_km: Option<f64>,
}

/// An agent's delivered orders over a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Earnings {
    pub orders: usize,
    pub total: Money,
}

/// Matches agents to ready orders and relays their position.
#[derive(Clone)]
pub struct Dispatcher<S: DocumentStore> {
    orders: OrderService<S>,
    locations: LocationStore,
    broadcaster: StatusBroadcaster,
    notifier: Arc<dyn Notifier>,
    estimated_delivery: Duration,
}

impl<S: DocumentStore + Clone> Dispatcher<S> {
    pub fn new(
        orders: OrderService<S>,
        locations: LocationStore,
        broadcaster: StatusBroadcaster,
        notifier: Arc<dyn Notifier>,
        estimated_delivery: Duration,
    ) -> Self {
        Self {
            orders,
            locations,
            broadcaster,
            notifier,
            estimated_delivery,
        }
    }

    /// Lists ready, unbound orders nearest first.
    ///
    /// Orders whose distance can't be computed sort last; ties go to the
    /// oldest order.
    pub async fn list_claimable(
        &self,
        agent_location: Option<GeoPoint>,
        limit: Option<usize>,
    ) -> Result<Vec<ClaimableOrder>> {
        if let Some(point) = agent_location
            && !point.is_valid()
        {
            return Err(FulfillmentError::InvalidCoordinates {
                lat: point.lat,
                lng: point.lng,
            });
        }

        let mut claimable: Vec<ClaimableOrder> = self
            .orders
            .claimable(None)
            .await?
            .into_iter()
            .map(|order| {
                let distance_km = agent_location
                    .zip(order.pickup())
                    .map(|(agent, pickup)| agent.distance_km(&pickup));
                ClaimableOrder { order, distance_km }
            })
            .collect();

        claimable.sort_by(|a, b| {
            compare_distance(a.distance_km, b.distance_km)
                .then_with(|| a.order.created_at().cmp(&b.order.created_at()))
        });
        if let Some(limit) = limit {
            claimable.truncate(limit);
        }
        Ok(claimable)
    }

    /// Binds the agent to the order if it is still ready and unbound.
    ///
    /// Of any number of simultaneous claims on one order exactly one wins;
    /// the rest fail with `NotAvailable` and change nothing.
    #[tracing::instrument(skip(self))]
    pub async fn claim(&self, order_id: AggregateId, agent: UserId, now: DateTime<Utc>) -> Result<Order> {
        let result = self
            .orders
            .assign_agent(order_id, agent, now, self.estimated_delivery)
            .await;

        let outcome = match &result {
            Ok(_) => "won",
            Err(DomainError::Order(OrderError::NotAvailable)) => "lost",
            Err(DomainError::NotFound { .. }) => "not_found",
            Err(_) => "error",
        };
        metrics::counter!("order_claims_total", "outcome" => outcome).increment(1);

        let order = result?.aggregate;
        tracing::info!(%order_id, %agent, "order claimed");

        if let (Some(customer), Some(number)) = (order.customer(), order.order_number()) {
            let event = StatusEvent::status(order_id, number.as_str(), OrderStatus::Delivering, now);
            self.broadcaster
                .publish(Topic::Customer(customer), event.clone());
            self.broadcaster.publish(Topic::Agent(agent), event);

            if let Some(notification) =
                Notification::for_status(customer, number.as_str(), OrderStatus::Delivering)
            {
                send_best_effort(self.notifier.as_ref(), notification).await;
            }
        }

        Ok(order)
    }

    /// Records the agent's position and relays it to the order's customer.
    ///
    /// The position is kept for the agent whatever the order's state.
    /// Returns whether it was forwarded, which only happens when the order
    /// exists, is out for delivery with this agent and the report is not
    /// older than one already recorded.
    #[tracing::instrument(skip(self))]
    pub async fn update_location(
        &self,
        agent: UserId,
        order_id: AggregateId,
        lat: f64,
        lng: f64,
        reported_at: DateTime<Utc>,
    ) -> Result<bool> {
        let point = GeoPoint::new(lat, lng);
        if !point.is_valid() {
            return Err(FulfillmentError::InvalidCoordinates { lat, lng });
        }

        let kept = self.locations.record(
            agent,
            AgentLocation {
                point,
                order: Some(order_id),
                reported_at,
            },
        );
        if !kept {
            return Ok(false);
        }

        let Some(order) = self.orders.get(order_id).await? else {
            return Ok(false);
        };
        let (Some(customer), Some(number)) = (order.customer(), order.order_number()) else {
            return Ok(false);
        };
        if order.agent() != Some(agent) || order.status() != OrderStatus::Delivering {
            return Ok(false);
        }

        self.broadcaster.publish(
            Topic::Customer(customer),
            StatusEvent::location(order_id, number.as_str(), lat, lng, reported_at),
        );
        Ok(true)
    }

    /// Returns the agent's last fresh position.
    pub fn agent_location(&self, agent: UserId, now: DateTime<Utc>) -> Option<AgentLocation> {
        self.locations.get(agent, now)
    }

    /// Sums the delivery fees of the agent's delivered orders created in
    /// `[from, to]`.
    pub async fn earnings(
        &self,
        agent: UserId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Earnings> {
        let delivered: Vec<Order> = self
            .orders
            .delivered_by(agent)
            .await?
            .into_iter()
            .filter(|order| {
                let created = order.created_at();
                from.is_none_or(|from| created.is_some_and(|c| c >= from))
                    && to.is_none_or(|to| created.is_some_and(|c| c <= to))
            })
            .collect();

        Ok(Earnings {
            orders: delivered.len(),
            total: delivered.iter().map(Order::delivery_fee).sum(),
        })
    }
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_distance_sorts_last() {
        let mut distances = vec![None, Some(3.0), Some(0.5), None, Some(1.2)];
        distances.sort_by(|a, b| compare_distance(*a, *b));
        assert_eq!(distances, vec![Some(0.5), Some(1.2), Some(3.0), None, None]);
    }
}
