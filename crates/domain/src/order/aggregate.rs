//! Order aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, StoreId, UserId};
use document_store::Version;
use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorRole};
use crate::aggregate::Aggregate;
use crate::geo::GeoPoint;
use crate::value_objects::{LineItem, Money};

use super::{
    DeliveryAddress, OrderError, OrderEvent, OrderNumber, OrderStatus, PaymentStatus, PlaceOrder,
    events::OrderPlacedData,
};

/// Order aggregate root.
///
/// The only writer of `status`, `payment_status` and `agent`. The total is
/// never stored; it is always derived from subtotal, fee and discount.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(skip)]
    version: Version,

    order_number: Option<OrderNumber>,
    customer: Option<UserId>,
    store: Option<StoreId>,

    /// Always serialized (as null when unset) so queries can match on it.
    agent: Option<UserId>,

    items: Vec<LineItem>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: String,
    subtotal: Money,
    delivery_fee: Money,
    discount: Money,
    coupon: Option<String>,
    delivery_address: Option<DeliveryAddress>,
    pickup: Option<GeoPoint>,
    note: Option<String>,

    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    estimated_delivery_time: Option<DateTime<Utc>>,
    actual_delivery_time: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<ActorRole>,
    cancellation_reason: Option<String>,

    /// Set in the same write that cancels, expires or refunds the order.
    /// Once set, the order's stock has been (or is being) returned and must
    /// not be returned again.
    inventory_released: bool,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn collection() -> &'static str {
        "orders"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::Placed(data) => self.apply_placed(*data),
            OrderEvent::PaymentConfirmed { at, confirmed } => {
                self.payment_status = PaymentStatus::Paid;
                self.paid_at = Some(at);
                if confirmed {
                    self.status = OrderStatus::Confirmed;
                }
                self.updated_at = Some(at);
            }
            OrderEvent::PaymentFailed { at } => {
                self.payment_status = PaymentStatus::Failed;
                self.updated_at = Some(at);
            }
            OrderEvent::StatusAdvanced { to, at, .. } => {
                self.status = to;
                if to == OrderStatus::Delivered {
                    self.actual_delivery_time = Some(at);
                }
                self.updated_at = Some(at);
            }
            OrderEvent::AgentAssigned {
                agent,
                at,
                estimated_delivery,
            } => {
                self.agent = Some(agent);
                self.status = OrderStatus::Delivering;
                self.estimated_delivery_time = Some(estimated_delivery);
                self.updated_at = Some(at);
            }
            OrderEvent::Cancelled { by, reason, at, .. } => {
                self.status = OrderStatus::Cancelled;
                self.cancelled_at = Some(at);
                self.cancelled_by = Some(by);
                self.cancellation_reason = reason;
                self.inventory_released = true;
                self.updated_at = Some(at);
            }
            OrderEvent::Refunded { by, at, .. } => {
                self.status = OrderStatus::Refunded;
                self.payment_status = PaymentStatus::Refunded;
                self.cancelled_at = Some(at);
                self.cancelled_by = Some(by);
                self.inventory_released = true;
                self.updated_at = Some(at);
            }
        }
    }
}

// Query methods
impl Order {
    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    pub fn customer(&self) -> Option<UserId> {
        self.customer
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn agent(&self) -> Option<UserId> {
        self.agent
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn delivery_fee(&self) -> Money {
        self.delivery_fee
    }

    pub fn discount(&self) -> Money {
        self.discount
    }

    /// `subtotal + delivery fee − discount`.
    pub fn total(&self) -> Money {
        self.subtotal + self.delivery_fee - self.discount
    }

    pub fn coupon(&self) -> Option<&str> {
        self.coupon.as_deref()
    }

    pub fn delivery_address(&self) -> Option<&DeliveryAddress> {
        self.delivery_address.as_ref()
    }

    /// Store coordinates captured at checkout.
    pub fn pickup(&self) -> Option<GeoPoint> {
        self.pickup
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn estimated_delivery_time(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery_time
    }

    pub fn actual_delivery_time(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery_time
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn inventory_released(&self) -> bool {
        self.inventory_released
    }

    /// Returns true if the actor may read this order.
    pub fn can_view(&self, actor: &Actor) -> bool {
        match *actor {
            Actor::System => true,
            Actor::Customer(user) => self.customer == Some(user),
            Actor::Merchant { store, .. } => self.store == Some(store),
            Actor::Agent(user) => self.agent == Some(user),
        }
    }

    /// Returns true if the order has waited for payment past `timeout`.
    pub fn is_payment_overdue(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.status == OrderStatus::Pending
            && self.payment_status == PaymentStatus::Pending
            && self.created_at.is_some_and(|created| created + timeout <= now)
    }
}

// Command methods (return events)
impl Order {
    /// Creates the order in `pending`.
    pub fn place(
        &self,
        id: AggregateId,
        order_number: OrderNumber,
        input: PlaceOrder,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if input.items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let subtotal = input.items.iter().map(|line| line.total).sum();
        Ok(vec![OrderEvent::Placed(Box::new(OrderPlacedData {
            order_id: id,
            order_number,
            customer: input.customer,
            store: input.store,
            items: input.items,
            subtotal,
            delivery_fee: input.delivery_fee,
            discount: input.discount.min(subtotal),
            coupon: input.coupon,
            delivery_address: input.delivery_address,
            pickup: input.pickup,
            note: input.note,
            payment_method: input.payment_method,
            placed_at: now,
        }))])
    }

    /// Records a successful payment; a pending order becomes confirmed.
    ///
    /// A repeated confirmation is a no-op.
    pub fn confirm_payment(&self, now: DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError> {
        match self.payment_status {
            PaymentStatus::Paid => return Ok(vec![]),
            PaymentStatus::Refunded => {
                return Err(OrderError::InvalidPaymentTransition {
                    from: self.payment_status,
                    to: PaymentStatus::Paid,
                });
            }
            PaymentStatus::Pending | PaymentStatus::Failed => {}
        }
        if matches!(self.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Confirmed,
            });
        }

        Ok(vec![OrderEvent::PaymentConfirmed {
            at: now,
            confirmed: self.status == OrderStatus::Pending,
        }])
    }

    /// Records a failed payment attempt.
    pub fn record_payment_failure(&self, now: DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError> {
        match self.payment_status {
            PaymentStatus::Pending => Ok(vec![OrderEvent::PaymentFailed { at: now }]),
            PaymentStatus::Failed => Ok(vec![]),
            PaymentStatus::Paid | PaymentStatus::Refunded => {
                Err(OrderError::InvalidPaymentTransition {
                    from: self.payment_status,
                    to: PaymentStatus::Failed,
                })
            }
        }
    }

    /// Moves the order to the immediate successor of its current status.
    ///
    /// `ready → delivering` is reserved for [`Order::assign_agent`].
    pub fn advance(
        &self,
        actor: &Actor,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status.next() != Some(next) || next == OrderStatus::Delivering {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let allowed = match (next, *actor) {
            (_, Actor::System) => true,
            (OrderStatus::Delivered, Actor::Agent(user)) => self.agent == Some(user),
            (
                OrderStatus::Confirmed | OrderStatus::Preparing | OrderStatus::Ready,
                Actor::Merchant { store, .. },
            ) => self.store == Some(store),
            _ => false,
        };
        if !allowed {
            return Err(OrderError::Unauthorized { actor: actor.role() });
        }

        Ok(vec![OrderEvent::StatusAdvanced {
            from: self.status,
            to: next,
            at: now,
        }])
    }

    /// Binds an agent: `ready` and unbound → `delivering`.
    pub fn assign_agent(
        &self,
        agent: UserId,
        now: DateTime<Utc>,
        estimated_delivery: Duration,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status != OrderStatus::Ready || self.agent.is_some() {
            return Err(OrderError::NotAvailable);
        }
        Ok(vec![OrderEvent::AgentAssigned {
            agent,
            at: now,
            estimated_delivery: now + estimated_delivery,
        }])
    }

    /// Cancels the order on behalf of its customer, its merchant or the system.
    pub fn cancel(
        &self,
        actor: &Actor,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let allowed = match *actor {
            Actor::System => true,
            Actor::Customer(user) => self.customer == Some(user),
            Actor::Merchant { store, .. } => self.store == Some(store),
            Actor::Agent(_) => false,
        };
        if !allowed {
            return Err(OrderError::Unauthorized { actor: actor.role() });
        }
        if !self.status.can_cancel() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }

        Ok(vec![OrderEvent::Cancelled {
            by: actor.role(),
            reason,
            at: now,
            release_inventory: !self.inventory_released,
        }])
    }

    /// Cancels an order whose payment deadline has passed.
    pub fn expire(&self, now: DateTime<Utc>, timeout: Duration) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.is_payment_overdue(now, timeout) {
            return Err(OrderError::NotExpired);
        }
        Ok(vec![OrderEvent::Cancelled {
            by: ActorRole::System,
            reason: Some("payment timeout".to_string()),
            at: now,
            release_inventory: !self.inventory_released,
        }])
    }

    /// Refunds a paid order that hasn't left the store.
    pub fn refund(&self, actor: &Actor, now: DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError> {
        let allowed = match *actor {
            Actor::System => true,
            Actor::Merchant { store, .. } => self.store == Some(store),
            Actor::Customer(_) | Actor::Agent(_) => false,
        };
        if !allowed {
            return Err(OrderError::Unauthorized { actor: actor.role() });
        }
        if !self.status.is_before_delivery() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Refunded,
            });
        }
        if self.payment_status != PaymentStatus::Paid {
            return Err(OrderError::InvalidPaymentTransition {
                from: self.payment_status,
                to: PaymentStatus::Refunded,
            });
        }

        Ok(vec![OrderEvent::Refunded {
            by: actor.role(),
            at: now,
            release_inventory: !self.inventory_released,
        }])
    }
}

// Event application
impl Order {
    fn apply_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.order_number = Some(data.order_number);
        self.customer = Some(data.customer);
        self.store = Some(data.store);
        self.items = data.items;
        self.status = OrderStatus::Pending;
        self.payment_status = PaymentStatus::Pending;
        self.payment_method = data.payment_method;
        self.subtotal = data.subtotal;
        self.delivery_fee = data.delivery_fee;
        self.discount = data.discount;
        self.coupon = data.coupon;
        self.delivery_address = Some(data.delivery_address);
        self.pickup = data.pickup;
        self.note = data.note;
        self.created_at = Some(data.placed_at);
        self.updated_at = Some(data.placed_at);
    }
}
