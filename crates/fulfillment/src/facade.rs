//! The operations the fulfillment core exposes to its host.

use std::sync::Arc;

use chrono::Utc;
use common::{AggregateId, StoreId, UserId};
use document_store::DocumentStore;
use domain::coupon::CouponQuote;
use domain::{
    Actor, CartService, Coupon, CouponEngine, GeoPoint, InventoryLedger, Money, Order,
    OrderService, OrderStatus,
};

use crate::broadcast::StatusBroadcaster;
use crate::checkout::{CheckoutCoordinator, CheckoutRequest};
use crate::config::FulfillmentConfig;
use crate::directory::{AddressBook, StoreDirectory};
use crate::dispatcher::{ClaimableOrder, Dispatcher};
use crate::error::Result;
use crate::lifecycle::OrderLifecycle;
use crate::location::LocationStore;
use crate::notify::Notifier;
use crate::sweeper::ExpirySweeper;

/// Entry point wiring every service of the core onto one document store.
#[derive(Clone)]
pub struct FulfillmentCore<S: DocumentStore> {
    carts: CartService<S>,
    inventory: InventoryLedger<S>,
    coupons: CouponEngine<S>,
    checkout: CheckoutCoordinator<S>,
    lifecycle: OrderLifecycle<S>,
    dispatcher: Dispatcher<S>,
    sweeper: ExpirySweeper<S>,
    broadcaster: StatusBroadcaster,
    config: FulfillmentConfig,
}

impl<S: DocumentStore + Clone + 'static> FulfillmentCore<S> {
    pub fn new(
        store: S,
        addresses: Arc<dyn AddressBook>,
        stores: Arc<dyn StoreDirectory>,
        notifier: Arc<dyn Notifier>,
        config: FulfillmentConfig,
    ) -> Self {
        let attempts = config.max_write_attempts;
        let carts = CartService::new(store.clone()).with_max_attempts(attempts);
        let inventory = InventoryLedger::new(store.clone()).with_max_attempts(attempts);
        let coupons = CouponEngine::new(store.clone()).with_max_attempts(attempts);
        let orders = OrderService::new(store).with_max_attempts(attempts);
        let broadcaster = StatusBroadcaster::new(config.broadcast_capacity);
        let locations = LocationStore::new(config.location_ttl);

        let checkout = CheckoutCoordinator::new(
            carts.clone(),
            inventory.clone(),
            coupons.clone(),
            orders.clone(),
            addresses,
            stores,
            Arc::clone(&notifier),
            broadcaster.clone(),
            config.fees,
        );
        let lifecycle = OrderLifecycle::new(
            orders.clone(),
            inventory.clone(),
            broadcaster.clone(),
            Arc::clone(&notifier),
        );
        let dispatcher = Dispatcher::new(
            orders.clone(),
            locations.clone(),
            broadcaster.clone(),
            notifier,
            config.estimated_delivery,
        );
        let sweeper = ExpirySweeper::new(orders, lifecycle.clone(), locations, &config);

        Self {
            carts,
            inventory,
            coupons,
            checkout,
            lifecycle,
            dispatcher,
            sweeper,
            broadcaster,
            config,
        }
    }

    /// Turns the customer's cart into a pending order.
    pub async fn create_order_from_cart(&self, request: CheckoutRequest) -> Result<Order> {
        self.checkout.create_from_cart(request, Utc::now()).await
    }

    /// Cancels a `pending` or `confirmed` order and returns its stock.
    pub async fn cancel_order(
        &self,
        order: AggregateId,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Order> {
        self.lifecycle.cancel(order, actor, reason, Utc::now()).await
    }

    /// Moves an order to the next status of the happy path.
    pub async fn advance_order_status(
        &self,
        order: AggregateId,
        actor: Actor,
        next: OrderStatus,
    ) -> Result<Order> {
        self.lifecycle.advance(order, actor, next, Utc::now()).await
    }

    /// Lists orders waiting for an agent, nearest first.
    pub async fn list_claimable_orders(
        &self,
        agent_location: Option<GeoPoint>,
        limit: Option<usize>,
    ) -> Result<Vec<ClaimableOrder>> {
        self.dispatcher.list_claimable(agent_location, limit).await
    }

    /// Binds the agent to a ready order; at most one claimant wins.
    pub async fn claim_order(&self, order: AggregateId, agent: UserId) -> Result<Order> {
        self.dispatcher.claim(order, agent, Utc::now()).await
    }

    /// Records the agent's position. Returns whether the customer was told.
    pub async fn update_agent_location(
        &self,
        agent: UserId,
        order: AggregateId,
        lat: f64,
        lng: f64,
    ) -> Result<bool> {
        self.dispatcher
            .update_location(agent, order, lat, lng, Utc::now())
            .await
    }

    /// Computes the discount a code gives on an order amount at a store.
    pub async fn validate_coupon(
        &self,
        code: &str,
        amount: Money,
        store: StoreId,
        customer: Option<UserId>,
    ) -> Result<CouponQuote> {
        Ok(self
            .coupons
            .validate(code, amount, store, customer, Utc::now())
            .await?)
    }

    /// Takes one unit of a coupon for the customer.
    pub async fn claim_coupon(&self, customer: UserId, coupon: AggregateId) -> Result<Coupon> {
        Ok(self.coupons.claim(customer, coupon, Utc::now()).await?)
    }

    /// Consumes the customer's claimed coupon for an order.
    pub async fn redeem_coupon(
        &self,
        customer: UserId,
        coupon: AggregateId,
        order: AggregateId,
    ) -> Result<Coupon> {
        Ok(self
            .coupons
            .redeem(customer, coupon, order, Utc::now())
            .await?)
    }

    /// Payment gateway callback: the order is now paid.
    pub async fn confirm_payment(&self, order: AggregateId) -> Result<Order> {
        self.lifecycle.confirm_payment(order, Utc::now()).await
    }

    pub fn carts(&self) -> &CartService<S> {
        &self.carts
    }

    pub fn inventory(&self) -> &InventoryLedger<S> {
        &self.inventory
    }

    pub fn coupons(&self) -> &CouponEngine<S> {
        &self.coupons
    }

    pub fn checkout(&self) -> &CheckoutCoordinator<S> {
        &self.checkout
    }

    pub fn lifecycle(&self) -> &OrderLifecycle<S> {
        &self.lifecycle
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.broadcaster
    }

    /// Returns a handle to the sweeper, e.g. to spawn [`ExpirySweeper::run`].
    pub fn sweeper(&self) -> ExpirySweeper<S> {
        self.sweeper.clone()
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }
}
