//! Checkout coordination: cart → pending order.
//!
//! Steps run in this order, and a failure after stock is taken undoes the
//! completed steps in reverse:
//! 1. Load the cart and resolve the delivery address
//! 2. Validate the coupon against the cart subtotal
//! 3. Reserve stock for every line (all or nothing)
//! 4. Redeem the coupon for the new order id
//! 5. Place the order
//! 6. Consume the cart at the version that was read; if the cart moved on,
//!    the new order is withdrawn before the earlier steps are undone

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{AggregateId, StoreId, UserId};
use document_store::DocumentStore;
use domain::inventory::Reservation;
use domain::{
    Aggregate, CartService, CouponEngine, DomainError, InventoryLedger, Money, Order,
    OrderNumber, OrderService, OrderStatus, PlaceOrder,
};

use crate::broadcast::{StatusBroadcaster, StatusEvent, Topic};
use crate::config::FeePolicy;
use crate::directory::{AddressBook, StoreDirectory};
use crate::error::{FulfillmentError, Result};
use crate::notify::{Notification, Notifier, send_best_effort};

/// Rounds of release attempts before unreturned stock is reported.
pub(crate) const RELEASE_ROUNDS: u32 = 3;

/// Input of a checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer: UserId,
    /// Id of one of the customer's saved addresses.
    pub address: AggregateId,
    pub note: Option<String>,
    pub payment_method: String,
    pub coupon: Option<String>,
}

impl CheckoutRequest {
    pub fn new(customer: UserId, address: AggregateId, payment_method: impl Into<String>) -> Self {
        Self {
            customer,
            address,
            note: None,
            payment_method: payment_method.into(),
            coupon: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon = Some(code.into());
        self
    }
}

/// What has to be undone if checkout fails part-way.
#[derive(Default)]
struct Taken {
    reservations: Vec<Reservation>,
    coupon: Option<AggregateId>,
}

/// Turns carts into orders.
#[derive(Clone)]
pub struct CheckoutCoordinator<S: DocumentStore> {
    carts: CartService<S>,
    inventory: InventoryLedger<S>,
    coupons: CouponEngine<S>,
    orders: OrderService<S>,
    addresses: Arc<dyn AddressBook>,
    stores: Arc<dyn StoreDirectory>,
    notifier: Arc<dyn Notifier>,
    broadcaster: StatusBroadcaster,
    fees: FeePolicy,
}

impl<S: DocumentStore + Clone> CheckoutCoordinator<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        carts: CartService<S>,
        inventory: InventoryLedger<S>,
        coupons: CouponEngine<S>,
        orders: OrderService<S>,
        addresses: Arc<dyn AddressBook>,
        stores: Arc<dyn StoreDirectory>,
        notifier: Arc<dyn Notifier>,
        broadcaster: StatusBroadcaster,
        fees: FeePolicy,
    ) -> Self {
        Self {
            carts,
            inventory,
            coupons,
            orders,
            addresses,
            stores,
            notifier,
            broadcaster,
            fees,
        }
    }

    /// Creates a pending order from the customer's cart.
    ///
    /// Either the order exists afterwards, with its stock reserved, its
    /// coupon redeemed and the cart gone, or none of those effects remain.
    #[tracing::instrument(skip(self, request), fields(customer = %request.customer))]
    pub async fn create_from_cart(
        &self,
        request: CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<Order> {
        let started = std::time::Instant::now();
        let result = self.checkout(request, now).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_number = order.order_number().map(OrderNumber::as_str),
                    total = %order.total(),
                    duration = started.elapsed().as_secs_f64(),
                    "order created"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failed_total", "reason" => e.reason()).increment(1);
                if e.is_fatal() {
                    tracing::error!(error = %e, "checkout failed");
                } else {
                    tracing::info!(error = %e, "checkout rejected");
                }
            }
        }

        result
    }

    async fn checkout(&self, request: CheckoutRequest, now: DateTime<Utc>) -> Result<Order> {
        let customer = request.customer;

        // 1. Cart and address
        let cart = self.carts.get_cart(customer).await?;
        let store = match cart.store() {
            Some(store) if !cart.is_empty() => store,
            _ => return Err(FulfillmentError::EmptyCart),
        };
        let address = self
            .addresses
            .address(customer, request.address)
            .await
            .ok_or(FulfillmentError::AddressNotFound {
                customer,
                address: request.address,
            })?;

        // 2. Coupon
        let subtotal = cart.total();
        let quote = match &request.coupon {
            Some(code) => Some(
                self.coupons
                    .validate(code, subtotal, store, Some(customer), now)
                    .await?,
            ),
            None => None,
        };
        let discount = quote.as_ref().map_or(Money::zero(), |q| q.discount);

        // 3. Stock
        let lines: Vec<Reservation> = cart
            .items()
            .iter()
            .map(|line| Reservation {
                product: line.product,
                quantity: line.quantity,
            })
            .collect();
        let mut taken = Taken {
            reservations: self.inventory.reserve_all(&lines).await?,
            coupon: None,
        };

        let order_number = OrderNumber::generate(now);
        let order_id = order_number.order_id();

        // 4. Coupon redemption
        if let Some(quote) = &quote {
            if let Err(e) = self
                .coupons
                .redeem_code(customer, &quote.code, order_id, now)
                .await
            {
                self.compensate(customer, order_id, &taken).await;
                return Err(e.into());
            }
            taken.coupon = Some(quote.coupon);
        }

        // 5. Order
        let input = PlaceOrder {
            customer,
            store,
            items: cart.items().to_vec(),
            delivery_fee: self.fees.fee_for(subtotal),
            discount,
            coupon: quote.map(|q| q.code),
            delivery_address: address.to_delivery_address(),
            pickup: self.stores.location(store).await,
            note: request.note,
            payment_method: request.payment_method,
        };
        let order = match self.orders.place(&order_number, input, now).await {
            Ok(result) => result.aggregate,
            Err(e) => {
                self.compensate(customer, order_id, &taken).await;
                return Err(e.into());
            }
        };

        // 6. Cart
        let consumed = match self.carts.discard(customer, cart.version()).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(FulfillmentError::CartChanged),
            Err(DomainError::Store(e)) if e.is_conflict() => Err(FulfillmentError::CartChanged),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = consumed {
            if self.withdraw(&order).await {
                self.compensate(customer, order_id, &taken).await;
                return Err(e);
            }
            tracing::warn!(
                %order_id,
                error = %e,
                "order was touched before it could be withdrawn, keeping it"
            );
        }

        self.announce(&order, store, now).await;
        Ok(order)
    }

    /// Deletes an order placed by a checkout that could not consume its
    /// cart. Only succeeds while nobody else has written to the order.
    async fn withdraw(&self, order: &Order) -> bool {
        let Some(order_id) = order.id() else {
            return false;
        };
        match self.orders.delete(order_id, Some(order.version())).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "failed to withdraw order");
                false
            }
        }
    }

    /// Undoes the steps recorded in `taken`, newest first.
    ///
    /// Failures are logged and skipped so the remaining steps still run.
    async fn compensate(&self, customer: UserId, order_id: AggregateId, taken: &Taken) {
        tracing::warn!(%customer, %order_id, "checkout failed after reserving stock, compensating");

        if let Some(coupon) = taken.coupon
            && let Err(e) = self.coupons.unredeem(customer, coupon, order_id).await
        {
            tracing::warn!(%coupon, error = %e, "failed to hand back coupon redemption");
        }

        let stuck = self
            .inventory
            .release_all_retrying(&taken.reservations, RELEASE_ROUNDS)
            .await;
        if !stuck.is_empty() {
            metrics::counter!("stock_release_failures_total").increment(stuck.len() as u64);
            tracing::error!(?stuck, "reserved stock could not be released");
        }
    }

    async fn announce(&self, order: &Order, store: StoreId, now: DateTime<Utc>) {
        let (Some(order_id), Some(customer), Some(number)) =
            (order.id(), order.customer(), order.order_number())
        else {
            return;
        };

        self.broadcaster.publish(
            Topic::Customer(customer),
            StatusEvent::status(order_id, number.as_str(), OrderStatus::Pending, now),
        );

        if let Some(merchant) = self.stores.merchant(store).await {
            send_best_effort(
                self.notifier.as_ref(),
                Notification {
                    recipient: merchant,
                    title: "New order".to_string(),
                    body: format!("Order {number} is waiting for payment ({})", order.total()),
                },
            )
            .await;
        }
    }
}
