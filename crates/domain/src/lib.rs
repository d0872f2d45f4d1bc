//! Domain layer of the order fulfillment core.
//!
//! This crate provides:
//! - The `Aggregate` trait for document-backed entities and the generic
//!   `CommandHandler` that runs every guarded mutation as a compare-and-swap
//! - Inventory (`Product`, `InventoryLedger`)
//! - Carts (`Cart`, `CartService`)
//! - Coupons with embedded redemptions (`Coupon`, `CouponEngine`)
//! - Orders and their state machine (`Order`, `OrderService`)

pub mod actor;
pub mod aggregate;
pub mod cart;
pub mod command;
pub mod coupon;
pub mod error;
pub mod geo;
pub mod inventory;
pub mod order;
pub mod value_objects;

pub use actor::{Actor, ActorRole};
pub use aggregate::{Aggregate, DomainEvent};
pub use cart::{Cart, CartError, CartEvent, CartService};
pub use command::{CommandHandler, CommandResult, DEFAULT_MAX_ATTEMPTS};
pub use coupon::{
    Coupon, CouponEngine, CouponError, CouponEvent, CouponFilter, CouponRejection, DiscountRule,
    NewCoupon, Redemption,
};
pub use error::DomainError;
pub use geo::GeoPoint;
pub use inventory::{InventoryError, InventoryLedger, NewProduct, Product, ProductEvent};
pub use order::{
    DeliveryAddress, Order, OrderError, OrderEvent, OrderNumber, OrderService, OrderStatus,
    PaymentStatus, PlaceOrder,
};
pub use value_objects::{LineItem, Money};
