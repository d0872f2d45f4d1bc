//! Cross-aggregate workflows of the order fulfillment core.
//!
//! The domain crate guards single documents; this crate strings those
//! guarded writes together:
//! 1. Checkout turns a cart into a pending order, reserving stock and
//!    redeeming a coupon, and compensates in reverse order on failure
//! 2. The lifecycle drives cancellation, payment and status changes and
//!    returns stock exactly once
//! 3. The dispatcher lets agents race for ready orders and relays their
//!    live location
//! 4. The sweeper expires unpaid orders and purges old cancelled ones
//!
//! Status changes fan out through the [`StatusBroadcaster`] and the
//! [`Notifier`].

pub mod broadcast;
pub mod checkout;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod facade;
pub mod lifecycle;
pub mod location;
pub mod notify;
pub mod sweeper;

pub use broadcast::{EventPayload, StatusBroadcaster, StatusEvent, Subscription, Topic};
pub use checkout::{CheckoutCoordinator, CheckoutRequest};
pub use config::{FeePolicy, FulfillmentConfig};
pub use directory::{
    Address, AddressBook, InMemoryAddressBook, InMemoryStoreDirectory, StoreDirectory,
};
pub use dispatcher::{ClaimableOrder, Dispatcher, Earnings};
pub use error::{ErrorKind, FulfillmentError, Result};
pub use facade::FulfillmentCore;
pub use lifecycle::{OrderLifecycle, OrderPage};
pub use location::{AgentLocation, LocationStore};
pub use notify::{Notification, Notifier, NotifyError, RecordingNotifier, TracingNotifier};
pub use sweeper::{ExpirySweeper, PurgeReport, SweepReport};
