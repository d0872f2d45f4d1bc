//! Address book and store directory collaborators.
//!
//! Both are owned by other parts of the system; the core only reads them.

use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, StoreId, UserId};
use dashmap::DashMap;
use domain::{DeliveryAddress, GeoPoint};

/// A customer's saved, coordinate-bearing address.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub id: AggregateId,
    pub recipient: String,
    pub phone: String,
    pub street: String,
    pub detail: Option<String>,
    pub location: GeoPoint,
}

impl Address {
    /// Snapshot stored on the order at checkout.
    pub fn to_delivery_address(&self) -> DeliveryAddress {
        DeliveryAddress {
            recipient: self.recipient.clone(),
            phone: self.phone.clone(),
            street: self.street.clone(),
            detail: self.detail.clone(),
            location: Some(self.location),
        }
    }
}

/// Read access to customers' saved addresses.
#[async_trait]
pub trait AddressBook: Send + Sync {
    /// Returns the customer's address with this id, if any.
    async fn address(&self, customer: UserId, address: AggregateId) -> Option<Address>;
}

/// Read access to store profiles.
#[async_trait]
pub trait StoreDirectory: Send + Sync {
    /// Returns where orders of this store are picked up.
    async fn location(&self, store: StoreId) -> Option<GeoPoint>;

    /// Returns the merchant account that runs this store.
    async fn merchant(&self, store: StoreId) -> Option<UserId>;
}

/// In-memory address book for tests and single-process deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAddressBook {
    addresses: Arc<DashMap<(UserId, AggregateId), Address>>,
}

impl InMemoryAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves an address for the customer, replacing one with the same id.
    pub fn save(&self, customer: UserId, address: Address) {
        self.addresses.insert((customer, address.id), address);
    }

    /// Removes a saved address. Returns whether it existed.
    pub fn remove(&self, customer: UserId, address: AggregateId) -> bool {
        self.addresses.remove(&(customer, address)).is_some()
    }
}

#[async_trait]
impl AddressBook for InMemoryAddressBook {
    async fn address(&self, customer: UserId, address: AggregateId) -> Option<Address> {
        self.addresses
            .get(&(customer, address))
            .map(|entry| entry.value().clone())
    }
}

#[derive(Debug, Clone, Copy)]
struct StoreProfile {
    location: Option<GeoPoint>,
    merchant: Option<UserId>,
}

/// In-memory store directory for tests and single-process deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStoreDirectory {
    stores: Arc<DashMap<StoreId, StoreProfile>>,
}

impl InMemoryStoreDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or updates a store.
    pub fn register(&self, store: StoreId, location: Option<GeoPoint>, merchant: Option<UserId>) {
        self.stores
            .insert(store, StoreProfile { location, merchant });
    }
}

#[async_trait]
impl StoreDirectory for InMemoryStoreDirectory {
    async fn location(&self, store: StoreId) -> Option<GeoPoint> {
        self.stores.get(&store).and_then(|p| p.location)
    }

    async fn merchant(&self, store: StoreId) -> Option<UserId> {
        self.stores.get(&store).and_then(|p| p.merchant)
    }
}
