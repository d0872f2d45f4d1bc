//! Cart aggregate implementation.

use common::{AggregateId, StoreId, UserId};
use document_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::inventory::{InventoryError, Product};
use crate::value_objects::{LineItem, Money};

use super::{CartError, CartEvent};

/// Cart aggregate root.
///
/// The document id is the owning customer's id. Invariants: every line
/// belongs to `store`; an empty cart has no store; `total` is the sum of the
/// line totals and is recomputed after every change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    id: Option<AggregateId>,

    #[serde(skip)]
    version: Version,

    customer: Option<UserId>,
    store: Option<StoreId>,
    items: Vec<LineItem>,
    total: Money,
}

impl Aggregate for Cart {
    type Event = CartEvent;
    type Error = CartError;

    fn collection() -> &'static str {
        "carts"
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
            CartEvent::Opened { cart_id, customer } => {
                self.id = Some(cart_id);
                self.customer = Some(customer);
            }
            CartEvent::LineAdded { store, line } => {
                self.store = Some(store);
                self.items.push(line);
            }
            CartEvent::LineUpdated { line } => {
                if let Some(existing) = self.items.iter_mut().find(|l| l.product == line.product) {
                    *existing = line;
                }
            }
            CartEvent::LineRemoved { product } => {
                self.items.retain(|l| l.product != product);
            }
        }

        self.total = self.items.iter().map(|l| l.total).sum();
        if self.items.is_empty() {
            self.store = None;
        }
    }
}

// Query methods
impl Cart {
    /// An unsaved, empty cart for a customer.
    pub fn empty(customer: UserId) -> Self {
        Self {
            customer: Some(customer),
            ..Self::default()
        }
    }

    pub fn customer(&self) -> Option<UserId> {
        self.customer
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn line(&self, product: AggregateId) -> Option<&LineItem> {
        self.items.iter().find(|l| l.product == product)
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// Command methods (return events)
impl Cart {
    /// Adds `quantity` of a product, merging into an existing line.
    ///
    /// The line is repriced at the product's current price.
    pub fn add_item(
        &self,
        customer: UserId,
        product: &Product,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity: 0 });
        }
        let product_id = product.key();
        let Some(product_store) = product.store() else {
            return Err(CartError::Stock(InventoryError::Unavailable {
                product: product_id,
            }));
        };

        if let Some(cart_store) = self.store
            && !self.items.is_empty()
            && cart_store != product_store
        {
            return Err(CartError::StoreMismatch {
                cart_store,
                product_store,
            });
        }

        let mut events = Vec::with_capacity(2);
        if self.id.is_none() {
            events.push(CartEvent::Opened {
                cart_id: AggregateId::from(customer),
                customer,
            });
        }

        let merged = self
            .line(product_id)
            .map_or(0, |l| l.quantity)
            .checked_add(quantity)
            .ok_or(CartError::InvalidQuantity {
                quantity: i64::from(quantity),
            })?;
        product.ensure_can_supply(merged)?;

        let line = product.line_item(merged);
        if self.line(product_id).is_some() {
            events.push(CartEvent::LineUpdated { line });
        } else {
            events.push(CartEvent::LineAdded {
                store: product_store,
                line,
            });
        }

        Ok(events)
    }

    /// Sets the quantity of an existing line, keeping its price snapshot.
    pub fn update_item(
        &self,
        product: &Product,
        quantity: u32,
    ) -> Result<Vec<CartEvent>, CartError> {
        let product_id = product.key();
        let Some(line) = self.line(product_id) else {
            return Err(CartError::ItemNotFound {
                product: product_id,
            });
        };
        if quantity == 0 {
            return self.remove_item(product_id);
        }
        if quantity == line.quantity {
            return Ok(vec![]);
        }

        product.ensure_can_supply(quantity)?;
        Ok(vec![CartEvent::LineUpdated {
            line: line.with_quantity(quantity),
        }])
    }

    /// Removes a line. Removing an absent line changes nothing.
    pub fn remove_item(&self, product: AggregateId) -> Result<Vec<CartEvent>, CartError> {
        if self.line(product).is_none() {
            return Ok(vec![]);
        }
        Ok(vec![CartEvent::LineRemoved { product }])
    }
}
