//! Product aggregate implementation.

use common::{AggregateId, StoreId};
use document_store::Version;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::Aggregate;
use crate::value_objects::{LineItem, Money};

use super::{InventoryError, ProductEvent, ProductListedData};

/// Input for listing a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub store: StoreId,
    pub name: String,
    pub image: Option<String>,
    pub unit: String,
    pub price: Money,
    pub stock: u32,
}

/// Product aggregate root.
///
/// Invariant: `stock` never goes negative, and every change to it through
/// reserve/release is mirrored on `sold` in the same write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    id: Option<AggregateId>,

    #[serde(skip)]
    version: Version,

    store: Option<StoreId>,
    name: String,
    image: Option<String>,
    unit: String,
    price: Money,
    stock: u32,
    sold: u32,
    available: bool,
}

impl Aggregate for Product {
    type Event = ProductEvent;
    type Error = InventoryError;

    fn collection() -> &'static str {
        "products"
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
            ProductEvent::Listed(data) => {
                self.id = Some(data.product_id);
                self.store = Some(data.store);
                self.name = data.name;
                self.image = data.image;
                self.unit = data.unit;
                self.price = data.price;
                self.stock = data.stock;
                self.sold = 0;
                self.available = true;
            }
            ProductEvent::StockReserved { quantity } => {
                self.stock -= quantity;
                self.sold += quantity;
            }
            ProductEvent::StockReleased { quantity } => {
                self.stock = self.stock.saturating_add(quantity);
                self.sold = self.sold.saturating_sub(quantity);
            }
            ProductEvent::Restocked { quantity } => {
                self.stock = self.stock.saturating_add(quantity);
            }
            ProductEvent::PriceChanged { price } => {
                self.price = price;
            }
            ProductEvent::AvailabilityChanged { available } => {
                self.available = available;
            }
        }
    }
}

// Query methods
impl Product {
    /// Returns the product id, or the nil id for an unlisted product.
    pub fn key(&self) -> AggregateId {
        self.id.unwrap_or_else(|| AggregateId::from_uuid(Uuid::nil()))
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn sold(&self) -> u32 {
        self.sold
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Builds a line item priced at the current unit price.
    pub fn line_item(&self, quantity: u32) -> LineItem {
        LineItem::new(
            self.key(),
            self.name.clone(),
            self.image.clone(),
            self.unit.clone(),
            self.price,
            quantity,
        )
    }

    /// Checks that `quantity` could be reserved right now.
    pub fn ensure_can_supply(&self, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity { quantity });
        }
        let product = self.key();
        if self.id.is_none() || !self.available {
            return Err(InventoryError::Unavailable { product });
        }
        if self.stock < quantity {
            return Err(InventoryError::InsufficientStock {
                product,
                requested: quantity,
                available: self.stock,
            });
        }
        Ok(())
    }
}

// Command methods (return events)
impl Product {
    /// Lists a new product.
    pub fn list(
        &self,
        id: AggregateId,
        input: NewProduct,
    ) -> Result<Vec<ProductEvent>, InventoryError> {
        if self.id.is_some() {
            return Err(InventoryError::AlreadyListed);
        }
        if input.price.is_negative() {
            return Err(InventoryError::InvalidPrice {
                price: input.price.cents(),
            });
        }

        Ok(vec![ProductEvent::Listed(ProductListedData {
            product_id: id,
            store: input.store,
            name: input.name,
            image: input.image,
            unit: input.unit,
            price: input.price,
            stock: input.stock,
        })])
    }

    /// Moves `quantity` units from stock to sold.
    pub fn reserve(&self, quantity: u32) -> Result<Vec<ProductEvent>, InventoryError> {
        self.ensure_can_supply(quantity)?;
        Ok(vec![ProductEvent::StockReserved { quantity }])
    }

    /// Returns `quantity` units from sold to stock.
    ///
    /// Accepted even while the product is unavailable: returned goods go
    /// back on the shelf regardless of whether it is being sold.
    pub fn release(&self, quantity: u32) -> Result<Vec<ProductEvent>, InventoryError> {
        if quantity == 0 || self.stock.checked_add(quantity).is_none() {
            return Err(InventoryError::InvalidQuantity { quantity });
        }
        Ok(vec![ProductEvent::StockReleased { quantity }])
    }

    /// Adds fresh stock.
    pub fn restock(&self, quantity: u32) -> Result<Vec<ProductEvent>, InventoryError> {
        if quantity == 0 || self.stock.checked_add(quantity).is_none() {
            return Err(InventoryError::InvalidQuantity { quantity });
        }
        Ok(vec![ProductEvent::Restocked { quantity }])
    }

    /// Changes the unit price.
    pub fn change_price(&self, price: Money) -> Result<Vec<ProductEvent>, InventoryError> {
        if price.is_negative() {
            return Err(InventoryError::InvalidPrice {
                price: price.cents(),
            });
        }
        if price == self.price {
            return Ok(vec![]);
        }
        Ok(vec![ProductEvent::PriceChanged { price }])
    }

    /// Takes the product off sale or puts it back.
    pub fn set_available(&self, available: bool) -> Result<Vec<ProductEvent>, InventoryError> {
        if available == self.available {
            return Ok(vec![]);
        }
        Ok(vec![ProductEvent::AvailabilityChanged { available }])
    }
}
