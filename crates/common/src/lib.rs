//! Identity types shared by every layer of the fulfillment core.

mod types;

pub use types::{AggregateId, StoreId, UserId};
