//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Human-readable, globally unique order number, e.g. `ORD-20261019-4F2A9C1B`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generates a fresh order number for the given day.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        Self(format!("ORD-{}-{suffix}", now.format("%Y%m%d")))
    }

    /// Returns the document id the order is stored under.
    pub fn order_id(&self) -> AggregateId {
        AggregateId::derived("order", &self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Snapshot of the delivery address chosen at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub recipient: String,
    pub phone: String,
    pub street: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let number = OrderNumber::generate(now);

        assert!(number.as_str().starts_with("ORD-20261019-"));
        assert_eq!(number.as_str().len(), "ORD-20261019-".len() + 8);
        assert_ne!(number, OrderNumber::generate(now));
    }

    #[test]
    fn test_order_id_is_derived_from_number() {
        let number = OrderNumber::from("ORD-20261019-4F2A9C1B".to_string());
        assert_eq!(number.order_id(), number.clone().order_id());
        assert_ne!(
            number.order_id(),
            OrderNumber::from("ORD-20261019-4F2A9C1C".to_string()).order_id()
        );
    }
}
