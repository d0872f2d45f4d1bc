//! Fulfillment configuration.

use std::time::Duration;

use domain::Money;

/// How the delivery fee of an order is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    /// Flat fee charged per order.
    pub delivery_fee: Money,
    /// Subtotal at or above which delivery is free.
    pub free_delivery_threshold: Option<Money>,
}

impl FeePolicy {
    /// A flat fee with no free-delivery threshold.
    pub fn flat(delivery_fee: Money) -> Self {
        Self {
            delivery_fee,
            free_delivery_threshold: None,
        }
    }

    /// Returns the delivery fee for an order with this subtotal.
    pub fn fee_for(&self, subtotal: Money) -> Money {
        match self.free_delivery_threshold {
            Some(threshold) if subtotal >= threshold => Money::zero(),
            _ => self.delivery_fee,
        }
    }
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self::flat(Money::from_cents(250))
    }
}

/// Tunables of the fulfillment core.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    /// How often the sweeper looks for unpaid orders.
    pub sweep_interval: Duration,
    /// How long an order may wait for payment.
    pub payment_timeout: chrono::Duration,
    /// How often cancelled orders are purged.
    pub purge_interval: Duration,
    /// How long cancelled orders are kept.
    pub cancelled_retention: chrono::Duration,
    /// How long an agent location stays fresh.
    pub location_ttl: chrono::Duration,
    /// Delivery estimate stamped on an order when it is claimed.
    pub estimated_delivery: chrono::Duration,
    /// Buffered events per broadcast topic.
    pub broadcast_capacity: usize,
    /// Conflicting writes tolerated per command.
    pub max_write_attempts: u32,
    pub fees: FeePolicy,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(5 * 60),
            payment_timeout: chrono::Duration::minutes(30),
            purge_interval: Duration::from_secs(24 * 60 * 60),
            cancelled_retention: chrono::Duration::days(30),
            location_ttl: chrono::Duration::minutes(10),
            estimated_delivery: chrono::Duration::minutes(45),
            broadcast_capacity: 64,
            max_write_attempts: domain::DEFAULT_MAX_ATTEMPTS,
            fees: FeePolicy::default(),
        }
    }
}
