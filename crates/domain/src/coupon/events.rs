//! Coupon domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, StoreId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::value_objects::Money;

use super::DiscountRule;

/// Events that can occur on a coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CouponEvent {
    /// Coupon was created.
    Issued(CouponIssuedData),

    /// A customer took one unit of the usage limit.
    Claimed { customer: UserId, at: DateTime<Utc> },

    /// A customer's redemption was consumed by an order.
    Redeemed {
        customer: UserId,
        order: AggregateId,
        at: DateTime<Utc>,
    },

    /// A redemption was handed back after its order failed to commit.
    RedemptionReverted { customer: UserId, order: AggregateId },

    /// Coupon was switched off.
    Deactivated,
}

impl DomainEvent for CouponEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CouponEvent::Issued(_) => "CouponIssued",
            CouponEvent::Claimed { .. } => "CouponClaimed",
            CouponEvent::Redeemed { .. } => "CouponRedeemed",
            CouponEvent::RedemptionReverted { .. } => "CouponRedemptionReverted",
            CouponEvent::Deactivated => "CouponDeactivated",
        }
    }
}

/// Data for the Issued event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponIssuedData {
    pub coupon_id: AggregateId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub discount: DiscountRule,
    pub min_order_amount: Money,
    pub applicable_stores: Vec<StoreId>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub usage_limit: u32,
}
