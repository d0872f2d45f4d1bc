//! Coupon aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, StoreId, UserId};
use document_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::value_objects::Money;

use super::{CouponError, CouponEvent, CouponIssuedData, CouponRejection, normalize_code};

/// How a coupon computes its discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountRule {
    /// `percent`% of the order amount, optionally capped.
    Percentage {
        percent: u32,
        max_discount: Option<Money>,
    },

    /// A fixed amount off.
    Fixed { amount: Money },
}

impl Default for DiscountRule {
    fn default() -> Self {
        DiscountRule::Fixed {
            amount: Money::zero(),
        }
    }
}

impl DiscountRule {
    /// Computes the discount for an order amount.
    ///
    /// The result is never negative and never larger than `amount`.
    pub fn discount_for(&self, amount: Money) -> Money {
        let raw = match *self {
            DiscountRule::Percentage {
                percent,
                max_discount,
            } => {
                let discount = amount.percent(percent);
                match max_discount {
                    Some(cap) => discount.min(cap),
                    None => discount,
                }
            }
            DiscountRule::Fixed { amount: value } => value,
        };
        raw.max(Money::zero()).min(amount.max(Money::zero()))
    }
}

/// One customer's entitlement to use a coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    pub customer: UserId,
    pub claimed_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub order: Option<AggregateId>,
}

impl Redemption {
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }
}

/// Input for issuing a new coupon.
#[derive(Debug, Clone)]
pub struct NewCoupon {
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

/// Coupon aggregate root.
///
/// Redemptions live inside the coupon document so that claiming (create a
/// redemption and bump `usage_count`) is a single conditional write.
/// Invariants: at most one redemption per customer; `usage_count` never
/// exceeds `usage_limit`; an order consumes at most one redemption.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Coupon {
    id: Option<AggregateId>,

    #[serde(skip)]
    version: Version,

    code: String,
    name: String,
    description: Option<String>,
    discount: DiscountRule,
    min_order_amount: Money,
    applicable_stores: Vec<StoreId>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    usage_limit: u32,
    usage_count: u32,
    active: bool,
    redemptions: Vec<Redemption>,
}

impl Aggregate for Coupon {
    type Event = CouponEvent;
    type Error = CouponError;

    fn collection() -> &'static str {
        "coupons"
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
            CouponEvent::Issued(data) => {
                self.id = Some(data.coupon_id);
                self.code = data.code;
                self.name = data.name;
                self.description = data.description;
                self.discount = data.discount;
                self.min_order_amount = data.min_order_amount;
                self.applicable_stores = data.applicable_stores;
                self.starts_at = data.starts_at;
                self.ends_at = data.ends_at;
                self.usage_limit = data.usage_limit;
                self.usage_count = 0;
                self.active = true;
            }
            CouponEvent::Claimed { customer, at } => {
                self.usage_count += 1;
                self.redemptions.push(Redemption {
                    customer,
                    claimed_at: at,
                    used_at: None,
                    order: None,
                });
            }
            CouponEvent::Redeemed {
                customer,
                order,
                at,
            } => {
                if let Some(r) = self.redemptions.iter_mut().find(|r| r.customer == customer) {
                    r.used_at = Some(at);
                    r.order = Some(order);
                }
            }
            CouponEvent::RedemptionReverted { customer, .. } => {
                if let Some(r) = self.redemptions.iter_mut().find(|r| r.customer == customer) {
                    r.used_at = None;
                    r.order = None;
                }
            }
            CouponEvent::Deactivated => {
                self.active = false;
            }
        }
    }
}

// Query methods
impl Coupon {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn discount(&self) -> DiscountRule {
        self.discount
    }

    pub fn min_order_amount(&self) -> Money {
        self.min_order_amount
    }

    pub fn applicable_stores(&self) -> &[StoreId] {
        &self.applicable_stores
    }

    pub fn starts_at(&self) -> DateTime<Utc> {
        self.starts_at
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.ends_at
    }

    pub fn usage_limit(&self) -> u32 {
        self.usage_limit
    }

    pub fn usage_count(&self) -> u32 {
        self.usage_count
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn redemptions(&self) -> &[Redemption] {
        &self.redemptions
    }

    /// Returns the customer's redemption, if they claimed this coupon.
    pub fn redemption(&self, customer: UserId) -> Option<&Redemption> {
        self.redemptions.iter().find(|r| r.customer == customer)
    }

    /// Returns true if the customer claimed this coupon and hasn't used it.
    pub fn holds_unused(&self, customer: UserId) -> bool {
        self.redemption(customer).is_some_and(|r| !r.is_used())
    }

    /// Returns true if another customer can still claim this coupon.
    pub fn has_headroom(&self) -> bool {
        self.usage_count < self.usage_limit
    }

    /// Checks that the coupon is switched on and `now` is inside its window.
    pub fn check_window(&self, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !self.active {
            return Err(CouponRejection::Inactive);
        }
        if now < self.starts_at {
            return Err(CouponRejection::NotYetValid);
        }
        if now > self.ends_at {
            return Err(CouponRejection::Expired);
        }
        Ok(())
    }

    /// Checks the order-dependent conditions: minimum amount and store.
    pub fn check_order(&self, amount: Money, store: Option<StoreId>) -> Result<(), CouponRejection> {
        if amount < self.min_order_amount {
            return Err(CouponRejection::MinimumNotMet {
                minimum: self.min_order_amount,
            });
        }
        if let Some(store) = store
            && !self.applicable_stores.is_empty()
            && !self.applicable_stores.contains(&store)
        {
            return Err(CouponRejection::StoreNotApplicable);
        }
        Ok(())
    }

    /// Runs every check and returns the discount for `amount`.
    ///
    /// A coupon at its usage limit still applies for a customer who holds an
    /// unused redemption, since their claim is part of the count.
    pub fn evaluate(
        &self,
        customer: Option<UserId>,
        amount: Money,
        store: Option<StoreId>,
        now: DateTime<Utc>,
    ) -> Result<Money, CouponRejection> {
        self.check_window(now)?;
        let holds_claim = customer.is_some_and(|c| self.holds_unused(c));
        if !holds_claim && !self.has_headroom() {
            return Err(CouponRejection::Exhausted);
        }
        self.check_order(amount, store)?;
        Ok(self.discount.discount_for(amount))
    }
}

// Command methods (return events)
impl Coupon {
    /// Issues a new coupon.
    pub fn issue(&self, id: AggregateId, input: NewCoupon) -> Result<Vec<CouponEvent>, CouponError> {
        if self.id.is_some() {
            return Err(CouponError::AlreadyIssued);
        }

        let code = normalize_code(&input.code);
        if code.is_empty() {
            return Err(CouponError::InvalidDefinition {
                reason: "code must not be empty",
            });
        }
        if input.ends_at < input.starts_at {
            return Err(CouponError::InvalidDefinition {
                reason: "validity window ends before it starts",
            });
        }
        match input.discount {
            DiscountRule::Percentage { percent, .. } if percent == 0 || percent > 100 => {
                return Err(CouponError::InvalidDefinition {
                    reason: "percentage must be between 1 and 100",
                });
            }
            DiscountRule::Fixed { amount } if !amount.is_positive() => {
                return Err(CouponError::InvalidDefinition {
                    reason: "fixed discount must be positive",
                });
            }
            _ => {}
        }

        Ok(vec![CouponEvent::Issued(CouponIssuedData {
            coupon_id: id,
            code,
            name: input.name,
            description: input.description,
            discount: input.discount,
            min_order_amount: input.min_order_amount,
            applicable_stores: input.applicable_stores,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            usage_limit: input.usage_limit,
        })])
    }

    /// Creates the customer's redemption and takes one unit of the limit.
    pub fn claim(&self, customer: UserId, now: DateTime<Utc>) -> Result<Vec<CouponEvent>, CouponError> {
        self.check_window(now)?;
        if self.redemption(customer).is_some() {
            return Err(CouponError::AlreadyRedeemed);
        }
        if !self.has_headroom() {
            return Err(CouponRejection::Exhausted.into());
        }
        Ok(vec![CouponEvent::Claimed { customer, at: now }])
    }

    /// Consumes the customer's unused redemption for `order`.
    ///
    /// With `claim_if_missing`, a customer without a redemption claims one in
    /// the same write (subject to the usual claim checks).
    pub fn redeem(
        &self,
        customer: UserId,
        order: AggregateId,
        now: DateTime<Utc>,
        claim_if_missing: bool,
    ) -> Result<Vec<CouponEvent>, CouponError> {
        if self.redemptions.iter().any(|r| r.order == Some(order)) {
            return Err(CouponError::AlreadyAppliedToOrder { order });
        }

        let mut events = Vec::with_capacity(2);
        match self.redemption(customer) {
            Some(r) if !r.is_used() => {}
            Some(_) => return Err(CouponError::NoRedemptionAvailable),
            None if claim_if_missing => events.extend(self.claim(customer, now)?),
            None => return Err(CouponError::NoRedemptionAvailable),
        }

        events.push(CouponEvent::Redeemed {
            customer,
            order,
            at: now,
        });
        Ok(events)
    }

    /// Hands back a redemption consumed by `order`. No-op if it wasn't.
    pub fn revert_redemption(
        &self,
        customer: UserId,
        order: AggregateId,
    ) -> Result<Vec<CouponEvent>, CouponError> {
        match self.redemption(customer) {
            Some(r) if r.order == Some(order) => {
                Ok(vec![CouponEvent::RedemptionReverted { customer, order }])
            }
            _ => Ok(vec![]),
        }
    }

    /// Switches the coupon off.
    pub fn deactivate(&self) -> Result<Vec<CouponEvent>, CouponError> {
        if !self.active {
            return Ok(vec![]);
        }
        Ok(vec![CouponEvent::Deactivated])
    }
}
