//! Coupon Engine: discount codes, per-customer redemptions and usage limits.

mod aggregate;
mod events;
mod service;

pub use aggregate::{Coupon, DiscountRule, NewCoupon, Redemption};
pub use events::{CouponEvent, CouponIssuedData};
pub use service::{CouponEngine, CouponFilter, CouponQuote};

use common::AggregateId;
use thiserror::Error;

use crate::value_objects::Money;

/// Why a coupon can't be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon is not active")]
    Inactive,

    #[error("coupon is not valid yet")]
    NotYetValid,

    #[error("coupon has expired")]
    Expired,

    #[error("coupon usage limit reached")]
    Exhausted,

    #[error("order amount below the minimum of {minimum}")]
    MinimumNotMet { minimum: Money },

    #[error("coupon does not apply to this store")]
    StoreNotApplicable,
}

/// Errors that can occur during coupon operations.
#[derive(Debug, Error)]
pub enum CouponError {
    /// No coupon has this code.
    #[error("Coupon not found: {code}")]
    NotFound { code: String },

    /// The coupon exists but can't be used here.
    #[error("Coupon rejected: {0}")]
    Rejected(#[from] CouponRejection),

    /// The customer already holds or used a redemption of this coupon.
    #[error("Coupon already redeemed by this customer")]
    AlreadyRedeemed,

    /// The customer has no unused redemption to consume.
    #[error("No unused redemption available")]
    NoRedemptionAvailable,

    /// The coupon was already applied to this order.
    #[error("Coupon already applied to order {order}")]
    AlreadyAppliedToOrder { order: AggregateId },

    /// Another coupon already uses this code.
    #[error("Coupon code already exists: {code}")]
    DuplicateCode { code: String },

    /// The coupon definition is inconsistent.
    #[error("Invalid coupon definition: {reason}")]
    InvalidDefinition { reason: &'static str },

    /// The coupon document was already initialized.
    #[error("Coupon already issued")]
    AlreadyIssued,
}

/// Normalizes a coupon code for storage and lookup.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
