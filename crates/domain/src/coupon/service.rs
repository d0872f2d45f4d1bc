//! Coupon Engine service.

use chrono::{DateTime, Utc};
use common::{AggregateId, StoreId, UserId};
use document_store::{DocumentQuery, DocumentStore, DocumentStoreError};

use crate::aggregate::Aggregate;
use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::value_objects::Money;

use super::{Coupon, CouponError, NewCoupon, normalize_code};

/// Which of a customer's coupons to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CouponFilter {
    /// Claimed, unused and still within the validity window.
    #[default]
    Available,
    /// Already consumed by an order.
    Used,
    /// Every coupon the customer has claimed.
    All,
}

/// Result of a successful coupon validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponQuote {
    pub coupon: AggregateId,
    pub code: String,
    pub discount: Money,
}

/// Service for issuing, validating and consuming coupons.
#[derive(Clone)]
pub struct CouponEngine<S: DocumentStore> {
    handler: CommandHandler<S, Coupon>,
}

impl<S: DocumentStore> CouponEngine<S> {
    /// Creates a new coupon engine with the given document store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Overrides how many conflicting writes a command tolerates.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.handler = self.handler.with_max_attempts(max_attempts);
        self
    }

    /// Returns the document id a coupon code is stored under.
    pub fn coupon_id(code: &str) -> AggregateId {
        AggregateId::derived("coupon", &normalize_code(code))
    }

    /// Issues a new coupon. Codes are unique after normalization.
    #[tracing::instrument(skip(self, input), fields(code = %input.code))]
    pub async fn issue(&self, input: NewCoupon) -> Result<Coupon, DomainError> {
        let code = normalize_code(&input.code);
        let id = Self::coupon_id(&code);

        match self
            .handler
            .create(id, move |coupon| coupon.issue(id, input))
            .await
        {
            Ok(result) => Ok(result.aggregate),
            Err(DomainError::Store(DocumentStoreError::AlreadyExists { .. })) => {
                Err(CouponError::DuplicateCode { code }.into())
            }
            Err(e) => Err(e),
        }
    }

    /// Returns a coupon by id, if it exists.
    pub async fn get(&self, id: AggregateId) -> Result<Option<Coupon>, DomainError> {
        self.handler.load(id).await
    }

    /// Returns a coupon by code, if it exists.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DomainError> {
        self.handler.load(Self::coupon_id(code)).await
    }

    /// Lists coupons the customer could claim or use right now.
    ///
    /// Returns active, time-valid coupons the customer has not used yet that
    /// still have headroom (or that the customer already holds), filtered by
    /// store and minimum amount when those are given.
    pub async fn list_available(
        &self,
        customer: UserId,
        store: Option<StoreId>,
        amount: Option<Money>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Coupon>, DomainError> {
        let coupons = self
            .handler
            .find(DocumentQuery::collection(Coupon::collection()).field_eq("active", true))
            .await?;

        Ok(coupons
            .into_iter()
            .filter(|c| c.check_window(now).is_ok())
            .filter(|c| c.redemption(customer).is_none_or(|r| !r.is_used()))
            .filter(|c| c.has_headroom() || c.holds_unused(customer))
            .filter(|c| match amount {
                Some(amount) => c.check_order(amount, store).is_ok(),
                None => c.check_order(c.min_order_amount(), store).is_ok(),
            })
            .collect())
    }

    /// Validates a code against an order amount and store.
    ///
    /// When `customer` is given, a coupon they already used is reported as
    /// `AlreadyRedeemed`, and an unused claim counts as headroom.
    #[tracing::instrument(skip(self))]
    pub async fn validate(
        &self,
        code: &str,
        amount: Money,
        store: StoreId,
        customer: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<CouponQuote, DomainError> {
        let coupon = self.coupon_by_code(code).await?;

        if let Some(customer) = customer
            && coupon.redemption(customer).is_some_and(|r| r.is_used())
        {
            return Err(CouponError::AlreadyRedeemed.into());
        }

        let discount = coupon
            .evaluate(customer, amount, Some(store), now)
            .map_err(CouponError::from)?;

        Ok(CouponQuote {
            coupon: Self::coupon_id(code),
            code: coupon.code().to_string(),
            discount,
        })
    }

    /// Claims one unit of a coupon for the customer.
    ///
    /// Headroom check, redemption creation and counter increment happen in
    /// one conditional write, so concurrent claimants for the last unit can't
    /// both win.
    #[tracing::instrument(skip(self))]
    pub async fn claim(
        &self,
        customer: UserId,
        coupon: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Coupon, DomainError> {
        let result = self
            .handler
            .execute(coupon, |c| c.claim(customer, now))
            .await;

        let outcome = match &result {
            Ok(_) => "claimed",
            Err(DomainError::Coupon(CouponError::Rejected(_))) => "rejected",
            Err(DomainError::Coupon(CouponError::AlreadyRedeemed)) => "duplicate",
            Err(_) => "error",
        };
        metrics::counter!("coupon_claims_total", "outcome" => outcome).increment(1);

        Ok(result?.aggregate)
    }

    /// Marks the customer's unused redemption as used by `order`.
    #[tracing::instrument(skip(self))]
    pub async fn redeem(
        &self,
        customer: UserId,
        coupon: AggregateId,
        order: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Coupon, DomainError> {
        let result = self
            .handler
            .execute(coupon, |c| c.redeem(customer, order, now, false))
            .await?;
        Ok(result.aggregate)
    }

    /// Redeems a code at checkout, claiming it first if the customer hasn't.
    #[tracing::instrument(skip(self))]
    pub async fn redeem_code(
        &self,
        customer: UserId,
        code: &str,
        order: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Coupon, DomainError> {
        let id = Self::coupon_id(code);
        let result = self
            .handler
            .execute(id, |c| c.redeem(customer, order, now, true))
            .await
            .map_err(|e| match e {
                e if e.is_not_found_in(Coupon::collection()) => CouponError::NotFound {
                    code: normalize_code(code),
                }
                .into(),
                e => e,
            })?;
        Ok(result.aggregate)
    }

    /// Hands back a redemption consumed by an order that never committed.
    #[tracing::instrument(skip(self))]
    pub async fn unredeem(
        &self,
        customer: UserId,
        coupon: AggregateId,
        order: AggregateId,
    ) -> Result<Coupon, DomainError> {
        let result = self
            .handler
            .execute(coupon, |c| c.revert_redemption(customer, order))
            .await?;
        Ok(result.aggregate)
    }

    /// Lists the coupons a customer has claimed.
    pub async fn my_coupons(
        &self,
        customer: UserId,
        filter: CouponFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Coupon>, DomainError> {
        let coupons = self
            .handler
            .find(DocumentQuery::collection(Coupon::collection()))
            .await?;

        Ok(coupons
            .into_iter()
            .filter(|c| match (c.redemption(customer), filter) {
                (None, _) => false,
                (Some(_), CouponFilter::All) => true,
                (Some(r), CouponFilter::Used) => r.is_used(),
                (Some(r), CouponFilter::Available) => !r.is_used() && c.check_window(now).is_ok(),
            })
            .collect())
    }

    /// Switches a coupon off.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, coupon: AggregateId) -> Result<Coupon, DomainError> {
        let result = self.handler.execute(coupon, |c| c.deactivate()).await?;
        Ok(result.aggregate)
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Coupon, DomainError> {
        self.find_by_code(code)
            .await?
            .ok_or_else(|| {
                CouponError::NotFound {
                    code: normalize_code(code),
                }
                .into()
            })
    }
}
