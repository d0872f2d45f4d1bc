//! Fulfillment error types.

use common::{AggregateId, UserId};
use document_store::DocumentStoreError;
use domain::{
    CartError, CouponError, CouponRejection, DomainError, InventoryError, OrderError,
};
use thiserror::Error;

/// Errors that can occur during fulfillment workflows.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Checkout was attempted on a cart with no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The cart changed or was checked out concurrently.
    #[error("Cart was modified during checkout")]
    CartChanged,

    /// The customer has no saved address with this id.
    #[error("Address {address} not found for customer {customer}")]
    AddressNotFound {
        customer: UserId,
        address: AggregateId,
    },

    /// Coordinates outside the valid latitude/longitude range.
    #[error("Invalid coordinates: ({lat}, {lng})")]
    InvalidCoordinates { lat: f64, lng: f64 },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

/// Caller-facing classification of a [`FulfillmentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    InsufficientStock,
    StoreMismatch,
    OrderNotAvailable,
    CouponInvalid(CouponRejection),
    AlreadyRedeemed,
    Unauthorized,
    InvalidInput,
    /// The storage collaborator failed or stayed contended.
    Storage,
}

impl FulfillmentError {
    /// Maps the error onto the kinds surfaced to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillmentError::EmptyCart | FulfillmentError::InvalidCoordinates { .. } => {
                ErrorKind::InvalidInput
            }
            FulfillmentError::CartChanged => ErrorKind::InvalidTransition,
            FulfillmentError::AddressNotFound { .. } => ErrorKind::NotFound,
            FulfillmentError::Domain(e) => domain_kind(e),
        }
    }

    /// Returns true only for storage failures, which callers can't fix.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::StoreMismatch => "store_mismatch",
            ErrorKind::OrderNotAvailable => "order_not_available",
            ErrorKind::CouponInvalid(_) => "coupon_invalid",
            ErrorKind::AlreadyRedeemed => "already_redeemed",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Storage => "storage",
        }
    }
}

fn domain_kind(error: &DomainError) -> ErrorKind {
    match error {
        DomainError::NotFound { .. } => ErrorKind::NotFound,
        DomainError::Store(DocumentStoreError::NotFound { .. }) => ErrorKind::NotFound,
        DomainError::Store(_)
        | DomainError::Serialization(_)
        | DomainError::ContentionExhausted { .. } => ErrorKind::Storage,
        DomainError::Inventory(e) => inventory_kind(e),
        DomainError::Cart(CartError::StoreMismatch { .. }) => ErrorKind::StoreMismatch,
        DomainError::Cart(CartError::InvalidQuantity { .. }) => ErrorKind::InvalidInput,
        DomainError::Cart(CartError::ItemNotFound { .. }) => ErrorKind::NotFound,
        DomainError::Cart(CartError::Stock(e)) => inventory_kind(e),
        DomainError::Coupon(e) => match e {
            CouponError::NotFound { .. } => ErrorKind::NotFound,
            CouponError::Rejected(rejection) => ErrorKind::CouponInvalid(*rejection),
            CouponError::AlreadyRedeemed
            | CouponError::NoRedemptionAvailable
            | CouponError::AlreadyAppliedToOrder { .. } => ErrorKind::AlreadyRedeemed,
            CouponError::DuplicateCode { .. }
            | CouponError::InvalidDefinition { .. }
            | CouponError::AlreadyIssued => ErrorKind::InvalidInput,
        },
        DomainError::Order(e) => match e {
            OrderError::NotAvailable => ErrorKind::OrderNotAvailable,
            OrderError::Unauthorized { .. } => ErrorKind::Unauthorized,
            OrderError::NoItems => ErrorKind::InvalidInput,
            OrderError::AlreadyPlaced
            | OrderError::InvalidTransition { .. }
            | OrderError::InvalidPaymentTransition { .. }
            | OrderError::NotExpired => ErrorKind::InvalidTransition,
        },
    }
}

fn inventory_kind(error: &InventoryError) -> ErrorKind {
    match error {
        InventoryError::InsufficientStock { .. } | InventoryError::Unavailable { .. } => {
            ErrorKind::InsufficientStock
        }
        InventoryError::InvalidQuantity { .. }
        | InventoryError::InvalidPrice { .. }
        | InventoryError::AlreadyListed => ErrorKind::InvalidInput,
    }
}

#[cfg(test)]
mod tests {
    use domain::{ActorRole, OrderStatus};

    use super::*;

    #[test]
    fn test_claim_loss_maps_to_order_not_available() {
        let err = FulfillmentError::from(DomainError::from(OrderError::NotAvailable));
        assert_eq!(err.kind(), ErrorKind::OrderNotAvailable);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_coupon_rejections_stay_distinguishable() {
        let expired = FulfillmentError::from(DomainError::from(CouponError::Rejected(
            CouponRejection::Expired,
        )));
        let exhausted = FulfillmentError::from(DomainError::from(CouponError::Rejected(
            CouponRejection::Exhausted,
        )));
        assert_eq!(expired.kind(), ErrorKind::CouponInvalid(CouponRejection::Expired));
        assert_eq!(
            exhausted.kind(),
            ErrorKind::CouponInvalid(CouponRejection::Exhausted)
        );
    }

    #[test]
    fn test_stock_errors_through_the_cart() {
        let product = AggregateId::new();
        let err = FulfillmentError::from(DomainError::from(CartError::Stock(
            InventoryError::InsufficientStock {
                product,
                requested: 3,
                available: 1,
            },
        )));
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }

    #[test]
    fn test_only_storage_is_fatal() {
        let contention = FulfillmentError::from(DomainError::ContentionExhausted {
            collection: "orders",
            id: AggregateId::new(),
            attempts: 32,
        });
        assert!(contention.is_fatal());

        let transition = FulfillmentError::from(DomainError::from(OrderError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        }));
        assert!(!transition.is_fatal());

        let unauthorized = FulfillmentError::from(DomainError::from(OrderError::Unauthorized {
            actor: ActorRole::Agent,
        }));
        assert_eq!(unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(unauthorized.reason(), "unauthorized");
    }
}
