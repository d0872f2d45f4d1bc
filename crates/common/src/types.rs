use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for ids derived from natural keys (coupon codes, order numbers).
const DERIVED_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2d8e_5b3a_4c7f_9e10_4a2b_8d6c_3e51);

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an id from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identifier of a stored document (product, cart, coupon, order).
    ///
    /// Wraps a UUID so document ids cannot be mixed up with user or store ids.
    AggregateId
);

uuid_id!(
    /// Stable identity of a caller: customer, merchant or delivery agent.
    UserId
);

uuid_id!(
    /// Identity of a store that owns products and receives orders.
    StoreId
);

impl AggregateId {
    /// Derives a stable id from a natural key.
    ///
    /// The same `kind`/`key` pair always yields the same id, which lets the
    /// storage layer's primary key enforce uniqueness of the natural key.
    pub fn derived(kind: &str, key: &str) -> Self {
        let name = format!("{kind}:{key}");
        Self(Uuid::new_v5(&DERIVED_ID_NAMESPACE, name.as_bytes()))
    }
}

impl From<UserId> for AggregateId {
    fn from(user: UserId) -> Self {
        Self(user.0)
    }
}
