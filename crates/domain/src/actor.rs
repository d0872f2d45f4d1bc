//! Who is performing an operation.

use common::{StoreId, UserId};
use serde::{Deserialize, Serialize};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actor {
    /// A customer acting on their own carts and orders.
    Customer(UserId),

    /// A merchant acting for one store.
    Merchant { user: UserId, store: StoreId },

    /// A delivery agent.
    Agent(UserId),

    /// The core itself (sweeper, payment callback, operators).
    System,
}

impl Actor {
    /// Returns the role of the actor.
    pub fn role(&self) -> ActorRole {
        match self {
            Actor::Customer(_) => ActorRole::Customer,
            Actor::Merchant { .. } => ActorRole::Merchant,
            Actor::Agent(_) => ActorRole::Agent,
            Actor::System => ActorRole::System,
        }
    }

    /// Returns the user behind the actor, if any.
    pub fn user(&self) -> Option<UserId> {
        match self {
            Actor::Customer(user) | Actor::Agent(user) | Actor::Merchant { user, .. } => {
                Some(*user)
            }
            Actor::System => None,
        }
    }
}

/// Role of an actor, as recorded on documents and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Customer,
    Merchant,
    Agent,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Customer => "customer",
            ActorRole::Merchant => "merchant",
            ActorRole::Agent => "agent",
            ActorRole::System => "system",
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
