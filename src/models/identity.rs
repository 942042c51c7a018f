//! Identity and capability types consumed from the platform's auth layer.
//!
//! Role checks live in one place: every permission decision in the engine
//! consumes `Capability` instead of re-deriving roles per call site.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What a user is allowed to act as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Requests consultations and joins their own sessions
    Farmer,
    /// Claims pending requests and runs sessions
    Consultant,
    /// Oversees and may cancel on either party's behalf
    Admin,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Farmer => write!(f, "farmer"),
            Self::Consultant => write!(f, "consultant"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "farmer" => Ok(Self::Farmer),
            "consultant" => Ok(Self::Consultant),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("Invalid capability: {s}")),
        }
    }
}

/// The authenticated user an operation runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub capability: Capability,
}

impl CurrentUser {
    pub fn farmer(id: Uuid) -> Self {
        Self {
            id,
            capability: Capability::Farmer,
        }
    }

    pub fn consultant(id: Uuid) -> Self {
        Self {
            id,
            capability: Capability::Consultant,
        }
    }

    pub fn admin(id: Uuid) -> Self {
        Self {
            id,
            capability: Capability::Admin,
        }
    }

    /// The internal actor for compensating transitions (disconnect timeouts,
    /// media rollback). Carries admin capability and the nil id so actor
    /// suppression never matches a real observer.
    pub fn system() -> Self {
        Self {
            id: Uuid::nil(),
            capability: Capability::Admin,
        }
    }
}

/// The platform's session layer, consumed as an opaque provider
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> CurrentUser;
}

/// Fixed identity, for embedding a per-client engine and for tests
#[derive(Debug, Clone, Copy)]
pub struct StaticIdentity(pub CurrentUser);

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> CurrentUser {
        self.0
    }
}
