pub mod coordinator;

pub use coordinator::{ClaimCoordinator, ClaimError};
