pub mod router;
pub mod types;

// Re-export key types for convenience
pub use router::{EventRouter, RouterStats};
pub use types::{EventObserver, Interest, SubscriptionHandle};
