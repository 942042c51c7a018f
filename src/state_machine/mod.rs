// State machine module for the consultation lifecycle
//
// Pure transition validation: given a record, an event, and the acting user,
// `apply` either produces the post-transition record or a typed rejection.
// All persistence and event fan-out happens outside this module.

pub mod errors;
pub mod events;
pub mod guards;
pub mod states;
pub mod transitions;

// Re-export main types for convenient access
pub use errors::{TransitionError, TransitionResult};
pub use events::ConsultationEvent;
pub use states::ConsultationStatus;
pub use transitions::apply;
