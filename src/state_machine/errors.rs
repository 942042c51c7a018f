use thiserror::Error;
use uuid::Uuid;

use super::states::ConsultationStatus;
use crate::models::Capability;

/// Result type for state machine operations
pub type TransitionResult<T> = Result<T, TransitionError>;

/// Errors produced when a requested transition is rejected.
///
/// These are expected business outcomes, not transport failures: the input
/// record is never mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The requested status is not reachable from the current status
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ConsultationStatus,
        to: ConsultationStatus,
    },

    /// The acting user lacks the capability for this transition
    #[error("{capability} {actor} may not {action} this consultation")]
    NotPermitted {
        actor: Uuid,
        capability: Capability,
        action: &'static str,
    },

    /// The transition would replace or remove an existing expert assignment
    #[error("consultation {consultation_id} already has an assigned expert")]
    AssignmentLocked { consultation_id: Uuid },
}
