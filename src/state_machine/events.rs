use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::states::ConsultationStatus;

/// Events that can trigger consultation state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ConsultationEvent {
    /// An expert claims the pending request, assigning themselves
    Claim { expert_id: Uuid },
    /// Start the live session
    Start,
    /// End the session normally, optionally recording expert notes
    Complete { notes: Option<String> },
    /// Cancel the request, optionally recording a reason
    Cancel { reason: Option<String> },
}

impl ConsultationEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Claim { .. } => "claim",
            Self::Start => "start",
            Self::Complete { .. } => "complete",
            Self::Cancel { .. } => "cancel",
        }
    }

    /// The status this event drives the consultation toward
    pub fn target_status(&self) -> ConsultationStatus {
        match self {
            Self::Claim { .. } => ConsultationStatus::Scheduled,
            Self::Start => ConsultationStatus::InProgress,
            Self::Complete { .. } => ConsultationStatus::Completed,
            Self::Cancel { .. } => ConsultationStatus::Cancelled,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Cancel { .. })
    }
}

/// Helpers for creating common events
impl ConsultationEvent {
    /// Create a claim event for the given expert
    pub fn claim_by(expert_id: Uuid) -> Self {
        Self::Claim { expert_id }
    }

    /// Create a completion event carrying session notes
    pub fn complete_with_notes(notes: impl Into<String>) -> Self {
        Self::Complete {
            notes: Some(notes.into()),
        }
    }

    /// Create a cancellation event carrying a reason
    pub fn cancel_with_reason(reason: impl Into<String>) -> Self {
        Self::Cancel {
            reason: Some(reason.into()),
        }
    }
}
