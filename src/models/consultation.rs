//! # Consultation Model
//!
//! The persisted record representing one farmer-expert engagement through its
//! full lifecycle, from the initial request to completion or cancellation.
//!
//! ## Concurrency token
//!
//! `version` is a monotonic counter bumped by every committed write. It is
//! read alongside the record and must match at write time (conditional
//! update), detecting concurrent modification without locking. `updated_at`
//! is maintained for display but is not the token: wall-clock values can
//! collide under sub-millisecond concurrent writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::identity::CurrentUser;
use crate::state_machine::states::ConsultationStatus;

/// A consultation request and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consultation {
    pub consultation_id: Uuid,
    pub farmer_id: Uuid,
    pub expert_id: Option<Uuid>,
    pub status: ConsultationStatus,
    pub topic: String,
    /// Present only for booked requests; `None` for instant (video-now) ones
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Maintained by the assigned expert
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    /// Optimistic-concurrency token
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consultation {
    /// Materialize a record from a creation payload.
    pub fn from_new(
        new: NewConsultation,
        consultation_id: Uuid,
        version: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let status = new.initial_status();
        Self {
            consultation_id,
            farmer_id: new.farmer_id,
            expert_id: new.expert_id,
            status,
            topic: new.topic,
            scheduled_for: new.scheduled_for,
            notes: None,
            cancel_reason: None,
            version,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if an expert currently holds the assignment
    pub fn is_assigned(&self) -> bool {
        self.expert_id.is_some()
    }

    /// Check if the record is still in the unassigned pool and claimable
    pub fn is_claimable(&self) -> bool {
        self.status == ConsultationStatus::Pending && self.expert_id.is_none()
    }

    /// Check the record-level invariants tying assignment to status
    pub fn invariants_hold(&self) -> bool {
        match self.status {
            ConsultationStatus::Pending => self.expert_id.is_none(),
            ConsultationStatus::Scheduled
            | ConsultationStatus::InProgress
            | ConsultationStatus::Completed => self.expert_id.is_some(),
            // Cancellation is reachable both before and after assignment
            ConsultationStatus::Cancelled => true,
        }
    }
}

/// Creation payload (without generated fields).
///
/// A farmer creates a pending request; an expert directly initiating an
/// instant session creates a record that is already assigned and in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConsultation {
    pub farmer_id: Uuid,
    pub topic: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub expert_id: Option<Uuid>,
}

impl NewConsultation {
    /// A video-now request entering the unassigned pool
    pub fn instant(farmer_id: Uuid, topic: impl Into<String>) -> Self {
        Self {
            farmer_id,
            topic: topic.into(),
            scheduled_for: None,
            expert_id: None,
        }
    }

    /// A booked request entering the unassigned pool
    pub fn booked(farmer_id: Uuid, topic: impl Into<String>, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            farmer_id,
            topic: topic.into(),
            scheduled_for: Some(scheduled_for),
            expert_id: None,
        }
    }

    /// An expert-initiated instant session, self-assigned from the start
    pub fn instant_with_expert(
        farmer_id: Uuid,
        topic: impl Into<String>,
        expert_id: Uuid,
    ) -> Self {
        Self {
            farmer_id,
            topic: topic.into(),
            scheduled_for: None,
            expert_id: Some(expert_id),
        }
    }

    /// The status the record is born in
    pub fn initial_status(&self) -> ConsultationStatus {
        if self.expert_id.is_some() {
            ConsultationStatus::InProgress
        } else {
            ConsultationStatus::Pending
        }
    }
}

/// The fields a single committed write may change, plus the acting user so
/// feed events can attribute the change. `expert_id` is set-only: no patch
/// can clear an assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsultationPatch {
    pub status: Option<ConsultationStatus>,
    pub expert_id: Option<Uuid>,
    pub topic: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub actor_id: Option<Uuid>,
}

impl ConsultationPatch {
    /// Diff a validated transition into the patch the store applies.
    pub fn from_transition(
        before: &Consultation,
        after: &Consultation,
        actor: &CurrentUser,
    ) -> Self {
        Self {
            status: (before.status != after.status).then_some(after.status),
            expert_id: match (before.expert_id, after.expert_id) {
                (None, Some(id)) => Some(id),
                _ => None,
            },
            topic: None,
            scheduled_for: None,
            notes: (before.notes != after.notes)
                .then(|| after.notes.clone())
                .flatten(),
            cancel_reason: (before.cancel_reason != after.cancel_reason)
                .then(|| after.cancel_reason.clone())
                .flatten(),
            actor_id: Some(actor.id),
        }
    }

    /// A pre-assignment topic edit by the requester.
    pub fn topic_edit(topic: impl Into<String>, actor: &CurrentUser) -> Self {
        Self {
            topic: Some(topic.into()),
            actor_id: Some(actor.id),
            ..Self::default()
        }
    }
}
