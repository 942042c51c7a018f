//! # Consultation Store Boundary
//!
//! The platform's backend-as-a-service is consumed behind the
//! [`ConsultationStore`] trait: row-level CRUD with conditional updates and a
//! change-subscription feed. Claim correctness rests entirely on
//! `conditional_update` rejecting stale tokens, because competing claimants
//! run in separate processes and share no memory.
//!
//! [`InMemoryConsultationStore`] is the embedded stand-in used by tests and
//! single-process deployments.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::constants::events as event_names;
use crate::models::{Consultation, ConsultationPatch, NewConsultation};
use crate::state_machine::ConsultationStatus;

pub use memory::InMemoryConsultationStore;

/// What kind of change a feed event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
}

/// One committed change, as delivered on the store's feed.
///
/// `version` is the record's token after the change; `previous_status` lets
/// observers recognize records leaving their view (a pending request claimed
/// by someone else), and `actor_id` attributes the change for
/// self-notification suppression.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub record: Consultation,
    pub kind: ChangeKind,
    pub version: i64,
    pub previous_status: Option<ConsultationStatus>,
    pub actor_id: Option<Uuid>,
}

impl ChangeEvent {
    /// Namespaced event name for logging and notification surfaces
    pub fn event_name(&self) -> &'static str {
        match (self.kind, self.record.status) {
            (ChangeKind::Created, _) => event_names::CONSULTATION_REQUESTED,
            (_, ConsultationStatus::Scheduled) => event_names::CONSULTATION_CLAIMED,
            (_, ConsultationStatus::InProgress) => event_names::CONSULTATION_STARTED,
            (_, ConsultationStatus::Completed) => event_names::CONSULTATION_COMPLETED,
            (_, ConsultationStatus::Cancelled) => event_names::CONSULTATION_CANCELLED,
            (_, ConsultationStatus::Pending) => event_names::CONSULTATION_UPDATED,
        }
    }

    /// Structured payload for logs and notification banners
    pub fn payload(&self) -> Value {
        json!({
            "consultation_id": self.record.consultation_id,
            "status": self.record.status,
            "previous_status": self.previous_status,
            "version": self.version,
            "actor_id": self.actor_id,
        })
    }
}

/// Errors surfaced by store operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("consultation {0} not found")]
    NotFound(Uuid),

    /// The record moved since it was read; re-read before reapplying
    #[error("stale version for consultation {id}: expected {expected}, found {actual}")]
    Conflict { id: Uuid, expected: i64, actual: i64 },

    #[error("topic may only be edited before an expert is assigned")]
    TopicLocked,

    /// Transport-level failure; safe to retry with backoff
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Row-level persistence with optimistic concurrency and a change feed.
#[async_trait]
pub trait ConsultationStore: Send + Sync + 'static {
    /// Persist a new record and emit a `Created` feed event
    async fn create(&self, new: NewConsultation) -> Result<Consultation, StoreError>;

    /// Fetch the current record and its token
    async fn get(&self, id: Uuid) -> Result<Consultation, StoreError>;

    /// Apply `patch` only if the record's version still equals
    /// `expected_version`; exactly one concurrent writer wins per token.
    async fn conditional_update(
        &self,
        id: Uuid,
        patch: ConsultationPatch,
        expected_version: i64,
    ) -> Result<Consultation, StoreError>;

    /// Subscribe to the ordered per-record change feed
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}
