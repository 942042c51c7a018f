//! # Claim Coordinator
//!
//! Resolves the race where several experts accept the same pending request
//! at once. The winning write is the one whose conditional update lands on
//! the token read at claim time; every other claimant observes a rejection
//! instead of a silent overwrite.
//!
//! There is no in-memory locking here: claimants run on different devices
//! and processes, so correctness rests entirely on the store's
//! conditional-write guarantee. A lost race is a normal outcome, not a
//! transient failure: callers must re-read before any retry, because the
//! request may no longer be claimable at all.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::models::{Capability, Consultation, ConsultationPatch, CurrentUser};
use crate::state_machine::{self, ConsultationEvent, TransitionError};
use crate::store::{ConsultationStore, StoreError};

/// Outcomes of a failed claim attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// Another expert got there first; pick a different request
    #[error("consultation {0} was already claimed")]
    AlreadyClaimed(Uuid),

    #[error("consultation {0} not found")]
    NotFound(Uuid),

    #[error("only consultants may claim consultation requests")]
    NotPermitted,

    /// Transport failure; safe to retry after a fresh read
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Race-free accept of pending consultation requests
pub struct ClaimCoordinator<S> {
    store: Arc<S>,
}

impl<S: ConsultationStore> ClaimCoordinator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Attempt to assign `expert` to a pending consultation.
    ///
    /// Exactly one of N concurrent claims succeeds; the rest return
    /// [`ClaimError::AlreadyClaimed`]. Never retried automatically.
    #[instrument(skip(self, expert), fields(expert_id = %expert.id))]
    pub async fn claim(
        &self,
        consultation_id: Uuid,
        expert: &CurrentUser,
    ) -> Result<Consultation, ClaimError> {
        if expert.capability != Capability::Consultant {
            return Err(ClaimError::NotPermitted);
        }

        let current = self
            .store
            .get(consultation_id)
            .await
            .map_err(map_store_error)?;

        if !current.is_claimable() {
            debug!(
                consultation_id = %consultation_id,
                status = %current.status,
                "claim attempt on a request no longer in the pool"
            );
            return Err(ClaimError::AlreadyClaimed(consultation_id));
        }

        let event = ConsultationEvent::claim_by(expert.id);
        let next = state_machine::apply(&current, &event, expert).map_err(|err| match err {
            TransitionError::NotPermitted { .. } => ClaimError::NotPermitted,
            TransitionError::InvalidTransition { .. } | TransitionError::AssignmentLocked { .. } => {
                ClaimError::AlreadyClaimed(consultation_id)
            }
        })?;

        let patch = ConsultationPatch::from_transition(&current, &next, expert);
        match self
            .store
            .conditional_update(consultation_id, patch, current.version)
            .await
        {
            Ok(updated) => {
                info!(
                    consultation_id = %consultation_id,
                    version = updated.version,
                    "claim won"
                );
                Ok(updated)
            }
            Err(StoreError::Conflict { .. }) => {
                debug!(consultation_id = %consultation_id, "claim lost the race");
                Err(ClaimError::AlreadyClaimed(consultation_id))
            }
            Err(other) => Err(map_store_error(other)),
        }
    }
}

fn map_store_error(err: StoreError) -> ClaimError {
    match err {
        StoreError::NotFound(id) => ClaimError::NotFound(id),
        StoreError::Unavailable(reason) => ClaimError::Unavailable(reason),
        other => ClaimError::Unavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewConsultation;
    use crate::state_machine::ConsultationStatus;
    use crate::store::InMemoryConsultationStore;

    async fn pending_request(store: &InMemoryConsultationStore) -> Consultation {
        store
            .create(NewConsultation::instant(Uuid::new_v4(), "powdery mildew"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_single_claim_wins() {
        let store = Arc::new(InMemoryConsultationStore::default());
        let coordinator = ClaimCoordinator::new(store.clone());
        let record = pending_request(&store).await;
        let expert = CurrentUser::consultant(Uuid::new_v4());

        let claimed = tokio_test::assert_ok!(coordinator.claim(record.consultation_id, &expert).await);
        assert_eq!(claimed.status, ConsultationStatus::Scheduled);
        assert_eq!(claimed.expert_id, Some(expert.id));
        assert_eq!(claimed.version, record.version + 1);
    }

    #[tokio::test]
    async fn test_second_claim_is_rejected() {
        let store = Arc::new(InMemoryConsultationStore::default());
        let coordinator = ClaimCoordinator::new(store.clone());
        let record = pending_request(&store).await;

        let first = CurrentUser::consultant(Uuid::new_v4());
        let second = CurrentUser::consultant(Uuid::new_v4());

        coordinator
            .claim(record.consultation_id, &first)
            .await
            .unwrap();
        let err = coordinator
            .claim(record.consultation_id, &second)
            .await
            .unwrap_err();
        assert_eq!(err, ClaimError::AlreadyClaimed(record.consultation_id));

        // The winner's assignment stands.
        let current = store.get(record.consultation_id).await.unwrap();
        assert_eq!(current.expert_id, Some(first.id));
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_exactly_one_winner() {
        let store = Arc::new(InMemoryConsultationStore::default());
        let coordinator = Arc::new(ClaimCoordinator::new(store.clone()));
        let record = pending_request(&store).await;

        let expert_a = CurrentUser::consultant(Uuid::new_v4());
        let expert_b = CurrentUser::consultant(Uuid::new_v4());

        let (result_a, result_b) = tokio::join!(
            coordinator.claim(record.consultation_id, &expert_a),
            coordinator.claim(record.consultation_id, &expert_b),
        );

        let winners = [&result_a, &result_b]
            .iter()
            .filter(|result| result.is_ok())
            .count();
        assert_eq!(winners, 1);

        let loser = if result_a.is_ok() { result_b } else { result_a };
        assert_eq!(
            loser.unwrap_err(),
            ClaimError::AlreadyClaimed(record.consultation_id)
        );
    }

    #[tokio::test]
    async fn test_farmer_cannot_claim() {
        let store = Arc::new(InMemoryConsultationStore::default());
        let coordinator = ClaimCoordinator::new(store.clone());
        let record = pending_request(&store).await;

        let err = coordinator
            .claim(record.consultation_id, &CurrentUser::farmer(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err, ClaimError::NotPermitted);
    }

    #[tokio::test]
    async fn test_claim_on_missing_record() {
        let store = Arc::new(InMemoryConsultationStore::default());
        let coordinator = ClaimCoordinator::new(store);
        let id = Uuid::new_v4();

        let err = coordinator
            .claim(id, &CurrentUser::consultant(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err, ClaimError::NotFound(id));
    }
}
