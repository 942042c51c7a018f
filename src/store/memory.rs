//! In-memory consultation store with a broadcast change feed.
//!
//! Conditional updates are atomic under the write lock, so concurrent
//! claimants observe the same compare-and-swap outcome the production store
//! guarantees: exactly one writer per token, everyone else gets a conflict.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::{ChangeEvent, ChangeKind, ConsultationStore, StoreError};
use crate::models::{Consultation, ConsultationPatch, NewConsultation};

const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Embedded store stand-in for tests and single-process deployments
pub struct InMemoryConsultationStore {
    records: RwLock<HashMap<Uuid, Consultation>>,
    feed: broadcast::Sender<ChangeEvent>,
}

impl InMemoryConsultationStore {
    /// Create a store whose feed buffers up to `feed_capacity` events
    pub fn new(feed_capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(feed_capacity);
        Self {
            records: RwLock::new(HashMap::new()),
            feed,
        }
    }

    fn emit(&self, event: ChangeEvent) {
        // A feed with no subscribers is fine; dashboards come and go.
        let _ = self.feed.send(event);
    }

    fn apply_patch(record: &mut Consultation, patch: &ConsultationPatch) -> Result<(), StoreError> {
        if patch.topic.is_some() && record.is_assigned() {
            return Err(StoreError::TopicLocked);
        }
        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(expert_id) = patch.expert_id {
            record.expert_id = Some(expert_id);
        }
        if let Some(topic) = &patch.topic {
            record.topic = topic.clone();
        }
        if let Some(scheduled_for) = patch.scheduled_for {
            record.scheduled_for = Some(scheduled_for);
        }
        if let Some(notes) = &patch.notes {
            record.notes = Some(notes.clone());
        }
        if let Some(reason) = &patch.cancel_reason {
            record.cancel_reason = Some(reason.clone());
        }
        Ok(())
    }
}

impl Default for InMemoryConsultationStore {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

#[async_trait]
impl ConsultationStore for InMemoryConsultationStore {
    async fn create(&self, new: NewConsultation) -> Result<Consultation, StoreError> {
        let actor_id = new.expert_id.unwrap_or(new.farmer_id);
        let record = Consultation::from_new(new, Uuid::new_v4(), 1, Utc::now());

        // Emitting while the lock is held keeps the feed in commit order.
        let mut records = self.records.write().await;
        records.insert(record.consultation_id, record.clone());
        debug!(
            consultation_id = %record.consultation_id,
            status = %record.status,
            "consultation created"
        );
        self.emit(ChangeEvent {
            version: record.version,
            previous_status: None,
            actor_id: Some(actor_id),
            kind: ChangeKind::Created,
            record: record.clone(),
        });

        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Consultation, StoreError> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        patch: ConsultationPatch,
        expected_version: i64,
    ) -> Result<Consultation, StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if record.version != expected_version {
            return Err(StoreError::Conflict {
                id,
                expected: expected_version,
                actual: record.version,
            });
        }

        let previous_status = record.status;
        Self::apply_patch(record, &patch)?;
        record.version += 1;
        record.updated_at = Utc::now();
        let updated = record.clone();

        debug!(
            consultation_id = %id,
            from = %previous_status,
            to = %updated.status,
            version = updated.version,
            "consultation updated"
        );
        self.emit(ChangeEvent {
            version: updated.version,
            previous_status: Some(previous_status),
            actor_id: patch.actor_id,
            kind: ChangeKind::Updated,
            record: updated.clone(),
        });

        Ok(updated)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CurrentUser;
    use crate::state_machine::ConsultationStatus;

    #[tokio::test]
    async fn test_create_assigns_initial_version_and_emits() {
        let store = InMemoryConsultationStore::default();
        let mut feed = store.subscribe();
        let farmer = Uuid::new_v4();

        let record = store
            .create(NewConsultation::instant(farmer, "yellowing leaves"))
            .await
            .unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.status, ConsultationStatus::Pending);

        let event = feed.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.record.consultation_id, record.consultation_id);
        assert_eq!(event.actor_id, Some(farmer));
        assert_eq!(event.previous_status, None);
    }

    #[tokio::test]
    async fn test_conditional_update_rejects_stale_token() {
        let store = InMemoryConsultationStore::default();
        let farmer = Uuid::new_v4();
        let record = store
            .create(NewConsultation::instant(farmer, "stem borers"))
            .await
            .unwrap();

        let actor = CurrentUser::farmer(farmer);
        let patch = ConsultationPatch {
            status: Some(ConsultationStatus::Cancelled),
            actor_id: Some(actor.id),
            ..Default::default()
        };

        let updated = store
            .conditional_update(record.consultation_id, patch.clone(), record.version)
            .await
            .unwrap();
        assert_eq!(updated.version, record.version + 1);

        // Same token again: the record moved, so the write must lose.
        let err = store
            .conditional_update(record.consultation_id, patch, record.version)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_topic_locked_after_assignment() {
        let store = InMemoryConsultationStore::default();
        let farmer = Uuid::new_v4();
        let expert = Uuid::new_v4();
        let record = store
            .create(NewConsultation::instant(farmer, "rust on wheat"))
            .await
            .unwrap();

        let claim_patch = ConsultationPatch {
            status: Some(ConsultationStatus::Scheduled),
            expert_id: Some(expert),
            actor_id: Some(expert),
            ..Default::default()
        };
        let claimed = store
            .conditional_update(record.consultation_id, claim_patch, record.version)
            .await
            .unwrap();

        let edit = ConsultationPatch::topic_edit("rust on barley", &CurrentUser::farmer(farmer));
        let err = store
            .conditional_update(record.consultation_id, edit, claimed.version)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::TopicLocked);
    }

    #[tokio::test]
    async fn test_get_missing_record() {
        let store = InMemoryConsultationStore::default();
        let id = Uuid::new_v4();
        assert_eq!(store.get(id).await.unwrap_err(), StoreError::NotFound(id));
    }
}
