//! # Session Controller
//!
//! Keeps the live-call session and the consultation status synchronized.
//! The status write happens before media acquisition; if acquisition then
//! fails, the controller compensates with an `in_progress -> cancelled`
//! transition so the record never claims a running session that does not
//! exist beyond the bounded acquisition window.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::models::{Consultation, ConsultationPatch, CurrentUser};
use crate::state_machine::{self, ConsultationEvent, ConsultationStatus, TransitionError};
use crate::store::{ConsultationStore, StoreError};

/// Errors from the media provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("media acquisition failed: {0}")]
    Acquisition(String),

    #[error("media acquisition timed out after {0:?}")]
    Timeout(Duration),
}

/// Opaque handle to a running call session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub consultation_id: Uuid,
}

/// The WebRTC/call transport, consumed as a black box
#[async_trait]
pub trait MediaSessionProvider: Send + Sync + 'static {
    async fn acquire(&self, consultation_id: Uuid) -> Result<SessionHandle, MediaError>;
    async fn release(&self, handle: SessionHandle) -> Result<(), MediaError>;
}

/// Errors surfaced by session orchestration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("consultation {0} not found")]
    NotFound(Uuid),

    /// The record moved concurrently; re-read and decide whether to reapply
    #[error("consultation {0} changed concurrently; refresh and retry")]
    Conflict(Uuid),

    /// Surfaced to the user; the status transition has been compensated
    #[error("media session unavailable: {0}")]
    MediaUnavailable(#[from] MediaError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Orchestrates starting and ending live sessions for consultations
pub struct SessionController<S, M> {
    store: Arc<S>,
    media: Arc<M>,
    config: SessionConfig,
    active: DashMap<Uuid, SessionHandle>,
}

impl<S: ConsultationStore, M: MediaSessionProvider> SessionController<S, M> {
    pub fn new(store: Arc<S>, media: Arc<M>, config: SessionConfig) -> Self {
        Self {
            store,
            media,
            config,
            active: DashMap::new(),
        }
    }

    /// Start the live session: transition to `in_progress`, then acquire
    /// media within the configured window. A failed acquisition rolls the
    /// status back unless the record was already in progress (a retry), in
    /// which case the error is surfaced for the UI to try again.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn start(
        &self,
        consultation_id: Uuid,
        actor: &CurrentUser,
    ) -> Result<Consultation, SessionError> {
        let current = self
            .store
            .get(consultation_id)
            .await
            .map_err(map_store_error)?;
        let was_in_progress = current.status == ConsultationStatus::InProgress;

        let record = if was_in_progress {
            // Retry path: still only the parties to the consultation.
            if current.farmer_id != actor.id && current.expert_id != Some(actor.id) {
                return Err(SessionError::Transition(TransitionError::NotPermitted {
                    actor: actor.id,
                    capability: actor.capability,
                    action: "start",
                }));
            }
            current
        } else {
            let next = state_machine::apply(&current, &ConsultationEvent::Start, actor)?;
            let patch = ConsultationPatch::from_transition(&current, &next, actor);
            match self
                .store
                .conditional_update(consultation_id, patch, current.version)
                .await
            {
                Ok(updated) => updated,
                Err(StoreError::Conflict { .. }) => {
                    return Err(SessionError::Conflict(consultation_id))
                }
                Err(other) => return Err(map_store_error(other)),
            }
        };

        let window = Duration::from_millis(self.config.acquire_timeout_ms);
        let acquired = match timeout(window, self.media.acquire(consultation_id)).await {
            Ok(result) => result,
            Err(_) => Err(MediaError::Timeout(window)),
        };

        match acquired {
            Ok(handle) => {
                info!(
                    consultation_id = %consultation_id,
                    session_id = %handle.session_id,
                    "live session started"
                );
                self.active.insert(consultation_id, handle);
                Ok(record)
            }
            Err(media_err) => {
                if !was_in_progress {
                    self.compensate(&record).await;
                }
                Err(SessionError::MediaUnavailable(media_err))
            }
        }
    }

    /// End the session: transition to `completed` (merging the expert's
    /// notes) and release the held media handle.
    #[instrument(skip(self, notes, actor), fields(actor_id = %actor.id))]
    pub async fn end(
        &self,
        consultation_id: Uuid,
        notes: Option<String>,
        actor: &CurrentUser,
    ) -> Result<Consultation, SessionError> {
        let current = self
            .store
            .get(consultation_id)
            .await
            .map_err(map_store_error)?;

        let event = ConsultationEvent::Complete { notes };
        let next = state_machine::apply(&current, &event, actor)?;

        let updated = if next.status == current.status {
            current
        } else {
            let patch = ConsultationPatch::from_transition(&current, &next, actor);
            match self
                .store
                .conditional_update(consultation_id, patch, current.version)
                .await
            {
                Ok(updated) => updated,
                Err(StoreError::Conflict { .. }) => {
                    return Err(SessionError::Conflict(consultation_id))
                }
                Err(other) => return Err(map_store_error(other)),
            }
        };

        self.release_if_active(consultation_id).await;
        info!(consultation_id = %consultation_id, "live session ended");
        Ok(updated)
    }

    /// Release the media handle for a consultation if one is held
    pub async fn release_if_active(&self, consultation_id: Uuid) {
        if let Some((_, handle)) = self.active.remove(&consultation_id) {
            if let Err(err) = self.media.release(handle).await {
                warn!(
                    consultation_id = %consultation_id,
                    error = %err,
                    "failed to release media session"
                );
            }
        }
    }

    /// The currently held handle, if the session is live on this client
    pub fn active_session(&self, consultation_id: Uuid) -> Option<SessionHandle> {
        self.active
            .get(&consultation_id)
            .map(|entry| entry.value().clone())
    }

    /// Roll a just-started consultation back to cancelled after media failed.
    async fn compensate(&self, record: &Consultation) {
        let system = CurrentUser::system();
        let event = ConsultationEvent::cancel_with_reason("media session could not be established");

        match state_machine::apply(record, &event, &system) {
            Ok(next) => {
                let patch = ConsultationPatch::from_transition(record, &next, &system);
                if let Err(err) = self
                    .store
                    .conditional_update(record.consultation_id, patch, record.version)
                    .await
                {
                    error!(
                        consultation_id = %record.consultation_id,
                        error = %err,
                        "compensating cancellation failed; record needs operator attention"
                    );
                } else {
                    debug!(
                        consultation_id = %record.consultation_id,
                        "compensated failed session start with cancellation"
                    );
                }
            }
            Err(err) => {
                error!(
                    consultation_id = %record.consultation_id,
                    error = %err,
                    "compensating transition rejected"
                );
            }
        }
    }
}

fn map_store_error(err: StoreError) -> SessionError {
    match err {
        StoreError::NotFound(id) => SessionError::NotFound(id),
        StoreError::Unavailable(reason) => SessionError::Unavailable(reason),
        StoreError::Conflict { id, .. } => SessionError::Conflict(id),
        other => SessionError::Unavailable(other.to_string()),
    }
}
