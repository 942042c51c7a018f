//! # Consultation Engine
//!
//! The facade a client (farmer app, expert dashboard, admin console) embeds.
//! Wires the store, state machine, claim coordinator, session controller,
//! event router, and notification policy together, and owns the background
//! pump that drains the store's change feed into the router.
//!
//! Each client runs its own engine instance; the only shared state between
//! clients is the consultation store itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::claim::{ClaimCoordinator, ClaimError};
use crate::config::EngineConfig;
use crate::error::{AgrilinkError, Result};
use crate::events::{EventObserver, EventRouter, Interest, RouterStats, SubscriptionHandle};
use crate::models::{
    Capability, Consultation, ConsultationPatch, CurrentUser, IdentityProvider, NewConsultation,
};
use crate::notify::{NotificationFilter, NotificationPolicy};
use crate::session::{MediaSessionProvider, SessionController, SessionError};
use crate::state_machine::{self, ConsultationEvent, TransitionError};
use crate::store::{ChangeEvent, ConsultationStore, StoreError};

/// Per-client consultation engine
pub struct ConsultationEngine<S: ConsultationStore, M: MediaSessionProvider> {
    store: Arc<S>,
    router: Arc<EventRouter>,
    claimer: ClaimCoordinator<S>,
    sessions: SessionController<S, M>,
    policy: Arc<NotificationPolicy>,
    identity: Arc<dyn IdentityProvider>,
    feed_pump: JoinHandle<()>,
}

impl<S: ConsultationStore, M: MediaSessionProvider> ConsultationEngine<S, M> {
    pub fn new(
        store: Arc<S>,
        media: Arc<M>,
        identity: Arc<dyn IdentityProvider>,
        config: EngineConfig,
    ) -> Self {
        let router = Arc::new(EventRouter::new());
        let feed_pump = spawn_feed_pump(store.subscribe(), router.clone());

        Self {
            claimer: ClaimCoordinator::new(store.clone()),
            sessions: SessionController::new(store.clone(), media, config.session),
            store,
            router,
            policy: Arc::new(NotificationPolicy::new()),
            identity,
            feed_pump,
        }
    }

    /// Create a consultation request entering the unassigned pool.
    #[instrument(skip(self, topic))]
    pub async fn request_consultation(
        &self,
        topic: impl Into<String> + Send,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<Consultation> {
        let user = self.identity.current_user();
        if user.capability != Capability::Farmer {
            return Err(not_permitted(&user, "request").into());
        }

        let new = match scheduled_for {
            Some(when) => NewConsultation::booked(user.id, topic, when),
            None => NewConsultation::instant(user.id, topic),
        };
        let record = self.store.create(new).await?;
        info!(
            consultation_id = %record.consultation_id,
            scheduled = record.scheduled_for.is_some(),
            "consultation requested"
        );
        Ok(record)
    }

    /// Expert-initiated instant session: the record is born assigned and in
    /// progress, and the media session is acquired right away.
    #[instrument(skip(self, topic))]
    pub async fn open_instant_session(
        &self,
        farmer_id: Uuid,
        topic: impl Into<String> + Send,
    ) -> Result<Consultation> {
        let user = self.identity.current_user();
        if user.capability != Capability::Consultant {
            return Err(not_permitted(&user, "open an instant session for").into());
        }

        let record = self
            .store
            .create(NewConsultation::instant_with_expert(
                farmer_id, topic, user.id,
            ))
            .await?;
        let record = self
            .sessions
            .start(record.consultation_id, &user)
            .await
            .map_err(AgrilinkError::from)?;
        Ok(record)
    }

    /// Accept a pending request, racing any other expert fairly.
    pub async fn claim(&self, consultation_id: Uuid) -> std::result::Result<Consultation, ClaimError> {
        let user = self.identity.current_user();
        self.claimer.claim(consultation_id, &user).await
    }

    /// Cancel a consultation with a reason, within the rules of the
    /// transition table for the caller's capability.
    #[instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        consultation_id: Uuid,
        reason: impl Into<String> + Send,
    ) -> Result<Consultation> {
        let user = self.identity.current_user();
        let current = self.store.get(consultation_id).await?;

        let event = ConsultationEvent::cancel_with_reason(reason);
        let next = state_machine::apply(&current, &event, &user)?;
        if next.status == current.status {
            return Ok(current);
        }

        let patch = ConsultationPatch::from_transition(&current, &next, &user);
        let updated = self
            .store
            .conditional_update(consultation_id, patch, current.version)
            .await?;

        // An admin override of a running session also tears the call down.
        self.sessions.release_if_active(consultation_id).await;
        info!(consultation_id = %consultation_id, "consultation cancelled");
        Ok(updated)
    }

    /// Start the live session. A consultant starting straight from the pool
    /// claims first, so the transition graph is preserved.
    pub async fn start(
        &self,
        consultation_id: Uuid,
    ) -> std::result::Result<Consultation, SessionError> {
        let user = self.identity.current_user();

        let record = self
            .store
            .get(consultation_id)
            .await
            .map_err(map_store_to_session)?;
        if record.is_claimable() && user.capability == Capability::Consultant {
            self.claimer
                .claim(consultation_id, &user)
                .await
                .map_err(|err| map_claim_to_session(err, &user))?;
        }

        self.sessions.start(consultation_id, &user).await
    }

    /// End the session normally, persisting the expert's notes.
    pub async fn complete(
        &self,
        consultation_id: Uuid,
        notes: impl Into<String> + Send,
    ) -> std::result::Result<Consultation, SessionError> {
        let user = self.identity.current_user();
        self.sessions
            .end(consultation_id, Some(notes.into()), &user)
            .await
    }

    /// Register a dashboard-style observer: receives every routed event in
    /// its interest, exactly once per record version.
    pub async fn subscribe(
        &self,
        interest: Interest,
        observer: Arc<dyn EventObserver>,
    ) -> SubscriptionHandle {
        self.router.subscribe(interest, observer).await
    }

    /// Register a banner-style observer behind the notification policy:
    /// self-caused and already-acknowledged transitions are filtered out.
    pub async fn subscribe_notifications(
        &self,
        interest: Interest,
        observer: Arc<dyn EventObserver>,
    ) -> SubscriptionHandle {
        let filtered = Arc::new(NotificationFilter::new(
            observer,
            self.policy.clone(),
            interest.observer_id,
            interest.capability,
        ));
        self.router.subscribe(interest, filtered).await
    }

    /// Tear a subscription down immediately
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.router.unsubscribe(handle).await
    }

    /// The session handle held for a consultation, if live on this client
    pub fn active_session(&self, consultation_id: Uuid) -> Option<crate::session::SessionHandle> {
        self.sessions.active_session(consultation_id)
    }

    /// Aggregate router counters for diagnostics
    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }

    /// The notification policy, for surfaces that render banners directly
    pub fn policy(&self) -> Arc<NotificationPolicy> {
        self.policy.clone()
    }
}

impl<S: ConsultationStore, M: MediaSessionProvider> Drop for ConsultationEngine<S, M> {
    fn drop(&mut self) {
        self.feed_pump.abort();
    }
}

/// Drain the store's change feed into the router from a single task,
/// preserving per-record delivery order. Lag is logged and tolerated: the
/// router's watermarks make any replay safe.
fn spawn_feed_pump(
    feed: broadcast::Receiver<ChangeEvent>,
    router: Arc<EventRouter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(feed);
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => router.on_store_event(&event).await,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "store feed lagged; continuing");
                }
            }
        }
        debug!("store feed closed; pump exiting");
    })
}

fn not_permitted(user: &CurrentUser, action: &'static str) -> TransitionError {
    TransitionError::NotPermitted {
        actor: user.id,
        capability: user.capability,
        action,
    }
}

fn map_store_to_session(err: StoreError) -> SessionError {
    match err {
        StoreError::NotFound(id) => SessionError::NotFound(id),
        StoreError::Unavailable(reason) => SessionError::Unavailable(reason),
        StoreError::Conflict { id, .. } => SessionError::Conflict(id),
        other => SessionError::Unavailable(other.to_string()),
    }
}

fn map_claim_to_session(err: ClaimError, user: &CurrentUser) -> SessionError {
    match err {
        ClaimError::AlreadyClaimed(id) => SessionError::Conflict(id),
        ClaimError::NotFound(id) => SessionError::NotFound(id),
        ClaimError::Unavailable(reason) => SessionError::Unavailable(reason),
        ClaimError::NotPermitted => SessionError::Transition(not_permitted(user, "claim")),
    }
}
