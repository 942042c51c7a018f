//! Shared test doubles for the integration suite: a recording observer, a
//! scriptable media provider, a store wrapper with injectable outages, and
//! an engine builder wiring a fixed identity.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use agrilink_core::config::EngineConfig;
use agrilink_core::engine::ConsultationEngine;
use agrilink_core::events::EventObserver;
use agrilink_core::models::{
    Consultation, ConsultationPatch, CurrentUser, NewConsultation, StaticIdentity,
};
use agrilink_core::session::{MediaError, MediaSessionProvider, SessionHandle};
use agrilink_core::store::{ChangeEvent, ConsultationStore, StoreError};

/// Observer that forwards every delivery into an inspectable channel
pub struct RecordingObserver {
    name: String,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl RecordingObserver {
    pub fn channel(name: &str) -> (Arc<Self>, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                name: name.to_string(),
                tx,
            }),
            rx,
        )
    }
}

#[async_trait]
impl EventObserver for RecordingObserver {
    async fn on_event(&self, event: &ChangeEvent) -> anyhow::Result<()> {
        // The test may have dropped the receiver already; that is fine.
        let _ = self.tx.send(event.clone());
        Ok(())
    }

    fn observer_name(&self) -> &str {
        &self.name
    }
}

/// Media provider with scriptable acquisition failures and call counters
pub struct ScriptedMediaProvider {
    fail_next: AtomicBool,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl ScriptedMediaProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail_next: AtomicBool::new(false),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        })
    }

    pub fn fail_next_acquire(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn acquired_count(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> u64 {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSessionProvider for ScriptedMediaProvider {
    async fn acquire(&self, consultation_id: Uuid) -> Result<SessionHandle, MediaError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(MediaError::Acquisition("scripted failure".to_string()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(SessionHandle {
            session_id: Uuid::new_v4(),
            consultation_id,
        })
    }

    async fn release(&self, _handle: SessionHandle) -> Result<(), MediaError> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Store wrapper that injects transport outages on demand
pub struct FlakyStore<S> {
    inner: Arc<S>,
    offline: AtomicBool,
}

impl<S: ConsultationStore> FlakyStore<S> {
    pub fn new(inner: Arc<S>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            offline: AtomicBool::new(false),
        })
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: ConsultationStore> ConsultationStore for FlakyStore<S> {
    async fn create(&self, new: NewConsultation) -> Result<Consultation, StoreError> {
        self.check()?;
        self.inner.create(new).await
    }

    async fn get(&self, id: Uuid) -> Result<Consultation, StoreError> {
        self.check()?;
        self.inner.get(id).await
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        patch: ConsultationPatch,
        expected_version: i64,
    ) -> Result<Consultation, StoreError> {
        self.check()?;
        self.inner.conditional_update(id, patch, expected_version).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.subscribe()
    }
}

/// Build a per-client engine running as `user` against a shared store
pub fn engine_for<S, M>(user: CurrentUser, store: Arc<S>, media: Arc<M>) -> ConsultationEngine<S, M>
where
    S: ConsultationStore,
    M: MediaSessionProvider,
{
    ConsultationEngine::new(
        store,
        media,
        Arc::new(StaticIdentity(user)),
        EngineConfig::default(),
    )
}

/// Await the next routed event, failing the test on a stall
pub async fn recv_event(rx: &mut mpsc::UnboundedReceiver<ChangeEvent>) -> ChangeEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Assert that no further event arrives within a settling window
pub async fn assert_no_event(rx: &mut mpsc::UnboundedReceiver<ChangeEvent>) {
    let outcome = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(
        outcome.is_err(),
        "expected no further events, got {:?}",
        outcome.unwrap()
    );
}
