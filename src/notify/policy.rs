//! # Notification Policy
//!
//! Decides, per observer, whether a state change deserves a user-visible
//! notification. Dashboards receive every routed event; banners only fire
//! when this policy says so.
//!
//! Rules: farmers hear about assignment, session start, completion, and
//! cancellation of their own requests; consultants and admins hear about new
//! unassigned requests entering the pool. The actor whose own action caused
//! the transition is never notified, and a per-observer per-record "last
//! notified version" watermark suppresses repeats after feed replays, the
//! same mechanism the router uses for delivery dedup.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::events::EventObserver;
use crate::models::Capability;
use crate::state_machine::ConsultationStatus;
use crate::store::ChangeEvent;

/// Stateful notification gate shared by all of a client's surfaces
pub struct NotificationPolicy {
    /// (observer id, consultation id) -> last notified version
    notified: DashMap<(Uuid, Uuid), i64>,
}

impl NotificationPolicy {
    pub fn new() -> Self {
        Self {
            notified: DashMap::new(),
        }
    }

    /// Decide whether this observer should be notified for this event.
    /// Pure read; acknowledgment is recorded separately.
    pub fn should_notify(
        &self,
        event: &ChangeEvent,
        observer_id: Uuid,
        capability: Capability,
    ) -> bool {
        if event.actor_id == Some(observer_id) {
            return false;
        }

        let key = (observer_id, event.record.consultation_id);
        let last = self.notified.get(&key).map(|entry| *entry).unwrap_or(0);
        if event.version <= last {
            return false;
        }

        self.transition_is_interesting(event, observer_id, capability)
    }

    /// Record that the observer has been shown this version
    pub fn record_notified(&self, observer_id: Uuid, consultation_id: Uuid, version: i64) {
        self.notified
            .entry((observer_id, consultation_id))
            .and_modify(|last| *last = (*last).max(version))
            .or_insert(version);
    }

    /// Check-and-acknowledge in one step
    pub fn notify_once(
        &self,
        event: &ChangeEvent,
        observer_id: Uuid,
        capability: Capability,
    ) -> bool {
        if self.should_notify(event, observer_id, capability) {
            debug!(
                observer_id = %observer_id,
                event = event.event_name(),
                payload = %event.payload(),
                "notification emitted"
            );
            self.record_notified(observer_id, event.record.consultation_id, event.version);
            true
        } else {
            debug!(
                observer_id = %observer_id,
                event = event.event_name(),
                version = event.version,
                "notification suppressed"
            );
            false
        }
    }

    fn transition_is_interesting(
        &self,
        event: &ChangeEvent,
        observer_id: Uuid,
        capability: Capability,
    ) -> bool {
        match capability {
            Capability::Farmer => {
                event.record.farmer_id == observer_id
                    && matches!(
                        event.record.status,
                        ConsultationStatus::Scheduled
                            | ConsultationStatus::InProgress
                            | ConsultationStatus::Completed
                            | ConsultationStatus::Cancelled
                    )
            }
            // The pool: new unassigned requests only.
            Capability::Consultant | Capability::Admin => event.record.is_claimable(),
        }
    }
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer adapter that forwards only policy-approved events.
///
/// Wraps a banner-style observer so it can be registered with the router
/// while the policy handles self-suppression and re-notification.
pub struct NotificationFilter {
    inner: Arc<dyn EventObserver>,
    policy: Arc<NotificationPolicy>,
    observer_id: Uuid,
    capability: Capability,
}

impl NotificationFilter {
    pub fn new(
        inner: Arc<dyn EventObserver>,
        policy: Arc<NotificationPolicy>,
        observer_id: Uuid,
        capability: Capability,
    ) -> Self {
        Self {
            inner,
            policy,
            observer_id,
            capability,
        }
    }
}

#[async_trait]
impl EventObserver for NotificationFilter {
    async fn on_event(&self, event: &ChangeEvent) -> anyhow::Result<()> {
        if self
            .policy
            .notify_once(event, self.observer_id, self.capability)
        {
            self.inner.on_event(event).await
        } else {
            Ok(())
        }
    }

    fn observer_name(&self) -> &str {
        self.inner.observer_name()
    }
}
