//! # Event Router
//!
//! Turns the store's raw change feed into per-observer deliveries, exactly
//! once per `(subscription, record, version)`, in the order the store
//! committed them for a given record.
//!
//! ## Redelivery
//!
//! The store feed may redeliver events after a reconnect. Each subscription
//! keeps a per-record "last seen version" watermark; an event at or below the
//! watermark is dropped, so observers never see a stale or repeated state.
//!
//! ## Failure isolation
//!
//! An observer that fails is logged and skipped; fan-out to the remaining
//! subscribers continues and nothing propagates back into the feed loop.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

use super::types::{EventObserver, Interest, SubscriptionHandle};
use crate::store::ChangeEvent;

/// One observer's registration
struct RouteSubscription {
    interest: Interest,
    observer: Arc<dyn EventObserver>,
    /// record id -> highest version delivered
    watermarks: HashMap<Uuid, i64>,
    delivered: u64,
    duplicates_dropped: u64,
    failures: u64,
    last_event_at: Option<DateTime<Utc>>,
}

/// Aggregate routing counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub events_routed: u64,
    pub deliveries: u64,
    pub duplicates_dropped: u64,
    pub observer_failures: u64,
}

/// Fan-out hub between the store feed and registered observers
pub struct EventRouter {
    subscriptions: RwLock<HashMap<Uuid, RouteSubscription>>,
    stats: Mutex<RouterStats>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            stats: Mutex::new(RouterStats::default()),
        }
    }

    /// Register an observer for the slice of the feed its interest matches
    pub async fn subscribe(
        &self,
        interest: Interest,
        observer: Arc<dyn EventObserver>,
    ) -> SubscriptionHandle {
        let subscription_id = Uuid::new_v4();
        let subscription = RouteSubscription {
            interest,
            observer,
            watermarks: HashMap::new(),
            delivered: 0,
            duplicates_dropped: 0,
            failures: 0,
            last_event_at: None,
        };

        self.subscriptions
            .write()
            .await
            .insert(subscription_id, subscription);

        debug!(
            subscription_id = %subscription_id,
            observer_id = %interest.observer_id,
            capability = %interest.capability,
            "observer subscribed"
        );
        SubscriptionHandle { subscription_id }
    }

    /// Tear a subscription down. Takes effect immediately: no deliveries
    /// happen after this returns.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let removed = self
            .subscriptions
            .write()
            .await
            .remove(&handle.subscription_id)
            .is_some();
        if removed {
            debug!(subscription_id = %handle.subscription_id, "observer unsubscribed");
        }
        removed
    }

    /// Fan one feed event out to every matching subscription, then return.
    ///
    /// Callers drive this from a single feed task per store, which is what
    /// preserves per-record delivery order.
    pub async fn on_store_event(&self, event: &ChangeEvent) {
        let record_id = event.record.consultation_id;
        let mut deliveries: Vec<(Uuid, Arc<dyn EventObserver>)> = Vec::new();
        let mut duplicates = 0u64;

        {
            let mut subscriptions = self.subscriptions.write().await;
            for (id, subscription) in subscriptions.iter_mut() {
                if !subscription.interest.matches(event) {
                    continue;
                }

                let seen = subscription.watermarks.get(&record_id).copied().unwrap_or(0);
                if event.version <= seen {
                    subscription.duplicates_dropped += 1;
                    duplicates += 1;
                    continue;
                }

                subscription.watermarks.insert(record_id, event.version);
                subscription.delivered += 1;
                subscription.last_event_at = Some(Utc::now());
                deliveries.push((*id, subscription.observer.clone()));
            }
        }

        let mut failures = 0u64;
        let delivery_count = deliveries.len() as u64;
        for (subscription_id, observer) in deliveries {
            // Unsubscribed while this fan-out was in flight: skip.
            if !self
                .subscriptions
                .read()
                .await
                .contains_key(&subscription_id)
            {
                continue;
            }

            if let Err(err) = observer.on_event(event).await {
                failures += 1;
                error!(
                    subscription_id = %subscription_id,
                    observer = observer.observer_name(),
                    event = event.event_name(),
                    error = %err,
                    "observer failed; continuing fan-out"
                );
            }
        }

        let mut stats = self.stats.lock();
        stats.events_routed += 1;
        stats.deliveries += delivery_count;
        stats.duplicates_dropped += duplicates;
        stats.observer_failures += failures;
    }

    /// Number of live subscriptions
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Snapshot of the aggregate counters
    pub fn stats(&self) -> RouterStats {
        *self.stats.lock()
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}
