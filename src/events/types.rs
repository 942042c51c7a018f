use async_trait::async_trait;
use uuid::Uuid;

use crate::models::Capability;
use crate::store::ChangeEvent;

/// Trait for consultation event observers (dashboards, notification banners)
#[async_trait]
pub trait EventObserver: Send + Sync {
    /// Handle one change event
    async fn on_event(&self, event: &ChangeEvent) -> anyhow::Result<()>;

    /// Get observer name for identification in logs
    fn observer_name(&self) -> &str {
        "unnamed_observer"
    }
}

/// What slice of the change feed a subscription wants.
///
/// Admins see everything; farmers see their own records; consultants see
/// records assigned to them plus the unassigned pool, including records
/// leaving the pool so dashboards drop requests someone else just claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest {
    pub observer_id: Uuid,
    pub capability: Capability,
    pub consultation_id: Option<Uuid>,
}

impl Interest {
    pub fn farmer(observer_id: Uuid) -> Self {
        Self {
            observer_id,
            capability: Capability::Farmer,
            consultation_id: None,
        }
    }

    pub fn consultant(observer_id: Uuid) -> Self {
        Self {
            observer_id,
            capability: Capability::Consultant,
            consultation_id: None,
        }
    }

    pub fn admin(observer_id: Uuid) -> Self {
        Self {
            observer_id,
            capability: Capability::Admin,
            consultation_id: None,
        }
    }

    /// Narrow the interest to a single consultation
    pub fn for_consultation(mut self, consultation_id: Uuid) -> Self {
        self.consultation_id = Some(consultation_id);
        self
    }

    /// Check whether an event falls inside this interest
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if let Some(wanted) = self.consultation_id {
            if wanted != event.record.consultation_id {
                return false;
            }
        }

        match self.capability {
            Capability::Admin => true,
            Capability::Farmer => event.record.farmer_id == self.observer_id,
            Capability::Consultant => {
                event.record.expert_id == Some(self.observer_id)
                    || event.record.status.is_open()
                    || event.previous_status.is_some_and(|status| status.is_open())
            }
        }
    }
}

/// Opaque handle returned by `subscribe`, used to tear the subscription down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub(crate) subscription_id: Uuid,
}
