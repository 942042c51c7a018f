//! Capability guards for consultation transitions.
//!
//! Each guard checks one transition's actor rules and returns
//! `TransitionError::NotPermitted` when the acting user may not perform it.
//! Guards are pure: the state machine performs no I/O.

use uuid::Uuid;

use super::errors::{TransitionError, TransitionResult};
use super::events::ConsultationEvent;
use super::states::ConsultationStatus;
use crate::models::{Capability, Consultation, CurrentUser};

/// Check the actor rules for a transition that has already been validated
/// against the transition table.
pub fn check(
    record: &Consultation,
    event: &ConsultationEvent,
    actor: &CurrentUser,
) -> TransitionResult<()> {
    match (record.status, event) {
        (ConsultationStatus::Pending, ConsultationEvent::Claim { expert_id }) => {
            claim_permitted(*expert_id, actor)
        }
        (ConsultationStatus::Pending, ConsultationEvent::Cancel { .. }) => {
            cancel_pending_permitted(record, actor)
        }
        (ConsultationStatus::Scheduled, ConsultationEvent::Start) => start_permitted(record, actor),
        (ConsultationStatus::Scheduled, ConsultationEvent::Cancel { .. }) => {
            cancel_scheduled_permitted(record, actor)
        }
        (ConsultationStatus::InProgress, ConsultationEvent::Complete { .. }) => {
            complete_permitted(record, actor)
        }
        (ConsultationStatus::InProgress, ConsultationEvent::Cancel { .. }) => {
            cancel_in_progress_permitted(actor)
        }
        _ => Ok(()),
    }
}

/// Experts claim for themselves; nobody assigns on another expert's behalf.
fn claim_permitted(expert_id: Uuid, actor: &CurrentUser) -> TransitionResult<()> {
    if actor.capability == Capability::Consultant && actor.id == expert_id {
        Ok(())
    } else {
        Err(not_permitted(actor, "claim"))
    }
}

/// Before assignment, only the requester or an admin may cancel.
fn cancel_pending_permitted(record: &Consultation, actor: &CurrentUser) -> TransitionResult<()> {
    if actor.id == record.farmer_id || actor.capability == Capability::Admin {
        Ok(())
    } else {
        Err(not_permitted(actor, "cancel"))
    }
}

/// The assigned expert or the farmer starts the session.
fn start_permitted(record: &Consultation, actor: &CurrentUser) -> TransitionResult<()> {
    if actor.id == record.farmer_id || record.expert_id == Some(actor.id) {
        Ok(())
    } else {
        Err(not_permitted(actor, "start"))
    }
}

/// After assignment, either party or an admin may cancel before start.
fn cancel_scheduled_permitted(record: &Consultation, actor: &CurrentUser) -> TransitionResult<()> {
    if actor.id == record.farmer_id
        || record.expert_id == Some(actor.id)
        || actor.capability == Capability::Admin
    {
        Ok(())
    } else {
        Err(not_permitted(actor, "cancel"))
    }
}

/// The assigned expert ends the session; admins may close it out.
fn complete_permitted(record: &Consultation, actor: &CurrentUser) -> TransitionResult<()> {
    if record.expert_id == Some(actor.id) || actor.capability == Capability::Admin {
        Ok(())
    } else {
        Err(not_permitted(actor, "complete"))
    }
}

/// Abnormal termination of a running session is an admin override
/// (the disconnect-timeout path acts through the system identity).
fn cancel_in_progress_permitted(actor: &CurrentUser) -> TransitionResult<()> {
    if actor.capability == Capability::Admin {
        Ok(())
    } else {
        Err(not_permitted(actor, "cancel"))
    }
}

fn not_permitted(actor: &CurrentUser, action: &'static str) -> TransitionError {
    TransitionError::NotPermitted {
        actor: actor.id,
        capability: actor.capability,
        action,
    }
}
