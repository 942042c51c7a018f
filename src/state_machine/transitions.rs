//! Pure transition logic for the consultation lifecycle.
//!
//! `apply` is the single source of truth for which transitions are legal. It
//! takes the current record, a requested event, and the acting user, and
//! either returns the post-transition record or a typed rejection. It
//! performs no I/O; persistence and fan-out happen at the store boundary.
//!
//! Transition table:
//!
//! | From         | Event    | To          |
//! |--------------|----------|-------------|
//! | pending      | claim    | scheduled   |
//! | pending      | cancel   | cancelled   |
//! | scheduled    | start    | in_progress |
//! | scheduled    | cancel   | cancelled   |
//! | in_progress  | complete | completed   |
//! | in_progress  | cancel   | cancelled   |
//!
//! A request whose target equals the current status is a no-op success, so
//! duplicate submissions and retries are harmless. No event targets
//! `pending`: once assigned, a consultation can only run to completion or be
//! cancelled, never re-open to the pool.

use chrono::Utc;

use super::errors::{TransitionError, TransitionResult};
use super::events::ConsultationEvent;
use super::guards;
use super::states::ConsultationStatus;
use crate::models::{Consultation, CurrentUser};

/// Validate and apply a transition, returning the new record.
///
/// On rejection the input record is untouched; callers may retry with a
/// fresh read or surface the error as-is.
pub fn apply(
    current: &Consultation,
    event: &ConsultationEvent,
    actor: &CurrentUser,
) -> TransitionResult<Consultation> {
    let target = event.target_status();

    if target == current.status {
        // Retry tolerance, except that a claim retry must belong to the
        // expert already holding the assignment.
        if let ConsultationEvent::Claim { expert_id } = event {
            if current.expert_id != Some(*expert_id) {
                return Err(TransitionError::AssignmentLocked {
                    consultation_id: current.consultation_id,
                });
            }
        }
        return Ok(current.clone());
    }

    ensure_reachable(current.status, target)?;
    guards::check(current, event, actor)?;

    let mut next = current.clone();
    match event {
        ConsultationEvent::Claim { expert_id } => {
            next.expert_id = Some(*expert_id);
        }
        ConsultationEvent::Start => {}
        ConsultationEvent::Complete { notes } => {
            if notes.is_some() {
                next.notes = notes.clone();
            }
        }
        ConsultationEvent::Cancel { reason } => {
            next.cancel_reason = reason.clone();
        }
    }
    next.status = target;
    next.version = current.version + 1;
    next.updated_at = Utc::now();

    Ok(next)
}

/// The transition table. Everything not listed is rejected.
fn ensure_reachable(from: ConsultationStatus, to: ConsultationStatus) -> TransitionResult<()> {
    use ConsultationStatus::*;

    let legal = matches!(
        (from, to),
        (Pending, Scheduled)
            | (Pending, Cancelled)
            | (Scheduled, InProgress)
            | (Scheduled, Cancelled)
            | (InProgress, Completed)
            | (InProgress, Cancelled)
    );

    if legal {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition { from, to })
    }
}
