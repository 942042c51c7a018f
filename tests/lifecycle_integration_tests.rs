//! End-to-end lifecycle: a farmer's request raced by two experts, the
//! winner running the session to completion, and the farmer's dashboard
//! observing every transition exactly once and in order.

mod common;

use std::sync::Arc;

use uuid::Uuid;

use agrilink_core::claim::ClaimError;
use agrilink_core::error::AgrilinkError;
use agrilink_core::events::Interest;
use agrilink_core::models::CurrentUser;
use agrilink_core::state_machine::{ConsultationStatus, TransitionError};
use agrilink_core::store::{ChangeKind, ConsultationStore, InMemoryConsultationStore};

use common::{RecordingObserver, ScriptedMediaProvider};

#[tokio::test]
async fn full_lifecycle_with_competing_claims() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryConsultationStore::default());
    let media = ScriptedMediaProvider::new();

    let farmer = CurrentUser::farmer(Uuid::new_v4());
    let expert_a = CurrentUser::consultant(Uuid::new_v4());
    let expert_b = CurrentUser::consultant(Uuid::new_v4());

    let farmer_engine = common::engine_for(farmer, store.clone(), media.clone());
    let engine_a = common::engine_for(expert_a, store.clone(), media.clone());
    let engine_b = common::engine_for(expert_b, store.clone(), media.clone());

    let (dashboard, mut events) = RecordingObserver::channel("farmer_dashboard");
    farmer_engine
        .subscribe(Interest::farmer(farmer.id), dashboard)
        .await;

    let request = farmer_engine.request_consultation("pest", None).await?;
    assert_eq!(request.status, ConsultationStatus::Pending);
    assert_eq!(request.farmer_id, farmer.id);
    let id = request.consultation_id;

    let created = common::recv_event(&mut events).await;
    assert_eq!(created.kind, ChangeKind::Created);
    assert_eq!(created.record.status, ConsultationStatus::Pending);

    // Both experts race for the same request.
    let (result_a, result_b) = tokio::join!(engine_a.claim(id), engine_b.claim(id));
    assert_eq!(
        result_a.is_ok() as usize + result_b.is_ok() as usize,
        1,
        "exactly one claim must win"
    );

    let (winner, winner_engine, claimed) = match result_a {
        Ok(record) => {
            assert_eq!(result_b.unwrap_err(), ClaimError::AlreadyClaimed(id));
            (expert_a, &engine_a, record)
        }
        Err(err_a) => {
            assert_eq!(err_a, ClaimError::AlreadyClaimed(id));
            (expert_b, &engine_b, result_b.unwrap())
        }
    };
    assert_eq!(claimed.status, ConsultationStatus::Scheduled);
    assert_eq!(claimed.expert_id, Some(winner.id));

    let started = winner_engine.start(id).await?;
    assert_eq!(started.status, ConsultationStatus::InProgress);
    assert_eq!(media.acquired_count(), 1);
    assert!(winner_engine.active_session(id).is_some());

    let completed = winner_engine.complete(id, "treated with neem oil").await?;
    assert_eq!(completed.status, ConsultationStatus::Completed);
    assert_eq!(completed.notes.as_deref(), Some("treated with neem oil"));
    assert_eq!(media.released_count(), 1);
    assert!(winner_engine.active_session(id).is_none());

    // The farmer's dashboard sees each transition exactly once, in commit
    // order, with no duplicates.
    let scheduled = common::recv_event(&mut events).await;
    assert_eq!(scheduled.record.status, ConsultationStatus::Scheduled);
    assert_eq!(scheduled.record.expert_id, Some(winner.id));

    let in_progress = common::recv_event(&mut events).await;
    assert_eq!(in_progress.record.status, ConsultationStatus::InProgress);

    let done = common::recv_event(&mut events).await;
    assert_eq!(done.record.status, ConsultationStatus::Completed);
    assert_eq!(done.record.notes.as_deref(), Some("treated with neem oil"));

    common::assert_no_event(&mut events).await;

    let persisted = store.get(id).await?;
    assert!(persisted.invariants_hold());
    assert_eq!(persisted.status, ConsultationStatus::Completed);

    Ok(())
}

#[tokio::test]
async fn cancel_after_completion_is_rejected() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryConsultationStore::default());
    let media = ScriptedMediaProvider::new();

    let farmer = CurrentUser::farmer(Uuid::new_v4());
    let expert = CurrentUser::consultant(Uuid::new_v4());

    let farmer_engine = common::engine_for(farmer, store.clone(), media.clone());
    let expert_engine = common::engine_for(expert, store.clone(), media.clone());

    let request = farmer_engine
        .request_consultation("blossom end rot", None)
        .await?;
    let id = request.consultation_id;

    expert_engine.claim(id).await?;
    expert_engine.start(id).await?;
    expert_engine.complete(id, "calcium deficiency; adjust watering").await?;

    let before = store.get(id).await?;
    let err = farmer_engine.cancel(id, "changed my mind").await.unwrap_err();
    assert!(matches!(
        err,
        AgrilinkError::Transition(TransitionError::InvalidTransition {
            from: ConsultationStatus::Completed,
            to: ConsultationStatus::Cancelled,
        })
    ));

    // Rejection leaves the record untouched.
    let after = store.get(id).await?;
    assert_eq!(after, before);

    Ok(())
}

#[tokio::test]
async fn notifications_skip_the_actor_and_reach_the_other_party() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryConsultationStore::default());
    let media = ScriptedMediaProvider::new();

    let farmer = CurrentUser::farmer(Uuid::new_v4());
    let expert = CurrentUser::consultant(Uuid::new_v4());

    let farmer_engine = common::engine_for(farmer, store.clone(), media.clone());
    let expert_engine = common::engine_for(expert, store.clone(), media.clone());

    let (farmer_banner, mut farmer_rx) = RecordingObserver::channel("farmer_banner");
    farmer_engine
        .subscribe_notifications(Interest::farmer(farmer.id), farmer_banner)
        .await;

    let (expert_banner, mut expert_rx) = RecordingObserver::channel("expert_banner");
    expert_engine
        .subscribe_notifications(Interest::consultant(expert.id), expert_banner)
        .await;

    let request = farmer_engine.request_consultation("whiteflies", None).await?;
    let id = request.consultation_id;

    // The pool hears about the new request; the requester does not get a
    // banner for their own action.
    let pool_notice = common::recv_event(&mut expert_rx).await;
    assert_eq!(pool_notice.record.consultation_id, id);
    common::assert_no_event(&mut farmer_rx).await;

    expert_engine.claim(id).await?;

    // Assignment notifies the farmer; the claiming expert caused it and
    // hears nothing.
    let assigned_notice = common::recv_event(&mut farmer_rx).await;
    assert_eq!(assigned_notice.record.status, ConsultationStatus::Scheduled);
    common::assert_no_event(&mut expert_rx).await;

    Ok(())
}
