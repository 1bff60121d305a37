//! Integration tests for single-image and pack sessions
//!
//! Tests cover:
//! - Partial pack failure after exhausted retries
//! - Cancellation between jobs
//! - A new session cancelling the running one
//! - Rate governor rejection
//! - Credential rejection and the re-authentication hook
//! - Streams that deliver fewer or out-of-range images
//! - Empty streams and transient errors reported through the stream
//! - Cancellation during a retry backoff

use crate::integration::support::{
    product_inputs, RecordingObserver, RecordingStore, ScriptedBackend,
};
use shotforge::config::PlanConfig;
use shotforge::inputs::SessionInputs;
use shotforge::orchestrator::{GenerateRequest, GenerationMode, JobOrchestrator};
use shotforge::pack::{AspectRatio, Catalog, ModelShot, PackKind, ShotTier};
use shotforge::persistence::PersistenceSidecar;
use shotforge::retry::RetryPolicy;
use shotforge::{SessionStatus, StudioError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn unlimited() -> PlanConfig {
    PlanConfig {
        requests_per_minute: 0,
        daily_limit: 100,
    }
}

fn orchestrator(backend: &Arc<ScriptedBackend>) -> JobOrchestrator {
    JobOrchestrator::new(backend.clone())
        .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(100)))
        .with_plan(unlimited())
}

fn pack(kind: PackKind) -> GenerateRequest {
    GenerateRequest::new(GenerationMode::Pack(kind), product_inputs())
}

fn five_shot_catalog() -> Catalog {
    let mut catalog = Catalog::builtin();
    catalog.model_shots.insert(
        4,
        ModelShot {
            id: "belt_detail".to_string(),
            label: "Belt detail".to_string(),
            tier: ShotTier::Essential,
            shot_type: "waist close-up".to_string(),
            expression: "neutral".to_string(),
            camera_angle: "eye level".to_string(),
        },
    );
    catalog
}

#[tokio::test(start_paused = true)]
async fn test_pack_continues_past_job_that_exhausts_retries() {
    let backend = Arc::new(ScriptedBackend::with_image_rule(|call, request| {
        if request.payload.text().contains("three-quarter body side profile") {
            return Err(StudioError::ServiceUnavailable("model overloaded".into()));
        }
        Ok(vec![Ok((0, crate::integration::support::png(call as u8)))])
    }));
    let store = Arc::new(RecordingStore::default());
    let (sidecar, _worker) = PersistenceSidecar::spawn(store.clone(), 16);
    let orchestrator = orchestrator(&backend)
        .with_catalog(five_shot_catalog())
        .with_sidecar(sidecar.clone());
    let observer = RecordingObserver::new();

    let handle = orchestrator
        .generate(pack(PackKind::Essential), observer.clone())
        .unwrap();
    let snapshot = handle.wait().await;
    sidecar.flush().await;

    assert_eq!(snapshot.status, SessionStatus::Done);
    assert_eq!(snapshot.result_slots.len(), 5);
    assert_eq!(snapshot.filled_count(), 4);
    assert!(snapshot.result_slots[2].is_none());
    assert_eq!(snapshot.progress_message, "Done: 4/5 generated");
    assert_eq!(observer.completed(), vec![4]);
    assert_eq!(observer.filled(), vec![0, 1, 3, 4]);
    // four clean jobs plus three attempts at the failing one
    assert_eq!(backend.image_calls(), 7);

    let saved = store.saved();
    assert_eq!(saved.len(), 4);
    assert!(saved.iter().all(|(user, _, _)| user == "user-1"));
    assert!(saved.iter().any(|(_, _, description)| description == "Belt detail"));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_jobs_keeps_filled_prefix() {
    let backend = Arc::new(ScriptedBackend::images_ok());
    let store = Arc::new(RecordingStore::default());
    let (sidecar, _worker) = PersistenceSidecar::spawn(store.clone(), 16);
    let orchestrator = orchestrator(&backend).with_sidecar(sidecar.clone());
    let observer = RecordingObserver::new();

    let handle = orchestrator
        .generate(pack(PackKind::Essential), observer.clone())
        .unwrap();
    observer.cancel_after(1, handle.token());
    let snapshot = handle.wait().await;
    sidecar.flush().await;

    assert_eq!(snapshot.status, SessionStatus::Cancelled);
    assert!(snapshot.result_slots[0].is_some());
    assert!(snapshot.result_slots[1].is_some());
    assert!(snapshot.result_slots[2].is_none());
    assert!(snapshot.result_slots[3].is_none());
    assert_eq!(backend.image_calls(), 2);
    assert!(observer.completed().is_empty());
    assert!(store.saved().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_new_session_cancels_running_session() {
    let backend = Arc::new(ScriptedBackend::images_ok().with_image_delay(Duration::from_secs(5)));
    let orchestrator = orchestrator(&backend);
    let first_observer = RecordingObserver::new();
    let second_observer = RecordingObserver::new();

    let first = orchestrator
        .generate(pack(PackKind::Essential), first_observer.clone())
        .unwrap();
    // let the first session get into its first backend call
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(first.status(), SessionStatus::Running);

    let second = orchestrator
        .generate(
            GenerateRequest::new(GenerationMode::Single, product_inputs()),
            second_observer.clone(),
        )
        .unwrap();
    assert!(first.token().is_cancelled());
    assert!(!second.token().is_cancelled());
    assert_ne!(first.session_id(), second.session_id());

    let first_snapshot = first.wait().await;
    let second_snapshot = second.wait().await;

    assert_eq!(first_snapshot.status, SessionStatus::Cancelled);
    assert_eq!(first_snapshot.filled_count(), 0);
    assert!(first_observer.completed().is_empty());
    assert_eq!(second_snapshot.status, SessionStatus::Done);
    assert_eq!(second_observer.completed(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_rate_governor_rejects_over_limit_session() {
    let backend = Arc::new(ScriptedBackend::images_ok());
    let orchestrator = orchestrator(&backend).with_plan(PlanConfig {
        requests_per_minute: 2,
        daily_limit: 100,
    });
    let single = || GenerateRequest::new(GenerationMode::Single, product_inputs());

    orchestrator.generate(single(), RecordingObserver::new()).unwrap();
    let second = orchestrator.generate(single(), RecordingObserver::new()).unwrap();
    let rejected_observer = RecordingObserver::new();
    let rejected = orchestrator
        .generate(single(), rejected_observer.clone())
        .unwrap();

    let snapshot = rejected.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Errored);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("Rate limit reached: at most 2 requests per minute")
    );
    assert!(snapshot.result_slots.is_empty());
    assert_eq!(rejected.wait().await.status, SessionStatus::Errored);
    assert!(rejected_observer.completed().is_empty());

    // the window is shared with the earlier sessions; the second was cancelled by the third
    assert_eq!(second.wait().await.status, SessionStatus::Cancelled);

    tokio::time::advance(Duration::from_secs(61)).await;
    let admitted = orchestrator.generate(single(), RecordingObserver::new()).unwrap();
    assert_eq!(admitted.wait().await.status, SessionStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_ends_pack_and_requests_reauth() {
    let backend = Arc::new(ScriptedBackend::with_image_rule(|_, _| {
        Err(StudioError::AuthFailed("API key not valid".into()))
    }));
    let orchestrator = orchestrator(&backend);
    let observer = RecordingObserver::new();

    let handle = orchestrator
        .generate(pack(PackKind::Plus), observer.clone())
        .unwrap();
    let snapshot = handle.wait().await;

    assert_eq!(snapshot.status, SessionStatus::Errored);
    assert_eq!(snapshot.filled_count(), 0);
    assert_eq!(backend.image_calls(), 1);
    assert_eq!(observer.reauth().len(), 1);
    assert!(observer.reauth()[0].contains("API key not valid"));
    assert!(observer.completed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_job_is_not_retried_and_pack_continues() {
    let backend = Arc::new(ScriptedBackend::with_image_rule(|call, _| {
        if call == 0 {
            return Err(StudioError::Rejected("blocked by safety filter".into()));
        }
        Ok(vec![Ok((0, crate::integration::support::png(call as u8)))])
    }));
    let orchestrator = orchestrator(&backend);
    let observer = RecordingObserver::new();

    let snapshot = orchestrator
        .generate(pack(PackKind::Essential), observer.clone())
        .unwrap()
        .wait()
        .await;

    assert_eq!(snapshot.status, SessionStatus::Done);
    assert!(snapshot.result_slots[0].is_none());
    assert_eq!(snapshot.filled_count(), 3);
    assert_eq!(backend.image_calls(), 4);
    assert_eq!(observer.completed(), vec![3]);
}

#[tokio::test(start_paused = true)]
async fn test_pack_where_every_job_fails_is_errored() {
    let backend = Arc::new(ScriptedBackend::with_image_rule(|_, _| {
        Err(StudioError::Rejected("unsupported garment".into()))
    }));
    let orchestrator = orchestrator(&backend);
    let observer = RecordingObserver::new();

    let snapshot = orchestrator
        .generate(pack(PackKind::Essential), observer.clone())
        .unwrap()
        .wait()
        .await;

    assert_eq!(snapshot.status, SessionStatus::Errored);
    assert!(snapshot.error.unwrap().contains("unsupported garment"));
    assert!(observer.completed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_single_mode_tolerates_short_and_out_of_range_streams() {
    let backend = Arc::new(ScriptedBackend::with_image_rule(|_, request| {
        assert_eq!(request.count, 3);
        Ok(vec![
            Ok((0, crate::integration::support::png(1))),
            Ok((7, crate::integration::support::png(7))),
            Ok((2, crate::integration::support::png(2))),
        ])
    }));
    let orchestrator = orchestrator(&backend);
    let observer = RecordingObserver::new();
    let inputs = product_inputs().with_number_of_images(3);

    let snapshot = orchestrator
        .generate(GenerateRequest::new(GenerationMode::Single, inputs), observer.clone())
        .unwrap()
        .wait()
        .await;

    assert_eq!(snapshot.status, SessionStatus::Done);
    assert_eq!(snapshot.result_slots.len(), 3);
    assert!(snapshot.result_slots[1].is_none());
    assert_eq!(observer.filled(), vec![0, 2]);
    assert_eq!(observer.completed(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_stream_error_after_images_keeps_them() {
    let backend = Arc::new(ScriptedBackend::with_image_rule(|_, _| {
        Ok(vec![
            Ok((0, crate::integration::support::png(1))),
            Err(StudioError::ServiceUnavailable("connection reset".into())),
        ])
    }));
    let orchestrator = orchestrator(&backend);
    let observer = RecordingObserver::new();
    let inputs = product_inputs().with_number_of_images(2);

    let snapshot = orchestrator
        .generate(GenerateRequest::new(GenerationMode::Single, inputs), observer.clone())
        .unwrap()
        .wait()
        .await;

    assert_eq!(snapshot.status, SessionStatus::Done);
    assert_eq!(snapshot.filled_count(), 1);
    assert_eq!(observer.completed(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_social_pack_requests_carry_per_job_ratio() {
    let backend = Arc::new(ScriptedBackend::images_ok());
    let orchestrator = orchestrator(&backend);

    let snapshot = orchestrator
        .generate(pack(PackKind::Social), RecordingObserver::new())
        .unwrap()
        .wait()
        .await;

    assert_eq!(snapshot.status, SessionStatus::Done);
    let ratios: Vec<AspectRatio> = backend
        .image_requests()
        .iter()
        .map(|request| request.aspect_ratio)
        .collect();
    assert_eq!(ratios.len(), 6);
    for pair in ratios.chunks(2) {
        assert_eq!(pair, [AspectRatio::Square, AspectRatio::Vertical]);
    }
    assert!(backend.image_requests()[1]
        .payload
        .text()
        .contains("Aspect ratio: 9:16"));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_inputs_fail_without_touching_running_session() {
    let backend = Arc::new(ScriptedBackend::images_ok().with_image_delay(Duration::from_secs(5)));
    let orchestrator = orchestrator(&backend);

    let running = orchestrator
        .generate(pack(PackKind::Essential), RecordingObserver::new())
        .unwrap();
    let result = orchestrator.generate(
        GenerateRequest::new(
            GenerationMode::Pack(PackKind::Essential),
            SessionInputs::new("user-1"),
        ),
        RecordingObserver::new(),
    );

    assert!(matches!(result, Err(StudioError::Validation(_))));
    assert!(!running.token().is_cancelled());
    assert_eq!(running.wait().await.status, SessionStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn test_orchestrator_cancel_stops_active_session() {
    let backend = Arc::new(ScriptedBackend::images_ok().with_image_delay(Duration::from_secs(5)));
    let orchestrator = orchestrator(&backend);

    let handle = orchestrator
        .generate(pack(PackKind::Plus), RecordingObserver::new())
        .unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;
    orchestrator.cancel();

    let snapshot = handle.wait().await;
    assert_eq!(snapshot.status, SessionStatus::Cancelled);
    assert!(snapshot.filled_count() >= 1);
    assert!(snapshot.filled_count() < snapshot.result_slots.len());
}

#[tokio::test(start_paused = true)]
async fn test_job_with_empty_stream_does_not_abort_pack() {
    let backend = Arc::new(ScriptedBackend::with_image_rule(|call, request| {
        if request.payload.text().contains("three-quarter body side profile") {
            return Ok(vec![]);
        }
        Ok(vec![Ok((0, crate::integration::support::png(call as u8)))])
    }));
    let store = Arc::new(RecordingStore::default());
    let (sidecar, _worker) = PersistenceSidecar::spawn(store.clone(), 16);
    let orchestrator = orchestrator(&backend).with_sidecar(sidecar.clone());
    let observer = RecordingObserver::new();

    let snapshot = orchestrator
        .generate(pack(PackKind::Essential), observer.clone())
        .unwrap()
        .wait()
        .await;
    sidecar.flush().await;

    assert_eq!(snapshot.status, SessionStatus::Done);
    assert!(snapshot.result_slots[2].is_none());
    assert_eq!(snapshot.filled_count(), 3);
    assert_eq!(snapshot.progress_message, "Done: 3/4 generated");
    assert_eq!(observer.completed(), vec![3]);
    // an empty answer is not retried
    assert_eq!(backend.image_calls(), 4);
    assert_eq!(store.saved().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_single_mode_with_empty_stream_is_errored() {
    let backend = Arc::new(ScriptedBackend::with_image_rule(|_, _| Ok(vec![])));
    let orchestrator = orchestrator(&backend);
    let observer = RecordingObserver::new();

    let snapshot = orchestrator
        .generate(
            GenerateRequest::new(GenerationMode::Single, product_inputs()),
            observer.clone(),
        )
        .unwrap()
        .wait()
        .await;

    assert_eq!(snapshot.status, SessionStatus::Errored);
    assert!(snapshot.error.unwrap().starts_with("No images returned"));
    assert!(observer.completed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transient_error_as_first_stream_item_is_retried() {
    let backend = Arc::new(ScriptedBackend::with_image_rule(|call, _| {
        if call == 0 {
            return Ok(vec![Err(StudioError::ServiceUnavailable("overloaded".into()))]);
        }
        Ok(vec![Ok((0, crate::integration::support::png(call as u8)))])
    }));
    let orchestrator = orchestrator(&backend);
    let observer = RecordingObserver::new();

    let snapshot = orchestrator
        .generate(
            GenerateRequest::new(GenerationMode::Single, product_inputs()),
            observer.clone(),
        )
        .unwrap()
        .wait()
        .await;

    assert_eq!(snapshot.status, SessionStatus::Done);
    assert_eq!(backend.image_calls(), 2);
    assert_eq!(observer.filled(), vec![0]);
    assert_eq!(observer.completed(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_retry_backoff_returns_promptly() {
    let backend = Arc::new(ScriptedBackend::with_image_rule(|_, _| {
        Err(StudioError::ServiceUnavailable("overloaded".into()))
    }));
    let orchestrator = JobOrchestrator::new(backend.clone())
        .with_retry_policy(RetryPolicy::new(3, Duration::from_secs(8)))
        .with_plan(unlimited());
    let observer = RecordingObserver::new();

    let started = Instant::now();
    let handle = orchestrator
        .generate(pack(PackKind::Essential), observer.clone())
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.cancel();
    let snapshot = handle.wait().await;

    assert_eq!(snapshot.status, SessionStatus::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(backend.image_calls(), 1);
    assert!(observer.completed().is_empty());
}
