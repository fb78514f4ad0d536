use super::*;
use crate::camera::MockCamera;
use crate::events::{DoorEvent, EventBus, EventFilter};
use crate::transport::{MockTransport, Recipient, TransportAdapter};
use chrono::TimeZone;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    capture_dir: std::path::PathBuf,
    camera: Arc<MockCamera>,
    transport: Arc<MockTransport>,
    event_bus: Arc<EventBus>,
    pipeline: Arc<CapturePipeline>,
}

async fn harness(camera: MockCamera, serialize_access: bool, delivery: DeliveryPolicy) -> Harness {
    let dir = TempDir::new().unwrap();
    let capture_dir = dir.path().join("captures");
    let camera = Arc::new(camera);
    let transport = Arc::new(MockTransport::new());
    let adapter = Arc::new(TransportAdapter::new(transport.clone()));
    adapter.start().await.unwrap();
    adapter.wait_ready(Duration::from_secs(1)).await.unwrap();

    let event_bus = Arc::new(EventBus::new(32));
    let pipeline = Arc::new(CapturePipeline::new(
        camera.clone(),
        adapter,
        &capture_dir,
        serialize_access,
        delivery,
        event_bus.clone(),
    ));
    pipeline.prepare().await.unwrap();

    Harness {
        _dir: dir,
        capture_dir,
        camera,
        transport,
        event_bus,
        pipeline,
    }
}

fn dir_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn test_photo_file_name_format() {
    let created_at = chrono::Utc
        .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
        .unwrap();
    let name = photo_file_name(created_at);
    assert!(name.starts_with("photo_20240309_070501_000_"), "{}", name);
    assert!(name.ends_with(".jpeg"));
    assert_eq!(name.len(), "photo_20240309_070501_000_".len() + 8 + ".jpeg".len());
}

#[test]
fn test_trigger_labels() {
    let trigger = CaptureTrigger::Burst {
        session_id: 4,
        remaining: 1,
    };
    assert_eq!(trigger.to_string(), "burst#4 (1 left)");
    assert_eq!(CaptureTrigger::Command.to_string(), "command");
}

#[tokio::test]
async fn test_successful_run_delivers_and_cleans_up() {
    let h = harness(MockCamera::new(), true, DeliveryPolicy::once()).await;
    let mut events = h.event_bus.subscribe_filtered(EventFilter::All, "test");
    let recipient = Recipient::new("42");

    let outcome = h
        .pipeline
        .run_once(&recipient, CaptureTrigger::Periodic { session_id: 1 })
        .await;

    match &outcome {
        CaptureOutcome::Delivered { photo, attempts } => {
            assert!(photo.starts_with("photo_"));
            assert_eq!(*attempts, 1);
        }
        other => panic!("Expected delivery, got {:?}", other),
    }

    let sent = h.transport.media();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, recipient);
    assert_eq!(sent[0].1.mime_type, "image/jpeg");
    assert!(sent[0].1.caption.as_deref().unwrap().starts_with("Door open at "));

    assert_eq!(dir_entries(&h.capture_dir), 0);
    assert!(matches!(
        events.recv().await.unwrap(),
        DoorEvent::PhotoDelivered { .. }
    ));

    let stats = h.pipeline.stats();
    assert_eq!(stats.attempted, 1);
    assert_eq!(stats.delivered, 1);
}

#[tokio::test]
async fn test_capture_failure_sends_nothing_and_cleans_partial_file() {
    let camera = MockCamera::new();
    camera.fail_next(1);
    let h = harness(camera, true, DeliveryPolicy::once()).await;
    let mut events = h.event_bus.subscribe_filtered(EventFilter::All, "test");

    let outcome = h
        .pipeline
        .run_once(&Recipient::new("42"), CaptureTrigger::Manual)
        .await;

    assert!(matches!(outcome, CaptureOutcome::CaptureFailed { .. }));
    assert!(h.transport.media().is_empty());
    assert_eq!(dir_entries(&h.capture_dir), 0);
    assert!(matches!(
        events.recv().await.unwrap(),
        DoorEvent::CaptureFailed { .. }
    ));
    assert_eq!(h.pipeline.stats().capture_failures, 1);
}

#[tokio::test]
async fn test_delivery_failure_still_removes_artifact() {
    let h = harness(MockCamera::new(), true, DeliveryPolicy::once()).await;
    h.transport.fail_next_sends(1);

    let outcome = h
        .pipeline
        .run_once(&Recipient::new("42"), CaptureTrigger::Command)
        .await;

    assert!(matches!(outcome, CaptureOutcome::DeliveryFailed { .. }));
    assert_eq!(dir_entries(&h.capture_dir), 0);
    assert_eq!(h.pipeline.stats().delivery_failures, 1);
}

#[tokio::test]
async fn test_delivery_retries_when_configured() {
    let policy = DeliveryPolicy {
        max_attempts: 3,
        retry_delay: Duration::from_millis(10),
    };
    let h = harness(MockCamera::new(), true, policy).await;
    h.transport.fail_next_sends(2);

    let outcome = h
        .pipeline
        .run_once(&Recipient::new("42"), CaptureTrigger::Manual)
        .await;

    assert!(matches!(
        outcome,
        CaptureOutcome::Delivered { attempts: 3, .. }
    ));
    assert_eq!(h.transport.media().len(), 1);
    assert_eq!(h.camera.capture_count(), 1);
}

#[tokio::test]
async fn test_serialized_access_never_overlaps_camera() {
    let camera = MockCamera::new().with_delay(Duration::from_millis(30));
    let h = harness(camera, true, DeliveryPolicy::once()).await;
    let recipient = Recipient::new("42");

    let runs: Vec<_> = (0..3)
        .map(|_| {
            let pipeline = h.pipeline.clone();
            let recipient = recipient.clone();
            tokio::spawn(async move { pipeline.run_once(&recipient, CaptureTrigger::Manual).await })
        })
        .collect();
    for run in runs {
        assert!(run.await.unwrap().is_delivered());
    }

    assert_eq!(h.camera.capture_count(), 3);
    assert_eq!(h.camera.max_concurrent(), 1);
    assert_eq!(h.transport.media().len(), 3);
    assert_eq!(dir_entries(&h.capture_dir), 0);
}

#[tokio::test]
async fn test_overlapping_runs_use_distinct_files() {
    let camera = MockCamera::new().with_delay(Duration::from_millis(30));
    let h = harness(camera, false, DeliveryPolicy::once()).await;
    let recipient = Recipient::new("42");

    let first = {
        let pipeline = h.pipeline.clone();
        let recipient = recipient.clone();
        tokio::spawn(async move { pipeline.run_once(&recipient, CaptureTrigger::Manual).await })
    };
    let second = h.pipeline.run_once(&recipient, CaptureTrigger::Command).await;
    assert!(second.is_delivered());
    assert!(first.await.unwrap().is_delivered());

    let targets = h.camera.targets();
    assert_eq!(targets.len(), 2);
    assert_ne!(targets[0], targets[1]);
    assert_eq!(dir_entries(&h.capture_dir), 0);
}

#[tokio::test]
async fn test_prepare_sweeps_leftover_artifacts() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("photo_old_1.jpeg"), b"x").unwrap();
    std::fs::write(dir.path().join("photo_old_2.jpeg"), b"x").unwrap();
    std::fs::write(dir.path().join("keep.txt"), b"x").unwrap();

    assert_eq!(sweep_capture_dir(dir.path()).await.unwrap(), 2);
    assert!(dir.path().join("keep.txt").exists());
}

#[tokio::test]
async fn test_temp_capture_release_tolerates_missing_file() {
    let dir = TempDir::new().unwrap();
    let artifact = TempCapture::new_in(dir.path(), chrono::Utc::now());
    assert!(!artifact.release().await.unwrap());
}
