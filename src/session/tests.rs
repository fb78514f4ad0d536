use super::*;
use crate::capture::{CaptureOutcome, CaptureRunner, CaptureTrigger};
use crate::events::{DoorEvent, EventBus, EventFilter};
use crate::sensor::SensorState;
use crate::transport::Recipient;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{sleep, Instant};

/// Records every pipeline invocation with the (paused) time it happened
struct RecordingRunner {
    start: Instant,
    calls: Mutex<Vec<(CaptureTrigger, Recipient, Duration)>>,
}

impl RecordingRunner {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn triggers(&self) -> Vec<CaptureTrigger> {
        self.calls.lock().iter().map(|(t, _, _)| *t).collect()
    }

    fn offsets_secs(&self) -> Vec<u64> {
        self.calls.lock().iter().map(|(_, _, at)| at.as_secs()).collect()
    }
}

#[async_trait]
impl CaptureRunner for RecordingRunner {
    async fn run_once(&self, recipient: &Recipient, trigger: CaptureTrigger) -> CaptureOutcome {
        self.calls
            .lock()
            .push((trigger, recipient.clone(), self.start.elapsed()));
        CaptureOutcome::Delivered {
            photo: "photo_test.jpeg".to_string(),
            attempts: 1,
        }
    }
}

fn policy(burst_count: u32) -> SessionPolicy {
    SessionPolicy {
        periodic_interval: Duration::from_secs(10),
        burst_count,
        burst_interval: Duration::from_secs(5),
        capture_on_open: false,
    }
}

fn manager_with(
    policy: SessionPolicy,
) -> (Arc<SessionManager>, Arc<RecordingRunner>, Arc<EventBus>) {
    let runner = RecordingRunner::new();
    let event_bus = Arc::new(EventBus::new(64));
    let manager = Arc::new(SessionManager::new(
        policy,
        Recipient::new("owner"),
        runner.clone(),
        event_bus.clone(),
    ));
    (manager, runner, event_bus)
}

#[tokio::test(start_paused = true)]
async fn test_periodic_captures_while_open() {
    let (manager, runner, _bus) = manager_with(policy(2));

    manager.handle_edge(SensorState::Open);
    assert_eq!(manager.phase(), SessionPhase::Open);
    assert_eq!(manager.snapshot().active_timer, Some(TimerKind::Periodic));

    sleep(Duration::from_millis(35_000)).await;

    assert_eq!(runner.offsets_secs(), vec![10, 20, 30]);
    assert!(runner
        .triggers()
        .iter()
        .all(|t| *t == CaptureTrigger::Periodic { session_id: 1 }));
    assert!(runner
        .calls
        .lock()
        .iter()
        .all(|(_, recipient, _)| recipient.as_str() == "owner"));
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_periodic_and_runs_burst() {
    let (manager, runner, _bus) = manager_with(policy(2));

    manager.handle_edge(SensorState::Open);
    sleep(Duration::from_millis(25_000)).await;
    manager.handle_edge(SensorState::Closed);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::ClosingBurst);
    assert_eq!(snapshot.active_timer, Some(TimerKind::Burst));
    assert_eq!(snapshot.burst_remaining, 2);

    sleep(Duration::from_secs(60)).await;

    assert_eq!(runner.offsets_secs(), vec![10, 20, 30, 35]);
    assert_eq!(
        runner.triggers()[2..],
        [
            CaptureTrigger::Burst {
                session_id: 1,
                remaining: 1
            },
            CaptureTrigger::Burst {
                session_id: 1,
                remaining: 0
            },
        ]
    );
    assert_eq!(manager.phase(), SessionPhase::Idle);
    assert_eq!(manager.snapshot().session_id, None);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_session_after_burst_gets_fresh_budget() {
    let (manager, runner, _bus) = manager_with(policy(2));

    manager.handle_edge(SensorState::Open);
    manager.handle_edge(SensorState::Closed);
    sleep(Duration::from_secs(12)).await;
    assert_eq!(manager.phase(), SessionPhase::Idle);

    manager.handle_edge(SensorState::Open);
    assert_eq!(manager.snapshot().session_id, Some(2));
    manager.handle_edge(SensorState::Closed);
    sleep(Duration::from_secs(12)).await;

    let bursts: Vec<_> = runner
        .triggers()
        .into_iter()
        .filter(|t| matches!(t, CaptureTrigger::Burst { session_id: 2, .. }))
        .collect();
    assert_eq!(bursts.len(), 2);
    assert_eq!(manager.phase(), SessionPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_zero_burst_returns_to_idle_immediately() {
    let (manager, runner, bus) = manager_with(policy(0));
    let mut events = bus.subscribe_filtered(EventFilter::All, "test");

    manager.handle_edge(SensorState::Open);
    manager.handle_edge(SensorState::Closed);

    assert_eq!(manager.phase(), SessionPhase::Idle);
    assert_eq!(manager.snapshot().active_timer, None);

    sleep(Duration::from_secs(60)).await;
    assert!(runner.triggers().is_empty());

    assert!(matches!(
        events.recv().await.unwrap(),
        DoorEvent::SessionStarted { session_id: 1 }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        DoorEvent::SessionRetired { session_id: 1 }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reopen_during_burst_cancels_burst() {
    let (manager, runner, _bus) = manager_with(policy(2));

    manager.handle_edge(SensorState::Open);
    sleep(Duration::from_secs(1)).await;
    manager.handle_edge(SensorState::Closed);
    // First burst tick at t=6
    sleep(Duration::from_secs(6)).await;
    manager.handle_edge(SensorState::Open);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.phase, SessionPhase::Open);
    assert_eq!(snapshot.session_id, Some(2));
    assert_eq!(snapshot.active_timer, Some(TimerKind::Periodic));

    // The old burst would have fired at t=11; the new periodic fires at t=17
    sleep(Duration::from_millis(10_500)).await;

    assert_eq!(
        runner.triggers(),
        vec![
            CaptureTrigger::Burst {
                session_id: 1,
                remaining: 1
            },
            CaptureTrigger::Periodic { session_id: 2 },
        ]
    );
    assert_eq!(runner.offsets_secs(), vec![6, 17]);
}

#[tokio::test(start_paused = true)]
async fn test_redundant_edges_are_no_ops() {
    let (manager, runner, _bus) = manager_with(policy(2));

    manager.handle_edge(SensorState::Closed);
    assert_eq!(manager.phase(), SessionPhase::Idle);

    manager.handle_edge(SensorState::Open);
    manager.handle_edge(SensorState::Open);
    manager.handle_edge(SensorState::Unknown);
    assert_eq!(manager.snapshot().session_id, Some(1));

    sleep(Duration::from_millis(10_500)).await;
    assert_eq!(runner.triggers().len(), 1);

    manager.handle_edge(SensorState::Closed);
    manager.handle_edge(SensorState::Closed);
    assert_eq!(manager.snapshot().burst_remaining, 2);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(runner.triggers().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_capture_on_open_fires_immediately() {
    let mut policy = policy(0);
    policy.capture_on_open = true;
    let (manager, runner, _bus) = manager_with(policy);

    manager.handle_edge(SensorState::Open);
    sleep(Duration::from_millis(10)).await;

    assert_eq!(
        runner.triggers(),
        vec![CaptureTrigger::OnOpen { session_id: 1 }]
    );
    assert_eq!(runner.offsets_secs(), vec![0]);
}

#[tokio::test(start_paused = true)]
async fn test_listener_consumes_door_edges() {
    let (manager, runner, bus) = manager_with(policy(2));
    let listener = manager.clone().listen();

    bus.publish(DoorEvent::DoorEdge {
        state: SensorState::Open,
        timestamp: SystemTime::now(),
    })
    .unwrap();
    sleep(Duration::from_millis(10_500)).await;

    assert_eq!(manager.phase(), SessionPhase::Open);
    assert_eq!(runner.triggers().len(), 1);

    manager.shutdown();
    listener.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_timers() {
    let (manager, runner, _bus) = manager_with(policy(2));

    manager.handle_edge(SensorState::Open);
    sleep(Duration::from_millis(10_500)).await;
    manager.shutdown();

    assert_eq!(manager.phase(), SessionPhase::Idle);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(runner.triggers().len(), 1);

    // Edges after shutdown start nothing
    manager.handle_edge(SensorState::Open);
    assert_eq!(manager.phase(), SessionPhase::Idle);
}
