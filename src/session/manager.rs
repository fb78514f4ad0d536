use super::types::{
    CaptureSession, SessionPhase, SessionPolicy, SessionSnapshot, TimerHandle, TimerKind,
};
use crate::capture::{CaptureRunner, CaptureTrigger};
use crate::error::EventBusError;
use crate::events::{DoorEvent, EventBus, EventFilter};
use crate::sensor::SensorState;
use crate::transport::Recipient;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct SessionState {
    phase: SessionPhase,
    session: Option<CaptureSession>,
    next_session_id: u64,
}

/// Drives capture sessions from door edges.
///
/// `Idle -> Open` on an open edge starts a session with a periodic timer;
/// `Open -> ClosingBurst` on a close edge swaps that timer for the post-close
/// burst; the burst running out returns to `Idle`. A session owns at most one
/// timer at a time and every transition cancels the old timer before creating
/// a new one. Cancelling a timer stops future ticks only: captures already
/// running are left to finish.
pub struct SessionManager {
    policy: SessionPolicy,
    recipient: Recipient,
    runner: Arc<dyn CaptureRunner>,
    event_bus: Arc<EventBus>,
    state: Mutex<SessionState>,
    cancellation_token: CancellationToken,
}

impl SessionManager {
    pub fn new(
        policy: SessionPolicy,
        recipient: Recipient,
        runner: Arc<dyn CaptureRunner>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            policy,
            recipient,
            runner,
            event_bus,
            state: Mutex::new(SessionState {
                phase: SessionPhase::Idle,
                session: None,
                next_session_id: 1,
            }),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.lock().phase
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            phase: state.phase,
            session_id: state.session.as_ref().map(|s| s.id),
            started_at: state.session.as_ref().map(|s| s.started_at),
            active_timer: state.session.as_ref().and_then(|s| s.timer_kind()),
            burst_remaining: state
                .session
                .as_ref()
                .map(|s| s.post_close_burst_remaining)
                .unwrap_or(0),
        }
    }

    /// Apply one sensor edge to the state machine
    pub fn handle_edge(self: &Arc<Self>, edge: SensorState) {
        if self.cancellation_token.is_cancelled() {
            debug!("Session manager stopped, ignoring door {}", edge);
            return;
        }

        let mut state = self.state.lock();
        match (state.phase, edge) {
            (SessionPhase::Idle, SensorState::Open) => self.open_session(&mut state),
            (SessionPhase::ClosingBurst, SensorState::Open) => {
                if let Some(mut session) = state.session.take() {
                    info!(
                        "Door re-opened during burst of session {}, dropping {} remaining photo(s)",
                        session.id, session.post_close_burst_remaining
                    );
                    session.clear_timer();
                    self.retire(session);
                }
                self.open_session(&mut state);
            }
            (SessionPhase::Open, SensorState::Closed) => self.close_session(&mut state),
            (phase, edge) => {
                debug!("Door {} while {}: no transition", edge, phase);
            }
        }
    }

    fn open_session(self: &Arc<Self>, state: &mut SessionState) {
        let id = state.next_session_id;
        state.next_session_id += 1;

        let mut session = CaptureSession::new(id);
        let token = self.cancellation_token.child_token();
        self.spawn_timer(id, TimerKind::Periodic, self.policy.periodic_interval, token.clone());
        session.timer = Some(TimerHandle {
            kind: TimerKind::Periodic,
            token,
        });

        info!(
            "Session {} started, capturing every {:?} while open",
            id, self.policy.periodic_interval
        );
        state.session = Some(session);
        state.phase = SessionPhase::Open;
        self.publish(DoorEvent::SessionStarted { session_id: id });

        if self.policy.capture_on_open {
            self.spawn_capture(CaptureTrigger::OnOpen { session_id: id });
        }
    }

    fn close_session(self: &Arc<Self>, state: &mut SessionState) {
        if self.policy.burst_count == 0 {
            if let Some(mut session) = state.session.take() {
                session.clear_timer();
                info!("Session {} closed, no post-close photos owed", session.id);
                self.retire(session);
            }
            state.phase = SessionPhase::Idle;
            return;
        }

        let Some(session) = state.session.as_mut() else {
            warn!("Close edge in open phase without a session");
            state.phase = SessionPhase::Idle;
            return;
        };
        session.clear_timer();

        let id = session.id;
        let token = self.cancellation_token.child_token();
        session.post_close_burst_remaining = self.policy.burst_count;
        self.spawn_timer(id, TimerKind::Burst, self.policy.burst_interval, token.clone());
        session.timer = Some(TimerHandle {
            kind: TimerKind::Burst,
            token,
        });

        info!(
            "Session {} closed, {} photo(s) owed every {:?}",
            id, self.policy.burst_count, self.policy.burst_interval
        );
        state.phase = SessionPhase::ClosingBurst;
    }

    fn retire(&self, session: CaptureSession) {
        debug!("Session {} retired", session.id);
        self.publish(DoorEvent::SessionRetired {
            session_id: session.id,
        });
    }

    fn spawn_timer(
        self: &Arc<Self>,
        session_id: u64,
        kind: TimerKind,
        period: Duration,
        token: CancellationToken,
    ) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !manager.on_tick(session_id, kind, &token) {
                            break;
                        }
                    }
                }
            }
            debug!("{:?} timer of session {} finished", kind, session_id);
        });
    }

    /// Handle one timer tick; returns false once the timer must stop.
    fn on_tick(&self, session_id: u64, kind: TimerKind, token: &CancellationToken) -> bool {
        let mut state = self.state.lock();

        // A transition may have cancelled this timer after the tick was queued
        if token.is_cancelled() {
            return false;
        }

        match kind {
            TimerKind::Periodic => {
                drop(state);
                self.spawn_capture(CaptureTrigger::Periodic { session_id });
                true
            }
            TimerKind::Burst => {
                let Some(session) = state.session.as_mut() else {
                    return false;
                };
                session.post_close_burst_remaining =
                    session.post_close_burst_remaining.saturating_sub(1);
                let remaining = session.post_close_burst_remaining;

                let keep_running = remaining > 0;
                if !keep_running {
                    if let Some(mut session) = state.session.take() {
                        session.clear_timer();
                        info!("Session {} burst complete", session.id);
                        self.retire(session);
                    }
                    state.phase = SessionPhase::Idle;
                }
                drop(state);

                self.spawn_capture(CaptureTrigger::Burst {
                    session_id,
                    remaining,
                });
                keep_running
            }
        }
    }

    /// Fire-and-forget pipeline run; outcomes never feed back into the timers
    fn spawn_capture(&self, trigger: CaptureTrigger) {
        let runner = Arc::clone(&self.runner);
        let recipient = self.recipient.clone();
        tokio::spawn(async move {
            let outcome = runner.run_once(&recipient, trigger).await;
            debug!("Capture {} finished: {:?}", trigger, outcome);
        });
    }

    fn publish(&self, event: DoorEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            debug!("Session event not delivered: {}", e);
        }
    }

    /// Feed door edges from the event bus into [`SessionManager::handle_edge`]
    pub fn listen(self: Arc<Self>) -> JoinHandle<()> {
        let mut receiver = self
            .event_bus
            .subscribe_filtered(EventFilter::EventTypes(vec!["door_edge"]), "session_manager");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = self.cancellation_token.cancelled() => break,
                    event = receiver.recv() => match event {
                        Ok(DoorEvent::DoorEdge { state, .. }) => self.handle_edge(state),
                        Ok(_) => {}
                        Err(EventBusError::Lagged { skipped }) => {
                            warn!("Session manager missed {} door events", skipped);
                        }
                        Err(e) => {
                            debug!("Session manager listener ending: {}", e);
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Cancel every pending timer and stop accepting edges
    pub fn shutdown(&self) {
        self.cancellation_token.cancel();

        let mut state = self.state.lock();
        if let Some(mut session) = state.session.take() {
            session.clear_timer();
            info!("Session {} abandoned at shutdown", session.id);
            self.retire(session);
        }
        state.phase = SessionPhase::Idle;
    }
}
