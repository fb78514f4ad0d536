use crate::capture::CaptureTrigger;
use crate::error::EventBusError;
use crate::sensor::SensorState;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Events that can occur in the doorsnap system
#[derive(Debug, Clone)]
pub enum DoorEvent {
    /// The debounced door sensor reported a new state
    DoorEdge {
        state: SensorState,
        timestamp: SystemTime,
    },
    /// A door-open capture session was created
    SessionStarted { session_id: u64 },
    /// A capture session finished (burst completed, cancelled or no burst owed)
    SessionRetired { session_id: u64 },
    /// A photo was captured and handed to the transport
    PhotoDelivered {
        trigger: CaptureTrigger,
        recipient: String,
        photo: String,
    },
    /// A capture pipeline invocation did not deliver a photo
    CaptureFailed {
        trigger: CaptureTrigger,
        error: String,
    },
    /// An inbound trigger command was accepted
    CommandReceived { sender: String },
    /// A local operator asked for a photo to the fixed recipient
    ManualCaptureRequested { timestamp: SystemTime },
    /// The messaging transport can send
    TransportReady,
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl DoorEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            DoorEvent::DoorEdge { state, .. } => format!("Door {}", state),
            DoorEvent::SessionStarted { session_id } => {
                format!("Capture session {} started", session_id)
            }
            DoorEvent::SessionRetired { session_id } => {
                format!("Capture session {} retired", session_id)
            }
            DoorEvent::PhotoDelivered {
                trigger,
                recipient,
                photo,
            } => format!("Photo {} ({}) delivered to {}", photo, trigger, recipient),
            DoorEvent::CaptureFailed { trigger, error } => {
                format!("Capture ({}) failed: {}", trigger, error)
            }
            DoorEvent::CommandReceived { sender } => format!("Command received from {}", sender),
            DoorEvent::ManualCaptureRequested { .. } => "Manual capture requested".to_string(),
            DoorEvent::TransportReady => "Transport ready".to_string(),
            DoorEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            DoorEvent::DoorEdge { .. } => "door_edge",
            DoorEvent::SessionStarted { .. } => "session_started",
            DoorEvent::SessionRetired { .. } => "session_retired",
            DoorEvent::PhotoDelivered { .. } => "photo_delivered",
            DoorEvent::CaptureFailed { .. } => "capture_failed",
            DoorEvent::CommandReceived { .. } => "command_received",
            DoorEvent::ManualCaptureRequested { .. } => "manual_capture_requested",
            DoorEvent::TransportReady => "transport_ready",
            DoorEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Broadcast event bus for component coordination
pub struct EventBus {
    sender: broadcast::Sender<DoorEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to a filtered stream of events
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers, returning how many received it
    pub fn publish(&self, event: DoorEvent) -> Result<usize, EventBusError> {
        match &event {
            DoorEvent::DoorEdge { state, .. } => info!("Door {}", state),
            DoorEvent::CaptureFailed { trigger, error } => {
                warn!("Capture ({}) failed: {}", trigger, error)
            }
            DoorEvent::ShutdownRequested { reason, .. } => info!("Shutdown requested: {}", reason),
            _ => debug!("Event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &DoorEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<DoorEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<DoorEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next event that passes the filter.
    ///
    /// A lagging receiver reports `Lagged` once and can keep receiving.
    pub async fn recv(&mut self) -> Result<DoorEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, skipped);
                    return Err(EventBusError::Lagged { skipped });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
