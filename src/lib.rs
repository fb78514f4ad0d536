pub mod app;
pub mod camera;
pub mod capture;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod gpio;
pub mod heartbeat;
pub mod sensor;
pub mod session;
pub mod transport;

pub use app::{ComponentState, DoorsnapOrchestrator, ShutdownReason};
pub use camera::{CameraBuilder, CameraDevice};
pub use capture::{CaptureOutcome, CapturePipeline, CaptureRunner, CaptureStats, CaptureTrigger};
pub use command::CommandTrigger;
pub use config::DoorsnapConfig;
pub use error::{DoorsnapError, Result};
pub use events::{DoorEvent, EventBus, EventFilter, EventReceiver};
pub use heartbeat::Heartbeat;
pub use sensor::{SensorMonitor, SensorState};
pub use session::{SessionManager, SessionPhase, SessionPolicy};
pub use transport::{Recipient, Transport, TransportAdapter};
