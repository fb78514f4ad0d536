use super::types::{ComponentState, ShutdownReason};
use crate::camera::{CameraBuilder, CameraDevice};
use crate::capture::{CapturePipeline, CaptureRunner, DeliveryPolicy};
use crate::command::CommandTrigger;
use crate::config::DoorsnapConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::gpio::{DigitalIo, KeyboardDoorSimulator};
use crate::heartbeat::Heartbeat;
use crate::sensor::SensorMonitor;
use crate::session::{SessionManager, SessionPolicy};
use crate::transport::{build_transport, Recipient, Transport, TransportAdapter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Main application coordinator that wires and supervises all components
pub struct DoorsnapOrchestrator {
    pub(super) config: DoorsnapConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) recipient: Recipient,

    // Components
    pub(super) io: Arc<dyn DigitalIo>,
    pub(super) simulator: Option<Arc<KeyboardDoorSimulator>>,
    pub(super) camera: Arc<dyn CameraDevice>,
    pub(super) transport: Arc<TransportAdapter>,
    pub(super) pipeline: Arc<CapturePipeline>,
    pub(super) session: Arc<SessionManager>,
    pub(super) sensor: SensorMonitor,
    pub(super) command: Option<Arc<CommandTrigger>>,
    pub(super) heartbeat: Option<Heartbeat>,

    // Lifecycle management
    pub(super) tasks: Vec<JoinHandle<()>>,
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl DoorsnapOrchestrator {
    /// Create an orchestrator driving real GPIO hardware
    pub async fn new(config: DoorsnapConfig) -> Result<Self> {
        let io = hardware_io()?;
        let camera = CameraBuilder::new().config(config.camera.clone()).build()?;
        let transport = build_transport(&config.transport)?;
        Ok(Self::with_parts(config, io, camera, transport))
    }

    /// Create an orchestrator whose door contact is driven from the keyboard
    pub async fn simulated(config: DoorsnapConfig) -> Result<Self> {
        let simulator = Arc::new(KeyboardDoorSimulator::new(config.sensor.open_level));
        let camera = CameraBuilder::new().config(config.camera.clone()).build()?;
        let transport = build_transport(&config.transport)?;

        let mut orchestrator = Self::with_parts(config, simulator.clone(), camera, transport);
        orchestrator.simulator = Some(simulator);
        Ok(orchestrator)
    }

    /// Wire the system around explicit collaborators
    pub fn with_parts(
        config: DoorsnapConfig,
        io: Arc<dyn DigitalIo>,
        camera: Arc<dyn CameraDevice>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let recipient = Recipient::new(config.transport.recipient.trim());
        let transport = Arc::new(TransportAdapter::new(transport));

        let pipeline = Arc::new(CapturePipeline::new(
            Arc::clone(&camera),
            Arc::clone(&transport),
            &config.camera.capture_dir,
            config.camera.serialize_access,
            DeliveryPolicy::from(&config.delivery),
            Arc::clone(&event_bus),
        ));
        let runner: Arc<dyn CaptureRunner> = pipeline.clone();

        let session = Arc::new(SessionManager::new(
            SessionPolicy::from(&config.session),
            recipient.clone(),
            Arc::clone(&runner),
            Arc::clone(&event_bus),
        ));

        let sensor = SensorMonitor::new(Arc::clone(&io), &config.sensor);

        let command = config.command.enabled.then(|| {
            Arc::new(CommandTrigger::new(
                &config.command,
                Arc::clone(&runner),
                Arc::clone(&transport),
                Arc::clone(&event_bus),
            ))
        });

        let heartbeat = config
            .heartbeat
            .enabled
            .then(|| Heartbeat::new(Arc::clone(&io), &config.heartbeat));

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Self {
            config,
            event_bus,
            recipient,
            io,
            simulator: None,
            camera,
            transport,
            pipeline,
            session,
            sensor,
            command,
            heartbeat,
            tasks: Vec::new(),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn transport(&self) -> Arc<TransportAdapter> {
        Arc::clone(&self.transport)
    }
}

#[cfg(feature = "gpio")]
fn hardware_io() -> Result<Arc<dyn DigitalIo>> {
    Ok(Arc::new(crate::gpio::RppalIo::new()?))
}

#[cfg(not(feature = "gpio"))]
fn hardware_io() -> Result<Arc<dyn DigitalIo>> {
    Err(crate::error::GpioError::Unavailable {
        details: "GPIO support is not compiled into this build; use --simulate".to_string(),
    }
    .into())
}
