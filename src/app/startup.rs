use super::{ComponentState, DoorsnapOrchestrator};
use crate::error::{DoorsnapError, Result};
use crate::capture::CaptureTrigger;
use crate::events::{DoorEvent, EventFilter};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

impl DoorsnapOrchestrator {
    /// Register every component as stopped
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing doorsnap components");

        let mut states = self.component_states.lock().await;
        for component in ["camera", "gpio", "transport", "session", "sensor"] {
            states.insert(component.to_string(), ComponentState::Stopped);
        }
        if self.command.is_some() {
            states.insert("command".to_string(), ComponentState::Stopped);
        }
        if self.heartbeat.is_some() {
            states.insert("heartbeat".to_string(), ComponentState::Stopped);
        }
        if self.simulator.is_some() {
            states.insert("simulator".to_string(), ComponentState::Stopped);
        }
        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Check the hardware-facing setup without starting anything that runs
    pub async fn probe(&self) -> Result<()> {
        info!("Probing {}", self.camera.describe());
        self.camera.probe().await.map_err(|e| {
            error!("Camera unavailable: {}", e);
            DoorsnapError::setup("camera", e.to_string())
        })?;
        self.pipeline.prepare().await?;

        self.io
            .setup_input(self.config.sensor.pin, self.config.sensor.bias)
            .map_err(|e| {
                error!("Failed to configure sensor pin: {}", e);
                DoorsnapError::setup("gpio", e.to_string())
            })?;

        Ok(())
    }

    /// Start all components. Nothing listens to the door before the
    /// transport has reported ready.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting doorsnap");

        self.set_component_state("camera", ComponentState::Starting).await;
        self.set_component_state("gpio", ComponentState::Starting).await;
        if let Err(e) = self.probe().await {
            self.set_component_state("camera", ComponentState::Failed).await;
            self.set_component_state("gpio", ComponentState::Failed).await;
            return Err(e);
        }
        self.set_component_state("camera", ComponentState::Running).await;
        self.set_component_state("gpio", ComponentState::Running).await;

        self.register_transport_hooks();

        self.set_component_state("transport", ComponentState::Starting).await;
        let ready_timeout = Duration::from_secs(self.config.transport.ready_timeout_secs);
        let transport_started = match self.transport.start().await {
            Ok(()) => self.transport.wait_ready(ready_timeout).await,
            Err(e) => Err(e),
        };
        if let Err(e) = transport_started {
            self.set_component_state("transport", ComponentState::Failed).await;
            error!("Transport failed to start: {}", e);
            return Err(DoorsnapError::setup("transport", e.to_string()));
        }
        self.set_component_state("transport", ComponentState::Running).await;
        if self.command.is_some() {
            self.set_component_state("command", ComponentState::Running).await;
        }

        self.set_component_state("session", ComponentState::Starting).await;
        self.tasks.push(Arc::clone(&self.session).listen());
        self.set_component_state("session", ComponentState::Running).await;

        self.set_component_state("sensor", ComponentState::Starting).await;
        let event_bus = Arc::clone(&self.event_bus);
        self.tasks.push(self.sensor.start(move |state| {
            if let Err(e) = event_bus.publish(DoorEvent::DoorEdge {
                state,
                timestamp: SystemTime::now(),
            }) {
                warn!("Door edge not delivered: {}", e);
            }
        }));
        self.set_component_state("sensor", ComponentState::Running).await;

        if let Some(heartbeat) = &self.heartbeat {
            self.set_component_state("heartbeat", ComponentState::Starting).await;
            match heartbeat.start() {
                Ok(task) => {
                    self.tasks.push(task);
                    self.set_component_state("heartbeat", ComponentState::Running).await;
                }
                Err(e) => {
                    self.set_component_state("heartbeat", ComponentState::Failed).await;
                    return Err(DoorsnapError::setup("heartbeat", e.to_string()));
                }
            }
        }

        if let Some(simulator) = &self.simulator {
            self.set_component_state("simulator", ComponentState::Starting).await;
            simulator.start(Arc::clone(&self.event_bus)).await?;
            self.set_component_state("simulator", ComponentState::Running).await;
        }

        self.start_manual_capture_listener();

        info!("doorsnap started, sending photos to {}", self.recipient);
        Ok(())
    }

    fn register_transport_hooks(&self) {
        self.transport.on_pairing_challenge(|challenge| {
            info!("Pairing required: {}", challenge);
            println!("Pair the messaging account: {}", challenge);
        });

        let event_bus = Arc::clone(&self.event_bus);
        self.transport.on_ready(move || {
            let _ = event_bus.publish(DoorEvent::TransportReady);
        });

        if let Some(command) = &self.command {
            command.attach(&self.transport);
        }
    }

    /// Local capture requests go to the fixed recipient
    fn start_manual_capture_listener(&mut self) {
        let mut receiver = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["manual_capture_requested"]),
            "manual_capture",
        );
        let pipeline = Arc::clone(&self.pipeline);
        let recipient = self.recipient.clone();
        let token = self.cancellation_token.clone();

        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    event = receiver.recv() => match event {
                        Ok(_) => {
                            let pipeline = Arc::clone(&pipeline);
                            let recipient = recipient.clone();
                            tokio::spawn(async move {
                                pipeline.run_once(&recipient, CaptureTrigger::Manual).await;
                            });
                        }
                        Err(crate::error::EventBusError::Lagged { .. }) => continue,
                        Err(e) => {
                            debug!("Manual capture listener ending: {}", e);
                            break;
                        }
                    }
                }
            }
        }));
    }
}
