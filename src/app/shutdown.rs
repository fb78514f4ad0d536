use super::{ComponentState, DoorsnapOrchestrator};
use crate::error::{DoorsnapError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl DoorsnapOrchestrator {
    /// Stop every component. In-flight captures are not awaited.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Cancel background listeners
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        // Stop components in reverse start order
        if let Some(simulator) = self.simulator.clone() {
            if let Err(e) = self.stop_component("simulator", simulator.stop()).await {
                error!("Error stopping simulator: {}", e);
                exit_code = 1;
            }
        }

        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.stop();
            self.set_component_state("heartbeat", ComponentState::Stopped).await;
        }

        self.sensor.stop();
        self.set_component_state("sensor", ComponentState::Stopped).await;

        self.session.shutdown();
        self.set_component_state("session", ComponentState::Stopped).await;

        if self.command.is_some() {
            self.set_component_state("command", ComponentState::Stopped).await;
        }

        let transport = self.transport();
        let stop_transport = async move { transport.stop().await.map_err(DoorsnapError::from) };
        if let Err(e) = self.stop_component("transport", stop_transport).await {
            error!("Error stopping transport: {}", e);
            exit_code = 1;
        }

        for task in self.tasks.drain(..) {
            if timeout(STOP_TIMEOUT, task).await.is_err() {
                warn!("Background task did not finish within {:?}", STOP_TIMEOUT);
            }
        }

        let removed = self.pipeline.sweep().await;
        if removed > 0 {
            info!("Removed {} capture artifacts at shutdown", removed);
        }
        self.set_component_state("camera", ComponentState::Stopped).await;
        self.set_component_state("gpio", ComponentState::Stopped).await;

        let stats = self.pipeline.stats();
        info!(
            "Capture statistics: {} attempted, {} delivered, {} capture failures, {} delivery failures, {} cleanup failures",
            stats.attempted,
            stats.delivered,
            stats.capture_failures,
            stats.delivery_failures,
            stats.cleanup_failures
        );

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Stop one component with a timeout, tracking its state
    async fn stop_component<F>(&self, component: &str, stop: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(STOP_TIMEOUT, stop).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(e)
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(DoorsnapError::component(
                    component.to_string(),
                    format!("{} component stop timeout", component),
                ))
            }
        }
    }
}
