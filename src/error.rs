use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DoorsnapError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Setup failed in {component}: {message}")]
    Setup { component: String, message: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl DoorsnapError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn setup<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Setup {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether this error must abort startup rather than be logged and skipped
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DoorsnapError::Config(_) | DoorsnapError::Setup { .. } | DoorsnapError::System { .. }
        )
    }
}

/// Digital I/O driver errors
#[derive(Error, Debug)]
pub enum GpioError {
    #[error("GPIO controller unavailable: {details}")]
    Unavailable { details: String },

    #[error("Pin {pin} is not configured as {direction}")]
    NotConfigured { pin: u8, direction: &'static str },

    #[error("Failed to read pin {pin}: {details}")]
    Read { pin: u8, details: String },

    #[error("Failed to write pin {pin}: {details}")]
    Write { pin: u8, details: String },
}

/// Camera device errors
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera device {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("Capture failed: {details}")]
    CaptureFailed { details: String },

    #[error("Capture timed out after {0:?}")]
    Timeout(Duration),

    #[error("Capture produced no image at {path}")]
    EmptyImage { path: String },

    #[error("Camera backend {0} is not available in this build")]
    BackendUnavailable(String),

    #[error("Camera IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Messaging transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport configuration error: {0}")]
    Config(String),

    #[error("Transport failed to start: {0}")]
    Startup(String),

    #[error("Transport is not ready")]
    NotReady,

    #[error("Invalid recipient {0}")]
    InvalidRecipient(String),

    #[error("Failed to send to {recipient}: {details}")]
    SendFailed { recipient: String, details: String },
}

/// Event bus errors
#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, DoorsnapError>;
