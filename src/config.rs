use crate::gpio::{Bias, Level};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DoorsnapConfig {
    pub sensor: SensorConfig,
    pub session: SessionConfig,
    pub camera: CameraConfig,
    pub transport: TransportConfig,
    pub command: CommandConfig,
    pub delivery: DeliveryConfig,
    pub heartbeat: HeartbeatConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SensorConfig {
    /// BCM pin number of the door contact
    #[serde(default = "default_sensor_pin")]
    pub pin: u8,

    /// Input level that means "door open" (wiring dependent)
    #[serde(default = "default_open_level")]
    pub open_level: Level,

    /// Internal resistor applied to the input pin
    #[serde(default = "default_bias")]
    pub bias: Bias,

    /// Poll cadence in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Seconds between captures while the door stays open
    #[serde(default = "default_periodic_interval_secs")]
    pub periodic_interval_secs: u64,

    /// Photos owed after the door closes
    #[serde(default = "default_burst_count")]
    pub burst_count: u32,

    /// Seconds between post-close captures
    #[serde(default = "default_burst_interval_secs")]
    pub burst_interval_secs: u64,

    /// Fire one capture immediately on the open edge
    #[serde(default = "default_capture_on_open")]
    pub capture_on_open: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    Fswebcam,
    Gstreamer,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    #[serde(default = "default_camera_backend")]
    pub backend: CameraBackend,

    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Capture resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// JPEG quality, 1-100
    #[serde(default = "default_camera_quality")]
    pub quality: u8,

    /// Executable used by the fswebcam backend
    #[serde(default = "default_camera_command")]
    pub command: String,

    /// Directory for temporary capture artifacts
    #[serde(default = "default_capture_dir")]
    pub capture_dir: String,

    #[serde(default = "default_capture_timeout_secs")]
    pub capture_timeout_secs: u64,

    /// Queue concurrent captures through a single slot
    #[serde(default = "default_serialize_access")]
    pub serialize_access: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportBackend {
    Telegram,
    Outbox,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_transport_backend")]
    pub backend: TransportBackend,

    /// Bot token for the telegram backend
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Fixed recipient for sensor-triggered photos
    #[serde(default)]
    pub recipient: String,

    /// How long startup waits for the transport to become ready
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Target directory for the outbox backend
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CommandConfig {
    #[serde(default = "default_command_enabled")]
    pub enabled: bool,

    /// Inbound text that requests a photo, matched case-insensitively
    #[serde(default = "default_trigger_word")]
    pub trigger_word: String,

    /// Reply sent before capturing
    #[serde(default = "default_ack_text")]
    pub ack_text: String,

    /// Reply sent when the photo could not be produced or delivered
    #[serde(default = "default_failure_text")]
    pub failure_text: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeliveryConfig {
    /// Total delivery attempts per photo; 1 disables retries
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HeartbeatConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_heartbeat_pin")]
    pub pin: u8,

    /// How long the pin is held high each period
    #[serde(default = "default_heartbeat_high_ms")]
    pub high_ms: u64,

    #[serde(default = "default_heartbeat_period_ms")]
    pub period_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl SensorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl CameraConfig {
    pub fn device_path(&self) -> String {
        format!("/dev/video{}", self.index)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }
}

impl DoorsnapConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("sensor.pin", default_sensor_pin())?
            .set_default("sensor.open_level", "low")?
            .set_default("sensor.bias", "pull_up")?
            .set_default("sensor.poll_interval_ms", default_poll_interval_ms())?
            .set_default(
                "session.periodic_interval_secs",
                default_periodic_interval_secs(),
            )?
            .set_default("session.burst_count", default_burst_count())?
            .set_default("session.burst_interval_secs", default_burst_interval_secs())?
            .set_default("session.capture_on_open", default_capture_on_open())?
            .set_default("camera.backend", "fswebcam")?
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.quality", default_camera_quality() as u64)?
            .set_default("camera.command", default_camera_command())?
            .set_default("camera.capture_dir", default_capture_dir())?
            .set_default("camera.capture_timeout_secs", default_capture_timeout_secs())?
            .set_default("camera.serialize_access", default_serialize_access())?
            .set_default("transport.backend", "telegram")?
            .set_default("transport.recipient", "")?
            .set_default("transport.ready_timeout_secs", default_ready_timeout_secs())?
            .set_default("transport.outbox_dir", default_outbox_dir())?
            .set_default("command.enabled", default_command_enabled())?
            .set_default("command.trigger_word", default_trigger_word())?
            .set_default("command.ack_text", default_ack_text())?
            .set_default("command.failure_text", default_failure_text())?
            .set_default("delivery.max_attempts", default_max_attempts())?
            .set_default("delivery.retry_delay_ms", default_retry_delay_ms())?
            .set_default("heartbeat.enabled", false)?
            .set_default("heartbeat.pin", default_heartbeat_pin())?
            .set_default("heartbeat.high_ms", default_heartbeat_high_ms())?
            .set_default("heartbeat.period_ms", default_heartbeat_period_ms())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // DOORSNAP_TRANSPORT__BOT_TOKEN -> transport.bot_token
            .add_source(
                Environment::with_prefix("DOORSNAP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: DoorsnapConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Sensor poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.session.periodic_interval_secs == 0 {
            return Err(ConfigError::Message(
                "Session periodic_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.session.burst_count > 0 && self.session.burst_interval_secs == 0 {
            return Err(ConfigError::Message(
                "Session burst_interval_secs must be greater than 0 when burst_count is set"
                    .to_string(),
            ));
        }

        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.camera.quality) {
            return Err(ConfigError::Message(
                "Camera quality must be between 1 and 100".to_string(),
            ));
        }

        if self.camera.capture_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Camera capture_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.transport.recipient.trim().is_empty() {
            return Err(ConfigError::Message(
                "Transport recipient must be set".to_string(),
            ));
        }

        if self.transport.backend == TransportBackend::Telegram
            && self
                .transport
                .bot_token
                .as_deref()
                .map_or(true, |token| token.trim().is_empty())
        {
            return Err(ConfigError::Message(
                "Transport bot_token is required for the telegram backend".to_string(),
            ));
        }

        if self.command.enabled && self.command.trigger_word.trim().is_empty() {
            return Err(ConfigError::Message(
                "Command trigger_word must not be empty".to_string(),
            ));
        }

        if self.delivery.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Delivery max_attempts must be at least 1".to_string(),
            ));
        }

        if self.heartbeat.enabled {
            if self.heartbeat.period_ms == 0 || self.heartbeat.high_ms >= self.heartbeat.period_ms
            {
                return Err(ConfigError::Message(
                    "Heartbeat high_ms must be shorter than a non-zero period_ms".to_string(),
                ));
            }

            if self.heartbeat.pin == self.sensor.pin {
                return Err(ConfigError::Message(
                    "Heartbeat pin must differ from the sensor pin".to_string(),
                ));
            }
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for DoorsnapConfig {
    fn default() -> Self {
        Self {
            sensor: SensorConfig {
                pin: default_sensor_pin(),
                open_level: default_open_level(),
                bias: default_bias(),
                poll_interval_ms: default_poll_interval_ms(),
            },
            session: SessionConfig {
                periodic_interval_secs: default_periodic_interval_secs(),
                burst_count: default_burst_count(),
                burst_interval_secs: default_burst_interval_secs(),
                capture_on_open: default_capture_on_open(),
            },
            camera: CameraConfig {
                backend: default_camera_backend(),
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                quality: default_camera_quality(),
                command: default_camera_command(),
                capture_dir: default_capture_dir(),
                capture_timeout_secs: default_capture_timeout_secs(),
                serialize_access: default_serialize_access(),
            },
            transport: TransportConfig {
                backend: default_transport_backend(),
                bot_token: None,
                recipient: String::new(),
                ready_timeout_secs: default_ready_timeout_secs(),
                outbox_dir: default_outbox_dir(),
            },
            command: CommandConfig {
                enabled: default_command_enabled(),
                trigger_word: default_trigger_word(),
                ack_text: default_ack_text(),
                failure_text: default_failure_text(),
            },
            delivery: DeliveryConfig {
                max_attempts: default_max_attempts(),
                retry_delay_ms: default_retry_delay_ms(),
            },
            heartbeat: HeartbeatConfig {
                enabled: false,
                pin: default_heartbeat_pin(),
                high_ms: default_heartbeat_high_ms(),
                period_ms: default_heartbeat_period_ms(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_sensor_pin() -> u8 {
    17
}
fn default_open_level() -> Level {
    Level::Low
}
fn default_bias() -> Bias {
    Bias::PullUp
}
fn default_poll_interval_ms() -> u64 {
    500
}

fn default_periodic_interval_secs() -> u64 {
    10
}
fn default_burst_count() -> u32 {
    2
}
fn default_burst_interval_secs() -> u64 {
    5
}
fn default_capture_on_open() -> bool {
    false
}

fn default_camera_backend() -> CameraBackend {
    CameraBackend::Fswebcam
}
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_camera_quality() -> u8 {
    100
}
fn default_camera_command() -> String {
    "fswebcam".to_string()
}
fn default_capture_dir() -> String {
    "./captures".to_string()
}
fn default_capture_timeout_secs() -> u64 {
    15
}
fn default_serialize_access() -> bool {
    true
}

fn default_transport_backend() -> TransportBackend {
    TransportBackend::Telegram
}
fn default_ready_timeout_secs() -> u64 {
    120
}
fn default_outbox_dir() -> String {
    "./outbox".to_string()
}

fn default_command_enabled() -> bool {
    true
}
fn default_trigger_word() -> String {
    "cam".to_string()
}
fn default_ack_text() -> String {
    "Taking photo...".to_string()
}
fn default_failure_text() -> String {
    "Sorry, there was an error taking the photo.".to_string()
}

fn default_max_attempts() -> u32 {
    1
}
fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_heartbeat_pin() -> u8 {
    27
}
fn default_heartbeat_high_ms() -> u64 {
    500
}
fn default_heartbeat_period_ms() -> u64 {
    5000
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> DoorsnapConfig {
        let mut config = DoorsnapConfig::default();
        config.transport.bot_token = Some("123:abc".to_string());
        config.transport.recipient = "4242".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.sensor.open_level, Level::Low);
        assert_eq!(config.sensor.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.session.burst_count, 2);
        assert_eq!(config.camera.device_path(), "/dev/video0");
        assert_eq!(config.delivery.max_attempts, 1);
    }

    #[test]
    fn test_default_config_requires_recipient() {
        let config = DoorsnapConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        config.camera.resolution = (0, 0);
        assert!(config.validate().is_err());
        config.camera.resolution = (640, 480);
        assert!(config.validate().is_ok());

        config.camera.quality = 0;
        assert!(config.validate().is_err());
        config.camera.quality = 80;

        config.delivery.max_attempts = 0;
        assert!(config.validate().is_err());
        config.delivery.max_attempts = 3;

        config.session.burst_interval_secs = 0;
        assert!(config.validate().is_err());
        config.session.burst_count = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_telegram_requires_token() {
        let mut config = valid_config();
        config.transport.bot_token = None;
        assert!(config.validate().is_err());

        config.transport.backend = TransportBackend::Outbox;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_heartbeat_validation() {
        let mut config = valid_config();
        config.heartbeat.enabled = true;
        config.heartbeat.high_ms = 5000;
        config.heartbeat.period_ms = 5000;
        assert!(config.validate().is_err());

        config.heartbeat.high_ms = 250;
        assert!(config.validate().is_ok());

        config.heartbeat.pin = config.sensor.pin;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[sensor]
pin = 4
open_level = "high"
bias = "pull_down"

[session]
burst_count = 0

[camera]
resolution = [640, 480]

[transport]
backend = "outbox"
recipient = "front-door"

[command]
trigger_word = "snap"
"#
        )
        .unwrap();

        let config = DoorsnapConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.sensor.pin, 4);
        assert_eq!(config.sensor.open_level, Level::High);
        assert_eq!(config.sensor.bias, Bias::PullDown);
        assert_eq!(config.sensor.poll_interval_ms, 500);
        assert_eq!(config.session.burst_count, 0);
        assert_eq!(config.session.periodic_interval_secs, 10);
        assert_eq!(config.camera.resolution, (640, 480));
        assert_eq!(config.transport.backend, TransportBackend::Outbox);
        assert_eq!(config.command.trigger_word, "snap");
        assert!(config.validate().is_ok());
    }
}
