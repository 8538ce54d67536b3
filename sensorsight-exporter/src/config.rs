//! Configuration for the sensor exporter.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use sensorsight_common::{LoggingConfig, SensorIdentity, SensorModel};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] sensorsight_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Sensor hardware settings.
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Sampling loop settings.
    #[serde(default)]
    pub sampler: SamplerConfig,

    /// HTTP metrics endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sensor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Sensor model (default: DHT22).
    #[serde(default)]
    pub model: SensorModel,

    /// GPIO pin identifier, published as identity metadata (default: "D4").
    #[serde(default = "default_gpio_pin")]
    pub gpio_pin: String,

    /// How the sensor is accessed.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Read the sensor once before serving metrics and fail startup if it
    /// does not respond (default: true).
    #[serde(default = "default_warmup")]
    pub warmup: bool,
}

fn default_gpio_pin() -> String {
    "D4".to_string()
}

fn default_warmup() -> bool {
    true
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            model: SensorModel::default(),
            gpio_pin: default_gpio_pin(),
            backend: BackendConfig::default(),
            warmup: default_warmup(),
        }
    }
}

/// Sensor access backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Linux kernel DHT driver exposed through the Industrial I/O sysfs interface.
    Iio {
        /// Explicit IIO device directory (auto-discovered when absent).
        #[serde(default)]
        device: Option<PathBuf>,

        /// Root of the IIO device tree (default: "/sys/bus/iio/devices").
        #[serde(default = "default_sysfs_root")]
        sysfs_root: PathBuf,
    },
    /// Generated readings, for demos and testing without hardware.
    Simulated {
        /// Temperature the simulation drifts around, in Celsius.
        #[serde(default = "default_base_temperature")]
        base_temperature: f64,

        /// Humidity the simulation drifts around, in percent.
        #[serde(default = "default_base_humidity")]
        base_humidity: f64,

        /// Probability (0.0 - 1.0) that a read fails.
        #[serde(default)]
        failure_rate: f64,

        /// Fixed RNG seed for reproducible runs.
        #[serde(default)]
        seed: Option<u64>,
    },
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/bus/iio/devices")
}

fn default_base_temperature() -> f64 {
    21.0
}

fn default_base_humidity() -> f64 {
    45.0
}

impl BackendConfig {
    /// Simulated backend with default parameters.
    pub fn simulated() -> Self {
        BackendConfig::Simulated {
            base_temperature: default_base_temperature(),
            base_humidity: default_base_humidity(),
            failure_rate: 0.0,
            seed: None,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Iio {
            device: None,
            sysfs_root: default_sysfs_root(),
        }
    }
}

/// Sampling loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Seconds between sensor reads (default: 10).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Location label attached to the readings (default: "default").
    #[serde(default = "default_location")]
    pub location: String,
}

fn default_interval() -> u64 {
    10
}

fn default_location() -> String {
    "default".to_string()
}

impl SamplerConfig {
    /// Sampling interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            location: default_location(),
        }
    }
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:8000").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl HttpConfig {
    /// Parse the listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen.parse().map_err(|_| {
            ConfigError::Validation(format!("Invalid listen address: {}", self.listen))
        })
    }

    /// Replace the port of the listen address, keeping the host.
    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        let mut addr = self.listen_addr()?;
        addr.set_port(port);
        self.listen = addr.to_string();
        Ok(())
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ExporterConfig = sensorsight_common::load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = sensorsight_common::parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampler.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "interval_secs must be > 0".to_string(),
            ));
        }

        if self.sampler.location.trim().is_empty() {
            return Err(ConfigError::Validation(
                "location must not be empty".to_string(),
            ));
        }

        if self.sensor.gpio_pin.trim().is_empty() {
            return Err(ConfigError::Validation(
                "gpio_pin must not be empty".to_string(),
            ));
        }

        if let BackendConfig::Simulated { failure_rate, .. } = &self.sensor.backend {
            if !(0.0..=1.0).contains(failure_rate) {
                return Err(ConfigError::Validation(format!(
                    "failure_rate must be between 0 and 1, got {}",
                    failure_rate
                )));
            }
        }

        self.http.listen_addr()?;

        if !self.http.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the static sensor identity published at startup.
    pub fn identity(&self, version: &str) -> SensorIdentity {
        SensorIdentity::new(
            self.sensor.model,
            self.sensor.gpio_pin.clone(),
            self.sampler.location.clone(),
            version,
        )
    }
}
