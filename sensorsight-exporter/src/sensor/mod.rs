//! Sensor access.
//!
//! A [`SensorReader`] performs one read attempt per call and reports either a
//! [`Reading`] or a [`SensorError`]. The exporter ships two backends:
//!
//! - [`IioSensor`] - Linux kernel DHT driver via the Industrial I/O sysfs interface
//! - [`SimulatedSensor`] - generated readings for demos
//!
//! [`ScriptedSensor`] replays a fixed sequence of results and is used by tests.

use std::future::Future;

use sensorsight_common::{Reading, SensorModel};
use tracing::info;

use crate::config::{BackendConfig, SensorConfig};

pub mod iio;
pub mod scripted;
pub mod simulated;

pub use iio::IioSensor;
pub use scripted::{ScriptedHandle, ScriptedSensor};
pub use simulated::SimulatedSensor;

/// Errors reported by a sensor.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Sensor initialization failed: {0}")]
    Init(String),
    #[error("Timed out waiting for sensor response")]
    Timeout,
    #[error("Checksum mismatch in sensor response")]
    Checksum,
    #[error("Sensor returned no {0} value")]
    MissingValue(&'static str),
    #[error("Reading out of range: {temperature:.1}°C, {humidity:.1}%")]
    OutOfRange { temperature: f64, humidity: f64 },
    #[error("Sensor I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sensor disconnected: {0}")]
    Disconnected(String),
}

impl SensorError {
    /// Whether the failure only affects the current read.
    ///
    /// Transient failures are counted and the sampling loop carries on; the
    /// rest terminate the process.
    pub fn is_transient(&self) -> bool {
        !matches!(self, SensorError::Init(_) | SensorError::Disconnected(_))
    }

    /// Reject readings the sensor model cannot physically produce.
    pub fn check_plausible(model: SensorModel, reading: Reading) -> Result<Reading, SensorError> {
        if model.is_plausible(&reading) {
            Ok(reading)
        } else {
            Err(SensorError::OutOfRange {
                temperature: reading.temperature_celsius,
                humidity: reading.humidity_percent,
            })
        }
    }
}

/// A temperature/humidity sensor.
pub trait SensorReader: Send {
    /// Perform one read attempt.
    fn read(&mut self) -> impl Future<Output = Result<Reading, SensorError>> + Send;

    /// Release the underlying hardware handle. Must be idempotent.
    fn release(&mut self);
}

/// Sensor selected from configuration.
#[derive(Debug)]
pub enum Sensor {
    Iio(IioSensor),
    Simulated(SimulatedSensor),
}

impl Sensor {
    /// Open the sensor described by the configuration.
    pub async fn open(config: &SensorConfig) -> Result<Self, SensorError> {
        let sensor = match &config.backend {
            BackendConfig::Iio { device, sysfs_root } => {
                let device = match device {
                    Some(device) => device.clone(),
                    None => iio::discover(sysfs_root)?,
                };
                Sensor::Iio(IioSensor::open(&device, config.model).await?)
            }
            BackendConfig::Simulated {
                base_temperature,
                base_humidity,
                failure_rate,
                seed,
            } => Sensor::Simulated(SimulatedSensor::new(
                *base_temperature,
                *base_humidity,
                *failure_rate,
                *seed,
            )),
        };

        info!(
            model = %config.model,
            gpio_pin = %config.gpio_pin,
            backend = sensor.backend_name(),
            "Sensor initialized"
        );

        Ok(sensor)
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Sensor::Iio(_) => "iio",
            Sensor::Simulated(_) => "simulated",
        }
    }
}

impl SensorReader for Sensor {
    async fn read(&mut self) -> Result<Reading, SensorError> {
        match self {
            Sensor::Iio(sensor) => sensor.read().await,
            Sensor::Simulated(sensor) => sensor.read().await,
        }
    }

    fn release(&mut self) {
        match self {
            Sensor::Iio(sensor) => sensor.release(),
            Sensor::Simulated(sensor) => sensor.release(),
        }
    }
}
