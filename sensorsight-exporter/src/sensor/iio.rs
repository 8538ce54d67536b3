//! DHT sensor read through the Linux Industrial I/O subsystem.
//!
//! With the `dht11` device tree overlay loaded (e.g. `dtoverlay=dht11,gpiopin=4`
//! on a Raspberry Pi), the kernel driver handles the one-wire timing and
//! exposes the sensor as an IIO device:
//!
//! ```text
//! /sys/bus/iio/devices/iio:device0/name                        "dht11"
//! /sys/bus/iio/devices/iio:device0/in_temp_input               milli-degrees Celsius
//! /sys/bus/iio/devices/iio:device0/in_humidityrelative_input   milli-percent
//! ```
//!
//! Each read of an attribute triggers a fresh measurement (the driver caches
//! results for about two seconds).

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use sensorsight_common::{Reading, SensorModel};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use super::{SensorError, SensorReader};

/// Name the kernel driver registers for DHT11, DHT22 and AM2302 sensors.
pub const DRIVER_NAME: &str = "dht11";

const TEMPERATURE_ATTR: &str = "in_temp_input";
const HUMIDITY_ATTR: &str = "in_humidityrelative_input";

// Linux errno values returned by the dht11 driver.
const EIO: i32 = 5;
const ENODEV: i32 = 19;

/// Find the IIO device directory of a DHT sensor under `sysfs_root`.
pub fn discover(sysfs_root: &Path) -> Result<PathBuf, SensorError> {
    let entries = std::fs::read_dir(sysfs_root).map_err(|e| {
        SensorError::Init(format!(
            "Cannot list IIO devices in '{}': {}",
            sysfs_root.display(),
            e
        ))
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("iio:device"))
        })
        .filter(|path| {
            std::fs::read_to_string(path.join("name"))
                .map(|name| name.trim() == DRIVER_NAME)
                .unwrap_or(false)
        })
        .collect();

    candidates.sort();

    match candidates.into_iter().next() {
        Some(path) => {
            debug!(device = %path.display(), "Discovered DHT IIO device");
            Ok(path)
        }
        None => Err(SensorError::Init(format!(
            "No '{}' IIO device found in '{}' (is the dht11 overlay loaded?)",
            DRIVER_NAME,
            sysfs_root.display()
        ))),
    }
}

/// Open attribute handles of the IIO channels.
#[derive(Debug)]
struct Channels {
    temperature: File,
    humidity: File,
}

/// A DHT sensor behind the kernel IIO driver.
#[derive(Debug)]
pub struct IioSensor {
    device: PathBuf,
    model: SensorModel,
    channels: Option<Channels>,
}

impl IioSensor {
    /// Open the temperature and humidity channels of an IIO device.
    pub async fn open(device: &Path, model: SensorModel) -> Result<Self, SensorError> {
        let temperature = open_attr(device, TEMPERATURE_ATTR).await?;
        let humidity = open_attr(device, HUMIDITY_ATTR).await?;

        info!(device = %device.display(), model = %model, "Opened IIO sensor");

        Ok(Self {
            device: device.to_path_buf(),
            model,
            channels: Some(Channels {
                temperature,
                humidity,
            }),
        })
    }

    /// Path of the IIO device directory.
    pub fn device(&self) -> &Path {
        &self.device
    }
}

impl SensorReader for IioSensor {
    async fn read(&mut self) -> Result<Reading, SensorError> {
        let channels = self
            .channels
            .as_mut()
            .ok_or_else(|| SensorError::Disconnected("sensor already released".to_string()))?;

        let temperature = read_milli(&mut channels.temperature, "temperature").await?;
        let humidity = read_milli(&mut channels.humidity, "humidity").await?;

        SensorError::check_plausible(self.model, Reading::new(temperature, humidity))
    }

    fn release(&mut self) {
        if self.channels.take().is_some() {
            info!(device = %self.device.display(), "Released IIO sensor");
        }
    }
}

async fn open_attr(device: &Path, attr: &str) -> Result<File, SensorError> {
    let path = device.join(attr);
    File::open(&path)
        .await
        .map_err(|e| SensorError::Init(format!("Cannot open '{}': {}", path.display(), e)))
}

/// Read an attribute holding a value in thousandths and scale it to units.
async fn read_milli(file: &mut File, channel: &'static str) -> Result<f64, SensorError> {
    file.seek(SeekFrom::Start(0)).await.map_err(map_io_error)?;

    let mut raw = String::new();
    file.read_to_string(&mut raw).await.map_err(map_io_error)?;

    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SensorError::MissingValue(channel));
    }

    raw.parse::<f64>()
        .map(|milli| milli / 1000.0)
        .map_err(|_| SensorError::MissingValue(channel))
}

fn map_io_error(err: std::io::Error) -> SensorError {
    if err.kind() == ErrorKind::TimedOut {
        return SensorError::Timeout;
    }
    if err.kind() == ErrorKind::NotFound {
        return SensorError::Disconnected(err.to_string());
    }
    match err.raw_os_error() {
        Some(EIO) => SensorError::Checksum,
        Some(ENODEV) => SensorError::Disconnected(err.to_string()),
        _ => SensorError::Io(err),
    }
}
