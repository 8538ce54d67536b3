//! Prometheus metrics for sensor readings.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::info::Info;
use prometheus_client::registry::Registry;
use sensorsight_common::{DerivedReading, SensorIdentity};
use tracing::trace;

/// Labels attached to every reading gauge.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct SensorLabels {
    pub sensor_type: String,
    pub location: String,
}

type ReadingGauge = Family<SensorLabels, Gauge<f64, AtomicU64>>;

/// The metric set exported for one sensor.
///
/// Metric handles are atomics, so the sampler can update values while the
/// HTTP server renders them.
#[derive(Debug)]
pub struct SensorMetrics {
    registry: Registry,
    labels: SensorLabels,
    temperature_celsius: ReadingGauge,
    temperature_fahrenheit: ReadingGauge,
    humidity_percent: ReadingGauge,
    read_errors: Counter,
    last_success: Gauge<f64, AtomicU64>,
}

/// Shared handle to the sensor metrics.
pub type SharedMetrics = Arc<SensorMetrics>;

impl SensorMetrics {
    /// Register all metrics and publish the static sensor identity.
    pub fn new(identity: &SensorIdentity) -> Self {
        let mut registry = Registry::default();

        let temperature_celsius = ReadingGauge::default();
        registry.register(
            "sensor_temperature_celsius",
            "Temperature reading in Celsius",
            temperature_celsius.clone(),
        );

        let temperature_fahrenheit = ReadingGauge::default();
        registry.register(
            "sensor_temperature_fahrenheit",
            "Temperature reading in Fahrenheit",
            temperature_fahrenheit.clone(),
        );

        let humidity_percent = ReadingGauge::default();
        registry.register(
            "sensor_humidity_percent",
            "Relative humidity percentage",
            humidity_percent.clone(),
        );

        // Exposed as `sensor_read_errors_total`.
        let read_errors = Counter::default();
        registry.register(
            "sensor_read_errors",
            "Total number of failed sensor reads",
            read_errors.clone(),
        );

        let last_success = Gauge::<f64, AtomicU64>::default();
        registry.register(
            "sensor_last_successful_read_timestamp_seconds",
            "Timestamp of last successful sensor read",
            last_success.clone(),
        );

        // Exposed as `sensor_info`.
        registry.register(
            "sensor",
            "Sensor identity metadata",
            Info::new(identity_labels(identity)),
        );

        Self {
            registry,
            labels: SensorLabels {
                sensor_type: identity.model.as_str().to_string(),
                location: identity.location.clone(),
            },
            temperature_celsius,
            temperature_fahrenheit,
            humidity_percent,
            read_errors,
            last_success,
        }
    }

    /// Publish a successful reading taken at `timestamp_secs` (Unix time).
    pub fn record_reading(&self, reading: &DerivedReading, timestamp_secs: f64) {
        self.temperature_celsius
            .get_or_create(&self.labels)
            .set(reading.temperature_celsius);
        self.temperature_fahrenheit
            .get_or_create(&self.labels)
            .set(reading.temperature_fahrenheit);
        self.humidity_percent
            .get_or_create(&self.labels)
            .set(reading.humidity_percent);
        self.last_success.set(timestamp_secs);

        trace!(?reading, timestamp_secs, "Recorded reading");
    }

    /// Count a failed read. Returns the new total.
    pub fn record_failure(&self) -> u64 {
        self.read_errors.inc() + 1
    }

    /// Total failed reads so far.
    pub fn read_errors(&self) -> u64 {
        self.read_errors.get()
    }

    /// Unix time of the last successful read, if any.
    pub fn last_success_timestamp(&self) -> Option<f64> {
        let value = self.last_success.get();
        (value > 0.0).then_some(value)
    }

    /// Labels used for the reading gauges.
    pub fn labels(&self) -> &SensorLabels {
        &self.labels
    }

    /// Render metrics in the OpenMetrics text exposition format.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut output = String::with_capacity(1024);
        encode(&mut output, &self.registry)?;
        Ok(output)
    }
}

fn identity_labels(identity: &SensorIdentity) -> Vec<(String, String)> {
    vec![
        ("type".to_string(), identity.model.as_str().to_string()),
        ("gpio_pin".to_string(), identity.gpio_pin.clone()),
        ("location".to_string(), identity.location.clone()),
        ("version".to_string(), identity.version.clone()),
    ]
}

/// Find the value of a sample in rendered exposition text.
///
/// `series` is the metric name followed by its label set exactly as rendered,
/// e.g. `sensor_read_errors_total` or `sensor_humidity_percent{...}`.
#[cfg(test)]
pub(crate) fn sample_value(rendered: &str, series: &str) -> Option<f64> {
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (name, value) = line.rsplit_once(' ')?;
            (name == series).then(|| value.parse().ok()).flatten()
        })
}
