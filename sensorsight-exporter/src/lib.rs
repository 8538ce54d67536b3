//! Prometheus exporter for DHT temperature and humidity sensors.
//!
//! This crate samples a DHT11/DHT22/AM2302 sensor on a fixed interval and
//! exposes the latest readings via an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │     Sensor      │────>│     Sampler     │────>│ SensorMetrics   │<──── HTTP /metrics
//! │  (iio / sim)    │     │ (fixed interval)│     │   (registry)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Exported metrics
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `sensor_temperature_celsius` | gauge | `sensor_type`, `location` |
//! | `sensor_temperature_fahrenheit` | gauge | `sensor_type`, `location` |
//! | `sensor_humidity_percent` | gauge | `sensor_type`, `location` |
//! | `sensor_read_errors_total` | counter | |
//! | `sensor_last_successful_read_timestamp_seconds` | gauge | |
//! | `sensor_info` | info | `type`, `gpio_pin`, `location`, `version` |
//!
//! Failed reads leave the reading gauges untouched; the last successful read
//! timestamp shows how fresh they are.
//!
//! # Usage
//!
//! ```bash
//! sensorsight-exporter --config sensorsight.json5
//! SENSOR_LOCATION=greenhouse sensorsight-exporter --simulate
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod http;
pub mod metrics;
pub mod runner;
pub mod sampler;
pub mod sensor;

pub use config::ExporterConfig;
pub use http::HttpServer;
pub use metrics::{SensorMetrics, SharedMetrics};
pub use runner::ExporterRunner;
pub use sampler::{SampleOutcome, Sampler, SamplerError};
pub use sensor::{Sensor, SensorError, SensorReader};
