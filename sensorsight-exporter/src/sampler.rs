//! Fixed-interval sensor sampling.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sensorsight_common::{DerivedReading, SensorIdentity};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::metrics::SharedMetrics;
use crate::sensor::{SensorError, SensorReader};

/// Errors that stop the sampling loop.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("Sensor not responding during warm-up: {0}")]
    Warmup(#[source] SensorError),
    #[error("Unrecoverable sensor failure: {0}")]
    Sensor(#[source] SensorError),
}

/// Result of one sampling cycle.
#[derive(Debug)]
pub enum SampleOutcome {
    /// The reading was published.
    Success {
        reading: DerivedReading,
        timestamp: DateTime<Utc>,
    },
    /// The read failed and was counted.
    Failure { error: SensorError, error_count: u64 },
}

/// Reads the sensor on a fixed interval and publishes the results.
///
/// The sampler owns the sensor; it is released when the sampler is dropped,
/// whichever way the loop ends.
pub struct Sampler<S: SensorReader> {
    sensor: S,
    metrics: SharedMetrics,
    interval: Duration,
    sensor_type: &'static str,
    location: String,
    error_count: u64,
    last_success: Option<DateTime<Utc>>,
}

impl<S: SensorReader> Sampler<S> {
    /// Create a sampler for `sensor`, publishing into `metrics`.
    pub fn new(
        sensor: S,
        metrics: SharedMetrics,
        identity: &SensorIdentity,
        interval: Duration,
    ) -> Self {
        Self {
            sensor,
            metrics,
            interval,
            sensor_type: identity.model.as_str(),
            location: identity.location.clone(),
            error_count: 0,
            last_success: None,
        }
    }

    /// Failed reads so far.
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Time of the last successful read.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    /// Read the sensor once before serving traffic.
    ///
    /// A successful reading is published like any other sample. Any failure
    /// is returned as an error; there is no retry.
    pub async fn warm_up(&mut self) -> Result<DerivedReading, SamplerError> {
        info!(sensor_type = self.sensor_type, "Checking sensor...");

        let reading = self.sensor.read().await.map_err(SamplerError::Warmup)?;
        let derived = reading.derive();
        self.publish(&derived);

        Ok(derived)
    }

    /// Perform one read and publish its result.
    ///
    /// Transient failures are counted and reported as [`SampleOutcome::Failure`];
    /// only unrecoverable sensor errors are returned as `Err`.
    pub async fn sample_once(&mut self) -> Result<SampleOutcome, SamplerError> {
        match self.sensor.read().await {
            Ok(reading) => {
                let derived = reading.derive();
                let timestamp = self.publish(&derived);
                Ok(SampleOutcome::Success {
                    reading: derived,
                    timestamp,
                })
            }
            Err(error) if error.is_transient() => {
                self.error_count += 1;
                let published = self.metrics.record_failure();
                debug_assert_eq!(published, self.error_count);

                warn!(
                    error = %error,
                    errors_total = self.error_count,
                    "Failed to read sensor (total errors: {})",
                    self.error_count
                );

                Ok(SampleOutcome::Failure {
                    error,
                    error_count: self.error_count,
                })
            }
            Err(error) => Err(SamplerError::Sensor(error)),
        }
    }

    /// Run the sampling loop until `shutdown` turns true or the sender is dropped.
    ///
    /// Each cycle sleeps for the interval, then samples once.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), SamplerError> {
        info!(
            interval_secs = self.interval.as_secs(),
            location = %self.location,
            "Starting sampling loop"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if let Err(e) = self.sample_once().await {
                error!(error = %e, "Sampling loop failed");
                return Err(e);
            }
        }

        info!(errors_total = self.error_count, "Sampling loop stopped");
        Ok(())
    }

    fn publish(&mut self, reading: &DerivedReading) -> DateTime<Utc> {
        let now = Utc::now();
        self.metrics.record_reading(reading, now.timestamp_millis() as f64 / 1000.0);
        self.last_success = Some(now);

        info!(
            sensor_type = self.sensor_type,
            location = %self.location,
            "{}",
            reading
        );

        now
    }
}

impl<S: SensorReader> Drop for Sampler<S> {
    fn drop(&mut self) {
        debug!("Releasing sensor");
        self.sensor.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::metrics::{SensorMetrics, sample_value};
    use crate::sensor::{ScriptedHandle, ScriptedSensor};
    use sensorsight_common::SensorModel;

    const FAHRENHEIT: &str =
        r#"sensor_temperature_fahrenheit{sensor_type="DHT22",location="default"}"#;
    const CELSIUS: &str = r#"sensor_temperature_celsius{sensor_type="DHT22",location="default"}"#;
    const HUMIDITY: &str = r#"sensor_humidity_percent{sensor_type="DHT22",location="default"}"#;
    const ERRORS: &str = "sensor_read_errors_total";
    const LAST_SUCCESS: &str = "sensor_last_successful_read_timestamp_seconds";

    fn make_sampler(
        sensor: ScriptedSensor,
        interval: Duration,
    ) -> (Sampler<ScriptedSensor>, SharedMetrics, ScriptedHandle) {
        let identity = SensorIdentity::new(SensorModel::Dht22, "D4", "default", "test");
        let metrics = Arc::new(SensorMetrics::new(&identity));
        let handle = sensor.handle();
        let sampler = Sampler::new(sensor, metrics.clone(), &identity, interval);
        (sampler, metrics, handle)
    }

    fn value(metrics: &SharedMetrics, series: &str) -> Option<f64> {
        sample_value(&metrics.render().unwrap(), series)
    }

    #[tokio::test]
    async fn test_successful_read_publishes_gauges() {
        let sensor = ScriptedSensor::default().then_ok(22.5, 55.0);
        let (mut sampler, metrics, _) = make_sampler(sensor, Duration::from_secs(10));

        let outcome = sampler.sample_once().await.unwrap();

        let SampleOutcome::Success { reading, timestamp } = outcome else {
            panic!("expected success");
        };
        assert!((reading.temperature_fahrenheit - 72.5).abs() < 1e-9);
        assert_eq!(value(&metrics, FAHRENHEIT), Some(72.5));
        assert_eq!(value(&metrics, CELSIUS), Some(22.5));
        assert_eq!(value(&metrics, HUMIDITY), Some(55.0));
        assert_eq!(value(&metrics, ERRORS), Some(0.0));
        assert_eq!(sampler.error_count(), 0);
        assert_eq!(sampler.last_success(), Some(timestamp));
        assert_eq!(
            value(&metrics, LAST_SUCCESS),
            Some(timestamp.timestamp_millis() as f64 / 1000.0)
        );
    }

    #[tokio::test]
    async fn test_consecutive_failures_count_up() {
        let sensor = ScriptedSensor::default()
            .then_err(SensorError::MissingValue("temperature"))
            .then_err(SensorError::MissingValue("temperature"))
            .then_err(SensorError::MissingValue("temperature"));
        let (mut sampler, metrics, _) = make_sampler(sensor, Duration::from_secs(10));

        for expected in 1..=3 {
            match sampler.sample_once().await.unwrap() {
                SampleOutcome::Failure { error_count, .. } => assert_eq!(error_count, expected),
                other => panic!("expected failure, got {:?}", other),
            }
            assert_eq!(value(&metrics, ERRORS), Some(expected as f64));
        }

        assert_eq!(value(&metrics, CELSIUS), None);
        assert_eq!(value(&metrics, FAHRENHEIT), None);
        assert_eq!(value(&metrics, HUMIDITY), None);
        assert_eq!(metrics.last_success_timestamp(), None);
        assert_eq!(sampler.last_success(), None);
    }

    #[tokio::test]
    async fn test_failure_keeps_last_good_values() {
        let sensor = ScriptedSensor::default()
            .then_ok(20.0, 40.0)
            .then_err(SensorError::Checksum)
            .then_ok(25.0, 60.0);
        let (mut sampler, metrics, _) = make_sampler(sensor, Duration::from_secs(10));

        sampler.sample_once().await.unwrap();
        let first_success = metrics.last_success_timestamp();

        sampler.sample_once().await.unwrap();
        assert_eq!(value(&metrics, CELSIUS), Some(20.0));
        assert_eq!(value(&metrics, HUMIDITY), Some(40.0));
        assert_eq!(metrics.last_success_timestamp(), first_success);

        sampler.sample_once().await.unwrap();
        assert_eq!(value(&metrics, CELSIUS), Some(25.0));
        assert_eq!(value(&metrics, FAHRENHEIT), Some(77.0));
        assert_eq!(value(&metrics, HUMIDITY), Some(60.0));
        assert_eq!(sampler.error_count(), 1);
        assert_eq!(value(&metrics, ERRORS), Some(1.0));
        assert!(metrics.last_success_timestamp() >= first_success);
    }

    #[tokio::test]
    async fn test_fatal_error_is_returned() {
        let sensor =
            ScriptedSensor::default().then_err(SensorError::Disconnected("gone".to_string()));
        let (mut sampler, metrics, _) = make_sampler(sensor, Duration::from_secs(10));

        let err = sampler.sample_once().await.unwrap_err();
        assert!(matches!(err, SamplerError::Sensor(SensorError::Disconnected(_))));
        assert_eq!(metrics.read_errors(), 0);
    }

    #[tokio::test]
    async fn test_warm_up_success_publishes() {
        let sensor = ScriptedSensor::default().then_ok(22.5, 55.0);
        let (mut sampler, metrics, _) = make_sampler(sensor, Duration::from_secs(10));

        sampler.warm_up().await.unwrap();
        assert_eq!(value(&metrics, FAHRENHEIT), Some(72.5));
        assert!(sampler.last_success().is_some());
    }

    #[tokio::test]
    async fn test_warm_up_failure() {
        let sensor = ScriptedSensor::default().then_err(SensorError::Timeout);
        let (mut sampler, metrics, _) = make_sampler(sensor, Duration::from_secs(10));

        let err = sampler.warm_up().await.unwrap_err();
        assert!(matches!(err, SamplerError::Warmup(SensorError::Timeout)));
        assert_eq!(metrics.read_errors(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sleeps_before_each_read() {
        let sensor = ScriptedSensor::default()
            .then_ok(20.0, 40.0)
            .then_ok(21.0, 41.0);
        let (sampler, metrics, handle) = make_sampler(sensor, Duration::from_secs(10));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(sampler.run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.reads(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.reads(), 1);
        assert_eq!(value(&metrics, CELSIUS), Some(20.0));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.reads(), 2);
        assert_eq!(value(&metrics, CELSIUS), Some(21.0));

        shutdown_tx.send(true).unwrap();
        task.await.unwrap().unwrap();
        assert!(handle.released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_sleep_releases_sensor() {
        let sensor = ScriptedSensor::default().then_ok(20.0, 40.0);
        let (sampler, _metrics, handle) = make_sampler(sensor, Duration::from_secs(10));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(sampler.run(shutdown_rx));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(handle.reads(), 1);

        shutdown_tx.send(true).unwrap();
        let result = task.await.unwrap();

        assert!(result.is_ok());
        assert!(handle.released());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handle.reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_stops_loop() {
        let (sampler, _metrics, handle) =
            make_sampler(ScriptedSensor::default(), Duration::from_secs(10));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(sampler.run(shutdown_rx));
        drop(shutdown_tx);

        assert!(task.await.unwrap().is_ok());
        assert_eq!(handle.reads(), 0);
        assert!(handle.released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_loop_and_releases() {
        let sensor = ScriptedSensor::default()
            .then_err(SensorError::Timeout)
            .then_err(SensorError::Disconnected("unplugged".to_string()));
        let (sampler, metrics, handle) = make_sampler(sensor, Duration::from_secs(1));
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let result = sampler.run(shutdown_rx).await;

        assert!(matches!(result, Err(SamplerError::Sensor(_))));
        assert_eq!(handle.reads(), 2);
        assert_eq!(metrics.read_errors(), 1);
        assert!(handle.released());
    }
}
