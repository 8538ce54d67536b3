//! Simulated sensor producing slowly drifting readings.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use sensorsight_common::Reading;
use tracing::debug;

use super::{SensorError, SensorReader};

/// Maximum change of the temperature between two reads, in Celsius.
const TEMPERATURE_STEP: f64 = 0.3;
/// Maximum change of the humidity between two reads, in percent.
const HUMIDITY_STEP: f64 = 1.0;
/// How far the simulation may wander from its base values.
const TEMPERATURE_SPREAD: f64 = 5.0;
const HUMIDITY_SPREAD: f64 = 15.0;

/// A sensor that generates readings instead of talking to hardware.
#[derive(Debug)]
pub struct SimulatedSensor {
    rng: SmallRng,
    base: Reading,
    current: Reading,
    failure_rate: f64,
    released: bool,
}

impl SimulatedSensor {
    /// Create a simulated sensor drifting around the given base values.
    pub fn new(
        base_temperature: f64,
        base_humidity: f64,
        failure_rate: f64,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let base = Reading::new(base_temperature, base_humidity);

        Self {
            rng,
            base,
            current: base,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            released: false,
        }
    }

    fn step(&mut self) -> Reading {
        let temperature = self.current.temperature_celsius
            + self.rng.random_range(-TEMPERATURE_STEP..=TEMPERATURE_STEP);
        let humidity =
            self.current.humidity_percent + self.rng.random_range(-HUMIDITY_STEP..=HUMIDITY_STEP);

        self.current = Reading::new(
            temperature.clamp(
                self.base.temperature_celsius - TEMPERATURE_SPREAD,
                self.base.temperature_celsius + TEMPERATURE_SPREAD,
            ),
            humidity
                .clamp(
                    self.base.humidity_percent - HUMIDITY_SPREAD,
                    self.base.humidity_percent + HUMIDITY_SPREAD,
                )
                .clamp(0.0, 100.0),
        );
        self.current
    }
}

impl SensorReader for SimulatedSensor {
    async fn read(&mut self) -> Result<Reading, SensorError> {
        if self.released {
            return Err(SensorError::Disconnected(
                "sensor already released".to_string(),
            ));
        }

        if self.failure_rate > 0.0 && self.rng.random_bool(self.failure_rate) {
            debug!("Simulating a missed sensor read");
            return Err(SensorError::MissingValue("temperature"));
        }

        Ok(self.step())
    }

    fn release(&mut self) {
        self.released = true;
    }
}
