use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// A single temperature/humidity sample as returned by a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Temperature in degrees Celsius.
    pub temperature_celsius: f64,

    /// Relative humidity in percent (0-100).
    pub humidity_percent: f64,
}

impl Reading {
    /// Create a new reading.
    pub fn new(temperature_celsius: f64, humidity_percent: f64) -> Self {
        Self {
            temperature_celsius,
            humidity_percent,
        }
    }

    /// Compute the derived values published for this reading.
    pub fn derive(&self) -> DerivedReading {
        DerivedReading {
            temperature_celsius: self.temperature_celsius,
            temperature_fahrenheit: celsius_to_fahrenheit(self.temperature_celsius),
            humidity_percent: self.humidity_percent,
        }
    }
}

/// A reading together with the values computed from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedReading {
    pub temperature_celsius: f64,
    pub temperature_fahrenheit: f64,
    pub humidity_percent: f64,
}

impl std::fmt::Display for DerivedReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Temp: {:.1}°F ({:.1}°C), Humidity: {:.1}%",
            self.temperature_fahrenheit, self.temperature_celsius, self.humidity_percent
        )
    }
}

/// Convert degrees Celsius to degrees Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Supported sensor models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorModel {
    Dht11,
    #[default]
    Dht22,
    Am2302,
}

impl SensorModel {
    /// Get the string representation used in metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorModel::Dht11 => "DHT11",
            SensorModel::Dht22 => "DHT22",
            SensorModel::Am2302 => "AM2302",
        }
    }

    /// Temperature range the sensor can report, in degrees Celsius.
    pub fn temperature_range(&self) -> (f64, f64) {
        match self {
            SensorModel::Dht11 => (0.0, 50.0),
            SensorModel::Dht22 | SensorModel::Am2302 => (-40.0, 80.0),
        }
    }

    /// Check whether a reading lies within what this model can physically report.
    pub fn is_plausible(&self, reading: &Reading) -> bool {
        let (min, max) = self.temperature_range();
        (min..=max).contains(&reading.temperature_celsius)
            && (0.0..=100.0).contains(&reading.humidity_percent)
    }
}

impl std::fmt::Display for SensorModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SensorModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DHT11" => Ok(SensorModel::Dht11),
            "DHT22" => Ok(SensorModel::Dht22),
            "AM2302" => Ok(SensorModel::Am2302),
            _ => Err(Error::SensorModel(s.to_string())),
        }
    }
}

/// Static descriptive attributes of the sensor, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorIdentity {
    /// Sensor model.
    pub model: SensorModel,

    /// GPIO pin the sensor data line is wired to (e.g., "D4").
    pub gpio_pin: String,

    /// Location label attached to every reading.
    pub location: String,

    /// Exporter software version.
    pub version: String,
}

impl SensorIdentity {
    /// Create a new identity.
    pub fn new(
        model: SensorModel,
        gpio_pin: impl Into<String>,
        location: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            model,
            gpio_pin: gpio_pin.into(),
            location: location.into(),
            version: version.into(),
        }
    }
}
