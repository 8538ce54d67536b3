//! Sensor that replays a fixed sequence of results.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use sensorsight_common::Reading;

use super::{SensorError, SensorReader};

/// Replays queued results in order. Once the script is exhausted every read
/// reports a missing value.
#[derive(Debug, Default)]
pub struct ScriptedSensor {
    script: VecDeque<Result<Reading, SensorError>>,
    handle: ScriptedHandle,
}

/// Observes a [`ScriptedSensor`] after it has been moved into a sampler.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHandle {
    reads: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl ScriptedHandle {
    /// Number of read attempts so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Whether the sensor has been released.
    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl ScriptedSensor {
    /// Create a sensor replaying `script`.
    pub fn new(script: impl IntoIterator<Item = Result<Reading, SensorError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            handle: ScriptedHandle::default(),
        }
    }

    /// Queue a successful reading.
    pub fn then_ok(mut self, temperature: f64, humidity: f64) -> Self {
        self.script.push_back(Ok(Reading::new(temperature, humidity)));
        self
    }

    /// Queue a failed read.
    pub fn then_err(mut self, error: SensorError) -> Self {
        self.script.push_back(Err(error));
        self
    }

    /// Handle for inspecting the sensor later.
    pub fn handle(&self) -> ScriptedHandle {
        self.handle.clone()
    }
}

impl SensorReader for ScriptedSensor {
    async fn read(&mut self) -> Result<Reading, SensorError> {
        self.handle.reads.fetch_add(1, Ordering::SeqCst);
        self.script
            .pop_front()
            .unwrap_or(Err(SensorError::MissingValue("temperature")))
    }

    fn release(&mut self) {
        self.handle.released.store(true, Ordering::SeqCst);
    }
}
