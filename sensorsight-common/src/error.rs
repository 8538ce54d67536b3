use thiserror::Error;

/// Common error type for SensorSight components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid sensor model: {0}")]
    SensorModel(String),
}

/// Result type alias using SensorSight's Error.
pub type Result<T> = std::result::Result<T, Error>;
