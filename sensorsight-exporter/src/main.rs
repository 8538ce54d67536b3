//! Prometheus exporter for DHT temperature and humidity sensors.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use sensorsight_exporter::{ExporterRunner, Sensor};
use sensorsight_common::SensorModel;
use sensorsight_exporter::config::{BackendConfig, ExporterConfig};

/// Prometheus exporter for DHT temperature and humidity sensors.
#[derive(Parser, Debug)]
#[command(name = "sensorsight-exporter")]
#[command(about = "Export DHT sensor readings as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// HTTP port, keeping the configured host (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Seconds between sensor reads (overrides config).
    #[arg(short, long)]
    interval: Option<u64>,

    /// Sensor model: DHT11, DHT22 or AM2302 (overrides config).
    #[arg(short, long)]
    model: Option<SensorModel>,

    /// Location label (overrides config).
    #[arg(long, env = "SENSOR_LOCATION")]
    location: Option<String>,

    /// Use the simulated sensor instead of hardware.
    #[arg(long)]
    simulate: bool,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Apply command line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut ExporterConfig) -> anyhow::Result<()> {
        if let Some(listen) = &self.listen {
            config.http.listen = listen.clone();
        }
        if let Some(port) = self.port {
            config.http.set_port(port)?;
        }
        if let Some(model) = self.model {
            config.sensor.model = model;
        }
        if let Some(interval) = self.interval {
            config.sampler.interval_secs = interval;
        }
        if let Some(location) = &self.location {
            config.sampler.location = location.clone();
        }
        if self.simulate {
            config.sensor.backend = BackendConfig::simulated();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => ExporterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => ExporterConfig::default(),
    };
    args.apply(&mut config)?;
    config.validate()?;

    // Initialize logging
    sensorsight_common::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting SensorSight exporter");
    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    // Create shutdown signal before touching the sensor
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(signal, "Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let Some(runner) = start_unless_shutdown(&config, &mut shutdown_rx).await? else {
        info!("Shutdown requested during startup");
        return Ok(());
    };

    runner.run(shutdown_rx).await
}

/// Start the exporter, giving up if shutdown is requested first.
///
/// Dropping the startup future releases a sensor that was already opened.
async fn start_unless_shutdown(
    config: &ExporterConfig,
    shutdown: &mut watch::Receiver<bool>,
) -> anyhow::Result<Option<ExporterRunner<Sensor>>> {
    tokio::select! {
        biased;

        _ = shutdown.changed() => Ok(None),
        runner = ExporterRunner::from_config(config) => runner.map(Some),
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => "SIGINT",
                    _ = sigterm.recv() => "SIGTERM",
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
                "SIGINT"
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "Ctrl+C"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "sensorsight-exporter",
            "--port",
            "9100",
            "--interval",
            "30",
            "--location",
            "garage",
            "--model",
            "am2302",
            "--simulate",
        ]);
        let mut config = ExporterConfig::default();
        args.apply(&mut config).unwrap();

        assert_eq!(config.http.listen, "0.0.0.0:9100");
        assert_eq!(config.sampler.interval_secs, 30);
        assert_eq!(config.sampler.location, "garage");
        assert_eq!(config.sensor.backend, BackendConfig::simulated());
        assert_eq!(config.sensor.model, SensorModel::Am2302);
    }

    #[tokio::test]
    async fn test_startup_abandoned_on_shutdown() {
        let mut config = ExporterConfig::default();
        config.http.listen = "127.0.0.1:0".to_string();
        config.sensor.backend = BackendConfig::simulated();

        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();

        let runner = start_unless_shutdown(&config, &mut rx).await.unwrap();
        assert!(runner.is_none());
    }

    #[tokio::test]
    async fn test_startup_completes_without_shutdown() {
        let mut config = ExporterConfig::default();
        config.http.listen = "127.0.0.1:0".to_string();
        config.sensor.backend = BackendConfig::simulated();

        let (_tx, mut rx) = watch::channel(false);

        let runner = start_unless_shutdown(&config, &mut rx).await.unwrap();
        assert!(runner.is_some());
    }

    #[test]
    fn test_args_reject_unknown_model() {
        let result = Args::try_parse_from(["sensorsight-exporter", "--model", "bme280"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_args_defaults_keep_config() {
        let args = Args::parse_from(["sensorsight-exporter"]);
        let mut config = ExporterConfig::default();
        config.sampler.location = "from-file".to_string();

        // SENSOR_LOCATION may be set in the environment running the tests.
        if args.location.is_none() {
            args.apply(&mut config).unwrap();
            assert_eq!(config.sampler.location, "from-file");
            assert_eq!(config.http.listen, "0.0.0.0:8000");
        }
    }
}
