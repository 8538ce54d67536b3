//! Exporter lifecycle: startup sequencing and the running service.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sensorsight_common::SensorIdentity;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::ExporterConfig;
use crate::http::HttpServer;
use crate::metrics::{SensorMetrics, SharedMetrics};
use crate::sampler::Sampler;
use crate::sensor::{Sensor, SensorReader};

/// A started exporter, ready to run.
///
/// Startup happens in a fixed order:
/// 1. Open the sensor (failure is fatal)
/// 2. Optional warm-up read (failure is fatal)
/// 3. Publish the sensor identity
/// 4. Bind the HTTP listener
///
/// Nothing is served until every step succeeded.
pub struct ExporterRunner<S: SensorReader> {
    identity: SensorIdentity,
    metrics: SharedMetrics,
    sampler: Sampler<S>,
    server: HttpServer,
}

impl ExporterRunner<Sensor> {
    /// Open the configured sensor and start the exporter.
    pub async fn from_config(config: &ExporterConfig) -> anyhow::Result<Self> {
        let sensor = Sensor::open(&config.sensor)
            .await
            .context("Failed to initialize sensor")?;

        Self::start(sensor, config).await
    }
}

impl<S: SensorReader + 'static> ExporterRunner<S> {
    /// Start the exporter around an already opened sensor.
    pub async fn start(sensor: S, config: &ExporterConfig) -> anyhow::Result<Self> {
        let identity = config.identity(env!("CARGO_PKG_VERSION"));
        let metrics = Arc::new(SensorMetrics::new(&identity));

        let mut sampler = Sampler::new(sensor, metrics.clone(), &identity, config.sampler.interval());

        if config.sensor.warmup {
            sampler.warm_up().await.context("Sensor not responding")?;
        }

        let listen_addr = config.http.listen_addr()?;
        let server =
            HttpServer::bind(metrics.clone(), listen_addr, config.http.path.clone()).await?;

        info!(
            port = listen_addr.port(),
            location = %identity.location,
            sensor_type = %identity.model,
            gpio_pin = %identity.gpio_pin,
            "Starting sensor exporter"
        );

        Ok(Self {
            identity,
            metrics,
            sampler,
            server,
        })
    }

    /// Address the metrics endpoint is bound to.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.server.local_addr()
    }

    /// Shared metrics handle.
    pub fn metrics(&self) -> SharedMetrics {
        self.metrics.clone()
    }

    /// Static identity published at startup.
    pub fn identity(&self) -> &SensorIdentity {
        &self.identity
    }

    /// Serve metrics and sample the sensor until `shutdown` turns true.
    ///
    /// Returns `Ok` after a requested shutdown. A sensor failure or an HTTP
    /// server failure ends the run with an error; the sensor is released in
    /// every case.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut http_task = tokio::spawn(self.server.run(shutdown.clone()));
        let sampling = self.sampler.run(shutdown.clone());
        tokio::pin!(sampling);

        let mut http_stopped = false;
        let outcome = tokio::select! {
            biased;

            result = &mut sampling => result.context("Sampling loop failed"),
            joined = &mut http_task => {
                http_stopped = true;
                match joined {
                    // The server saw the shutdown before the sampler did.
                    Ok(Ok(())) if *shutdown.borrow() => {
                        sampling.await.context("Sampling loop failed")
                    }
                    Ok(Ok(())) => Err(anyhow::anyhow!("HTTP server stopped unexpectedly")),
                    Ok(Err(e)) => Err(e.context("HTTP server failed")),
                    Err(e) => Err(anyhow::anyhow!("HTTP server task failed: {}", e)),
                }
            }
        };

        match outcome {
            Ok(()) if http_stopped => {
                info!(errors_total = self.metrics.read_errors(), "Exporter stopped");
                Ok(())
            }
            Ok(()) => {
                match tokio::time::timeout(std::time::Duration::from_secs(5), http_task).await {
                    Ok(Ok(Ok(()))) => {}
                    Ok(Ok(Err(e))) => warn!(error = %e, "HTTP server error during shutdown"),
                    Ok(Err(e)) => warn!(error = %e, "HTTP server task failed during shutdown"),
                    Err(_) => warn!("HTTP server did not stop in time"),
                }

                info!(errors_total = self.metrics.read_errors(), "Exporter stopped");
                Ok(())
            }
            Err(e) => {
                http_task.abort();
                error!(error = %e, "Exporter failed");
                Err(e)
            }
        }
    }
}
