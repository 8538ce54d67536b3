//! HTTP server for Prometheus metrics endpoint.

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::metrics::SharedMetrics;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    metrics: SharedMetrics,
}

/// Create the HTTP router.
fn create_router(metrics: SharedMetrics, metrics_path: &str) -> Router {
    let state = AppState { metrics };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", OPENMETRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n").into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler(State(state): State<AppState>) -> Response {
    let body = json!({
        "status": "healthy",
        "read_errors_total": state.metrics.read_errors(),
        "last_successful_read_timestamp_seconds": state.metrics.last_success_timestamp(),
    });

    (StatusCode::OK, Json(body)).into_response()
}

/// Handler for the /ready endpoint.
async fn ready_handler(State(state): State<AppState>) -> Response {
    if state.metrics.last_success_timestamp().is_some() {
        (StatusCode::OK, "ready\n").into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready - no successful sensor read yet\n",
        )
            .into_response()
    }
}

/// HTTP server bound to its listen address.
pub struct HttpServer {
    metrics: SharedMetrics,
    listener: TcpListener,
    metrics_path: String,
}

impl HttpServer {
    /// Bind the listen address. Serving starts with [`HttpServer::run`].
    pub async fn bind(
        metrics: SharedMetrics,
        listen_addr: SocketAddr,
        metrics_path: String,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", listen_addr, e))?;

        Ok(Self {
            metrics,
            listener,
            metrics_path,
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let addr = self.local_addr()?;
        let router = create_router(self.metrics, &self.metrics_path);

        info!(
            addr = %addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        // Run server with graceful shutdown
        axum::serve(self.listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if *shutdown.borrow_and_update() {
                        break;
                    }
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SensorMetrics;
    use axum::body::Body;
    use axum::http::Request;
    use sensorsight_common::{Reading, SensorIdentity, SensorModel};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn make_metrics() -> SharedMetrics {
        Arc::new(SensorMetrics::new(&SensorIdentity::new(
            SensorModel::Dht22,
            "D4",
            "default",
            "test",
        )))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let metrics = make_metrics();
        metrics.record_reading(&Reading::new(22.5, 55.0).derive(), 1_700_000_000.0);
        let router = create_router(metrics, "/metrics");

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response.headers().get("content-type").unwrap();
        assert!(
            content_type
                .to_str()
                .unwrap()
                .starts_with("application/openmetrics-text")
        );

        let body = body_string(response).await;
        assert!(body.contains("sensor_temperature_fahrenheit{"));
        assert!(body.contains("sensor_info{"));
        assert!(body.trim_end().ends_with("# EOF"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let metrics = make_metrics();
        metrics.record_failure();
        let router = create_router(metrics, "/metrics");

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["read_errors_total"], 1);
        assert!(body["last_successful_read_timestamp_seconds"].is_null());
    }

    #[tokio::test]
    async fn test_ready_endpoint_not_ready() {
        let router = create_router(make_metrics(), "/metrics");

        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        // Not ready because the sensor has not been read yet
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_ready_endpoint_ready() {
        let metrics = make_metrics();
        metrics.record_reading(&Reading::new(20.0, 40.0).derive(), 1_700_000_000.0);
        let router = create_router(metrics, "/metrics");

        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let router = create_router(make_metrics(), "/sensor/metrics");

        // Custom path should work
        let response = router
            .clone()
            .oneshot(Request::get("/sensor/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Default path should 404
        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bind_reports_local_addr() {
        let server = HttpServer::bind(
            make_metrics(),
            "127.0.0.1:0".parse().unwrap(),
            "/metrics".to_string(),
        )
        .await
        .unwrap();

        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }
}
