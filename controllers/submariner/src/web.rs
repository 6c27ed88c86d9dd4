//! HTTP endpoint for metrics scraping and kubelet probes.

use crate::error::ControllerError;
use crate::metrics::PrometheusMetrics;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// State shared between the controller and the web server
#[derive(Debug, Clone)]
pub struct WebState {
    pub metrics: Arc<PrometheusMetrics>,
    /// Set once the watchers are running
    pub ready: Arc<AtomicBool>,
}

impl WebState {
    pub fn new(metrics: Arc<PrometheusMetrics>) -> Self {
        Self {
            metrics,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn metrics_handler(
    State(state): State<WebState>,
) -> Result<([(header::HeaderName, &'static str); 1], String), StatusCode> {
    match state.metrics.encode() {
        Ok(body) => Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn readyz_handler(State(state): State<WebState>) -> (StatusCode, &'static str) {
    if state.ready.load(Ordering::Acquire) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    }
}

/// Serve [`router`] on `addr` until the task is dropped
pub async fn serve(addr: SocketAddr, state: WebState) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::InvalidConfig(format!("cannot bind {}: {}", addr, e)))?;
    info!("Metrics and probes listening on {}", addr);
    axum::serve(listener, router(state))
        .await
        .map_err(|e| ControllerError::Watch(format!("metrics server stopped: {}", e)))
}
