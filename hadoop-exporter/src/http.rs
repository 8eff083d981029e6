/**
 * Exposition server
 *
 * ROUTES :
 * - GET /                landing page linking the metrics path
 * - GET <metrics path>   runs one scrape cycle, Prometheus text format
 * - GET /health          liveness of the exporter process itself
 * - GET /status          topology, active endpoint and last cycle as JSON
 *
 * Scrape failures are reported through the liveness gauges, never through
 * the HTTP status; only an encoding failure yields a 500.
 */

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use tracing::error;

use crate::exporter::{Exporter, ExporterStatus};

#[derive(Clone)]
pub struct AppState {
    pub exporter: Arc<Exporter>,
    pub metrics_path: String,
}

impl AppState {
    pub fn new(exporter: Arc<Exporter>, metrics_path: impl Into<String>) -> Self {
        Self { exporter, metrics_path: metrics_path.into() }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    let metrics_path = app_state.metrics_path.clone();
    Router::new()
        .route("/", get(landing))
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(get_status))
        .route(&metrics_path, get(get_metrics))
        .with_state(app_state)
}

// GET /
async fn landing(State(app): State<AppState>) -> Html<String> {
    let title = format!("{} Exporter", app.exporter.kind().metric_prefix());
    Html(format!(
        "<html>\n<head><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n<p><a href=\"/status\">Status</a></p>\n</body>\n</html>\n",
        path = app.metrics_path
    ))
}

// GET <metrics path>
async fn get_metrics(State(app): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let report = app.exporter.collect().await;
    match report.metrics.render() {
        Ok(body) => Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body)),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// GET /status
async fn get_status(State(app): State<AppState>) -> Json<ExporterStatus> {
    Json(app.exporter.status())
}
