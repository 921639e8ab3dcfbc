//! Health-Check-Endpunkt fuer Funkraum
//!
//! Endpoint: `GET /health`
//! Response: 200 mit festem JSON-Body (Status + Version). Dient nur als
//! Liveness-Probe, daher keine veraenderlichen Felder.

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
}

impl HealthResponse {
    fn aktuell() -> Self {
        Self {
            status: HealthStatus::Healthy,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router() -> Router {
    Router::new().route("/health", get(health_handler))
}

/// `GET /health` – Prozess lebt und nimmt Anfragen an
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::aktuell()))
}
