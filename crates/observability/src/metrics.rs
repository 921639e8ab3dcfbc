//! Prometheus-kompatible Metriken fuer Funkraum
//!
//! Registrierte Metriken:
//! - `funkraum_connected_clients` – Gauge: Aktuell offene WebSocket-Verbindungen
//! - `funkraum_rooms` – Gauge: Anzahl bekannter Raeume
//! - `funkraum_messages_total` – Counter: Eingehende Nachrichten (type)
//! - `funkraum_signals_relayed_total` – Counter: Weitergeleitete Signaling-Nachrichten
//! - `funkraum_signals_dropped_total` – Counter: Verworfene Signaling-Nachrichten

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Funkraum-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Metrik-Handles.
#[derive(Clone)]
pub struct FunkraumMetrics {
    pub registry: Arc<Registry>,

    pub connected_clients: IntGauge,
    pub rooms: IntGauge,
    pub messages_total: IntCounterVec,
    pub signals_relayed_total: IntCounter,
    pub signals_dropped_total: IntCounter,
}

impl FunkraumMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "funkraum_connected_clients",
            "Anzahl offener WebSocket-Verbindungen",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let rooms = IntGauge::with_opts(Opts::new("funkraum_rooms", "Anzahl bekannter Raeume"))?;
        registry.register(Box::new(rooms.clone()))?;

        let messages_total = IntCounterVec::new(
            Opts::new(
                "funkraum_messages_total",
                "Eingehende Nachrichten nach Typ",
            ),
            &["type"],
        )?;
        registry.register(Box::new(messages_total.clone()))?;

        let signals_relayed_total = IntCounter::with_opts(Opts::new(
            "funkraum_signals_relayed_total",
            "Weitergeleitete Signaling-Nachrichten",
        ))?;
        registry.register(Box::new(signals_relayed_total.clone()))?;

        let signals_dropped_total = IntCounter::with_opts(Opts::new(
            "funkraum_signals_dropped_total",
            "Verworfene Signaling-Nachrichten (Empfaenger nicht erreichbar)",
        ))?;
        registry.register(Box::new(signals_dropped_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            rooms,
            messages_total,
            signals_relayed_total,
            signals_dropped_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: FunkraumMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<FunkraumMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
