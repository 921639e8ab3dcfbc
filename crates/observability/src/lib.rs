//! # funkraum-observability
//!
//! Observability-Crate fuer Funkraum:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber (text/json)
//! - Request-Timing Middleware
//!
//! Alle Router laufen auf demselben Port wie der WebSocket-Endpunkt und
//! werden vom Server-Binary zusammengesetzt.

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{health_router, HealthResponse, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, FunkraumMetrics};
pub use middleware::{request_timing_layer, timing_middleware};
