//! # liftcom-observability
//!
//! Observability-Crate fuer das LiftCom-Relay:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber
//! - Request-Tracing Layer

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::health_router;
pub use logging::logging_initialisieren;
pub use metrics::{RelayMetriken, metrics_router};
pub use middleware::request_timing_layer;
