//! Request-Tracing fuer die HTTP-Endpunkte
//!
//! Der WebSocket-Upgrade laeuft ebenfalls ueber diesen Layer, danach
//! loggt die Verbindung selbst.

use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;

/// Erstellt den Axum-Layer, der jede HTTP-Anfrage als Span protokolliert.
pub fn request_timing_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}
