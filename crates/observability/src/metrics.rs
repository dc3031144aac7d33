//! Prometheus-kompatible Metriken fuer das LiftCom-Relay
//!
//! Registrierte Metriken:
//! - `liftcom_connected_clients` – Gauge: Aktuell verbundene WebSockets
//! - `liftcom_messages_total{type}` – Counter: Erkannte eingehende Nachrichten
//! - `liftcom_dropped_messages_total{reason}` – Counter: Verworfene Eingaben
//! - `liftcom_floor_events_total{event}` – Counter: Floor-Uebergaenge
//! - `liftcom_audio_frames_total` – Counter: Weitergeleitete Audio-Bursts
//! - `liftcom_deliveries_total` – Counter: An Mitglieder eingereihte Frames

use anyhow::Result;
use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Relay-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Metrik-Handles.
#[derive(Clone)]
pub struct RelayMetriken {
    pub registry: Arc<Registry>,

    pub connected_clients: IntGauge,
    pub messages_total: IntCounterVec,
    pub dropped_messages_total: IntCounterVec,
    pub floor_events_total: IntCounterVec,
    pub audio_frames_total: IntCounter,
    pub deliveries_total: IntCounter,
}

impl RelayMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "liftcom_connected_clients",
            "Anzahl aktuell verbundener WebSocket-Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let messages_total = IntCounterVec::new(
            Opts::new(
                "liftcom_messages_total",
                "Erkannte eingehende Nachrichten nach Typ",
            ),
            &["type"],
        )?;
        registry.register(Box::new(messages_total.clone()))?;

        let dropped_messages_total = IntCounterVec::new(
            Opts::new(
                "liftcom_dropped_messages_total",
                "Verworfene eingehende Nachrichten nach Grund",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(dropped_messages_total.clone()))?;

        let floor_events_total = IntCounterVec::new(
            Opts::new(
                "liftcom_floor_events_total",
                "Floor-Uebergaenge (granted, renewed, busy, released, expired, disconnect, switch)",
            ),
            &["event"],
        )?;
        registry.register(Box::new(floor_events_total.clone()))?;

        let audio_frames_total = IntCounter::with_opts(Opts::new(
            "liftcom_audio_frames_total",
            "Weitergeleitete Audio-Nachrichten",
        ))?;
        registry.register(Box::new(audio_frames_total.clone()))?;

        let deliveries_total = IntCounter::with_opts(Opts::new(
            "liftcom_deliveries_total",
            "An Kanal-Mitglieder eingereihte Nachrichten",
        ))?;
        registry.register(Box::new(deliveries_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            messages_total,
            dropped_messages_total,
            floor_events_total,
            audio_frames_total,
            deliveries_total,
        })
    }

    /// Zaehlt einen Floor-Uebergang
    pub fn floor_ereignis(&self, ereignis: &str) {
        self.floor_events_total.with_label_values(&[ereignis]).inc();
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
pub fn metrics_router(metriken: RelayMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RelayMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = RelayMetriken::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn zwei_instanzen_sind_unabhaengig() {
        let a = RelayMetriken::neu().unwrap();
        let b = RelayMetriken::neu().unwrap();
        a.audio_frames_total.inc();
        assert_eq!(a.audio_frames_total.get(), 1);
        assert_eq!(b.audio_frames_total.get(), 0);
    }

    #[test]
    fn floor_ereignis_mit_label() {
        let metriken = RelayMetriken::neu().unwrap();
        metriken.floor_ereignis("granted");
        metriken.floor_ereignis("granted");
        metriken.floor_ereignis("busy");
        let granted = metriken
            .floor_events_total
            .with_label_values(&["granted"])
            .get();
        assert_eq!(granted, 2);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = RelayMetriken::neu().unwrap();
        metriken.connected_clients.set(3);
        metriken
            .messages_total
            .with_label_values(&["audio"])
            .inc();

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("liftcom_connected_clients 3"));
        assert!(output.contains("liftcom_messages_total{type=\"audio\"} 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}
