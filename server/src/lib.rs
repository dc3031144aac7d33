//! liftcom-server – Bibliotheks-Root
//!
//! Setzt Relay, Health-Check und Metriken zu einem HTTP-Server zusammen und
//! stellt den Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use axum::Router;
use config::ServerConfig;
use liftcom_observability::{RelayMetriken, health_router, metrics_router, request_timing_layer};
use liftcom_relay::{RelayHandle, RelayServer, relay_router};
use std::future::Future;
use tokio::net::TcpListener;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bindet den konfigurierten Port und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_adresse()).await?;
        self.starten_mit(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler nicht verfuegbar");
                return;
            }
            tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
        })
        .await
    }

    /// Startet Relay und HTTP-Server auf einem bereits gebundenen Listener
    ///
    /// Reihenfolge:
    /// 1. Metriken-Registry anlegen (falls aktiviert)
    /// 2. Relay-Task starten
    /// 3. HTTP/WebSocket bedienen bis `shutdown` fertig ist
    /// 4. Relay-Task stoppen
    pub async fn starten_mit<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let metriken = if self.config.observability.metriken {
            Some(RelayMetriken::neu()?)
        } else {
            None
        };

        let (relay, handle) = RelayServer::neu(self.config.relay_config(), metriken.clone());
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let relay_task = tokio::spawn(relay.starten(shutdown_rx));

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %listener.local_addr()?,
            pfad = %self.config.relay.pfad,
            metriken = metriken.is_some(),
            "LiftCom-Relay lauscht"
        );

        let app = router(handle, metriken);
        let ergebnis = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        let _ = shutdown_tx.send(true);
        if let Err(e) = relay_task.await {
            tracing::error!(fehler = %e, "Relay-Task abgebrochen");
        }
        tracing::info!("Server gestoppt");

        Ok(ergebnis?)
    }
}

/// Baut den HTTP-Router: WebSocket-Relay, `/health` und optional `/metrics`
pub fn router(relay: RelayHandle, metriken: Option<RelayMetriken>) -> Router {
    let mut app = relay_router(relay).merge(health_router());
    if let Some(metriken) = metriken {
        app = app.merge(metrics_router(metriken));
    }
    app.layer(request_timing_layer())
}
