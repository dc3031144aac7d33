//! LiftCom Relay – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use liftcom_observability::logging_initialisieren;
use liftcom_server::{Server, config::ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("LIFTCOM_CONFIG").unwrap_or_else(|_| "liftcom.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let mut config = ServerConfig::laden(&config_pfad)?;
    config.port_ueberschreiben(std::env::var("PORT").ok().as_deref())?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        adresse = %config.bind_adresse(),
        "LiftCom-Relay wird initialisiert"
    );

    Server::neu(config).starten().await
}
