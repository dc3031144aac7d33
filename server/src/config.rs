//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Die Umgebungsvariable `PORT` ueberschreibt den Port.

use liftcom_observability::logging::{log_format_gueltig, log_level_gueltig};
use liftcom_relay::RelayConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Relay-Einstellungen (Pfad, Floor-Timeout, Queues)
    pub relay: RelayEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers (nur fuer Logs)
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "LiftCom Relay".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

/// Relay-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// HTTP-Pfad des WebSocket-Endpunkts
    pub pfad: String,
    /// Floor-Timeout in Millisekunden
    pub floor_timeout_ms: u64,
    /// Send-Queue pro Verbindung (Frames)
    pub send_queue_groesse: usize,
    /// Inbox des Relay-Tasks (Ereignisse)
    pub inbox_groesse: usize,
    /// Ping-Intervall in Sekunden
    pub keepalive_sek: u64,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        let relay = RelayConfig::default();
        Self {
            pfad: relay.pfad,
            floor_timeout_ms: relay.floor_timeout.as_millis() as u64,
            send_queue_groesse: relay.send_queue_groesse,
            inbox_groesse: relay.inbox_groesse,
            keepalive_sek: relay.keepalive.as_secs(),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den `/metrics`-Endpunkt
    pub metriken: bool,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self { metriken: true }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ));
            }
        };
        config.pruefen()?;
        Ok(config)
    }

    /// Parst eine Konfiguration aus TOML-Text
    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(inhalt)?)
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if !self.relay.pfad.starts_with('/') {
            anyhow::bail!("relay.pfad muss mit '/' beginnen: '{}'", self.relay.pfad);
        }
        if self.relay.floor_timeout_ms == 0 {
            anyhow::bail!("relay.floor_timeout_ms muss groesser als 0 sein");
        }
        if self.relay.send_queue_groesse == 0 || self.relay.inbox_groesse == 0 {
            anyhow::bail!("relay.send_queue_groesse und relay.inbox_groesse muessen groesser als 0 sein");
        }
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Unbekanntes Log-Level: '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Unbekanntes Log-Format: '{}'", self.logging.format);
        }
        Ok(())
    }

    /// Uebernimmt einen Port aus der Umgebung (`PORT`), falls gesetzt
    ///
    /// Leere Werte werden ignoriert, ungueltige sind ein Fehler.
    pub fn port_ueberschreiben(&mut self, port: Option<&str>) -> anyhow::Result<()> {
        let Some(port) = port.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(());
        };
        self.netzwerk.port = port
            .parse()
            .map_err(|e| anyhow::anyhow!("Ungueltiger PORT '{port}': {e}"))?;
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Laufzeit-Konfiguration fuer das Relay
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            pfad: self.relay.pfad.clone(),
            floor_timeout: Duration::from_millis(self.relay.floor_timeout_ms),
            send_queue_groesse: self.relay.send_queue_groesse,
            inbox_groesse: self.relay.inbox_groesse,
            keepalive: Duration::from_secs(self.relay.keepalive_sek),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.netzwerk.port, 3000);
        assert_eq!(cfg.relay.pfad, "/liftcom");
        assert_eq!(cfg.relay.floor_timeout_ms, 5000);
        assert_eq!(cfg.relay.send_queue_groesse, 64);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.observability.metriken);
        cfg.pruefen().unwrap();
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_adresse(), "0.0.0.0:3000");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Baustelle Nord"

            [relay]
            floor_timeout_ms = 8000
        "#;
        let cfg = ServerConfig::aus_toml(toml).unwrap();
        assert_eq!(cfg.server.name, "Baustelle Nord");
        assert_eq!(cfg.relay.floor_timeout_ms, 8000);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.relay.pfad, "/liftcom");
        assert_eq!(cfg.netzwerk.port, 3000);
    }

    #[test]
    fn relay_config_abbildung() {
        let mut cfg = ServerConfig::default();
        cfg.relay.floor_timeout_ms = 1500;
        cfg.relay.keepalive_sek = 10;
        let relay = cfg.relay_config();
        assert_eq!(relay.floor_timeout, Duration::from_millis(1500));
        assert_eq!(relay.keepalive, Duration::from_secs(10));
        assert_eq!(relay.pfad, "/liftcom");
    }

    #[test]
    fn port_aus_umgebung() {
        let mut cfg = ServerConfig::default();
        cfg.port_ueberschreiben(None).unwrap();
        assert_eq!(cfg.netzwerk.port, 3000);
        cfg.port_ueberschreiben(Some("")).unwrap();
        assert_eq!(cfg.netzwerk.port, 3000);
        cfg.port_ueberschreiben(Some(" 8080 ")).unwrap();
        assert_eq!(cfg.netzwerk.port, 8080);
        assert!(cfg.port_ueberschreiben(Some("achtzig")).is_err());
        assert_eq!(cfg.netzwerk.port, 8080);
    }

    #[test]
    fn ungueltige_werte_werden_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.relay.pfad = "liftcom".into();
        assert!(cfg.pruefen().is_err());

        let mut cfg = ServerConfig::default();
        cfg.relay.floor_timeout_ms = 0;
        assert!(cfg.pruefen().is_err());

        let mut cfg = ServerConfig::default();
        cfg.logging.format = "xml".into();
        assert!(cfg.pruefen().is_err());
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/liftcom.toml").unwrap();
        assert_eq!(cfg.netzwerk.port, 3000);
    }
}
