//! Laufzeit-Konfiguration des Relays

use std::time::Duration;

/// Standard-Pfad des WebSocket-Endpunkts
pub const STANDARD_PFAD: &str = "/liftcom";

/// Nach dieser Zeit ohne Erneuerung verfaellt die Sendeerlaubnis
pub const STANDARD_FLOOR_TIMEOUT: Duration = Duration::from_millis(5000);

/// Konfiguration fuer das Relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// HTTP-Pfad fuer den WebSocket-Upgrade
    pub pfad: String,
    /// Floor-Timeout ab Vergabe oder Erneuerung
    pub floor_timeout: Duration,
    /// Groesse der Send-Queue pro Verbindung (volle Queue = Frame verworfen)
    pub send_queue_groesse: usize,
    /// Groesse der Inbox des Relay-Tasks
    pub inbox_groesse: usize,
    /// Intervall fuer WebSocket-Pings
    pub keepalive: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            pfad: STANDARD_PFAD.to_string(),
            floor_timeout: STANDARD_FLOOR_TIMEOUT,
            send_queue_groesse: 64,
            inbox_groesse: 1024,
            keepalive: Duration::from_secs(30),
        }
    }
}
