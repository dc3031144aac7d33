//! Fehlertypen fuer das Relay

use liftcom_protocol::ProtokollFehler;
use thiserror::Error;

/// Fehlertyp fuer das Relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Der Relay-Task laeuft nicht mehr (Inbox geschlossen)
    #[error("Relay gestoppt")]
    Gestoppt,

    /// Protokollfehler beim Serialisieren einer ausgehenden Nachricht
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtokollFehler),
}

/// Result-Typ fuer das Relay
pub type RelayResult<T> = Result<T, RelayError>;
