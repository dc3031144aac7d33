//! Fehlertypen fuer das Relay-Protokoll

use thiserror::Error;

/// Gruende, aus denen eine eingehende Nachricht verworfen wird
#[derive(Debug, Error)]
pub enum ProtokollFehler {
    /// Kein gueltiges JSON
    #[error("Ungueltiges JSON: {0}")]
    UngueltigesJson(#[source] serde_json::Error),

    /// Gueltiges JSON, aber kein Objekt
    #[error("Nachricht ist kein JSON-Objekt")]
    KeinObjekt,

    /// `type` fehlt oder ist unbekannt
    #[error("Unbekannter Nachrichtentyp: {0:?}")]
    UnbekannterTyp(Option<String>),

    /// `audio` ohne (oder mit leerem) `data`-Feld
    #[error("Audio-Nachricht ohne Daten")]
    AudioOhneDaten,

    /// Ausgehende Nachricht konnte nicht serialisiert werden
    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[source] serde_json::Error),
}

impl ProtokollFehler {
    /// Kurzer, stabiler Grund fuer Logs und Metrik-Labels
    pub fn grund(&self) -> &'static str {
        match self {
            Self::UngueltigesJson(_) => "invalid_json",
            Self::KeinObjekt => "not_an_object",
            Self::UnbekannterTyp(_) => "unknown_type",
            Self::AudioOhneDaten => "audio_without_data",
            Self::Serialisierung(_) => "serialization",
        }
    }
}

/// Result-Typ fuer das Protokoll
pub type ProtokollResult<T> = Result<T, ProtokollFehler>;
