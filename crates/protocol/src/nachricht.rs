//! Relay-Nachrichten (WebSocket, JSON)
//!
//! ## Eingehend
//! `join`, `presence`, `audio`, `request_floor`, `release_floor`
//!
//! ## Ausgehend
//! `presence`, `leave`, `audio`, `floor_taken`, `floor_busy`,
//! `floor_released`, `transmission_ended`
//!
//! Jede Nachricht ist ein JSON-Objekt mit `type` und `channel`. Die
//! Kanal-Nummer eingehender Nachrichten wird immer auf 1..=4 normalisiert.

use liftcom_core::KanalNummer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtokollFehler, ProtokollResult};

// ---------------------------------------------------------------------------
// Eingehende Nachrichten
// ---------------------------------------------------------------------------

/// Rohform einer eingehenden Nachricht – alle Felder beliebig typisiert
#[derive(Debug, Deserialize)]
struct RohUmschlag {
    #[serde(rename = "type", default)]
    typ: Option<Value>,
    #[serde(default)]
    channel: Option<Value>,
    #[serde(rename = "deviceId", default)]
    device_id: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
}

/// Eine erkannte, normalisierte Client-Nachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EingehendeNachricht {
    /// Kanal beitreten, `deviceId` wird gesetzt (oder geloescht)
    Join {
        kanal: KanalNummer,
        device_id: Option<String>,
    },
    /// Anwesenheit melden, `deviceId` nur aktualisieren wenn angegeben
    Presence {
        kanal: KanalNummer,
        device_id: Option<String>,
    },
    /// Audio-Burst (base64, wird nicht dekodiert)
    Audio { kanal: KanalNummer, data: String },
    /// Sendeerlaubnis anfordern oder erneuern
    RequestFloor {
        kanal: KanalNummer,
        device_id: Option<String>,
    },
    /// Sendeerlaubnis zurueckgeben
    ReleaseFloor {
        kanal: KanalNummer,
        device_id: Option<String>,
    },
}

impl EingehendeNachricht {
    /// Parst einen rohen WebSocket-Text
    ///
    /// Fehler sind kein Abbruchgrund fuer die Verbindung: der Aufrufer
    /// verwirft die Nachricht und antwortet nicht.
    pub fn parsen(roh: &str) -> ProtokollResult<Self> {
        let wert: Value = serde_json::from_str(roh).map_err(ProtokollFehler::UngueltigesJson)?;
        if !wert.is_object() {
            return Err(ProtokollFehler::KeinObjekt);
        }
        let umschlag: RohUmschlag =
            serde_json::from_value(wert).map_err(|_| ProtokollFehler::KeinObjekt)?;

        let kanal = KanalNummer::aufloesen(umschlag.channel.as_ref());
        let device_id = nicht_leerer_text(umschlag.device_id);

        let typ = match umschlag.typ {
            Some(Value::String(typ)) => typ,
            Some(anderes) => return Err(ProtokollFehler::UnbekannterTyp(Some(anderes.to_string()))),
            None => return Err(ProtokollFehler::UnbekannterTyp(None)),
        };

        match typ.as_str() {
            "join" => Ok(Self::Join { kanal, device_id }),
            "presence" => Ok(Self::Presence { kanal, device_id }),
            "audio" => match nicht_leerer_text(umschlag.data) {
                Some(data) => Ok(Self::Audio { kanal, data }),
                None => Err(ProtokollFehler::AudioOhneDaten),
            },
            "request_floor" => Ok(Self::RequestFloor { kanal, device_id }),
            "release_floor" => Ok(Self::ReleaseFloor { kanal, device_id }),
            _ => Err(ProtokollFehler::UnbekannterTyp(Some(typ))),
        }
    }

    /// Normalisierter Ziel-Kanal der Nachricht
    pub fn kanal(&self) -> KanalNummer {
        match self {
            Self::Join { kanal, .. }
            | Self::Presence { kanal, .. }
            | Self::Audio { kanal, .. }
            | Self::RequestFloor { kanal, .. }
            | Self::ReleaseFloor { kanal, .. } => *kanal,
        }
    }

    /// Wire-Name des Nachrichtentyps
    pub fn typ(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Presence { .. } => "presence",
            Self::Audio { .. } => "audio",
            Self::RequestFloor { .. } => "request_floor",
            Self::ReleaseFloor { .. } => "release_floor",
        }
    }
}

/// Nur nicht-leere Strings zaehlen als angegeben
fn nicht_leerer_text(wert: Option<Value>) -> Option<String> {
    match wert {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Ausgehende Nachrichten
// ---------------------------------------------------------------------------

/// Nachricht vom Relay an die Funkgeraete eines Kanals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AusgehendeNachricht {
    Presence {
        channel: KanalNummer,
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
    },
    Leave {
        channel: KanalNummer,
        #[serde(rename = "deviceId")]
        device_id: String,
    },
    Audio {
        channel: KanalNummer,
        data: String,
        from: Option<String>,
    },
    FloorTaken {
        channel: KanalNummer,
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
    },
    FloorBusy {
        channel: KanalNummer,
    },
    FloorReleased {
        channel: KanalNummer,
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
    },
    TransmissionEnded {
        channel: KanalNummer,
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
    },
}

impl AusgehendeNachricht {
    pub fn presence(channel: KanalNummer, device_id: Option<String>) -> Self {
        Self::Presence { channel, device_id }
    }

    pub fn leave(channel: KanalNummer, device_id: impl Into<String>) -> Self {
        Self::Leave {
            channel,
            device_id: device_id.into(),
        }
    }

    pub fn audio(channel: KanalNummer, data: impl Into<String>, from: Option<String>) -> Self {
        Self::Audio {
            channel,
            data: data.into(),
            from,
        }
    }

    pub fn floor_taken(channel: KanalNummer, device_id: Option<String>) -> Self {
        Self::FloorTaken { channel, device_id }
    }

    pub fn floor_busy(channel: KanalNummer) -> Self {
        Self::FloorBusy { channel }
    }

    pub fn floor_released(channel: KanalNummer, device_id: Option<String>) -> Self {
        Self::FloorReleased { channel, device_id }
    }

    pub fn transmission_ended(channel: KanalNummer, device_id: Option<String>) -> Self {
        Self::TransmissionEnded { channel, device_id }
    }

    /// Serialisiert die Nachricht einmalig zu JSON-Text
    pub fn serialisieren(&self) -> ProtokollResult<String> {
        serde_json::to_string(self).map_err(ProtokollFehler::Serialisierung)
    }

    /// Wire-Name des Nachrichtentyps
    pub fn typ(&self) -> &'static str {
        match self {
            Self::Presence { .. } => "presence",
            Self::Leave { .. } => "leave",
            Self::Audio { .. } => "audio",
            Self::FloorTaken { .. } => "floor_taken",
            Self::FloorBusy { .. } => "floor_busy",
            Self::FloorReleased { .. } => "floor_released",
            Self::TransmissionEnded { .. } => "transmission_ended",
        }
    }

    /// Kanal, auf den sich die Nachricht bezieht
    pub fn kanal(&self) -> KanalNummer {
        match self {
            Self::Presence { channel, .. }
            | Self::Leave { channel, .. }
            | Self::Audio { channel, .. }
            | Self::FloorTaken { channel, .. }
            | Self::FloorBusy { channel }
            | Self::FloorReleased { channel, .. }
            | Self::TransmissionEnded { channel, .. } => *channel,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
