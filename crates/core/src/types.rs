//! Gemeinsame Identifikationstypen fuer LiftCom
//!
//! Newtypes verhindern Verwechslungen zwischen Kanal-Nummern, Verbindungen
//! und beliebigen Zahlen zur Compilezeit.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// KanalNummer
// ---------------------------------------------------------------------------

/// Nummer eines der vier festen Funk-Kanaele (immer 1..=4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub struct KanalNummer(u8);

impl KanalNummer {
    /// Kleinste gueltige Kanal-Nummer
    pub const MIN: u8 = 1;
    /// Groesste gueltige Kanal-Nummer
    pub const MAX: u8 = 4;
    /// Anzahl der statisch angelegten Kanaele
    pub const ANZAHL: usize = Self::MAX as usize;
    /// Standard-Kanal fuer fehlende oder ungueltige Angaben
    pub const STANDARD: Self = Self(Self::MIN);

    /// Erstellt eine Kanal-Nummer, `None` ausserhalb von 1..=4
    pub fn neu(nummer: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&nummer).then_some(Self(nummer))
    }

    /// Loest einen beliebigen `channel`-Wert aus einer Client-Nachricht auf
    ///
    /// Zahlen werden auf 1..=4 begrenzt, numerische Strings wie Zahlen
    /// behandelt. Alles andere (fehlend, null, bool, Text, Objekt) ergibt
    /// Kanal 1. Schlaegt nie fehl.
    pub fn aufloesen(roh: Option<&Value>) -> Self {
        match roh {
            Some(Value::Number(n)) => n.as_f64().map(Self::aus_zahl).unwrap_or(Self::STANDARD),
            Some(Value::String(s)) => {
                let s = s.trim();
                if s.is_empty() {
                    return Self::STANDARD;
                }
                s.parse::<f64>()
                    .map(Self::aus_zahl)
                    .unwrap_or(Self::STANDARD)
            }
            _ => Self::STANDARD,
        }
    }

    /// Begrenzt eine Zahl auf 1..=4; 0 und NaN zaehlen als "nicht angegeben"
    pub fn aus_zahl(zahl: f64) -> Self {
        if zahl.is_nan() || zahl == 0.0 {
            return Self::STANDARD;
        }
        let begrenzt = zahl.clamp(f64::from(Self::MIN), f64::from(Self::MAX));
        Self(begrenzt.trunc() as u8)
    }

    /// Gibt die Kanal-Nummer als Zahl zurueck
    pub fn wert(&self) -> u8 {
        self.0
    }

    /// Index in eine Tabelle mit `ANZAHL` Eintraegen (0-basiert)
    pub fn index(&self) -> usize {
        usize::from(self.0 - Self::MIN)
    }

    /// Alle Kanaele in aufsteigender Reihenfolge
    pub fn alle() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl Default for KanalNummer {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl From<KanalNummer> for u8 {
    fn from(kanal: KanalNummer) -> Self {
        kanal.0
    }
}

impl TryFrom<u8> for KanalNummer {
    type Error = String;

    fn try_from(nummer: u8) -> Result<Self, Self::Error> {
        Self::neu(nummer).ok_or_else(|| format!("Kanal {nummer} ausserhalb von 1..=4"))
    }
}

impl std::fmt::Display for KanalNummer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kanal:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// VerbindungId
// ---------------------------------------------------------------------------

/// Eindeutige ID einer WebSocket-Verbindung
///
/// Wird serverseitig vergeben und ist im Gegensatz zur `deviceId` des
/// Clients garantiert eindeutig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerbindungId(pub Uuid);

impl VerbindungId {
    /// Erstellt eine neue zufaellige VerbindungId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for VerbindungId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VerbindungId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "verbindung:{}", self.0)
    }
}
