//! Kanal-Tabelle – Vier feste Kanaele mit Mitgliedschaft und Floor-Zustand
//!
//! Die Tabelle haelt ausserdem das Register aller offenen Verbindungen
//! (Send-Handle, zuletzt gemeldete `deviceId`, aktueller Kanal). Sie wird
//! ausschliesslich vom Relay-Task veraendert und braucht daher keine Locks.

use liftcom_core::{KanalNummer, VerbindungId};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use crate::broadcast::ClientSender;
use crate::floor::FloorZustand;

// ---------------------------------------------------------------------------
// Verbindung
// ---------------------------------------------------------------------------

/// Eine offene WebSocket-Verbindung aus Sicht des Relays
#[derive(Debug)]
pub struct Verbindung {
    pub id: VerbindungId,
    /// Vom Client gemeldete Geraete-Kennung (nicht eindeutig, reines Label)
    pub device_id: Option<String>,
    /// Kanal der letzten kanalbezogenen Nachricht (None vor der ersten)
    pub kanal: Option<KanalNummer>,
    pub sender: ClientSender,
}

// ---------------------------------------------------------------------------
// Kanal
// ---------------------------------------------------------------------------

/// Einer der vier statisch angelegten Kanaele
#[derive(Debug)]
pub struct Kanal {
    pub nummer: KanalNummer,
    pub mitglieder: BTreeSet<VerbindungId>,
    pub floor: FloorZustand,
}

impl Kanal {
    fn neu(nummer: KanalNummer) -> Self {
        Self {
            nummer,
            mitglieder: BTreeSet::new(),
            floor: FloorZustand::Frei,
        }
    }
}

// ---------------------------------------------------------------------------
// KanalTabelle
// ---------------------------------------------------------------------------

/// Alle Kanaele und Verbindungen einer Relay-Instanz
#[derive(Debug)]
pub struct KanalTabelle {
    kanaele: [Kanal; KanalNummer::ANZAHL],
    verbindungen: HashMap<VerbindungId, Verbindung>,
}

impl KanalTabelle {
    /// Erstellt eine Tabelle mit vier leeren Kanaelen
    pub fn neu() -> Self {
        Self {
            kanaele: std::array::from_fn(|i| Kanal::neu(KanalNummer::aus_zahl((i + 1) as f64))),
            verbindungen: HashMap::new(),
        }
    }

    /// Loest einen rohen `channel`-Wert auf (siehe `KanalNummer::aufloesen`)
    pub fn aufloesen(roh: Option<&Value>) -> KanalNummer {
        KanalNummer::aufloesen(roh)
    }

    pub fn kanal(&self, kanal: KanalNummer) -> &Kanal {
        &self.kanaele[kanal.index()]
    }

    pub fn kanal_mut(&mut self, kanal: KanalNummer) -> &mut Kanal {
        &mut self.kanaele[kanal.index()]
    }

    /// Live-Mitgliedermenge eines Kanals (keine Kopie)
    pub fn mitglieder(&self, kanal: KanalNummer) -> &BTreeSet<VerbindungId> {
        &self.kanal(kanal).mitglieder
    }

    /// Veraenderbare Live-Mitgliedermenge eines Kanals
    pub fn mitglieder_mut(&mut self, kanal: KanalNummer) -> &mut BTreeSet<VerbindungId> {
        &mut self.kanal_mut(kanal).mitglieder
    }

    /// Registriert eine neue Verbindung (noch in keinem Kanal)
    pub fn verbindung_registrieren(&mut self, sender: ClientSender) {
        let id = sender.verbindung;
        self.verbindungen.insert(
            id,
            Verbindung {
                id,
                device_id: None,
                kanal: None,
                sender,
            },
        );
    }

    /// Entfernt eine Verbindung aus dem Register
    ///
    /// Die Kanal-Mitgliedschaft muss der Aufrufer vorher aufloesen.
    pub fn verbindung_entfernen(&mut self, id: &VerbindungId) -> Option<Verbindung> {
        self.verbindungen.remove(id)
    }

    pub fn verbindung(&self, id: &VerbindungId) -> Option<&Verbindung> {
        self.verbindungen.get(id)
    }

    pub fn verbindung_mut(&mut self, id: &VerbindungId) -> Option<&mut Verbindung> {
        self.verbindungen.get_mut(id)
    }

    pub fn sender(&self, id: &VerbindungId) -> Option<&ClientSender> {
        self.verbindungen.get(id).map(|v| &v.sender)
    }

    /// Fuegt eine Verbindung einem Kanal hinzu und merkt ihn als aktuellen Kanal
    ///
    /// Idempotent. Gibt `true` zurueck wenn die Verbindung neu aufgenommen wurde.
    pub fn beitreten(&mut self, id: VerbindungId, kanal: KanalNummer) -> bool {
        let Some(verbindung) = self.verbindungen.get_mut(&id) else {
            return false;
        };
        verbindung.kanal = Some(kanal);
        self.mitglieder_mut(kanal).insert(id)
    }

    /// Entfernt eine Verbindung aus einem Kanal
    pub fn austreten(&mut self, id: &VerbindungId, kanal: KanalNummer) -> bool {
        self.mitglieder_mut(kanal).remove(id)
    }

    /// Anzahl registrierter Verbindungen
    pub fn verbindungs_anzahl(&self) -> usize {
        self.verbindungen.len()
    }
}

impl Default for KanalTabelle {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
