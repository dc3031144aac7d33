//! Message-Dispatcher – Nimmt Client-Nachrichten entgegen und verteilt sie
//!
//! Pro erkannter Nachricht:
//! 1. Kanal normalisieren (1..=4)
//! 2. bei Kanalwechsel den alten Kanal verlassen (wie beim Trennen)
//! 3. Verbindung im Ziel-Kanal registrieren (idempotent)
//! 4. Nachricht an Broadcast-Router oder Floor-Arbiter weitergeben
//!
//! Nicht erkannte Nachrichten werden verworfen, ohne Antwort an den Client.

use liftcom_core::{KanalNummer, VerbindungId};
use liftcom_observability::RelayMetriken;
use liftcom_protocol::{AusgehendeNachricht, EingehendeNachricht};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::broadcast::{BroadcastRouter, ClientSender};
use crate::channel_table::KanalTabelle;
use crate::config::RelayConfig;
use crate::floor::{FloorAblauf, FloorAnfrage, FloorArbiter};

/// Momentaufnahme eines Kanals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KanalStatus {
    pub kanal: KanalNummer,
    /// Anzahl der Mitglieder
    pub mitglieder: usize,
    /// Bekannte `deviceId`s der Mitglieder (sortiert, ohne Verbindungen ohne Kennung)
    pub device_ids: Vec<String>,
    pub floor_belegt: bool,
    /// Label des aktuellen Floor-Halters
    pub floor_halter: Option<String>,
}

/// Grund, aus dem eine Verbindung ihren Kanal verlaesst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verlassen {
    Getrennt,
    Kanalwechsel,
}

impl Verlassen {
    fn als_str(self) -> &'static str {
        match self {
            Self::Getrennt => "disconnect",
            Self::Kanalwechsel => "switch",
        }
    }
}

/// Zustand und Logik des Relays, ausgefuehrt im Relay-Task
pub struct MessageDispatcher {
    tabelle: KanalTabelle,
    arbiter: FloorArbiter,
    router: BroadcastRouter,
    metriken: Option<RelayMetriken>,
}

impl MessageDispatcher {
    /// Erstellt einen Dispatcher mit leerer Kanal-Tabelle
    pub fn neu(
        config: &RelayConfig,
        ablauf_tx: mpsc::UnboundedSender<FloorAblauf>,
        metriken: Option<RelayMetriken>,
    ) -> Self {
        let router = BroadcastRouter::neu(metriken.clone());
        Self {
            tabelle: KanalTabelle::neu(),
            arbiter: FloorArbiter::neu(config.floor_timeout, ablauf_tx, router.clone()),
            router,
            metriken,
        }
    }

    pub fn tabelle(&self) -> &KanalTabelle {
        &self.tabelle
    }

    pub fn floor_timeout(&self) -> Duration {
        self.arbiter.timeout()
    }

    // -----------------------------------------------------------------------
    // Verbindungs-Lebenszyklus
    // -----------------------------------------------------------------------

    /// Registriert eine neue Verbindung (noch keinem Kanal zugeordnet)
    pub fn verbunden(&mut self, sender: ClientSender) {
        let id = sender.verbindung;
        self.tabelle.verbindung_registrieren(sender);
        if let Some(m) = &self.metriken {
            m.connected_clients.inc();
        }
        tracing::info!(verbindung = %id, verbindungen = self.tabelle.verbindungs_anzahl(), "Client verbunden");
    }

    /// Raeumt eine getrennte Verbindung ab
    ///
    /// Reihenfolge fuer die verbleibenden Mitglieder: `leave`, dann
    /// `transmission_ended` falls die Verbindung den Floor hielt.
    pub fn getrennt(&mut self, id: VerbindungId) {
        let Some(kanal) = self.tabelle.verbindung(&id).map(|v| v.kanal) else {
            tracing::debug!(verbindung = %id, "Trennung einer unbekannten Verbindung");
            return;
        };
        if let Some(kanal) = kanal {
            self.kanal_verlassen(id, kanal, Verlassen::Getrennt);
        }
        let verbindung = self.tabelle.verbindung_entfernen(&id);
        if let Some(m) = &self.metriken {
            m.connected_clients.dec();
        }
        tracing::info!(
            verbindung = %id,
            device_id = ?verbindung.and_then(|v| v.device_id),
            verbindungen = self.tabelle.verbindungs_anzahl(),
            "Client getrennt"
        );
    }

    // -----------------------------------------------------------------------
    // Nachrichten
    // -----------------------------------------------------------------------

    /// Parst und verarbeitet einen rohen Text-Frame
    ///
    /// Gibt `false` zurueck wenn die Nachricht verworfen wurde.
    pub fn nachricht_verarbeiten(&mut self, id: VerbindungId, text: &str) -> bool {
        match EingehendeNachricht::parsen(text) {
            Ok(nachricht) => self.dispatch(id, nachricht),
            Err(e) => {
                tracing::debug!(verbindung = %id, grund = e.grund(), fehler = %e, "Nachricht verworfen");
                if let Some(m) = &self.metriken {
                    m.dropped_messages_total.with_label_values(&[e.grund()]).inc();
                }
                false
            }
        }
    }

    /// Verarbeitet eine erkannte Nachricht
    pub fn dispatch(&mut self, id: VerbindungId, nachricht: EingehendeNachricht) -> bool {
        let Some(aktueller_kanal) = self.tabelle.verbindung(&id).map(|v| v.kanal) else {
            tracing::debug!(verbindung = %id, typ = nachricht.typ(), "Nachricht einer unbekannten Verbindung");
            return false;
        };
        let kanal = nachricht.kanal();
        tracing::trace!(verbindung = %id, kanal = %kanal, typ = nachricht.typ(), "Nachricht empfangen");
        if let Some(m) = &self.metriken {
            m.messages_total.with_label_values(&[nachricht.typ()]).inc();
        }

        if let Some(alt) = aktueller_kanal.filter(|alt| *alt != kanal) {
            self.kanal_verlassen(id, alt, Verlassen::Kanalwechsel);
        }
        self.tabelle.beitreten(id, kanal);

        match nachricht {
            EingehendeNachricht::Join { device_id, .. } => {
                self.device_id_setzen(id, device_id.clone());
                self.router.an_kanal_senden(
                    &self.tabelle,
                    kanal,
                    &AusgehendeNachricht::presence(kanal, device_id),
                    Some(id),
                );
            }
            EingehendeNachricht::Presence { device_id, .. } => {
                if device_id.is_some() {
                    self.device_id_setzen(id, device_id);
                }
                let aktuell = self.device_id(id);
                self.router.an_kanal_senden(
                    &self.tabelle,
                    kanal,
                    &AusgehendeNachricht::presence(kanal, aktuell),
                    Some(id),
                );
            }
            EingehendeNachricht::Audio { data, .. } => {
                let von = self.device_id(id);
                let empfaenger = self.router.an_kanal_senden(
                    &self.tabelle,
                    kanal,
                    &AusgehendeNachricht::audio(kanal, data, von),
                    Some(id),
                );
                tracing::trace!(verbindung = %id, kanal = %kanal, empfaenger, "Audio weitergeleitet");
                if let Some(m) = &self.metriken {
                    m.audio_frames_total.inc();
                }
            }
            EingehendeNachricht::RequestFloor { device_id, .. } => {
                let label = device_id.or_else(|| self.device_id(id));
                let ergebnis = self.arbiter.anfordern(&mut self.tabelle, kanal, id, label);
                self.floor_ereignis(ergebnis.als_str());
            }
            EingehendeNachricht::ReleaseFloor { .. } => {
                if self.arbiter.freigeben(&mut self.tabelle, kanal, id) {
                    self.floor_ereignis("released");
                }
            }
        }
        true
    }

    /// Verarbeitet einen abgelaufenen Floor-Timer
    pub fn floor_abgelaufen(&mut self, ablauf: FloorAblauf) -> bool {
        let abgelaufen = self.arbiter.ablaufen(&mut self.tabelle, ablauf);
        if abgelaufen {
            self.floor_ereignis("expired");
        }
        abgelaufen
    }

    /// Momentaufnahme eines Kanals
    pub fn kanal_status(&self, kanal: KanalNummer) -> KanalStatus {
        let eintrag = self.tabelle.kanal(kanal);
        let mut device_ids: Vec<String> = eintrag
            .mitglieder
            .iter()
            .filter_map(|id| self.tabelle.verbindung(id))
            .filter_map(|v| v.device_id.clone())
            .collect();
        device_ids.sort();
        let belegung = eintrag.floor.belegung();
        KanalStatus {
            kanal,
            mitglieder: eintrag.mitglieder.len(),
            device_ids,
            floor_belegt: belegung.is_some(),
            floor_halter: belegung.and_then(|b| b.device_id.clone()),
        }
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    /// Entfernt die Verbindung aus einem Kanal, meldet `leave` und gibt
    /// einen gehaltenen Floor implizit frei
    fn kanal_verlassen(&mut self, id: VerbindungId, kanal: KanalNummer, grund: Verlassen) {
        if !self.tabelle.austreten(&id, kanal) {
            return;
        }
        if let Some(device_id) = self.device_id(id) {
            self.router.an_kanal_senden(
                &self.tabelle,
                kanal,
                &AusgehendeNachricht::leave(kanal, device_id),
                None,
            );
        }
        if self.arbiter.halter_verlaesst(&mut self.tabelle, kanal, id) {
            self.floor_ereignis(grund.als_str());
        }
        tracing::debug!(verbindung = %id, kanal = %kanal, grund = grund.als_str(), "Kanal verlassen");
    }

    fn device_id(&self, id: VerbindungId) -> Option<String> {
        self.tabelle.verbindung(&id).and_then(|v| v.device_id.clone())
    }

    fn device_id_setzen(&mut self, id: VerbindungId, device_id: Option<String>) {
        if let Some(verbindung) = self.tabelle.verbindung_mut(&id) {
            verbindung.device_id = device_id;
        }
    }

    fn floor_ereignis(&self, ereignis: &str) {
        if let Some(m) = &self.metriken {
            m.floor_ereignis(ereignis);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
