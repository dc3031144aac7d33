//! Floor-Arbiter – Vergibt die Sendeerlaubnis pro Kanal
//!
//! ## Zustandsmaschine
//! ```text
//!            request_floor                     request_floor (gleiche Verbindung)
//!   Frei ─────────────────────> Belegt ──────┐  = transmission_ended + floor_taken
//!    ^                           │  ^         │
//!    │  release_floor (Halter)   │  └─────────┘
//!    ├───────────────────────────┤
//!    │  Timeout (5s)             │  request_floor (andere Verbindung) -> floor_busy
//!    ├───────────────────────────┤
//!    │  Halter getrennt/wechselt │
//!    └───────────────────────────┘
//! ```
//!
//! Jede Vergabe startet einen Timer-Task und erhaelt eine Generationsnummer.
//! Jeder Uebergang aus `Belegt` bricht den Timer ab; ein bereits in der
//! Queue liegender Ablauf mit alter Generation wird ignoriert.
//!
//! Besitzer des Floors ist die Verbindung, nicht die `deviceId`. Die
//! `deviceId` ist nur das Label in den Broadcasts.

use liftcom_core::{KanalNummer, VerbindungId};
use liftcom_protocol::AusgehendeNachricht;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::broadcast::BroadcastRouter;
use crate::channel_table::KanalTabelle;

// ---------------------------------------------------------------------------
// Zustand
// ---------------------------------------------------------------------------

/// Ein abgelaufener Floor-Timer, vom Timer-Task an den Relay-Task gemeldet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorAblauf {
    pub kanal: KanalNummer,
    pub generation: u64,
}

/// Aktive Vergabe der Sendeerlaubnis
#[derive(Debug)]
pub struct Belegung {
    /// Verbindung, die den Floor haelt
    pub halter: VerbindungId,
    /// Label fuer Broadcasts
    pub device_id: Option<String>,
    /// Zeitpunkt des automatischen Ablaufs
    pub frist: Instant,
    pub generation: u64,
    abbruch: AbortHandle,
}

impl Belegung {
    fn timer_abbrechen(&self) {
        self.abbruch.abort();
    }
}

/// Floor-Zustand eines Kanals
#[derive(Debug, Default)]
pub enum FloorZustand {
    #[default]
    Frei,
    Belegt(Belegung),
}

impl FloorZustand {
    pub fn ist_frei(&self) -> bool {
        matches!(self, Self::Frei)
    }

    pub fn belegung(&self) -> Option<&Belegung> {
        match self {
            Self::Frei => None,
            Self::Belegt(belegung) => Some(belegung),
        }
    }

    pub fn halter(&self) -> Option<VerbindungId> {
        self.belegung().map(|b| b.halter)
    }
}

/// Ergebnis einer Floor-Anforderung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloorAnfrage {
    /// Floor war frei und wurde vergeben
    Vergeben,
    /// Halter hat erneut angefordert (Ende + Neuvergabe)
    Erneuert,
    /// Floor gehoert einer anderen Verbindung
    Besetzt,
}

impl FloorAnfrage {
    /// Label fuer Logs und Metriken
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Vergeben => "granted",
            Self::Erneuert => "renewed",
            Self::Besetzt => "busy",
        }
    }
}

// ---------------------------------------------------------------------------
// FloorArbiter
// ---------------------------------------------------------------------------

/// Zustandsmaschine fuer die Sendeerlaubnis aller Kanaele
///
/// Der Zustand selbst liegt in der `KanalTabelle`; der Arbiter haelt nur
/// Timeout, Generationszaehler und den Rueckkanal fuer Timer-Ablaeufe.
pub struct FloorArbiter {
    timeout: Duration,
    ablauf_tx: mpsc::UnboundedSender<FloorAblauf>,
    router: BroadcastRouter,
    naechste_generation: u64,
}

impl FloorArbiter {
    /// Erstellt einen Arbiter; abgelaufene Timer landen in `ablauf_tx`
    pub fn neu(
        timeout: Duration,
        ablauf_tx: mpsc::UnboundedSender<FloorAblauf>,
        router: BroadcastRouter,
    ) -> Self {
        Self {
            timeout,
            ablauf_tx,
            router,
            naechste_generation: 1,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fordert den Floor an oder erneuert ihn
    ///
    /// - frei: vergeben, `floor_taken` an alle
    /// - vom Anfragenden gehalten: `transmission_ended` + `floor_taken`, Frist neu
    /// - von anderer Verbindung gehalten: `floor_busy` nur an den Anfragenden
    pub fn anfordern(
        &mut self,
        tabelle: &mut KanalTabelle,
        kanal: KanalNummer,
        anfragender: VerbindungId,
        device_id: Option<String>,
    ) -> FloorAnfrage {
        if let Some(halter) = tabelle.kanal(kanal).floor.halter() {
            if halter != anfragender {
                self.router.an_verbindung_senden(
                    tabelle,
                    anfragender,
                    &AusgehendeNachricht::floor_busy(kanal),
                );
                tracing::debug!(kanal = %kanal, verbindung = %anfragender, "Floor besetzt");
                return FloorAnfrage::Besetzt;
            }
        }

        let vorherige = Self::raeumen(tabelle, kanal);
        if let Some(vorherige) = &vorherige {
            self.router.an_kanal_senden(
                tabelle,
                kanal,
                &AusgehendeNachricht::transmission_ended(kanal, vorherige.device_id.clone()),
                None,
            );
        }

        let generation = self.naechste_generation;
        self.naechste_generation += 1;
        let frist = Instant::now() + self.timeout;
        let abbruch = self.timer_starten(kanal, generation);

        tabelle.kanal_mut(kanal).floor = FloorZustand::Belegt(Belegung {
            halter: anfragender,
            device_id: device_id.clone(),
            frist,
            generation,
            abbruch,
        });

        self.router.an_kanal_senden(
            tabelle,
            kanal,
            &AusgehendeNachricht::floor_taken(kanal, device_id.clone()),
            None,
        );

        let ergebnis = if vorherige.is_some() {
            FloorAnfrage::Erneuert
        } else {
            FloorAnfrage::Vergeben
        };
        tracing::debug!(
            kanal = %kanal,
            verbindung = %anfragender,
            device_id = ?device_id,
            generation,
            ergebnis = ergebnis.als_str(),
            "Floor vergeben"
        );
        ergebnis
    }

    /// Gibt den Floor zurueck, nur wirksam fuer den aktuellen Halter
    pub fn freigeben(
        &mut self,
        tabelle: &mut KanalTabelle,
        kanal: KanalNummer,
        anfragender: VerbindungId,
    ) -> bool {
        if tabelle.kanal(kanal).floor.halter() != Some(anfragender) {
            return false;
        }
        let Some(belegung) = Self::raeumen(tabelle, kanal) else {
            return false;
        };
        self.router.an_kanal_senden(
            tabelle,
            kanal,
            &AusgehendeNachricht::floor_released(kanal, belegung.device_id.clone()),
            None,
        );
        tracing::debug!(kanal = %kanal, verbindung = %anfragender, "Floor freigegeben");
        true
    }

    /// Verarbeitet einen abgelaufenen Timer
    ///
    /// Ignoriert Ablaeufe, deren Vergabe inzwischen beendet oder erneuert wurde.
    pub fn ablaufen(&mut self, tabelle: &mut KanalTabelle, ablauf: FloorAblauf) -> bool {
        let aktuell = tabelle
            .kanal(ablauf.kanal)
            .floor
            .belegung()
            .map(|b| b.generation);
        if aktuell != Some(ablauf.generation) {
            tracing::trace!(kanal = %ablauf.kanal, generation = ablauf.generation, "Veralteter Floor-Ablauf ignoriert");
            return false;
        }
        let Some(belegung) = Self::raeumen(tabelle, ablauf.kanal) else {
            return false;
        };
        self.router.an_kanal_senden(
            tabelle,
            ablauf.kanal,
            &AusgehendeNachricht::transmission_ended(ablauf.kanal, belegung.device_id.clone()),
            None,
        );
        tracing::debug!(
            kanal = %ablauf.kanal,
            verbindung = %belegung.halter,
            "Floor abgelaufen"
        );
        true
    }

    /// Implizite Freigabe, wenn der Halter den Kanal verlaesst oder trennt
    pub fn halter_verlaesst(
        &mut self,
        tabelle: &mut KanalTabelle,
        kanal: KanalNummer,
        verbindung: VerbindungId,
    ) -> bool {
        if tabelle.kanal(kanal).floor.halter() != Some(verbindung) {
            return false;
        }
        let Some(belegung) = Self::raeumen(tabelle, kanal) else {
            return false;
        };
        self.router.an_kanal_senden(
            tabelle,
            kanal,
            &AusgehendeNachricht::transmission_ended(kanal, belegung.device_id.clone()),
            None,
        );
        tracing::debug!(kanal = %kanal, verbindung = %verbindung, "Floor-Halter hat Kanal verlassen");
        true
    }

    /// Setzt den Kanal auf `Frei` und bricht einen laufenden Timer ab
    fn raeumen(tabelle: &mut KanalTabelle, kanal: KanalNummer) -> Option<Belegung> {
        match std::mem::take(&mut tabelle.kanal_mut(kanal).floor) {
            FloorZustand::Frei => None,
            FloorZustand::Belegt(belegung) => {
                belegung.timer_abbrechen();
                Some(belegung)
            }
        }
    }

    fn timer_starten(&self, kanal: KanalNummer, generation: u64) -> AbortHandle {
        let ablauf_tx = self.ablauf_tx.clone();
        let dauer = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(dauer).await;
            let _ = ablauf_tx.send(FloorAblauf { kanal, generation });
        })
        .abort_handle()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
