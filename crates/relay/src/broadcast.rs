//! Broadcast-Router – Verteilt eine Nachricht an die Mitglieder eines Kanals
//!
//! Jede Nachricht wird genau einmal serialisiert und dann in die
//! Send-Queues der Empfaenger eingereiht. Es gibt keine Bestaetigung, keine
//! Wiederholung und keine Dead-Letter-Queue:
//! - geschlossene Verbindungen werden still uebersprungen
//! - volle Queues verwerfen den Frame nur fuer diesen Empfaenger
//!
//! Iteriert wird ueber eine Kopie der Mitgliederliste, die Mitgliedschaft
//! selbst wird nie veraendert.

use liftcom_core::{KanalNummer, VerbindungId};
use liftcom_observability::RelayMetriken;
use liftcom_protocol::AusgehendeNachricht;
use tokio::sync::mpsc;

use crate::channel_table::KanalTabelle;
use crate::error::RelayResult;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer WebSocket-Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub verbindung: VerbindungId,
    pub tx: mpsc::Sender<String>,
}

impl ClientSender {
    /// Erstellt eine Send-Queue und gibt die Empfangsseite fuer den Schreib-Task zurueck
    pub fn neu(verbindung: VerbindungId, groesse: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(groesse.max(1));
        (Self { verbindung, tx }, rx)
    }

    /// Offen solange der Schreib-Task die Queue noch liest
    pub fn ist_offen(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Sendet einen Frame nicht-blockierend an den Client
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, text: String) -> bool {
        match self.tx.try_send(text) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(verbindung = %self.verbindung, "Send-Queue voll – Frame verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(verbindung = %self.verbindung, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BroadcastRouter
// ---------------------------------------------------------------------------

/// Fan-Out-Primitive fuer Kanal-Nachrichten
///
/// Haelt selbst keinen Zustand ausser den (optionalen) Metriken; Clone ist billig.
#[derive(Clone, Default)]
pub struct BroadcastRouter {
    metriken: Option<RelayMetriken>,
}

impl BroadcastRouter {
    /// Erstellt einen neuen Router
    pub fn neu(metriken: Option<RelayMetriken>) -> Self {
        Self { metriken }
    }

    /// Sendet eine Nachricht an alle offenen Mitglieder eines Kanals
    ///
    /// `ausser` wird uebersprungen (typisch: der Absender). Gibt die Anzahl
    /// der Empfaenger zurueck, bei denen der Frame eingereiht wurde.
    pub fn an_kanal_senden(
        &self,
        tabelle: &KanalTabelle,
        kanal: KanalNummer,
        nachricht: &AusgehendeNachricht,
        ausser: Option<VerbindungId>,
    ) -> usize {
        let text = match self.vorbereiten(nachricht) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(typ = nachricht.typ(), fehler = %e, "Broadcast nicht serialisierbar");
                return 0;
            }
        };

        let empfaenger: Vec<VerbindungId> = tabelle.mitglieder(kanal).iter().copied().collect();

        let mut gesendet = 0;
        for verbindung in empfaenger {
            if Some(verbindung) == ausser {
                continue;
            }
            let Some(sender) = tabelle.sender(&verbindung) else {
                continue;
            };
            if !sender.ist_offen() {
                continue;
            }
            if sender.senden(text.clone()) {
                gesendet += 1;
            }
        }

        tracing::trace!(
            kanal = %kanal,
            typ = nachricht.typ(),
            empfaenger = gesendet,
            "Broadcast verteilt"
        );
        self.zustellungen_zaehlen(gesendet);
        gesendet
    }

    /// Sendet eine Nachricht an genau eine Verbindung
    pub fn an_verbindung_senden(
        &self,
        tabelle: &KanalTabelle,
        verbindung: VerbindungId,
        nachricht: &AusgehendeNachricht,
    ) -> bool {
        let Some(sender) = tabelle.sender(&verbindung) else {
            tracing::debug!(verbindung = %verbindung, "Senden an unbekannte Verbindung");
            return false;
        };
        if !sender.ist_offen() {
            return false;
        }
        let gesendet = match self.vorbereiten(nachricht) {
            Ok(text) => sender.senden(text),
            Err(e) => {
                tracing::error!(typ = nachricht.typ(), fehler = %e, "Nachricht nicht serialisierbar");
                false
            }
        };
        self.zustellungen_zaehlen(usize::from(gesendet));
        gesendet
    }

    fn vorbereiten(&self, nachricht: &AusgehendeNachricht) -> RelayResult<String> {
        Ok(nachricht.serialisieren()?)
    }

    fn zustellungen_zaehlen(&self, anzahl: usize) {
        if let Some(metriken) = &self.metriken {
            metriken.deliveries_total.inc_by(anzahl as u64);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
