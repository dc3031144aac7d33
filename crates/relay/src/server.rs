//! Relay-Server – Der einzige Task, der die Kanal-Tabelle veraendert
//!
//! Verbindungs-Tasks und Floor-Timer posten Ereignisse in Queues; der
//! `RelayServer` verarbeitet sie strikt nacheinander. Jeder Handler laeuft
//! bis zum Ende durch, bevor das naechste Ereignis gelesen wird.
//!
//! ```text
//! ClientConnection ──RelayHandle──> Inbox ──┐
//!                                          ├──> RelayServer ──> MessageDispatcher
//! Floor-Timer ──────FloorAblauf─────────────┘
//! ```

use liftcom_core::{KanalNummer, VerbindungId};
use liftcom_observability::RelayMetriken;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

use crate::broadcast::ClientSender;
use crate::config::RelayConfig;
use crate::dispatcher::{KanalStatus, MessageDispatcher};
use crate::error::{RelayError, RelayResult};
use crate::floor::FloorAblauf;

// ---------------------------------------------------------------------------
// Ereignisse
// ---------------------------------------------------------------------------

/// Ereignis von einer Verbindung an den Relay-Task
#[derive(Debug)]
pub enum RelayEreignis {
    /// Neue Verbindung mit ihrer Send-Queue
    Verbunden { sender: ClientSender },
    /// Text-Frame einer Verbindung
    Nachricht { verbindung: VerbindungId, text: String },
    /// Verbindung wurde geschlossen
    Getrennt { verbindung: VerbindungId },
    /// Momentaufnahme eines Kanals anfordern
    Status {
        kanal: KanalNummer,
        antwort: oneshot::Sender<KanalStatus>,
    },
}

// ---------------------------------------------------------------------------
// RelayHandle
// ---------------------------------------------------------------------------

/// Cloneable Zugriff auf den Relay-Task
#[derive(Clone)]
pub struct RelayHandle {
    inbox: mpsc::Sender<RelayEreignis>,
    config: Arc<RelayConfig>,
}

impl RelayHandle {
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Meldet eine neue Verbindung an
    ///
    /// Gibt die Verbindungs-ID und die Empfangsseite der Send-Queue zurueck.
    pub async fn verbinden(&self) -> RelayResult<(VerbindungId, mpsc::Receiver<String>)> {
        let id = VerbindungId::new();
        let (sender, sende_rx) = ClientSender::neu(id, self.config.send_queue_groesse);
        self.senden(RelayEreignis::Verbunden { sender }).await?;
        Ok((id, sende_rx))
    }

    /// Leitet einen Text-Frame an den Relay-Task weiter
    pub async fn nachricht(&self, verbindung: VerbindungId, text: String) -> RelayResult<()> {
        self.senden(RelayEreignis::Nachricht { verbindung, text }).await
    }

    /// Meldet eine geschlossene Verbindung
    pub async fn trennen(&self, verbindung: VerbindungId) -> RelayResult<()> {
        self.senden(RelayEreignis::Getrennt { verbindung }).await
    }

    /// Fragt den aktuellen Zustand eines Kanals ab
    ///
    /// Wird in Reihenfolge mit allen anderen Ereignissen verarbeitet.
    pub async fn kanal_status(&self, kanal: KanalNummer) -> RelayResult<KanalStatus> {
        let (antwort, antwort_rx) = oneshot::channel();
        self.senden(RelayEreignis::Status { kanal, antwort }).await?;
        antwort_rx.await.map_err(|_| RelayError::Gestoppt)
    }

    async fn senden(&self, ereignis: RelayEreignis) -> RelayResult<()> {
        self.inbox.send(ereignis).await.map_err(|_| RelayError::Gestoppt)
    }
}

// ---------------------------------------------------------------------------
// RelayServer
// ---------------------------------------------------------------------------

/// Relay-Task: besitzt den `MessageDispatcher` und serialisiert alle Zugriffe
pub struct RelayServer {
    dispatcher: MessageDispatcher,
    inbox_rx: mpsc::Receiver<RelayEreignis>,
    ablauf_rx: mpsc::UnboundedReceiver<FloorAblauf>,
}

impl RelayServer {
    /// Erstellt den Relay-Task und ein Handle dazu
    pub fn neu(config: RelayConfig, metriken: Option<RelayMetriken>) -> (Self, RelayHandle) {
        let (inbox, inbox_rx) = mpsc::channel(config.inbox_groesse.max(1));
        let (ablauf_tx, ablauf_rx) = mpsc::unbounded_channel();
        let dispatcher = MessageDispatcher::neu(&config, ablauf_tx, metriken);
        let handle = RelayHandle {
            inbox,
            config: Arc::new(config),
        };
        (
            Self {
                dispatcher,
                inbox_rx,
                ablauf_rx,
            },
            handle,
        )
    }

    /// Verarbeitet Ereignisse bis zum Shutdown-Signal
    ///
    /// Endet auch, wenn alle `RelayHandle`s verworfen wurden.
    pub async fn starten(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::info!(
            floor_timeout_ms = self.dispatcher.floor_timeout().as_millis() as u64,
            "Relay gestartet"
        );

        loop {
            tokio::select! {
                ereignis = self.inbox_rx.recv() => {
                    match ereignis {
                        Some(ereignis) => self.ereignis_verarbeiten(ereignis),
                        None => {
                            tracing::debug!("Alle Relay-Handles verworfen");
                            break;
                        }
                    }
                }

                Some(ablauf) = self.ablauf_rx.recv() => {
                    self.dispatcher.floor_abgelaufen(ablauf);
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Relay: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            verbindungen = self.dispatcher.tabelle().verbindungs_anzahl(),
            "Relay gestoppt"
        );
    }

    fn ereignis_verarbeiten(&mut self, ereignis: RelayEreignis) {
        match ereignis {
            RelayEreignis::Verbunden { sender } => self.dispatcher.verbunden(sender),
            RelayEreignis::Nachricht { verbindung, text } => {
                self.dispatcher.nachricht_verarbeiten(verbindung, &text);
            }
            RelayEreignis::Getrennt { verbindung } => self.dispatcher.getrennt(verbindung),
            RelayEreignis::Status { kanal, antwort } => {
                let _ = antwort.send(self.dispatcher.kanal_status(kanal));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
