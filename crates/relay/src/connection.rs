//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung besteht aus zwei Tasks:
//! - Leser: WebSocket-Frames -> `RelayHandle::nachricht`
//! - Schreiber: Send-Queue -> WebSocket, plus Keepalive-Ping
//!
//! Endet einer der beiden, wird der andere abgebrochen und die Trennung an
//! den Relay-Task gemeldet. Die Kanal-Tabelle fasst die Verbindung nie an.

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;

use crate::server::RelayHandle;

/// Kuerzestes erlaubtes Ping-Intervall
const MIN_KEEPALIVE: Duration = Duration::from_secs(1);

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    relay: RelayHandle,
}

impl ClientConnection {
    pub fn neu(relay: RelayHandle) -> Self {
        Self { relay }
    }

    /// Laeuft bis der Client trennt oder der Socket nicht mehr beschreibbar ist
    pub async fn verarbeiten(self, socket: WebSocket) {
        let (id, mut sende_rx) = match self.relay.verbinden().await {
            Ok(angemeldet) => angemeldet,
            Err(e) => {
                tracing::warn!(fehler = %e, "Verbindung abgelehnt");
                return;
            }
        };

        let (mut ws_tx, mut ws_rx) = socket.split();
        let keepalive = self.relay.config().keepalive.max(MIN_KEEPALIVE);

        // Schreiber: Send-Queue -> WebSocket + periodischer Ping
        let mut schreiber = tokio::spawn(async move {
            let mut ping_intervall = tokio::time::interval(keepalive);
            ping_intervall.tick().await;

            loop {
                tokio::select! {
                    text = sende_rx.recv() => {
                        let Some(text) = text else { break };
                        if ws_tx.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    _ = ping_intervall.tick() => {
                        if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                            break;
                        }
                        tracing::trace!(verbindung = %id, "Ping gesendet");
                    }
                }
            }
            let _ = ws_tx.close().await;
        });

        // Leser: WebSocket -> Relay-Task
        let relay = self.relay.clone();
        let mut leser = tokio::spawn(async move {
            while let Some(Ok(frame)) = ws_rx.next().await {
                let text = match frame {
                    Message::Text(text) => text,
                    Message::Binary(daten) => match String::from_utf8(daten) {
                        Ok(text) => text,
                        Err(_) => {
                            tracing::debug!(verbindung = %id, "Binaer-Frame ist kein UTF-8 – verworfen");
                            continue;
                        }
                    },
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => continue,
                };
                if relay.nachricht(id, text).await.is_err() {
                    break;
                }
            }
        });

        tokio::select! {
            _ = &mut schreiber => leser.abort(),
            _ = &mut leser => schreiber.abort(),
        }

        if let Err(e) = self.relay.trennen(id).await {
            tracing::debug!(verbindung = %id, fehler = %e, "Trennung nicht zugestellt");
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Axum-Router fuer den WebSocket-Endpunkt unter `RelayConfig::pfad`
pub fn relay_router(relay: RelayHandle) -> Router {
    let pfad = relay.config().pfad.clone();
    let pfad = if pfad.starts_with('/') {
        pfad
    } else {
        format!("/{pfad}")
    };
    Router::new()
        .route(&pfad, get(ws_handler))
        .with_state(relay)
}

async fn ws_handler(ws: WebSocketUpgrade, State(relay): State<RelayHandle>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ClientConnection::neu(relay).verarbeiten(socket))
}
