//! Integrationstests fuer den Relay-Task
//!
//! Die Tests sprechen nur ueber `RelayHandle` mit dem Relay, genau wie es
//! die WebSocket-Verbindungen tun. `kanal_status` dient als Synchronisations-
//! punkt: danach sind alle vorher gesendeten Ereignisse verarbeitet.

use liftcom_core::{KanalNummer, VerbindungId};
use liftcom_observability::RelayMetriken;
use liftcom_relay::{RelayConfig, RelayHandle, RelayServer};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

fn kanal(n: u8) -> KanalNummer {
    KanalNummer::neu(n).unwrap()
}

struct Relay {
    handle: RelayHandle,
    _shutdown: watch::Sender<bool>,
}

fn relay_starten(metriken: Option<RelayMetriken>) -> Relay {
    let (server, handle) = RelayServer::neu(RelayConfig::default(), metriken);
    let (shutdown, shutdown_rx) = watch::channel(false);
    tokio::spawn(server.starten(shutdown_rx));
    Relay {
        handle,
        _shutdown: shutdown,
    }
}

struct Funkgeraet {
    id: VerbindungId,
    rx: mpsc::Receiver<String>,
}

impl Funkgeraet {
    async fn verbinden(relay: &Relay) -> Self {
        let (id, rx) = relay.handle.verbinden().await.unwrap();
        Self { id, rx }
    }

    async fn senden(&self, relay: &Relay, nachricht: Value) {
        relay.handle.nachricht(self.id, nachricht.to_string()).await.unwrap();
    }

    /// Alle bisher zugestellten Frames (nach Synchronisation mit dem Relay)
    async fn frames(&mut self, relay: &Relay) -> Vec<Value> {
        relay.handle.kanal_status(kanal(1)).await.unwrap();
        let mut frames = Vec::new();
        while let Ok(text) = self.rx.try_recv() {
            frames.push(serde_json::from_str(&text).unwrap());
        }
        frames
    }
}

// ---------------------------------------------------------------------------
// Ablauf mit drei Geraeten auf Kanal 2
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn beispiel_ablauf_kanal_2() {
    let relay = relay_starten(None);
    let mut a = Funkgeraet::verbinden(&relay).await;
    let mut b = Funkgeraet::verbinden(&relay).await;
    let mut c = Funkgeraet::verbinden(&relay).await;
    b.senden(&relay, json!({"type": "join", "channel": 2, "deviceId": "B"})).await;
    c.senden(&relay, json!({"type": "join", "channel": 2, "deviceId": "C"})).await;
    b.frames(&relay).await;
    c.frames(&relay).await;

    // 1. A tritt bei
    a.senden(&relay, json!({"type": "join", "channel": 2, "deviceId": "A"})).await;
    let presence = json!({"type": "presence", "channel": 2, "deviceId": "A"});
    assert!(a.frames(&relay).await.is_empty());
    assert_eq!(b.frames(&relay).await, vec![presence.clone()]);
    assert_eq!(c.frames(&relay).await, vec![presence]);

    // 2. A fordert den Floor an
    a.senden(&relay, json!({"type": "request_floor", "channel": 2, "deviceId": "A"})).await;
    let genommen = json!({"type": "floor_taken", "channel": 2, "deviceId": "A"});
    for geraet in [&mut a, &mut b, &mut c] {
        assert_eq!(geraet.frames(&relay).await, vec![genommen.clone()]);
    }

    // 3. B fordert an, nur B erhaelt floor_busy
    b.senden(&relay, json!({"type": "request_floor", "channel": 2, "deviceId": "B"})).await;
    assert_eq!(
        b.frames(&relay).await,
        vec![json!({"type": "floor_busy", "channel": 2})]
    );
    assert!(a.frames(&relay).await.is_empty());
    assert!(c.frames(&relay).await.is_empty());

    // 4. A gibt frei
    a.senden(&relay, json!({"type": "release_floor", "channel": 2, "deviceId": "A"})).await;
    let freigegeben = json!({"type": "floor_released", "channel": 2, "deviceId": "A"});
    for geraet in [&mut a, &mut b, &mut c] {
        assert_eq!(geraet.frames(&relay).await, vec![freigegeben.clone()]);
    }

    // 5. A fordert erneut an und trennt nach 2000ms ohne Freigabe
    a.senden(&relay, json!({"type": "request_floor", "channel": 2, "deviceId": "A"})).await;
    b.frames(&relay).await;
    c.frames(&relay).await;
    tokio::time::advance(Duration::from_millis(2000)).await;
    relay.handle.trennen(a.id).await.unwrap();

    let erwartet = vec![
        json!({"type": "leave", "channel": 2, "deviceId": "A"}),
        json!({"type": "transmission_ended", "channel": 2, "deviceId": "A"}),
    ];
    assert_eq!(b.frames(&relay).await, erwartet);
    assert_eq!(c.frames(&relay).await, erwartet);

    let status = relay.handle.kanal_status(kanal(2)).await.unwrap();
    assert!(!status.floor_belegt);
    assert_eq!(status.mitglieder, 2);

    // Floor ist sofort wieder verfuegbar
    b.senden(&relay, json!({"type": "request_floor", "channel": 2, "deviceId": "B"})).await;
    assert_eq!(
        c.frames(&relay).await,
        vec![json!({"type": "floor_taken", "channel": 2, "deviceId": "B"})]
    );

    // Die abgebrochene Vergabe von A laeuft nicht mehr ab
    tokio::time::advance(Duration::from_millis(3500)).await;
    assert!(c.frames(&relay).await.is_empty());
    let status = relay.handle.kanal_status(kanal(2)).await.unwrap();
    assert_eq!(status.floor_halter.as_deref(), Some("B"));
}

// ---------------------------------------------------------------------------
// Floor-Timeout
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn floor_laeuft_nach_5000ms_genau_einmal_ab() {
    let relay = relay_starten(None);
    let mut a = Funkgeraet::verbinden(&relay).await;
    let mut b = Funkgeraet::verbinden(&relay).await;
    b.senden(&relay, json!({"type": "join", "channel": 1, "deviceId": "B"})).await;
    a.senden(&relay, json!({"type": "request_floor", "channel": 1, "deviceId": "A"})).await;
    a.frames(&relay).await;
    b.frames(&relay).await;
    let start = tokio::time::Instant::now();

    tokio::time::advance(Duration::from_millis(4999)).await;
    assert!(relay.handle.kanal_status(kanal(1)).await.unwrap().floor_belegt);
    assert!(b.frames(&relay).await.is_empty());

    let text = b.rx.recv().await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(5000));
    let frame: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        frame,
        json!({"type": "transmission_ended", "channel": 1, "deviceId": "A"})
    );
    assert!(!relay.handle.kanal_status(kanal(1)).await.unwrap().floor_belegt);

    tokio::time::advance(Duration::from_millis(10_000)).await;
    assert!(a.frames(&relay).await.iter().all(|f| f["type"] == "transmission_ended"));
    assert!(b.frames(&relay).await.is_empty(), "kein zweiter Ablauf");
}

#[tokio::test(start_paused = true)]
async fn erneuerung_setzt_frist_zurueck() {
    let relay = relay_starten(None);
    let mut a = Funkgeraet::verbinden(&relay).await;
    let mut b = Funkgeraet::verbinden(&relay).await;
    b.senden(&relay, json!({"type": "join", "channel": 3, "deviceId": "B"})).await;
    a.senden(&relay, json!({"type": "request_floor", "channel": 3, "deviceId": "A"})).await;
    b.frames(&relay).await;

    tokio::time::advance(Duration::from_millis(4000)).await;
    a.senden(&relay, json!({"type": "request_floor", "channel": 3, "deviceId": "A"})).await;
    assert_eq!(
        b.frames(&relay).await,
        vec![
            json!({"type": "transmission_ended", "channel": 3, "deviceId": "A"}),
            json!({"type": "floor_taken", "channel": 3, "deviceId": "A"}),
        ]
    );

    // 4000 + 4000 > 5000: die erste Frist waere bereits abgelaufen
    tokio::time::advance(Duration::from_millis(4000)).await;
    assert!(relay.handle.kanal_status(kanal(3)).await.unwrap().floor_belegt);
    assert!(b.frames(&relay).await.is_empty());
    a.frames(&relay).await;

    let text = b.rx.recv().await.unwrap();
    assert!(text.contains("transmission_ended"));
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn audio_an_alle_anderen_offenen_mitglieder() {
    let metriken = RelayMetriken::neu().unwrap();
    let relay = relay_starten(Some(metriken.clone()));
    let mut a = Funkgeraet::verbinden(&relay).await;
    let mut b = Funkgeraet::verbinden(&relay).await;
    let c = Funkgeraet::verbinden(&relay).await;
    let mut d = Funkgeraet::verbinden(&relay).await;
    for (geraet, kennung) in [(&a, "A"), (&b, "B"), (&c, "C")] {
        geraet.senden(&relay, json!({"type": "join", "channel": 4, "deviceId": kennung})).await;
    }
    d.senden(&relay, json!({"type": "join", "channel": 1, "deviceId": "D"})).await;
    a.frames(&relay).await;
    b.frames(&relay).await;

    // C ist geschlossen, bleibt aber Mitglied bis zur Trennung
    let c_id = c.id;
    drop(c);

    a.senden(&relay, json!({"type": "audio", "channel": 4, "data": "AAECAw=="})).await;

    assert!(a.frames(&relay).await.is_empty());
    assert_eq!(
        b.frames(&relay).await,
        vec![json!({"type": "audio", "channel": 4, "data": "AAECAw==", "from": "A"})]
    );
    assert!(d.frames(&relay).await.is_empty());
    assert_eq!(relay.handle.kanal_status(kanal(4)).await.unwrap().mitglieder, 3);
    assert_eq!(metriken.audio_frames_total.get(), 1);

    relay.handle.trennen(c_id).await.unwrap();
    assert_eq!(
        b.frames(&relay).await,
        vec![json!({"type": "leave", "channel": 4, "deviceId": "C"})]
    );
    assert_eq!(metriken.connected_clients.get(), 3);
}

#[tokio::test]
async fn ungueltige_eingaben_halten_die_verbindung_offen() {
    let relay = relay_starten(None);
    let a = Funkgeraet::verbinden(&relay).await;
    let mut b = Funkgeraet::verbinden(&relay).await;
    b.senden(&relay, json!({"type": "join", "channel": 1, "deviceId": "B"})).await;

    relay.handle.nachricht(a.id, "{kaputt".into()).await.unwrap();
    relay.handle.nachricht(a.id, "[1,2,3]".into()).await.unwrap();
    a.senden(&relay, json!({"type": "unbekannt", "channel": 1})).await;
    a.senden(&relay, json!({"channel": 1})).await;
    assert!(b.frames(&relay).await.is_empty());

    a.senden(&relay, json!({"type": "audio", "channel": 1, "data": "QQ=="})).await;
    assert_eq!(b.frames(&relay).await.len(), 1);
}

#[tokio::test]
async fn kanal_werte_werden_normalisiert() {
    let relay = relay_starten(None);
    let a = Funkgeraet::verbinden(&relay).await;

    a.senden(&relay, json!({"type": "join", "channel": 7, "deviceId": "A"})).await;
    assert_eq!(relay.handle.kanal_status(kanal(4)).await.unwrap().mitglieder, 1);

    a.senden(&relay, json!({"type": "join", "channel": "abc", "deviceId": "A"})).await;
    assert_eq!(relay.handle.kanal_status(kanal(1)).await.unwrap().mitglieder, 1);
    assert_eq!(relay.handle.kanal_status(kanal(4)).await.unwrap().mitglieder, 0);

    a.senden(&relay, json!({"type": "join", "channel": 0, "deviceId": "A"})).await;
    assert_eq!(relay.handle.kanal_status(kanal(1)).await.unwrap().mitglieder, 1);

    a.senden(&relay, json!({"type": "join", "deviceId": "A"})).await;
    let status = relay.handle.kanal_status(kanal(1)).await.unwrap();
    assert_eq!(status.device_ids, vec!["A".to_string()]);
}

#[tokio::test]
async fn kanalwechsel_meldet_leave_im_alten_kanal() {
    let relay = relay_starten(None);
    let a = Funkgeraet::verbinden(&relay).await;
    let mut b = Funkgeraet::verbinden(&relay).await;
    let mut c = Funkgeraet::verbinden(&relay).await;
    b.senden(&relay, json!({"type": "join", "channel": 1, "deviceId": "B"})).await;
    c.senden(&relay, json!({"type": "join", "channel": 2, "deviceId": "C"})).await;
    a.senden(&relay, json!({"type": "join", "channel": 1, "deviceId": "A"})).await;
    b.frames(&relay).await;

    a.senden(&relay, json!({"type": "presence", "channel": 2})).await;

    assert_eq!(
        b.frames(&relay).await,
        vec![json!({"type": "leave", "channel": 1, "deviceId": "A"})]
    );
    assert_eq!(
        c.frames(&relay).await,
        vec![json!({"type": "presence", "channel": 2, "deviceId": "A"})]
    );
    assert_eq!(relay.handle.kanal_status(kanal(1)).await.unwrap().mitglieder, 1);
    assert_eq!(relay.handle.kanal_status(kanal(2)).await.unwrap().mitglieder, 2);
}

#[tokio::test]
async fn unabhaengige_relays() {
    let eins = relay_starten(None);
    let zwei = relay_starten(None);
    let a = Funkgeraet::verbinden(&eins).await;
    a.senden(&eins, json!({"type": "join", "channel": 1, "deviceId": "A"})).await;

    assert_eq!(eins.handle.kanal_status(kanal(1)).await.unwrap().mitglieder, 1);
    assert_eq!(zwei.handle.kanal_status(kanal(1)).await.unwrap().mitglieder, 0);
}
