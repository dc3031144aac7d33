//! liftcom-relay – Kanal-Relay mit Floor-Vergabe
//!
//! Funkgeraete verbinden sich per WebSocket, treten einem von vier Kanaelen
//! bei und senden Anwesenheit und kurze Audio-Bursts an alle anderen
//! Mitglieder. Pro Kanal darf nur ein Geraet gleichzeitig senden; die
//! Sendeerlaubnis (Floor) verfaellt automatisch nach dem Floor-Timeout.
//!
//! ## Architektur
//!
//! ```text
//! WebSocket (relay_router)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Leser- und ein Schreib-Task)
//!     |  RelayHandle -> Inbox
//!     v
//! RelayServer (ein Task, serialisiert alle Zugriffe)
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- KanalTabelle     (Mitgliedschaft, Verbindungen, Floor-Zustand)
//!     +-- FloorArbiter     (Vergabe, Erneuerung, Freigabe, Timeout)
//!     +-- BroadcastRouter  (Fan-Out an offene Mitglieder)
//! ```

pub mod broadcast;
pub mod channel_table;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod floor;
pub mod server;

// Bequeme Re-Exporte
pub use broadcast::{BroadcastRouter, ClientSender};
pub use channel_table::KanalTabelle;
pub use config::RelayConfig;
pub use connection::{ClientConnection, relay_router};
pub use dispatcher::{KanalStatus, MessageDispatcher};
pub use error::{RelayError, RelayResult};
pub use floor::{FloorAblauf, FloorAnfrage, FloorArbiter, FloorZustand};
pub use server::{RelayEreignis, RelayHandle, RelayServer};
