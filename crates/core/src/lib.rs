//! liftcom-core – Gemeinsame Typen
//!
//! Stellt die Identifikationstypen bereit, die Protokoll und Relay
//! gemeinsam nutzen.

pub mod types;

pub use types::{KanalNummer, VerbindungId};
