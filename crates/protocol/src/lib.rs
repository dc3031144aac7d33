//! liftcom-protocol – JSON-Nachrichten zwischen Funkgeraet und Relay
//!
//! Eingehende Nachrichten werden tolerant geparst (fehlerhafte Eingaben
//! ergeben einen `ProtokollFehler`, den der Aufrufer verwirft), ausgehende
//! Nachrichten sind ein getaggtes Enum mit festem Feld-Layout.

pub mod error;
pub mod nachricht;

pub use error::{ProtokollFehler, ProtokollResult};
pub use nachricht::{AusgehendeNachricht, EingehendeNachricht};
