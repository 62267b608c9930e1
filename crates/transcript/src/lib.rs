//! guidecast-transcript – Uebersetzung und Archivierung von Transkripten
//!
//! Ablauf fuer eine finale Aeusserung:
//! 1. [`UebersetzungsPool`] uebersetzt parallel in alle Zielsprachen
//! 2. der Aufrufer verteilt das Ergebnis an die Clients
//! 3. [`Verteiler`] archiviert im Hintergrund in alle Speicher

pub mod error;
pub mod pool;
pub mod service;
pub mod speicher;
pub mod uebersetzer;

pub use error::{TranscriptFehler, TranscriptResult};
pub use pool::{UebersetzungsErgebnis, UebersetzungsPool};
pub use service::{TranscriptEintrag, TranscriptService};
pub use speicher::{DateiSpeicher, DbSpeicher, TranscriptSpeicher, Verteiler};
pub use uebersetzer::{BefehlsUebersetzer, KeineUebersetzung, Uebersetzer};
