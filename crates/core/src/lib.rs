//! guidecast-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Guidecast-Crates gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{GuidecastError, Result};
pub use types::{sprache_normalisieren, ConnectionId, Rolle, STANDARD_SPRACHE};
