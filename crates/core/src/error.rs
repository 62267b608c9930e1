//! Fehlertypen fuer Guidecast
//!
//! Zentraler Fehler-Enum fuer crate-uebergreifende Fehler. Untermodule
//! definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Guidecast
pub type Result<T> = std::result::Result<T, GuidecastError>;

/// Alle crate-uebergreifenden Fehler im Guidecast-System
#[derive(Debug, Error)]
pub enum GuidecastError {
    // --- Verbindung ---
    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Sitzung ---
    #[error("Aktion nur fuer den Guide erlaubt")]
    NurGuide,

    #[error("Kein Guide verbunden")]
    KeinGuide,

    // --- Externe Dienste ---
    #[error("Aushandlung fehlgeschlagen: {0}")]
    Aushandlung(String),

    #[error("Uebersetzung fehlgeschlagen ({sprache}): {grund}")]
    Uebersetzung { sprache: String, grund: String },

    #[error("Persistenz fehlgeschlagen: {0}")]
    Persistenz(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl GuidecastError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler nur den ausloesenden Client betrifft
    pub fn ist_lokal(&self) -> bool {
        matches!(
            self,
            Self::UngueltigeNachricht(_) | Self::NurGuide | Self::KeinGuide | Self::Aushandlung(_)
        )
    }
}
