//! Fehlertypen fuer die Medien-Schnittstelle

use thiserror::Error;

/// Fehler der Medien-Engine
#[derive(Debug, Error)]
pub enum MedienFehler {
    /// SDP fehlt, ist leer oder hat einen unbekannten Typ
    #[error("Ungueltige Sitzungsbeschreibung: {0}")]
    UngueltigeBeschreibung(String),

    /// Engine ist nicht konfiguriert (nur Chunk-Pfad aktiv)
    #[error("Medien-Engine nicht verfuegbar")]
    NichtVerfuegbar,

    /// Verbindung wurde bereits geschlossen
    #[error("Verbindung geschlossen")]
    Geschlossen,

    /// Track stammt nicht von dieser Engine
    #[error("Fremder Track: {0}")]
    FremderTrack(String),

    /// Fehler der darunterliegenden Engine
    #[error("Engine-Fehler: {0}")]
    Engine(String),

    /// IO-Fehler (Aufnahme-Datei)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl MedienFehler {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}

/// Result-Typ fuer die Medien-Schnittstelle
pub type MedienResult<T> = Result<T, MedienFehler>;
