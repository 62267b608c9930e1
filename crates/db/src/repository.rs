//! Repository-Trait-Definitionen

use crate::error::DbError;
use crate::models::{NeuerTranscript, TranscriptRecord};

pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://guidecast.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://guidecast.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Repository fuer den Transcript-Verlauf
#[allow(async_fn_in_trait)]
pub trait TranscriptRepository: Send + Sync {
    /// Speichert eine finale Aeusserung samt Uebersetzungen
    async fn speichern(&self, data: NeuerTranscript<'_>) -> DbResult<TranscriptRecord>;

    /// Laedt die letzten `limit` Eintraege, neueste zuerst
    async fn verlauf(&self, limit: u32) -> DbResult<Vec<TranscriptRecord>>;

    /// Loescht den gesamten Verlauf, gibt die Anzahl geloeschter Zeilen zurueck
    async fn verlauf_loeschen(&self) -> DbResult<u64>;
}
