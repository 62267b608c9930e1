//! Fehlertypen fuer Uebersetzung und Archivierung

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranscriptFehler {
    #[error("Uebersetzung nach '{sprache}' fehlgeschlagen: {grund}")]
    Uebersetzung { sprache: String, grund: String },

    #[error("Uebersetzungsbefehl fehlgeschlagen: {0}")]
    Befehl(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Datenbankfehler: {0}")]
    Db(#[from] guidecast_db::DbError),
}

impl TranscriptFehler {
    pub fn uebersetzung(sprache: &str, grund: impl Into<String>) -> Self {
        Self::Uebersetzung {
            sprache: sprache.to_string(),
            grund: grund.into(),
        }
    }
}

pub type TranscriptResult<T> = std::result::Result<T, TranscriptFehler>;
