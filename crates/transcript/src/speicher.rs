//! Archivierung finaler Transkripte
//!
//! Jeder Speicher laeuft unabhaengig: ein fehlschlagender Speicher wird
//! geloggt und blockiert weder die anderen noch die Live-Verteilung.

use async_trait::async_trait;
use futures_util::future::join_all;
use guidecast_db::{NeuerTranscript, SqliteDb, TranscriptRepository};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use crate::error::TranscriptResult;
use crate::service::TranscriptEintrag;

#[async_trait]
pub trait TranscriptSpeicher: Send + Sync + 'static {
    /// Kurzname fuer Logs
    fn name(&self) -> &'static str;

    async fn speichern(&self, eintrag: &TranscriptEintrag) -> TranscriptResult<()>;
}

// ---------------------------------------------------------------------------
// Textdatei
// ---------------------------------------------------------------------------

/// Haengt den Originaltext zeilenweise an eine Datei an
#[derive(Debug, Clone)]
pub struct DateiSpeicher {
    pfad: PathBuf,
}

impl DateiSpeicher {
    pub fn neu(pfad: impl Into<PathBuf>) -> Self {
        Self { pfad: pfad.into() }
    }

    pub fn pfad(&self) -> &Path {
        &self.pfad
    }
}

#[async_trait]
impl TranscriptSpeicher for DateiSpeicher {
    fn name(&self) -> &'static str {
        "datei"
    }

    async fn speichern(&self, eintrag: &TranscriptEintrag) -> TranscriptResult<()> {
        let mut datei = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.pfad)
            .await?;
        datei
            .write_all(format!("{}\n", eintrag.original).as_bytes())
            .await?;
        datei.flush().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DbSpeicher {
    db: SqliteDb,
}

impl DbSpeicher {
    pub fn neu(db: SqliteDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TranscriptSpeicher for DbSpeicher {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn speichern(&self, eintrag: &TranscriptEintrag) -> TranscriptResult<()> {
        self.db
            .speichern(NeuerTranscript {
                original: &eintrag.original,
                translations: &eintrag.translations,
                created_at: eintrag.created_at,
            })
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Verteiler
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct Verteiler {
    speicher: Vec<Arc<dyn TranscriptSpeicher>>,
}

impl Verteiler {
    pub fn neu(speicher: Vec<Arc<dyn TranscriptSpeicher>>) -> Self {
        Self { speicher }
    }

    pub fn anzahl(&self) -> usize {
        self.speicher.len()
    }

    /// Startet einen Task pro Speicher und kehrt sofort zurueck
    pub fn im_hintergrund(&self, eintrag: TranscriptEintrag) -> Vec<JoinHandle<bool>> {
        let eintrag = Arc::new(eintrag);
        self.speicher
            .iter()
            .map(|speicher| {
                let speicher = Arc::clone(speicher);
                let eintrag = Arc::clone(&eintrag);
                tokio::spawn(async move { einzeln_speichern(speicher.as_ref(), &eintrag).await })
            })
            .collect()
    }

    /// Speichert in alle Speicher und wartet auf alle
    ///
    /// Gibt die Anzahl erfolgreicher Speicher zurueck.
    pub async fn alle_speichern(&self, eintrag: &TranscriptEintrag) -> usize {
        let ergebnisse = join_all(
            self.speicher
                .iter()
                .map(|speicher| einzeln_speichern(speicher.as_ref(), eintrag)),
        )
        .await;
        ergebnisse.into_iter().filter(|ok| *ok).count()
    }
}

async fn einzeln_speichern(speicher: &dyn TranscriptSpeicher, eintrag: &TranscriptEintrag) -> bool {
    match speicher.speichern(eintrag).await {
        Ok(()) => {
            tracing::debug!(speicher = speicher.name(), "Transcript archiviert");
            true
        }
        Err(e) => {
            tracing::error!(speicher = speicher.name(), fehler = %e, "Archivierung fehlgeschlagen");
            false
        }
    }
}
