//! SQLite-Implementierung des TranscriptRepository

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::error::DbError;
use crate::models::{NeuerTranscript, TranscriptRecord};
use crate::repository::{DbResult, TranscriptRepository};
use crate::sqlite::pool::SqliteDb;

impl TranscriptRepository for SqliteDb {
    async fn speichern(&self, data: NeuerTranscript<'_>) -> DbResult<TranscriptRecord> {
        if data.original.trim().is_empty() {
            return Err(DbError::UngueltigeDaten("leerer Transcript-Text".into()));
        }

        let translations_json = serde_json::to_string(data.translations)?;
        let created_str = data.created_at.to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO transcripts (original, translations, created_at)
             VALUES (?, ?, ?)",
        )
        .bind(data.original)
        .bind(&translations_json)
        .bind(&created_str)
        .execute(&self.pool)
        .await?;

        Ok(TranscriptRecord {
            id: result.last_insert_rowid(),
            original: data.original.to_string(),
            translations: data.translations.clone(),
            created_at: data.created_at,
        })
    }

    async fn verlauf(&self, limit: u32) -> DbResult<Vec<TranscriptRecord>> {
        let rows = sqlx::query(
            "SELECT id, original, translations, created_at
             FROM transcripts
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transcript).collect()
    }

    async fn verlauf_loeschen(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM transcripts")
            .execute(&self.pool)
            .await?;
        tracing::info!(geloescht = result.rows_affected(), "Transcript-Verlauf geloescht");
        Ok(result.rows_affected())
    }
}

fn row_to_transcript(row: &sqlx::sqlite::SqliteRow) -> DbResult<TranscriptRecord> {
    use sqlx::Row as _;

    let translations_str: String = row.try_get("translations")?;
    let translations: BTreeMap<String, String> = serde_json::from_str(&translations_str)?;

    Ok(TranscriptRecord {
        id: row.try_get("id")?,
        original: row.try_get("original")?,
        translations,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
    })
}

fn parse_timestamp(s: String) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltige Zeitangabe '{s}': {e}")))
}
