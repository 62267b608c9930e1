//! HTTP-Handler fuer Verlauf und Aufnahmen
//!
//! - `GET /history`        – finale Transkripte, neueste zuerst
//! - `DELETE /history`     – Verlauf leeren
//! - `GET /api/recordings` – Dateinamen der Aufnahmen, neueste zuerst

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use guidecast_db::{SqliteDb, TranscriptRecord, TranscriptRepository};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Dateiendung der Aufnahmen der Medien-Engine
pub const AUFNAHME_ENDUNG: &str = "ogg";

#[derive(Clone)]
pub struct ArchivState {
    pub db: Option<SqliteDb>,
    pub aufnahme_verzeichnis: Option<PathBuf>,
    pub verlauf_limit: u32,
}

#[derive(Debug, Serialize)]
pub struct VerlaufEintrag {
    pub id: i64,
    pub text: String,
    pub translations: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl From<TranscriptRecord> for VerlaufEintrag {
    fn from(r: TranscriptRecord) -> Self {
        Self {
            id: r.id,
            text: r.original,
            translations: r.translations,
            created_at: r.created_at,
        }
    }
}

pub fn archiv_router(state: ArchivState) -> Router {
    Router::new()
        .route("/history", get(verlauf).delete(verlauf_loeschen))
        .route("/api/recordings", get(aufnahmen))
        .with_state(state)
}

fn fehler_antwort(status: StatusCode, meldung: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "error": meldung.to_string() }))).into_response()
}

async fn verlauf(State(state): State<ArchivState>) -> Response {
    let Some(db) = state.db.as_ref() else {
        return Json(json!({ "history": [] })).into_response();
    };
    match db.verlauf(state.verlauf_limit).await {
        Ok(eintraege) => {
            let history: Vec<VerlaufEintrag> = eintraege.into_iter().map(Into::into).collect();
            Json(json!({ "history": history })).into_response()
        }
        Err(e) => {
            tracing::error!(fehler = %e, "Verlauf nicht lesbar");
            fehler_antwort(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn verlauf_loeschen(State(state): State<ArchivState>) -> Response {
    let Some(db) = state.db.as_ref() else {
        return fehler_antwort(StatusCode::SERVICE_UNAVAILABLE, "Datenbank deaktiviert");
    };
    match db.verlauf_loeschen().await {
        Ok(geloescht) => {
            tracing::info!(geloescht, "Verlauf geloescht");
            Json(json!({ "deleted": geloescht })).into_response()
        }
        Err(e) => fehler_antwort(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn aufnahmen(State(state): State<ArchivState>) -> Response {
    let Some(verzeichnis) = state.aufnahme_verzeichnis else {
        return Json(json!({ "files": [] })).into_response();
    };
    match aufnahmen_auflisten(&verzeichnis).await {
        Ok(files) => Json(json!({ "files": files })).into_response(),
        Err(e) => fehler_antwort(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// Aufnahmedateien nach Aenderungszeit, neueste zuerst
///
/// Ein fehlendes Verzeichnis ergibt eine leere Liste.
pub async fn aufnahmen_auflisten(verzeichnis: &Path) -> std::io::Result<Vec<String>> {
    let mut eintraege = match tokio::fs::read_dir(verzeichnis).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut dateien: Vec<(SystemTime, String)> = Vec::new();
    while let Some(eintrag) = eintraege.next_entry().await? {
        let pfad = eintrag.path();
        if pfad.extension().and_then(|e| e.to_str()) != Some(AUFNAHME_ENDUNG) {
            continue;
        }
        let geaendert = eintrag
            .metadata()
            .await?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        dateien.push((geaendert, eintrag.file_name().to_string_lossy().into_owned()));
    }

    dateien.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    Ok(dateien.into_iter().map(|(_, name)| name).collect())
}
