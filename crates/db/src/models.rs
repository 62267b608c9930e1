//! Datenbankmodelle
//!
//! Reine Datenuebertragungsobjekte, getrennt von den Protokolltypen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Gespeicherte finale Aeusserung des Guides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: i64,
    pub original: String,
    /// Sprachcode -> Uebersetzung
    pub translations: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// Daten zum Anlegen eines Transcript-Eintrags
#[derive(Debug, Clone)]
pub struct NeuerTranscript<'a> {
    pub original: &'a str,
    pub translations: &'a BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}
