//! Transcript-Dienst: Uebersetzen, Verteilen vorbereiten, Archivieren

use chrono::{DateTime, Utc};
use guidecast_protocol::control::TranscriptBroadcast;
use std::collections::{BTreeMap, BTreeSet};
use tokio::task::JoinHandle;

use crate::pool::UebersetzungsPool;
use crate::speicher::Verteiler;

/// Standard-Zielsprachen zusaetzlich zu den Sprachen der Touristen
pub const STANDARD_ZIELSPRACHEN: [&str; 4] = ["en", "ko", "ja", "zh-CN"];

/// Eine verarbeitete Aeusserung des Guides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEintrag {
    pub original: String,
    pub translations: BTreeMap<String, String>,
    pub is_final: bool,
    pub created_at: DateTime<Utc>,
}

impl TranscriptEintrag {
    pub fn als_broadcast(&self) -> TranscriptBroadcast {
        TranscriptBroadcast {
            original: self.original.clone(),
            translations: self.translations.clone(),
            is_final: self.is_final,
        }
    }
}

pub struct TranscriptService {
    pool: UebersetzungsPool,
    verteiler: Verteiler,
    zielsprachen: BTreeSet<String>,
}

impl TranscriptService {
    pub fn neu(
        pool: UebersetzungsPool,
        verteiler: Verteiler,
        zielsprachen: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            pool,
            verteiler,
            zielsprachen: zielsprachen
                .into_iter()
                .filter(|s| !s.trim().is_empty())
                .collect(),
        }
    }

    /// Konfigurierte Sprachen vereinigt mit den Sprachen verbundener Touristen
    pub fn zielsprachen_fuer(
        &self,
        tourist_sprachen: impl IntoIterator<Item = String>,
    ) -> BTreeSet<String> {
        let mut ziele = self.zielsprachen.clone();
        ziele.extend(tourist_sprachen.into_iter().filter(|s| !s.trim().is_empty()));
        ziele
    }

    /// Verarbeitet eine eingehende Aeusserung
    ///
    /// - leerer Text: `None`
    /// - nicht final: sofort, ohne Uebersetzungen
    /// - final: Uebersetzung in alle Zielsprachen
    ///
    /// Der zweite Wert enthaelt die Sprachen, die auf den Originaltext
    /// zurueckgefallen sind.
    pub async fn verarbeiten(
        &self,
        text: &str,
        is_final: bool,
        tourist_sprachen: impl IntoIterator<Item = String>,
    ) -> Option<(TranscriptEintrag, Vec<String>)> {
        if text.trim().is_empty() {
            return None;
        }

        let mut eintrag = TranscriptEintrag {
            original: text.to_string(),
            translations: BTreeMap::new(),
            is_final,
            created_at: Utc::now(),
        };

        if !is_final {
            return Some((eintrag, Vec::new()));
        }

        let ziele = self.zielsprachen_fuer(tourist_sprachen);
        let ergebnis = self.pool.alle_uebersetzen(text, &ziele).await;
        tracing::debug!(
            sprachen = ziele.len(),
            fehlgeschlagen = ergebnis.fehlgeschlagen.len(),
            "Transcript uebersetzt"
        );
        eintrag.translations = ergebnis.uebersetzungen;
        Some((eintrag, ergebnis.fehlgeschlagen))
    }

    /// Archiviert finale Eintraege im Hintergrund
    pub fn archivieren(&self, eintrag: TranscriptEintrag) -> Vec<JoinHandle<bool>> {
        if !eintrag.is_final {
            return Vec::new();
        }
        self.verteiler.im_hintergrund(eintrag)
    }
}
