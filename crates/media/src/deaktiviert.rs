//! Engine ohne Medienunterstuetzung
//!
//! Wird verwendet wenn der Server ohne WebRTC-Adapter gebaut ist. Jede
//! Aushandlung schlaegt fehl; Audio fliesst dann nur ueber den Chunk-Pfad.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::{MedienEngine, PeerVerbindung, TrackRef};
use crate::error::{MedienFehler, MedienResult};

#[derive(Debug, Default, Clone, Copy)]
pub struct DeaktivierteEngine;

#[async_trait]
impl MedienEngine for DeaktivierteEngine {
    async fn verbindung_erstellen(&self) -> MedienResult<Arc<dyn PeerVerbindung>> {
        Err(MedienFehler::NichtVerfuegbar)
    }

    fn relay_abonnieren(&self, _quelle: &TrackRef) -> MedienResult<TrackRef> {
        Err(MedienFehler::NichtVerfuegbar)
    }

    async fn aufnahme_starten(&self, _track: TrackRef) -> MedienResult<Option<PathBuf>> {
        Ok(None)
    }
}
