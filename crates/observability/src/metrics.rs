//! Prometheus-kompatible Metriken fuer Guidecast
//!
//! Registrierte Metriken:
//! - `guidecast_connected_clients` – Gauge: offene WebSocket-Verbindungen
//! - `guidecast_participants` – Gauge nach Rolle: registrierte Teilnehmer
//! - `guidecast_audio_chunks_total` – Counter: relayte Audio-Chunks
//! - `guidecast_transcripts_total` – Counter: verteilte finale Transkripte
//! - `guidecast_translation_failures_total` – Counter: Uebersetzungen mit Fallback
//! - `guidecast_negotiations_total` – Counter nach Rolle und Ergebnis

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct GuidecastMetriken {
    pub registry: Arc<Registry>,

    pub connected_clients: IntGauge,
    pub participants: IntGaugeVec,
    pub audio_chunks_total: IntCounter,
    pub transcripts_total: IntCounter,
    pub translation_failures_total: IntCounter,
    pub negotiations_total: IntCounterVec,
}

impl GuidecastMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "guidecast_connected_clients",
            "Anzahl offener WebSocket-Verbindungen",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let participants = IntGaugeVec::new(
            Opts::new("guidecast_participants", "Registrierte Teilnehmer nach Rolle"),
            &["role"],
        )?;
        registry.register(Box::new(participants.clone()))?;

        let audio_chunks_total = IntCounter::with_opts(Opts::new(
            "guidecast_audio_chunks_total",
            "Anzahl relayter Audio-Chunks",
        ))?;
        registry.register(Box::new(audio_chunks_total.clone()))?;

        let transcripts_total = IntCounter::with_opts(Opts::new(
            "guidecast_transcripts_total",
            "Anzahl verteilter finaler Transkripte",
        ))?;
        registry.register(Box::new(transcripts_total.clone()))?;

        let translation_failures_total = IntCounter::with_opts(Opts::new(
            "guidecast_translation_failures_total",
            "Uebersetzungen die auf den Originaltext zurueckgefallen sind",
        ))?;
        registry.register(Box::new(translation_failures_total.clone()))?;

        let negotiations_total = IntCounterVec::new(
            Opts::new("guidecast_negotiations_total", "Medien-Aushandlungen"),
            &["role", "result"],
        )?;
        registry.register(Box::new(negotiations_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            participants,
            audio_chunks_total,
            transcripts_total,
            translation_failures_total,
            negotiations_total,
        })
    }

    /// Setzt die Teilnehmer-Gauges (Guide, Touristen, Monitore)
    pub fn teilnehmer_setzen(&self, guides: usize, touristen: usize, monitore: usize) {
        for (rolle, anzahl) in [("guide", guides), ("tourist", touristen), ("monitor", monitore)] {
            self.participants
                .with_label_values(&[rolle])
                .set(anzahl as i64);
        }
    }

    pub fn aushandlung_zaehlen(&self, rolle: &str, erfolgreich: bool) {
        let ergebnis = if erfolgreich { "ok" } else { "error" };
        self.negotiations_total
            .with_label_values(&[rolle, ergebnis])
            .inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: GuidecastMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<GuidecastMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
