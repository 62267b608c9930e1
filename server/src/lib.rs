//! guidecast-server – Bibliotheks-Root
//!
//! Baut aus der Konfiguration alle Komponenten zusammen und stellt den
//! Router fuer Integrationstests bereit.

pub mod config;
pub mod http;

use anyhow::Result;
use axum::{http::HeaderValue, Router};
use config::ServerConfig;
use guidecast_db::{DatabaseConfig, SqliteDb};
use guidecast_media::MedienEngine;
use guidecast_observability::{health_router, metrics_router, GuidecastMetriken, HealthState};
use guidecast_signaling::{ws_router, Sitzung, SitzungsKonfig};
use guidecast_transcript::{
    BefehlsUebersetzer, DateiSpeicher, DbSpeicher, KeineUebersetzung, TranscriptService,
    TranscriptSpeicher, Uebersetzer, UebersetzungsPool, Verteiler,
};
use http::{archiv_router, ArchivState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// Intervall fuer die Aktualisierung des Health-Zustands
const HEALTH_INTERVALL: Duration = Duration::from_secs(5);

/// Alle laufzeitrelevanten Komponenten
pub struct Komponenten {
    pub sitzung: Arc<Sitzung>,
    pub health: HealthState,
    pub metriken: GuidecastMetriken,
    pub archiv: ArchivState,
}

impl Komponenten {
    /// Baut die Komponenten aus der Konfiguration auf
    ///
    /// Eine nicht erreichbare Datenbank ist kein Startfehler, der Server
    /// laeuft dann ohne Verlauf weiter.
    pub async fn aufbauen(config: &ServerConfig) -> Result<Self> {
        let health = HealthState::neu();
        let metriken = GuidecastMetriken::neu()?;

        let db = datenbank_oeffnen(config, &health).await;

        let mut speicher: Vec<Arc<dyn TranscriptSpeicher>> = Vec::new();
        if !config.persistenz.transcript_datei.is_empty() {
            speicher.push(Arc::new(DateiSpeicher::neu(
                &config.persistenz.transcript_datei,
            )));
        }
        if let Some(db) = db.clone() {
            speicher.push(Arc::new(DbSpeicher::neu(db)));
        }

        let uebersetzer: Arc<dyn Uebersetzer> = match config.uebersetzung.befehl.split_first() {
            Some((programm, argumente)) => {
                tracing::info!(programm = %programm, "Uebersetzung ueber externes Programm");
                Arc::new(BefehlsUebersetzer::neu(programm.clone(), argumente.to_vec()))
            }
            None => {
                tracing::info!("Keine Uebersetzung konfiguriert, Originaltext wird verteilt");
                Arc::new(KeineUebersetzung)
            }
        };

        let transcripts = TranscriptService::neu(
            UebersetzungsPool::neu(uebersetzer, config.uebersetzung.max_parallel),
            Verteiler::neu(speicher),
            config.uebersetzung.zielsprachen.clone(),
        );

        let aufnahme_verzeichnis = aufnahme_verzeichnis(config);
        let engine = engine_erstellen(config, aufnahme_verzeichnis.clone())?;

        let sitzung = Sitzung::neu(
            SitzungsKonfig {
                max_frame_groesse: config.server.max_frame_groesse,
            },
            engine,
            transcripts,
            metriken.clone(),
        );

        Ok(Self {
            sitzung,
            health,
            metriken,
            archiv: ArchivState {
                db,
                aufnahme_verzeichnis,
                verlauf_limit: config.persistenz.verlauf_limit,
            },
        })
    }

    /// Router mit WebSocket, Archiv und optional Observability
    pub fn router(&self, config: &ServerConfig) -> Router {
        let mut app = Router::new()
            .merge(ws_router(Arc::clone(&self.sitzung)))
            .merge(archiv_router(self.archiv.clone()));

        if let Some(verzeichnis) = &self.archiv.aufnahme_verzeichnis {
            app = app.nest_service("/recordings", ServeDir::new(verzeichnis));
        }

        if config.observability.aktiviert {
            app = app
                .merge(health_router(self.health.clone()))
                .merge(metrics_router(self.metriken.clone()));
        }

        app.layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.netzwerk.cors_origins))
    }

    /// Spiegelt die Verbindungszahl periodisch in den Health-Zustand
    pub fn health_aktualisieren(&self) -> tokio::task::JoinHandle<()> {
        let sitzung = Arc::downgrade(&self.sitzung);
        let health = self.health.clone();
        tokio::spawn(async move {
            let mut intervall = tokio::time::interval(HEALTH_INTERVALL);
            loop {
                intervall.tick().await;
                let Some(sitzung) = sitzung.upgrade() else {
                    break;
                };
                health.verbindungen_setzen(sitzung.fanout.client_anzahl());
            }
        })
    }
}

async fn datenbank_oeffnen(config: &ServerConfig, health: &HealthState) -> Option<SqliteDb> {
    if config.persistenz.datenbank_url.is_empty() {
        tracing::info!("Datenbank deaktiviert");
        return None;
    }
    let db_config = DatabaseConfig {
        url: config.persistenz.datenbank_url.clone(),
        max_verbindungen: config.persistenz.max_verbindungen,
        ..DatabaseConfig::default()
    };
    match SqliteDb::oeffnen(&db_config).await {
        Ok(db) => {
            tracing::info!(url = %db_config.url, "Datenbank geoeffnet");
            health.db_status_setzen(true);
            Some(db)
        }
        Err(e) => {
            tracing::error!(url = %db_config.url, fehler = %e, "Datenbank nicht verfuegbar, Verlauf deaktiviert");
            health.db_status_setzen(false);
            None
        }
    }
}

fn aufnahme_verzeichnis(config: &ServerConfig) -> Option<PathBuf> {
    let verzeichnis = config.medien.aufnahme_verzeichnis.trim();
    (!verzeichnis.is_empty()).then(|| PathBuf::from(verzeichnis))
}

#[cfg(feature = "webrtc")]
fn engine_erstellen(
    config: &ServerConfig,
    aufnahme_verzeichnis: Option<PathBuf>,
) -> Result<Arc<dyn MedienEngine>> {
    use guidecast_media::webrtc_engine::{WebrtcEngine, WebrtcKonfiguration};

    let engine = WebrtcEngine::neu(WebrtcKonfiguration {
        ice_server: config.medien.stun_server.clone(),
        aufnahme_verzeichnis,
    })?;
    tracing::info!("WebRTC-Engine aktiv");
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "webrtc"))]
fn engine_erstellen(
    _config: &ServerConfig,
    _aufnahme_verzeichnis: Option<PathBuf>,
) -> Result<Arc<dyn MedienEngine>> {
    tracing::warn!("Ohne Feature `webrtc` gebaut, nur der Chunk-Pfad ist verfuegbar");
    Ok(Arc::new(guidecast_media::DeaktivierteEngine))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let erlaubt: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ungueltiger CORS-Origin ignoriert");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(erlaubt)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Server und laeuft bis zum Shutdown-Signal
    pub async fn starten(self) -> Result<()> {
        let komponenten = Komponenten::aufbauen(&self.config).await?;
        let app = komponenten.router(&self.config);
        let health_task = komponenten.health_aktualisieren();

        let adresse = self.config.http_bind_adresse();
        let listener = tokio::net::TcpListener::bind(&adresse).await?;
        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            "Server laeuft"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        health_task.abort();
        tracing::info!("Server beendet");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(fehler = %e, "Shutdown-Signal nicht verfuegbar");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown-Signal empfangen");
}
