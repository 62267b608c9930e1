//! Sitzung – gemeinsamer Zustand aller Verbindungen
//!
//! Eine `Sitzung` pro Prozess. Sie besitzt Registry, Guide-Session,
//! Audio-Relay, Fanout, laufende Aushandlungen und den Monitor-Aggregator
//! und bietet jede Client-Operation als Methode an.
//!
//! Lock-Reihenfolge: Guide-Session vor Relay. Kein Lock wird ueber ein
//! `await` gehalten.

use bytes::Bytes;
use chrono::Utc;
use guidecast_core::{ConnectionId, GuidecastError, Rolle};
use guidecast_media::MedienEngine;
use guidecast_observability::GuidecastMetriken;
use guidecast_protocol::control::{GuideStatus, JoinRoomRequest, TranscriptRequest};
use guidecast_protocol::{ServerEreignis, ServerNachricht};
use guidecast_transcript::TranscriptService;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audio_relay::AudioRelay;
use crate::broadcast::EventFanout;
use crate::guide_session::{GuideBeitritt, GuideSession, GuideSnapshot};
use crate::monitor::MonitorAggregator;
use crate::negotiation::Aushandlungen;
use crate::registry::ConnectionRegistry;

/// Konfiguration der Sitzung
#[derive(Debug, Clone)]
pub struct SitzungsKonfig {
    /// Maximale Groesse eines eingehenden WebSocket-Frames
    pub max_frame_groesse: usize,
}

impl Default for SitzungsKonfig {
    fn default() -> Self {
        Self {
            max_frame_groesse: guidecast_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

pub struct Sitzung {
    pub(crate) selbst: Weak<Sitzung>,
    pub config: SitzungsKonfig,
    pub registry: ConnectionRegistry,
    pub guide: Arc<GuideSession>,
    pub relay: AudioRelay,
    pub fanout: EventFanout,
    pub(crate) aushandlungen: Aushandlungen,
    pub(crate) engine: Arc<dyn MedienEngine>,
    transcripts: TranscriptService,
    pub metriken: GuidecastMetriken,
    monitor_task: Mutex<Option<JoinHandle<()>>>,
    start_time: Instant,
}

impl Sitzung {
    /// Erstellt die Sitzung und startet den Monitor-Aggregator
    ///
    /// Muss innerhalb einer tokio-Runtime aufgerufen werden.
    pub fn neu(
        config: SitzungsKonfig,
        engine: Arc<dyn MedienEngine>,
        transcripts: TranscriptService,
        metriken: GuidecastMetriken,
    ) -> Arc<Self> {
        let registry = ConnectionRegistry::neu();
        let guide = Arc::new(GuideSession::neu());
        let fanout = EventFanout::neu(registry.clone());

        let monitor = MonitorAggregator::neu(
            registry.clone(),
            Arc::clone(&guide),
            fanout.clone(),
            metriken.clone(),
        )
        .starten();

        Arc::new_cyclic(|selbst| Self {
            selbst: selbst.clone(),
            config,
            registry,
            guide,
            relay: AudioRelay::neu(),
            fanout,
            aushandlungen: Aushandlungen::default(),
            engine,
            transcripts,
            metriken,
            monitor_task: Mutex::new(Some(monitor)),
            start_time: Instant::now(),
        })
    }

    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    // -----------------------------------------------------------------------
    // Verbindungs-Lebenszyklus
    // -----------------------------------------------------------------------

    /// Vergibt eine neue Verbindungs-ID und sendet `connection_success`
    pub fn verbindung_oeffnen(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerNachricht>) {
        let connection_id = ConnectionId::new();
        let rx = self.fanout.client_registrieren(connection_id);
        self.fanout.an_client_senden(
            &connection_id,
            ServerEreignis::ConnectionSuccess { sid: connection_id },
        );
        self.metriken.connected_clients.inc();
        tracing::info!(connection_id = %connection_id, "Verbindung geoeffnet");
        (connection_id, rx)
    }

    /// Raeumt alles auf, was an der Verbindung haengt
    ///
    /// War die Verbindung der Guide, faellt die Session zurueck oder ein
    /// anderer registrierter Guide uebernimmt.
    pub async fn verbindung_schliessen(&self, connection_id: ConnectionId) {
        if !self.fanout.client_entfernen(&connection_id) {
            return;
        }
        self.registry.abmelden(&connection_id);
        self.guide_freigeben(connection_id);
        self.aushandlung_freigeben(connection_id).await;
        self.metriken.connected_clients.dec();
        tracing::info!(connection_id = %connection_id, "Verbindung geschlossen");
    }

    /// Verbindung ist noch im Fanout registriert
    pub fn ist_verbunden(&self, connection_id: &ConnectionId) -> bool {
        self.fanout.ist_registriert(connection_id)
    }

    // -----------------------------------------------------------------------
    // Raum
    // -----------------------------------------------------------------------

    /// Tritt dem Raum bei (unbekannte Rollen werden Tourist)
    pub fn raum_beitreten(&self, connection_id: ConnectionId, anfrage: &JoinRoomRequest) -> Rolle {
        let rolle = Rolle::nachsichtig(anfrage.role.as_deref());
        self.registry
            .registrieren(connection_id, rolle, anfrage.language.as_deref());

        match rolle {
            Rolle::Guide => self.guide_beitreten(connection_id),
            Rolle::Tourist => {
                self.guide_freigeben(connection_id);
                self.guide_aushandlung_verwerfen(&connection_id);
                self.guide_status_senden(&connection_id);
            }
            Rolle::Monitor => {
                self.guide_freigeben(connection_id);
                self.guide_aushandlung_verwerfen(&connection_id);
            }
        }
        rolle
    }

    pub fn sprache_aendern(&self, connection_id: &ConnectionId, sprache: &str) -> bool {
        self.registry.sprache_aendern(connection_id, Some(sprache))
    }

    /// Unicast des aktuellen Guide-Status
    pub fn guide_status_senden(&self, connection_id: &ConnectionId) -> bool {
        self.fanout
            .an_client_senden(connection_id, ServerEreignis::GuideStatus(self.guide.status()))
    }

    fn guide_beitreten(&self, connection_id: ConnectionId) {
        let (beitritt, snapshot) = self.guide.aendern(|d| {
            let beitritt = d.als_guide_beitreten(connection_id);
            if matches!(beitritt, GuideBeitritt::Ersetzt(_)) {
                self.relay.leeren();
            }
            beitritt
        });

        if let GuideBeitritt::Ersetzt(alt) = beitritt {
            tracing::warn!(alt = %alt, neu = %connection_id, "Guide ersetzt");
            self.guide_aushandlung_verwerfen(&alt);
        }
        self.status_an_touristen(&snapshot);
    }

    /// Entfernt die Verbindung als Guide, falls sie es war
    ///
    /// Ein anderer noch als Guide registrierter Teilnehmer wird befoerdert.
    fn guide_freigeben(&self, connection_id: ConnectionId) -> bool {
        let (nachfolger, snapshot) = self.guide.aendern(|d| {
            if !d.guide_getrennt(&connection_id) {
                return None;
            }
            self.relay.leeren();
            let nachfolger = self
                .registry
                .mit_rolle(Rolle::Guide)
                .into_iter()
                .map(|t| t.connection_id)
                .find(|id| *id != connection_id);
            if let Some(neu) = nachfolger {
                d.als_guide_beitreten(neu);
            }
            Some(nachfolger)
        });

        let Some(nachfolger) = nachfolger else {
            return false;
        };
        match nachfolger {
            Some(neu) => tracing::info!(alt = %connection_id, neu = %neu, "Guide befoerdert"),
            None => tracing::info!(connection_id = %connection_id, "Guide getrennt"),
        }
        self.status_an_touristen(&snapshot);
        true
    }

    // -----------------------------------------------------------------------
    // Guide-Steuerung
    // -----------------------------------------------------------------------

    pub fn senden_starten(&self, connection_id: &ConnectionId) -> Result<GuideStatus, GuidecastError> {
        let (ergebnis, snapshot) = self.guide.aendern(|d| {
            d.senden_starten(connection_id, Utc::now())?;
            self.relay.zuruecksetzen();
            Ok::<_, GuidecastError>(())
        });
        ergebnis?;
        tracing::info!(connection_id = %connection_id, "Senden gestartet");
        self.status_an_touristen(&snapshot);
        Ok(snapshot.status())
    }

    pub fn senden_stoppen(&self, connection_id: &ConnectionId) -> Result<GuideStatus, GuidecastError> {
        let (ergebnis, snapshot) = self.guide.aendern(|d| {
            d.senden_stoppen(connection_id)?;
            self.relay.stoppen();
            Ok::<_, GuidecastError>(())
        });
        ergebnis?;
        tracing::info!(connection_id = %connection_id, "Senden gestoppt");
        self.status_an_touristen(&snapshot);
        Ok(snapshot.status())
    }

    /// Neue Audio-Session: Sequenz und Init-Segment verwerfen
    pub fn audio_zuruecksetzen(&self, connection_id: &ConnectionId) -> Result<GuideStatus, GuidecastError> {
        let (ergebnis, snapshot) = self.guide.aendern(|d| {
            d.darf_steuern(connection_id)?;
            self.relay.zuruecksetzen();
            Ok::<_, GuidecastError>(())
        });
        ergebnis?;
        self.status_an_touristen(&snapshot);
        Ok(snapshot.status())
    }

    fn status_an_touristen(&self, snapshot: &GuideSnapshot) {
        let n = self
            .fanout
            .an_rolle_senden(Rolle::Tourist, ServerEreignis::GuideStatus(snapshot.status()));
        tracing::trace!(touristen = n, "Guide-Status verteilt");
    }

    // -----------------------------------------------------------------------
    // Audio-Chunks
    // -----------------------------------------------------------------------

    /// Verteilt einen Chunk, nur vom aktuellen Guide
    ///
    /// Gibt die vergebene Sequenznummer zurueck. Chunks anderer
    /// Verbindungen werden verworfen und mit `NurGuide` abgelehnt.
    pub fn chunk_einspeisen(
        &self,
        connection_id: &ConnectionId,
        daten: Bytes,
    ) -> Result<u32, GuidecastError> {
        let sequenz = self.guide.lesen(|d| {
            d.ist_guide(connection_id)
                .then(|| self.relay.chunk_verteilen(daten, &self.fanout))
        });
        match sequenz {
            Some(sequenz) => {
                self.metriken.audio_chunks_total.inc();
                Ok(sequenz)
            }
            None => {
                tracing::warn!(connection_id = %connection_id, "Audio-Chunk von Nicht-Guide verworfen");
                Err(GuidecastError::NurGuide)
            }
        }
    }

    pub fn init_anfordern(&self, connection_id: &ConnectionId) -> bool {
        self.relay.init_anfordern(connection_id, &self.fanout)
    }

    // -----------------------------------------------------------------------
    // Transkripte
    // -----------------------------------------------------------------------

    /// Uebersetzt, verteilt an Touristen und Guides, archiviert finale Eintraege
    pub async fn transcript_verarbeiten(
        &self,
        connection_id: &ConnectionId,
        anfrage: TranscriptRequest,
    ) -> Option<Vec<JoinHandle<bool>>> {
        let (eintrag, fehlgeschlagen) = self
            .transcripts
            .verarbeiten(&anfrage.text, anfrage.is_final, self.registry.tourist_sprachen())
            .await?;

        if !fehlgeschlagen.is_empty() {
            tracing::warn!(sprachen = ?fehlgeschlagen, "Uebersetzung teilweise fehlgeschlagen");
            self.metriken
                .translation_failures_total
                .inc_by(fehlgeschlagen.len() as u64);
        }

        let empfaenger = self.fanout.an_rollen_senden(
            &[Rolle::Tourist, Rolle::Guide],
            ServerEreignis::Transcript(eintrag.als_broadcast()),
        );
        tracing::debug!(
            connection_id = %connection_id,
            is_final = eintrag.is_final,
            empfaenger,
            "Transcript verteilt"
        );

        if eintrag.is_final {
            self.metriken.transcripts_total.inc();
        }
        Some(self.transcripts.archivieren(eintrag))
    }
}

impl Drop for Sitzung {
    fn drop(&mut self) {
        if let Some(task) = self.monitor_task.lock().take() {
            task.abort();
        }
    }
}
