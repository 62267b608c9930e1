//! Adapter auf die webrtc-rs Engine
//!
//! - Eingehende Guide-Tracks werden in einen `TrackLocalStaticRTP`
//!   weitergeleitet. Dieser lokale Track kann an beliebig viele
//!   Peer-Verbindungen gebunden werden und bildet so das Relay.
//! - Aufnahmen schreiben die Opus-Pakete des Tracks in eine Ogg-Datei.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::Any;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::io::ogg_writer::OggWriter;
use webrtc::media::io::Writer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};
use webrtc::track::track_remote::TrackRemote;

use crate::engine::{
    IceHandler, IceZustand, MedienEngine, MedienTrack, PeerVerbindung, SdpTyp,
    SitzungsBeschreibung, TrackArt, TrackHandler, TrackRef,
};
use crate::error::{MedienFehler, MedienResult};

/// Abtastrate fuer Opus-Aufnahmen
const OPUS_ABTASTRATE: u32 = 48_000;
const OPUS_KANAELE: u16 = 2;

/// Konfiguration des WebRTC-Adapters
#[derive(Debug, Clone, Default)]
pub struct WebrtcKonfiguration {
    /// STUN/TURN-URLs
    pub ice_server: Vec<String>,
    /// Zielverzeichnis fuer Aufnahmen (`None` = keine Aufnahmen)
    pub aufnahme_verzeichnis: Option<PathBuf>,
}

fn engine_fehler(e: webrtc::Error) -> MedienFehler {
    MedienFehler::engine(e.to_string())
}

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

type AufnahmeSlot = Arc<Mutex<Option<OggWriter<File>>>>;

/// Relay-faehiger Audio-Track
pub struct WebrtcTrack {
    id: String,
    lokal: Arc<TrackLocalStaticRTP>,
    aufnahme: AufnahmeSlot,
}

impl std::fmt::Debug for WebrtcTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebrtcTrack").field("id", &self.id).finish()
    }
}

impl MedienTrack for WebrtcTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn art(&self) -> TrackArt {
        TrackArt::Audio
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn als_webrtc_track(track: &TrackRef) -> MedienResult<&WebrtcTrack> {
    track
        .as_any()
        .downcast_ref::<WebrtcTrack>()
        .ok_or_else(|| MedienFehler::FremderTrack(track.id().to_string()))
}

/// Liest RTP vom Remote-Track und schreibt in Relay und Aufnahme
async fn weiterleiten(
    remote: Arc<TrackRemote>,
    lokal: Arc<TrackLocalStaticRTP>,
    aufnahme: AufnahmeSlot,
) {
    loop {
        let paket = match remote.read_rtp().await {
            Ok((paket, _)) => paket,
            Err(e) => {
                tracing::info!(track_id = %remote.id(), fehler = %e, "Guide-Track beendet");
                break;
            }
        };

        if let Some(writer) = aufnahme.lock().as_mut() {
            if let Err(e) = writer.write_rtp(&paket) {
                tracing::warn!(fehler = %e, "Aufnahme-Schreiben fehlgeschlagen");
            }
        }

        if let Err(e) = lokal.write_rtp(&paket).await {
            tracing::trace!(fehler = %e, "Relay-Schreiben fehlgeschlagen");
        }
    }

    if let Some(mut writer) = aufnahme.lock().take() {
        if let Err(e) = writer.close() {
            tracing::warn!(fehler = %e, "Aufnahme konnte nicht abgeschlossen werden");
        }
    }
}

// ---------------------------------------------------------------------------
// Verbindung
// ---------------------------------------------------------------------------

pub struct WebrtcVerbindung {
    pc: Arc<RTCPeerConnection>,
    track_handler: Arc<Mutex<Option<TrackHandler>>>,
    ice_handler: Arc<Mutex<Option<IceHandler>>>,
}

impl WebrtcVerbindung {
    fn neu(pc: Arc<RTCPeerConnection>) -> Self {
        let track_handler: Arc<Mutex<Option<TrackHandler>>> = Arc::new(Mutex::new(None));
        let ice_handler: Arc<Mutex<Option<IceHandler>>> = Arc::new(Mutex::new(None));

        let slot = Arc::clone(&track_handler);
        pc.on_track(Box::new(move |remote: Arc<TrackRemote>, _, _| {
            let slot = Arc::clone(&slot);
            Box::pin(async move {
                if remote.kind() != RTPCodecType::Audio {
                    tracing::debug!(track_id = %remote.id(), "Nicht-Audio-Track ignoriert");
                    return;
                }

                let lokal = Arc::new(TrackLocalStaticRTP::new(
                    remote.codec().capability.clone(),
                    remote.id(),
                    remote.stream_id(),
                ));
                let aufnahme: AufnahmeSlot = Arc::new(Mutex::new(None));
                let track = Arc::new(WebrtcTrack {
                    id: remote.id(),
                    lokal: Arc::clone(&lokal),
                    aufnahme: Arc::clone(&aufnahme),
                });

                tokio::spawn(weiterleiten(remote, lokal, aufnahme));

                if let Some(handler) = slot.lock().as_ref() {
                    handler(track);
                }
            })
        }));

        let slot = Arc::clone(&ice_handler);
        pc.on_ice_connection_state_change(Box::new(move |zustand: RTCIceConnectionState| {
            let slot = Arc::clone(&slot);
            Box::pin(async move {
                if let Some(handler) = slot.lock().as_ref() {
                    handler(ice_abbilden(zustand));
                }
            })
        }));

        Self {
            pc,
            track_handler,
            ice_handler,
        }
    }
}

fn ice_abbilden(zustand: RTCIceConnectionState) -> IceZustand {
    match zustand {
        RTCIceConnectionState::Checking => IceZustand::Pruefend,
        RTCIceConnectionState::Connected => IceZustand::Verbunden,
        RTCIceConnectionState::Completed => IceZustand::Abgeschlossen,
        RTCIceConnectionState::Disconnected => IceZustand::Getrennt,
        RTCIceConnectionState::Failed => IceZustand::Fehlgeschlagen,
        RTCIceConnectionState::Closed => IceZustand::Geschlossen,
        _ => IceZustand::Neu,
    }
}

fn nach_webrtc(beschreibung: SitzungsBeschreibung) -> MedienResult<RTCSessionDescription> {
    let result = match beschreibung.typ {
        SdpTyp::Offer => RTCSessionDescription::offer(beschreibung.sdp),
        SdpTyp::Answer => RTCSessionDescription::answer(beschreibung.sdp),
        SdpTyp::Pranswer => RTCSessionDescription::pranswer(beschreibung.sdp),
    };
    result.map_err(|e| MedienFehler::UngueltigeBeschreibung(e.to_string()))
}

fn von_webrtc(beschreibung: RTCSessionDescription) -> MedienResult<SitzungsBeschreibung> {
    Ok(SitzungsBeschreibung {
        typ: SdpTyp::parsen(&beschreibung.sdp_type.to_string())?,
        sdp: beschreibung.sdp,
    })
}

#[async_trait]
impl PeerVerbindung for WebrtcVerbindung {
    fn bei_track(&self, handler: TrackHandler) {
        *self.track_handler.lock() = Some(handler);
    }

    fn bei_ice_zustand(&self, handler: IceHandler) {
        *self.ice_handler.lock() = Some(handler);
    }

    async fn remote_beschreibung_setzen(
        &self,
        beschreibung: SitzungsBeschreibung,
    ) -> MedienResult<()> {
        self.pc
            .set_remote_description(nach_webrtc(beschreibung)?)
            .await
            .map_err(engine_fehler)
    }

    async fn antwort_erstellen(&self) -> MedienResult<SitzungsBeschreibung> {
        let antwort = self.pc.create_answer(None).await.map_err(engine_fehler)?;
        von_webrtc(antwort)
    }

    async fn lokale_beschreibung_setzen(
        &self,
        beschreibung: SitzungsBeschreibung,
    ) -> MedienResult<()> {
        // Ohne Trickle-ICE: Antwort erst nach vollstaendigem Gathering
        let mut gathering = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(nach_webrtc(beschreibung)?)
            .await
            .map_err(engine_fehler)?;
        let _ = gathering.recv().await;
        Ok(())
    }

    async fn lokale_beschreibung(&self) -> Option<SitzungsBeschreibung> {
        let beschreibung = self.pc.local_description().await?;
        von_webrtc(beschreibung).ok()
    }

    async fn track_hinzufuegen(&self, track: TrackRef) -> MedienResult<()> {
        let track = als_webrtc_track(&track)?;
        let sender = self
            .pc
            .add_track(Arc::clone(&track.lokal) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(engine_fehler)?;

        // RTCP lesen, sonst laufen die Interceptor-Puffer voll
        tokio::spawn(async move {
            let mut puffer = vec![0u8; 1500];
            while sender.read(&mut puffer).await.is_ok() {}
        });
        Ok(())
    }

    async fn schliessen(&self) -> MedienResult<()> {
        self.pc.close().await.map_err(engine_fehler)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct WebrtcEngine {
    api: API,
    konfig: WebrtcKonfiguration,
}

impl WebrtcEngine {
    pub fn neu(konfig: WebrtcKonfiguration) -> MedienResult<Self> {
        let mut medien = MediaEngine::default();
        medien.register_default_codecs().map_err(engine_fehler)?;

        let registry = register_default_interceptors(Registry::new(), &mut medien)
            .map_err(engine_fehler)?;

        let api = APIBuilder::new()
            .with_media_engine(medien)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api, konfig })
    }
}

#[async_trait]
impl MedienEngine for WebrtcEngine {
    async fn verbindung_erstellen(&self) -> MedienResult<Arc<dyn PeerVerbindung>> {
        let config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: self.konfig.ice_server.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let pc = self
            .api
            .new_peer_connection(config)
            .await
            .map_err(engine_fehler)?;

        Ok(Arc::new(WebrtcVerbindung::neu(Arc::new(pc))))
    }

    fn relay_abonnieren(&self, quelle: &TrackRef) -> MedienResult<TrackRef> {
        let quelle = als_webrtc_track(quelle)?;
        Ok(Arc::new(WebrtcTrack {
            id: format!("{}-relay", quelle.id),
            lokal: Arc::clone(&quelle.lokal),
            aufnahme: Arc::clone(&quelle.aufnahme),
        }))
    }

    async fn aufnahme_starten(&self, track: TrackRef) -> MedienResult<Option<PathBuf>> {
        let Some(verzeichnis) = self.konfig.aufnahme_verzeichnis.as_ref() else {
            return Ok(None);
        };
        let track = als_webrtc_track(&track)?;

        tokio::fs::create_dir_all(verzeichnis).await?;
        let kennung = uuid::Uuid::new_v4().simple().to_string();
        let pfad = verzeichnis.join(format!("guide_{}.ogg", &kennung[..8]));

        let datei = File::create(&pfad)?;
        let writer =
            OggWriter::new(datei, OPUS_ABTASTRATE, OPUS_KANAELE).map_err(engine_fehler)?;
        *track.aufnahme.lock() = Some(writer);

        tracing::info!(pfad = %pfad.display(), "Aufnahme gestartet");
        Ok(Some(pfad))
    }
}
