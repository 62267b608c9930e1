//! In-Memory-Engine fuer Tests
//!
//! Simuliert Aushandlung, Track-Ankunft und ICE-Wechsel ohne Netzwerk.
//! Tests loesen Callbacks ueber `TestVerbindung::track_ausloesen` und
//! `TestVerbindung::ice_ausloesen` aus.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::Any;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::engine::{
    IceHandler, IceZustand, MedienEngine, MedienTrack, PeerVerbindung, SdpTyp,
    SitzungsBeschreibung, TrackArt, TrackHandler, TrackRef,
};
use crate::error::{MedienFehler, MedienResult};

// ---------------------------------------------------------------------------
// TestTrack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TestTrack {
    pub id: String,
    pub art: TrackArt,
    /// ID des Ursprungs-Tracks bei Relay-Abonnements
    pub quelle: Option<String>,
}

impl TestTrack {
    pub fn audio(id: &str) -> TrackRef {
        Arc::new(Self {
            id: id.to_string(),
            art: TrackArt::Audio,
            quelle: None,
        })
    }

    pub fn video(id: &str) -> TrackRef {
        Arc::new(Self {
            id: id.to_string(),
            art: TrackArt::Video,
            quelle: None,
        })
    }
}

impl MedienTrack for TestTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn art(&self) -> TrackArt {
        self.art
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// TestVerbindung
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct TestVerbindung {
    track_handler: Mutex<Option<TrackHandler>>,
    ice_handler: Mutex<Option<IceHandler>>,
    remote: Mutex<Option<SitzungsBeschreibung>>,
    lokal: Mutex<Option<SitzungsBeschreibung>>,
    tracks: Mutex<Vec<TrackRef>>,
    geschlossen: AtomicBool,
}

impl TestVerbindung {
    /// Simuliert einen eintreffenden Track
    pub fn track_ausloesen(&self, track: TrackRef) {
        if let Some(handler) = self.track_handler.lock().as_ref() {
            handler(track);
        }
    }

    /// Simuliert einen ICE-Zustandswechsel
    pub fn ice_ausloesen(&self, zustand: IceZustand) {
        if let Some(handler) = self.ice_handler.lock().as_ref() {
            handler(zustand);
        }
    }

    pub fn angehaengte_tracks(&self) -> Vec<TrackRef> {
        self.tracks.lock().clone()
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.geschlossen.load(Ordering::SeqCst)
    }

    fn offen_pruefen(&self) -> MedienResult<()> {
        if self.ist_geschlossen() {
            return Err(MedienFehler::Geschlossen);
        }
        Ok(())
    }
}

#[async_trait]
impl PeerVerbindung for TestVerbindung {
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
        self.offen_pruefen()?;
        if !beschreibung.sdp.starts_with("v=0") {
            return Err(MedienFehler::UngueltigeBeschreibung(
                "SDP muss mit v=0 beginnen".into(),
            ));
        }
        if beschreibung.typ != SdpTyp::Offer {
            return Err(MedienFehler::UngueltigeBeschreibung(format!(
                "erwartet offer, erhalten {}",
                beschreibung.typ.als_str()
            )));
        }
        *self.remote.lock() = Some(beschreibung);
        Ok(())
    }

    async fn antwort_erstellen(&self) -> MedienResult<SitzungsBeschreibung> {
        self.offen_pruefen()?;
        if self.remote.lock().is_none() {
            return Err(MedienFehler::engine("keine Remote-Beschreibung gesetzt"));
        }
        let tracks = self.tracks.lock().len();
        Ok(SitzungsBeschreibung {
            typ: SdpTyp::Answer,
            sdp: format!("v=0\r\na=x-test-tracks:{tracks}\r\n"),
        })
    }

    async fn lokale_beschreibung_setzen(
        &self,
        beschreibung: SitzungsBeschreibung,
    ) -> MedienResult<()> {
        self.offen_pruefen()?;
        *self.lokal.lock() = Some(beschreibung);
        Ok(())
    }

    async fn lokale_beschreibung(&self) -> Option<SitzungsBeschreibung> {
        self.lokal.lock().clone()
    }

    async fn track_hinzufuegen(&self, track: TrackRef) -> MedienResult<()> {
        self.offen_pruefen()?;
        self.tracks.lock().push(track);
        Ok(())
    }

    async fn schliessen(&self) -> MedienResult<()> {
        self.geschlossen.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TestEngine
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct TestEngine {
    verbindungen: Mutex<Vec<Arc<TestVerbindung>>>,
    erstellen_schlaegt_fehl: AtomicBool,
    relay_abos: AtomicUsize,
    aufnahmen: Mutex<Vec<String>>,
}

impl TestEngine {
    pub fn neu() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Laesst alle folgenden `verbindung_erstellen`-Aufrufe fehlschlagen
    pub fn erstellen_fehlschlagen_lassen(&self, fehler: bool) {
        self.erstellen_schlaegt_fehl.store(fehler, Ordering::SeqCst);
    }

    /// Alle bisher erstellten Verbindungen in Erstellungsreihenfolge
    pub fn verbindungen(&self) -> Vec<Arc<TestVerbindung>> {
        self.verbindungen.lock().clone()
    }

    pub fn letzte_verbindung(&self) -> Option<Arc<TestVerbindung>> {
        self.verbindungen.lock().last().cloned()
    }

    pub fn relay_abo_anzahl(&self) -> usize {
        self.relay_abos.load(Ordering::SeqCst)
    }

    /// IDs der aufgenommenen Tracks
    pub fn aufnahmen(&self) -> Vec<String> {
        self.aufnahmen.lock().clone()
    }
}

#[async_trait]
impl MedienEngine for TestEngine {
    async fn verbindung_erstellen(&self) -> MedienResult<Arc<dyn PeerVerbindung>> {
        if self.erstellen_schlaegt_fehl.load(Ordering::SeqCst) {
            return Err(MedienFehler::engine("Testfehler beim Erstellen"));
        }
        let verbindung = Arc::new(TestVerbindung::default());
        self.verbindungen.lock().push(Arc::clone(&verbindung));
        Ok(verbindung)
    }

    fn relay_abonnieren(&self, quelle: &TrackRef) -> MedienResult<TrackRef> {
        let n = self.relay_abos.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(TestTrack {
            id: format!("relay-{n}-{}", quelle.id()),
            art: quelle.art(),
            quelle: Some(quelle.id().to_string()),
        }))
    }

    async fn aufnahme_starten(&self, track: TrackRef) -> MedienResult<Option<PathBuf>> {
        self.aufnahmen.lock().push(track.id().to_string());
        Ok(Some(PathBuf::from(format!("recordings/{}.ogg", track.id()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::antwort_aushandeln;

    fn angebot() -> SitzungsBeschreibung {
        SitzungsBeschreibung {
            typ: SdpTyp::Offer,
            sdp: "v=0\r\n".into(),
        }
    }

    #[tokio::test]
    async fn aushandlung_liefert_antwort() {
        let engine = TestEngine::neu();
        let verbindung = engine.verbindung_erstellen().await.unwrap();
        let antwort = antwort_aushandeln(verbindung.as_ref(), angebot())
            .await
            .unwrap();
        assert_eq!(antwort.typ, SdpTyp::Answer);
        assert!(antwort.sdp.contains("x-test-tracks:0"));
    }

    #[tokio::test]
    async fn relay_abo_verweist_auf_quelle() {
        let engine = TestEngine::neu();
        let quelle = TestTrack::audio("guide-1");
        let abo = engine.relay_abonnieren(&quelle).unwrap();
        let abo = abo.as_any().downcast_ref::<TestTrack>().unwrap();
        assert_eq!(abo.quelle.as_deref(), Some("guide-1"));
        assert_eq!(engine.relay_abo_anzahl(), 1);
    }

    #[tokio::test]
    async fn geschlossene_verbindung_lehnt_ab() {
        let engine = TestEngine::neu();
        let verbindung = engine.verbindung_erstellen().await.unwrap();
        verbindung.schliessen().await.unwrap();
        let result = verbindung.remote_beschreibung_setzen(angebot()).await;
        assert!(matches!(result, Err(MedienFehler::Geschlossen)));
    }
}
