//! WebRTC-Aushandlung pro Verbindung
//!
//! Jede Verbindung hat hoechstens einen aktiven Aushandlungskontext. Ein
//! neues Angebot ersetzt und schliesst den alten. Endgueltige ICE-Zustaende
//! verwerfen den Kontext nur, wenn er noch der aktuelle ist.
//!
//! ```text
//! Angebot -> Verbindung erstellen -> [Tourist: Relay-Track anhaengen]
//!         -> Remote setzen -> Antwort erstellen -> Lokal setzen -> Antwort
//! ```
//!
//! Callbacks halten nur `Weak`-Referenzen auf Sitzung und Kontext.

use dashmap::DashMap;
use guidecast_core::{ConnectionId, GuidecastError, Rolle};
use guidecast_media::{
    antwort_aushandeln, MedienFehler, PeerVerbindung, SitzungsBeschreibung, TrackArt, TrackRef,
};
use guidecast_protocol::control::{AnswerResponse, OfferRequest};
use guidecast_protocol::ServerEreignis;
use std::sync::Arc;

use crate::guide_session::GuideBeitritt;
use crate::server_state::Sitzung;

/// Fortschritt einer Aushandlung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Verbindung erstellt, noch keine Medien angehaengt
    Angeboten,
    /// Relay-Track des Guides ist angehaengt
    MedienAngehaengt,
}

pub struct AushandlungsKontext {
    pub connection_id: ConnectionId,
    pub rolle: Rolle,
    pub verbindung: Arc<dyn PeerVerbindung>,
    pub relay_track: Option<TrackRef>,
    pub phase: Phase,
}

impl std::fmt::Debug for AushandlungsKontext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AushandlungsKontext")
            .field("connection_id", &self.connection_id)
            .field("rolle", &self.rolle)
            .field("relay_track", &self.relay_track)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// Aktuelle Kontexte, hoechstens einer pro Verbindung
#[derive(Default)]
pub struct Aushandlungen {
    kontexte: DashMap<ConnectionId, Arc<AushandlungsKontext>>,
}

impl Aushandlungen {
    /// Setzt den Kontext ein und gibt den ersetzten zurueck
    pub fn einsetzen(&self, kontext: Arc<AushandlungsKontext>) -> Option<Arc<AushandlungsKontext>> {
        self.kontexte.insert(kontext.connection_id, kontext)
    }

    /// Entfernt den Kontext nur, wenn er noch der aktuelle ist
    pub fn entfernen_wenn_aktuell(&self, kontext: &Arc<AushandlungsKontext>) -> bool {
        self.kontexte
            .remove_if(&kontext.connection_id, |_, aktuell| Arc::ptr_eq(aktuell, kontext))
            .is_some()
    }

    pub fn ist_aktuell(&self, kontext: &Arc<AushandlungsKontext>) -> bool {
        self.kontexte
            .get(&kontext.connection_id)
            .is_some_and(|aktuell| Arc::ptr_eq(aktuell.value(), kontext))
    }

    /// Entfernt den Kontext der Verbindung, falls er als Guide ausgehandelt wurde
    pub fn guide_kontext_entfernen(
        &self,
        connection_id: &ConnectionId,
    ) -> Option<Arc<AushandlungsKontext>> {
        self.kontexte
            .remove_if(connection_id, |_, k| k.rolle == Rolle::Guide)
            .map(|(_, k)| k)
    }

    pub fn entfernen(&self, connection_id: &ConnectionId) -> Option<Arc<AushandlungsKontext>> {
        self.kontexte.remove(connection_id).map(|(_, k)| k)
    }

    pub fn aktuell(&self, connection_id: &ConnectionId) -> Option<Arc<AushandlungsKontext>> {
        self.kontexte.get(connection_id).map(|k| Arc::clone(k.value()))
    }

    pub fn anzahl(&self) -> usize {
        self.kontexte.len()
    }
}

fn aushandlungsfehler(fehler: MedienFehler) -> GuidecastError {
    GuidecastError::Aushandlung(fehler.to_string())
}

async fn verbindung_schliessen(verbindung: &dyn PeerVerbindung) {
    if let Err(e) = verbindung.schliessen().await {
        tracing::debug!(fehler = %e, "Peer-Verbindung liess sich nicht sauber schliessen");
    }
}

impl Sitzung {
    /// Beantwortet ein SDP-Angebot
    ///
    /// Guides muessen vorher als Guide beigetreten sein. Touristen bekommen
    /// den Relay-Track des Guides angehaengt, falls einer existiert.
    pub async fn angebot_verarbeiten(
        &self,
        connection_id: ConnectionId,
        angebot: OfferRequest,
    ) -> Result<AnswerResponse, GuidecastError> {
        let rolle = Rolle::nachsichtig(angebot.role.as_deref());
        let ergebnis = self.aushandeln(connection_id, rolle, angebot).await;

        self.metriken
            .aushandlung_zaehlen(rolle.als_str(), ergebnis.is_ok());
        match &ergebnis {
            Ok(_) => tracing::info!(connection_id = %connection_id, rolle = %rolle, "Aushandlung abgeschlossen"),
            Err(e) => tracing::warn!(connection_id = %connection_id, rolle = %rolle, fehler = %e, "Aushandlung fehlgeschlagen"),
        }
        ergebnis
    }

    async fn aushandeln(
        &self,
        connection_id: ConnectionId,
        rolle: Rolle,
        angebot: OfferRequest,
    ) -> Result<AnswerResponse, GuidecastError> {
        let beschreibung =
            SitzungsBeschreibung::aus_client(&angebot.sdp, &angebot.typ).map_err(aushandlungsfehler)?;

        if rolle == Rolle::Guide && self.registry.rolle_von(&connection_id) != Some(Rolle::Guide) {
            return Err(GuidecastError::Aushandlung(
                "Guide-Angebot ohne vorherigen Guide-Beitritt".into(),
            ));
        }

        let verbindung = self
            .engine
            .verbindung_erstellen()
            .await
            .map_err(aushandlungsfehler)?;

        match self
            .kontext_aufbauen(connection_id, rolle, Arc::clone(&verbindung), beschreibung)
            .await
        {
            Ok(antwort) => Ok(antwort),
            Err(e) => {
                verbindung_schliessen(verbindung.as_ref()).await;
                Err(e)
            }
        }
    }

    async fn kontext_aufbauen(
        &self,
        connection_id: ConnectionId,
        rolle: Rolle,
        verbindung: Arc<dyn PeerVerbindung>,
        beschreibung: SitzungsBeschreibung,
    ) -> Result<AnswerResponse, GuidecastError> {
        if !self.ist_verbunden(&connection_id) {
            return Err(GuidecastError::Getrennt(connection_id.to_string()));
        }

        let relay_track = match (rolle, self.relay.guide_track()) {
            (Rolle::Guide, _) | (_, None) => None,
            (_, Some(quelle)) => {
                let abo = self
                    .engine
                    .relay_abonnieren(&quelle)
                    .map_err(aushandlungsfehler)?;
                verbindung
                    .track_hinzufuegen(Arc::clone(&abo))
                    .await
                    .map_err(aushandlungsfehler)?;
                Some(abo)
            }
        };
        let phase = if relay_track.is_some() {
            Phase::MedienAngehaengt
        } else {
            Phase::Angeboten
        };

        let kontext = Arc::new(AushandlungsKontext {
            connection_id,
            rolle,
            verbindung,
            relay_track,
            phase,
        });
        self.callbacks_registrieren(&kontext);

        if let Some(alt) = self.aushandlungen.einsetzen(Arc::clone(&kontext)) {
            tracing::debug!(connection_id = %connection_id, "Vorherige Aushandlung ersetzt");
            verbindung_schliessen(alt.verbindung.as_ref()).await;
        }

        let antwort = match antwort_aushandeln(kontext.verbindung.as_ref(), beschreibung).await {
            Ok(antwort) => antwort,
            Err(e) => {
                self.aushandlungen.entfernen_wenn_aktuell(&kontext);
                return Err(aushandlungsfehler(e));
            }
        };

        if !self.ist_verbunden(&connection_id) {
            self.aushandlungen.entfernen_wenn_aktuell(&kontext);
            return Err(GuidecastError::Getrennt(connection_id.to_string()));
        }

        Ok(AnswerResponse {
            sdp: antwort.sdp,
            typ: antwort.typ.als_str().to_string(),
        })
    }

    fn callbacks_registrieren(&self, kontext: &Arc<AushandlungsKontext>) {
        let sitzung = self.selbst.clone();
        let kontext_weak = Arc::downgrade(kontext);
        let connection_id = kontext.connection_id;

        kontext.verbindung.bei_ice_zustand(Box::new(move |zustand| {
            tracing::debug!(connection_id = %connection_id, zustand = ?zustand, "ICE-Zustand");
            if !zustand.ist_endgueltig() {
                return;
            }
            let (Some(sitzung), Some(kontext)) = (sitzung.upgrade(), kontext_weak.upgrade()) else {
                return;
            };
            if sitzung.aushandlungen.entfernen_wenn_aktuell(&kontext) {
                tracing::info!(connection_id = %connection_id, "Aushandlung nach ICE-Ende verworfen");
                tokio::spawn(async move {
                    verbindung_schliessen(kontext.verbindung.as_ref()).await;
                });
            }
        }));

        if kontext.rolle != Rolle::Guide {
            return;
        }
        let sitzung = self.selbst.clone();
        let kontext_weak = Arc::downgrade(kontext);
        kontext.verbindung.bei_track(Box::new(move |track| {
            let (Some(sitzung), Some(kontext)) = (sitzung.upgrade(), kontext_weak.upgrade()) else {
                return;
            };
            if !sitzung.aushandlungen.ist_aktuell(&kontext) {
                tracing::debug!(connection_id = %connection_id, "Track einer ersetzten Aushandlung ignoriert");
                return;
            }
            tokio::spawn(async move {
                sitzung.guide_track_angekommen(connection_id, track).await;
            });
        }));
    }

    /// Eingehender Track einer Guide-Verbindung
    ///
    /// Angenommen wird der Track nur, wenn die Verbindung als Guide
    /// registriert ist und die Session keinen anderen Guide fuehrt. Stellt
    /// den Track fuer das Relay bereit, startet die Aufnahme und meldet
    /// `guide_ready`.
    pub async fn guide_track_angekommen(&self, connection_id: ConnectionId, track: TrackRef) {
        if track.art() != TrackArt::Audio {
            tracing::debug!(connection_id = %connection_id, track = track.id(), "Nicht-Audio-Track ignoriert");
            return;
        }
        if !self.ist_verbunden(&connection_id) {
            return;
        }

        let (beitritt, snapshot) = self.guide.aendern(|d| {
            if self.registry.rolle_von(&connection_id) != Some(Rolle::Guide) {
                return None;
            }
            let beitritt = match d.guide() {
                None => d.als_guide_beitreten(connection_id),
                Some(guide) if guide == connection_id => GuideBeitritt::Bestaetigt,
                Some(_) => return None,
            };
            self.relay.guide_track_setzen(Arc::clone(&track));
            d.track_bereit_setzen(true);
            Some(beitritt)
        });
        let Some(beitritt) = beitritt else {
            tracing::warn!(connection_id = %connection_id, track = track.id(), "Track einer frueheren Guide-Verbindung verworfen");
            return;
        };
        if beitritt != GuideBeitritt::Bestaetigt {
            self.fanout
                .an_rolle_senden(Rolle::Tourist, ServerEreignis::GuideStatus(snapshot.status()));
        }

        match self.engine.aufnahme_starten(Arc::clone(&track)).await {
            Ok(Some(pfad)) => tracing::info!(pfad = %pfad.display(), "Aufnahme gestartet"),
            Ok(None) => tracing::debug!("Aufnahme deaktiviert"),
            Err(e) => tracing::warn!(fehler = %e, "Aufnahme konnte nicht gestartet werden"),
        }

        let touristen = self.fanout.an_rolle_senden(Rolle::Tourist, ServerEreignis::GuideReady);
        tracing::info!(connection_id = %connection_id, track = track.id(), touristen, "Guide-Track bereit");
    }

    pub fn aktive_aushandlungen(&self) -> usize {
        self.aushandlungen.anzahl()
    }

    /// Phase des aktuellen Kontexts einer Verbindung
    pub fn aushandlungs_phase(&self, connection_id: &ConnectionId) -> Option<Phase> {
        self.aushandlungen.aktuell(connection_id).map(|k| k.phase)
    }

    /// Verwirft die Guide-Aushandlung einer Verbindung, die nicht mehr Guide ist
    pub(crate) fn guide_aushandlung_verwerfen(&self, connection_id: &ConnectionId) {
        if let Some(kontext) = self.aushandlungen.guide_kontext_entfernen(connection_id) {
            tracing::info!(connection_id = %connection_id, "Guide-Aushandlung verworfen");
            tokio::spawn(async move {
                verbindung_schliessen(kontext.verbindung.as_ref()).await;
            });
        }
    }

    pub(crate) async fn aushandlung_freigeben(&self, connection_id: ConnectionId) {
        if let Some(kontext) = self.aushandlungen.entfernen(&connection_id) {
            verbindung_schliessen(kontext.verbindung.as_ref()).await;
        }
    }
}
