//! Audio-Relay – Chunk-Pfad und geteilter Guide-Track
//!
//! Zwei unabhaengige Pfade:
//! - Track-Pfad: der eingehende Guide-Track wird hier gehalten und von der
//!   Aushandlung fuer jeden Touristen per Relay abonniert
//! - Chunk-Pfad: rohe Audio-Chunks des Guides werden nummeriert und sofort
//!   an alle Touristen verteilt
//!
//! Chunks werden unter dem Relay-Lock verteilt, damit die Reihenfolge bei
//! allen Touristen der Push-Reihenfolge entspricht. Die Client-Queues sind
//! unbegrenzt; das Relay blockiert und verwirft nie.

use bytes::Bytes;
use guidecast_core::{ConnectionId, Rolle};
use guidecast_media::TrackRef;
use guidecast_protocol::ServerNachricht;
use parking_lot::Mutex;

use crate::broadcast::EventFanout;

#[derive(Debug, Default)]
struct RelayZustand {
    sequenz: u32,
    init_segment: Option<Bytes>,
    aktiv: bool,
    guide_track: Option<TrackRef>,
}

#[derive(Debug, Default)]
pub struct AudioRelay {
    zustand: Mutex<RelayZustand>,
}

impl AudioRelay {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Zaehler und Init-Segment leeren, Session aktiv setzen
    pub fn zuruecksetzen(&self) {
        let mut z = self.zustand.lock();
        z.sequenz = 0;
        z.init_segment = None;
        z.aktiv = true;
        tracing::debug!("Audio-Relay zurueckgesetzt");
    }

    /// Session inaktiv setzen und den geteilten Guide-Track freigeben
    pub fn stoppen(&self) {
        let mut z = self.zustand.lock();
        z.aktiv = false;
        z.guide_track = None;
    }

    /// Alles verwerfen (Guide getrennt)
    pub fn leeren(&self) {
        *self.zustand.lock() = RelayZustand::default();
    }

    /// Nummeriert einen Chunk und verteilt ihn an alle Touristen
    ///
    /// Der erste Chunk seit dem letzten Reset wird als Init-Segment gemerkt.
    /// Gibt die vergebene Sequenznummer zurueck.
    pub fn chunk_verteilen(&self, daten: Bytes, fanout: &EventFanout) -> u32 {
        let mut z = self.zustand.lock();
        let sequenz = z.sequenz;
        if z.init_segment.is_none() {
            z.init_segment = Some(daten.clone());
        }
        z.sequenz = z.sequenz.wrapping_add(1);

        fanout.an_rolle_senden(Rolle::Tourist, ServerNachricht::AudioChunk { sequenz, daten });
        sequenz
    }

    /// Sendet das Init-Segment an einen Client, falls vorhanden und aktiv
    pub fn init_anfordern(&self, connection_id: &ConnectionId, fanout: &EventFanout) -> bool {
        let Some(daten) = self.init_segment() else {
            tracing::debug!(connection_id = %connection_id, "Kein Init-Segment verfuegbar");
            return false;
        };
        fanout.an_client_senden(connection_id, ServerNachricht::AudioInit { daten })
    }

    /// Init-Segment, nur solange die Session aktiv ist
    pub fn init_segment(&self) -> Option<Bytes> {
        let z = self.zustand.lock();
        if z.aktiv {
            z.init_segment.clone()
        } else {
            None
        }
    }

    pub fn ist_aktiv(&self) -> bool {
        self.zustand.lock().aktiv
    }

    /// Naechste zu vergebende Sequenznummer
    pub fn sequenz(&self) -> u32 {
        self.zustand.lock().sequenz
    }

    pub fn guide_track(&self) -> Option<TrackRef> {
        self.zustand.lock().guide_track.clone()
    }

    pub fn guide_track_setzen(&self, track: TrackRef) {
        self.zustand.lock().guide_track = Some(track);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionRegistry;
    use guidecast_media::testing::TestTrack;

    fn aufbau() -> (AudioRelay, EventFanout, ConnectionRegistry) {
        let registry = ConnectionRegistry::neu();
        let fanout = EventFanout::neu(registry.clone());
        (AudioRelay::neu(), fanout, registry)
    }

    #[test]
    fn nter_chunk_hat_sequenz_n() {
        let (relay, fanout, registry) = aufbau();
        let tourist = ConnectionId::new();
        let mut rx = fanout.client_registrieren(tourist);
        registry.registrieren(tourist, Rolle::Tourist, None);

        relay.zuruecksetzen();
        for i in 0..5u8 {
            let seq = relay.chunk_verteilen(Bytes::from(vec![i]), &fanout);
            assert_eq!(seq, u32::from(i));
        }

        for i in 0..5u8 {
            match rx.try_recv().unwrap() {
                ServerNachricht::AudioChunk { sequenz, daten } => {
                    assert_eq!(sequenz, u32::from(i));
                    assert_eq!(daten.as_ref(), &[i]);
                }
                andere => panic!("unerwartet: {andere:?}"),
            }
        }
    }

    #[test]
    fn nur_erster_chunk_ist_init_segment() {
        let (relay, fanout, _) = aufbau();
        relay.zuruecksetzen();
        relay.chunk_verteilen(Bytes::from_static(b"init"), &fanout);
        relay.chunk_verteilen(Bytes::from_static(b"weiter"), &fanout);
        assert_eq!(relay.init_segment().as_deref(), Some(&b"init"[..]));
    }

    #[test]
    fn nach_reset_kein_init_segment() {
        let (relay, fanout, _) = aufbau();
        relay.zuruecksetzen();
        relay.chunk_verteilen(Bytes::from_static(b"alt"), &fanout);

        relay.zuruecksetzen();
        assert!(relay.init_segment().is_none());
        assert_eq!(relay.sequenz(), 0);

        relay.chunk_verteilen(Bytes::from_static(b"neu"), &fanout);
        assert_eq!(relay.init_segment().as_deref(), Some(&b"neu"[..]));
    }

    #[test]
    fn inaktive_session_liefert_kein_init() {
        let (relay, fanout, _) = aufbau();
        relay.zuruecksetzen();
        relay.chunk_verteilen(Bytes::from_static(b"c1"), &fanout);
        relay.stoppen();
        assert!(!relay.ist_aktiv());
        assert!(relay.init_segment().is_none());
    }

    #[test]
    fn init_anfordern_sendet_unicast() {
        let (relay, fanout, _) = aufbau();
        let client = ConnectionId::new();
        let mut rx = fanout.client_registrieren(client);

        assert!(!relay.init_anfordern(&client, &fanout));

        relay.zuruecksetzen();
        relay.chunk_verteilen(Bytes::from_static(b"c1"), &fanout);
        assert!(relay.init_anfordern(&client, &fanout));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerNachricht::AudioInit { daten } if daten.as_ref() == b"c1"
        ));
    }

    #[test]
    fn stoppen_gibt_track_frei() {
        let (relay, _, _) = aufbau();
        relay.guide_track_setzen(TestTrack::audio("guide"));
        assert!(relay.guide_track().is_some());
        relay.stoppen();
        assert!(relay.guide_track().is_none());
    }
}
