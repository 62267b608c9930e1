//! Connection-Registry – Wer ist verbunden, in welcher Rolle und Sprache
//!
//! Haelt den ephemeren Zustand aller registrierten Teilnehmer und
//! benachrichtigt Subscriber (Monitor-Aggregator) bei jeder Aenderung.
//! Die Benachrichtigung ist best-effort: ein Subscriber der hinterherhinkt
//! baut seinen Snapshot einfach neu aus dem aktuellen Zustand.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use guidecast_core::{sprache_normalisieren, ConnectionId, Rolle};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Registry-Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEreignis {
    /// Teilnehmer registriert oder erneut beigetreten
    Beigetreten {
        connection_id: ConnectionId,
        rolle: Rolle,
        vorher: Option<Rolle>,
    },
    /// Teilnehmer entfernt
    Verlassen {
        connection_id: ConnectionId,
        rolle: Rolle,
    },
    SpracheGeaendert {
        connection_id: ConnectionId,
        sprache: String,
    },
}

// ---------------------------------------------------------------------------
// Teilnehmer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeilnehmerStatus {
    Verbunden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Teilnehmer {
    pub connection_id: ConnectionId,
    pub rolle: Rolle,
    pub sprache: String,
    pub beigetreten: DateTime<Utc>,
    pub status: TeilnehmerStatus,
}

/// Zaehlung aller Teilnehmer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStatistik {
    pub guides: usize,
    pub touristen: usize,
    pub monitore: usize,
    pub touristen_nach_sprache: BTreeMap<String, usize>,
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

const EVENT_KANAL_GROESSE: usize = 256;

/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    teilnehmer: DashMap<ConnectionId, Teilnehmer>,
    event_tx: broadcast::Sender<RegistryEreignis>,
}

impl ConnectionRegistry {
    pub fn neu() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_KANAL_GROESSE);
        Self {
            inner: Arc::new(RegistryInner {
                teilnehmer: DashMap::new(),
                event_tx,
            }),
        }
    }

    /// Registriert einen Teilnehmer (Upsert)
    ///
    /// Eine leere Sprache wird zur Standardsprache. Bei einem erneuten
    /// Beitritt bleibt der urspruengliche Beitrittszeitpunkt erhalten.
    pub fn registrieren(
        &self,
        connection_id: ConnectionId,
        rolle: Rolle,
        sprache: Option<&str>,
    ) -> Teilnehmer {
        let sprache = sprache_normalisieren(sprache);

        let (eintrag, vorher) = {
            let mut neu = false;
            let mut entry = self
                .inner
                .teilnehmer
                .entry(connection_id)
                .or_insert_with(|| {
                    neu = true;
                    Teilnehmer {
                        connection_id,
                        rolle,
                        sprache: sprache.clone(),
                        beigetreten: Utc::now(),
                        status: TeilnehmerStatus::Verbunden,
                    }
                });
            let vorher = (!neu).then_some(entry.rolle);
            entry.rolle = rolle;
            entry.sprache = sprache;
            (entry.clone(), vorher)
        };

        tracing::info!(
            connection_id = %connection_id,
            rolle = %rolle,
            sprache = %eintrag.sprache,
            "Teilnehmer registriert"
        );
        let _ = self.inner.event_tx.send(RegistryEreignis::Beigetreten {
            connection_id,
            rolle,
            vorher,
        });
        eintrag
    }

    /// Entfernt einen Teilnehmer und gibt den vorherigen Eintrag zurueck
    pub fn abmelden(&self, connection_id: &ConnectionId) -> Option<Teilnehmer> {
        let (_, teilnehmer) = self.inner.teilnehmer.remove(connection_id)?;

        tracing::info!(connection_id = %connection_id, rolle = %teilnehmer.rolle, "Teilnehmer abgemeldet");
        let _ = self.inner.event_tx.send(RegistryEreignis::Verlassen {
            connection_id: *connection_id,
            rolle: teilnehmer.rolle,
        });
        Some(teilnehmer)
    }

    /// Aendert die Sprache; unbekannte Verbindungen werden ignoriert
    pub fn sprache_aendern(&self, connection_id: &ConnectionId, sprache: Option<&str>) -> bool {
        let sprache = sprache_normalisieren(sprache);
        {
            let Some(mut entry) = self.inner.teilnehmer.get_mut(connection_id) else {
                tracing::debug!(connection_id = %connection_id, "Sprachwechsel fuer unbekannte Verbindung");
                return false;
            };
            entry.sprache = sprache.clone();
        }

        let _ = self.inner.event_tx.send(RegistryEreignis::SpracheGeaendert {
            connection_id: *connection_id,
            sprache,
        });
        true
    }

    pub fn teilnehmer(&self, connection_id: &ConnectionId) -> Option<Teilnehmer> {
        self.inner.teilnehmer.get(connection_id).map(|e| e.clone())
    }

    pub fn rolle_von(&self, connection_id: &ConnectionId) -> Option<Rolle> {
        self.inner.teilnehmer.get(connection_id).map(|e| e.rolle)
    }

    pub fn anzahl(&self, rolle: Rolle) -> usize {
        self.inner
            .teilnehmer
            .iter()
            .filter(|e| e.rolle == rolle)
            .count()
    }

    /// Alle Teilnehmer einer Rolle, nach Beitrittszeit sortiert
    pub fn mit_rolle(&self, rolle: Rolle) -> Vec<Teilnehmer> {
        let mut liste: Vec<Teilnehmer> = self
            .inner
            .teilnehmer
            .iter()
            .filter(|e| e.rolle == rolle)
            .map(|e| e.value().clone())
            .collect();
        liste.sort_by(|a, b| {
            a.beigetreten
                .cmp(&b.beigetreten)
                .then(a.connection_id.cmp(&b.connection_id))
        });
        liste
    }

    pub fn ids_mit_rolle(&self, rolle: Rolle) -> Vec<ConnectionId> {
        self.inner
            .teilnehmer
            .iter()
            .filter(|e| e.rolle == rolle)
            .map(|e| *e.key())
            .collect()
    }

    /// Sprachen aller verbundenen Touristen (mit Duplikaten)
    pub fn tourist_sprachen(&self) -> Vec<String> {
        self.inner
            .teilnehmer
            .iter()
            .filter(|e| e.rolle == Rolle::Tourist)
            .map(|e| e.sprache.clone())
            .collect()
    }

    pub fn touristen_nach_sprache(&self) -> BTreeMap<String, usize> {
        let mut histogramm = BTreeMap::new();
        for sprache in self.tourist_sprachen() {
            *histogramm.entry(sprache).or_insert(0) += 1;
        }
        histogramm
    }

    pub fn statistik(&self) -> RegistryStatistik {
        let mut statistik = RegistryStatistik::default();
        for eintrag in self.inner.teilnehmer.iter() {
            match eintrag.rolle {
                Rolle::Guide => statistik.guides += 1,
                Rolle::Monitor => statistik.monitore += 1,
                Rolle::Tourist => {
                    statistik.touristen += 1;
                    *statistik
                        .touristen_nach_sprache
                        .entry(eintrag.sprache.clone())
                        .or_insert(0) += 1;
                }
            }
        }
        statistik
    }

    pub fn gesamt(&self) -> usize {
        self.inner.teilnehmer.len()
    }

    pub fn events_abonnieren(&self) -> broadcast::Receiver<RegistryEreignis> {
        self.inner.event_tx.subscribe()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrieren_und_abmelden() {
        let registry = ConnectionRegistry::neu();
        let conn = ConnectionId::new();

        registry.registrieren(conn, Rolle::Tourist, Some("ko"));
        assert_eq!(registry.rolle_von(&conn), Some(Rolle::Tourist));
        assert_eq!(registry.gesamt(), 1);

        let entfernt = registry.abmelden(&conn).expect("Eintrag muss existieren");
        assert_eq!(entfernt.sprache, "ko");
        assert!(registry.abmelden(&conn).is_none());
        assert_eq!(registry.gesamt(), 0);
    }

    #[test]
    fn leere_sprache_wird_standard() {
        let registry = ConnectionRegistry::neu();
        let conn = ConnectionId::new();
        let t = registry.registrieren(conn, Rolle::Tourist, Some(""));
        assert_eq!(t.sprache, "en");
    }

    #[test]
    fn erneuter_beitritt_behaelt_beitrittszeit() {
        let registry = ConnectionRegistry::neu();
        let conn = ConnectionId::new();

        let erst = registry.registrieren(conn, Rolle::Tourist, Some("en"));
        let dann = registry.registrieren(conn, Rolle::Guide, Some("de"));

        assert_eq!(erst.beigetreten, dann.beigetreten);
        assert_eq!(dann.rolle, Rolle::Guide);
        assert_eq!(dann.sprache, "de");
        assert_eq!(registry.gesamt(), 1);
    }

    #[test]
    fn sprachhistogramm() {
        let registry = ConnectionRegistry::neu();
        for sprache in ["en", "en", "ko"] {
            registry.registrieren(ConnectionId::new(), Rolle::Tourist, Some(sprache));
        }
        registry.registrieren(ConnectionId::new(), Rolle::Monitor, Some("ja"));

        let statistik = registry.statistik();
        assert_eq!(statistik.touristen, 3);
        assert_eq!(statistik.monitore, 1);
        assert_eq!(
            statistik.touristen_nach_sprache,
            BTreeMap::from([("en".to_string(), 2), ("ko".to_string(), 1)])
        );
        assert_eq!(registry.touristen_nach_sprache(), statistik.touristen_nach_sprache);
    }

    #[test]
    fn sprachwechsel_unbekannt_ist_noop() {
        let registry = ConnectionRegistry::neu();
        let mut rx = registry.events_abonnieren();
        assert!(!registry.sprache_aendern(&ConnectionId::new(), Some("ko")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn clone_teilt_inneren_state() {
        let a = ConnectionRegistry::neu();
        let b = a.clone();
        let conn = ConnectionId::new();
        a.registrieren(conn, Rolle::Guide, None);
        assert_eq!(b.anzahl(Rolle::Guide), 1);
        assert_eq!(b.ids_mit_rolle(Rolle::Guide), vec![conn]);
    }

    #[tokio::test]
    async fn events_werden_versendet() {
        let registry = ConnectionRegistry::neu();
        let mut rx = registry.events_abonnieren();
        let conn = ConnectionId::new();

        registry.registrieren(conn, Rolle::Tourist, None);
        registry.sprache_aendern(&conn, Some("ja"));
        registry.abmelden(&conn);

        assert!(matches!(
            rx.try_recv().unwrap(),
            RegistryEreignis::Beigetreten { vorher: None, .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            RegistryEreignis::SpracheGeaendert { .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap(),
            RegistryEreignis::Verlassen { rolle: Rolle::Tourist, .. }
        ));
    }
}
