//! Monitor-Aggregator – Live-Sicht fuer Monitor-Clients
//!
//! Laeuft als Hintergrund-Task und abonniert die Events von Registry und
//! Guide-Session. Jedes Event loest einen neuen Snapshot aus, der an alle
//! Monitore geht. Verpasste Events (Lagged) sind unkritisch, da der Snapshot
//! immer aus dem aktuellen Zustand gebaut wird.

use chrono::Utc;
use guidecast_core::Rolle;
use guidecast_observability::GuidecastMetriken;
use guidecast_protocol::control::TouristEintrag;
use guidecast_protocol::{MonitorUpdate, ServerEreignis};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::broadcast::EventFanout;
use crate::guide_session::{GuideSession, GuideSnapshot};
use crate::registry::ConnectionRegistry;

/// Baut den Monitor-Snapshot aus Registry und Guide-Session
pub fn monitor_update_bauen(registry: &ConnectionRegistry, guide: &GuideSnapshot) -> MonitorUpdate {
    let tourist_list: Vec<TouristEintrag> = registry
        .mit_rolle(Rolle::Tourist)
        .into_iter()
        .map(|t| TouristEintrag {
            sid: t.connection_id,
            language: t.sprache,
            joined_at: t.beigetreten,
        })
        .collect();

    let mut tourists_by_language = std::collections::BTreeMap::new();
    for eintrag in &tourist_list {
        *tourists_by_language
            .entry(eintrag.language.clone())
            .or_insert(0) += 1;
    }

    MonitorUpdate {
        guide_online: guide.guide.is_some(),
        guide_broadcasting: guide.sendet,
        guide_started_at: guide.gestartet,
        total_tourists: tourist_list.len(),
        tourists_by_language,
        tourist_list,
        timestamp: Utc::now(),
    }
}

pub struct MonitorAggregator {
    registry: ConnectionRegistry,
    guide: Arc<GuideSession>,
    fanout: EventFanout,
    metriken: GuidecastMetriken,
}

impl MonitorAggregator {
    pub fn neu(
        registry: ConnectionRegistry,
        guide: Arc<GuideSession>,
        fanout: EventFanout,
        metriken: GuidecastMetriken,
    ) -> Self {
        Self {
            registry,
            guide,
            fanout,
            metriken,
        }
    }

    /// Baut einen Snapshot und sendet ihn an alle Monitore
    pub fn senden(&self) -> usize {
        let statistik = self.registry.statistik();
        self.metriken
            .teilnehmer_setzen(statistik.guides, statistik.touristen, statistik.monitore);

        let update = monitor_update_bauen(&self.registry, &self.guide.snapshot());
        self.fanout
            .an_rolle_senden(Rolle::Monitor, ServerEreignis::MonitorUpdate(update))
    }

    /// Startet den Hintergrund-Task
    ///
    /// Die Abonnements entstehen vor dem Spawn, damit kein Event zwischen
    /// Start und erstem Poll verloren geht.
    pub fn starten(self) -> JoinHandle<()> {
        let mut registry_rx = self.registry.events_abonnieren();
        let mut guide_rx = self.guide.events_abonnieren();

        tokio::spawn(async move {
            loop {
                let weiter = tokio::select! {
                    r = registry_rx.recv() => ereignis_auswerten(r),
                    g = guide_rx.recv() => ereignis_auswerten(g),
                };
                if !weiter {
                    break;
                }
                let empfaenger = self.senden();
                tracing::trace!(empfaenger, "Monitor-Update verteilt");
            }
            tracing::debug!("Monitor-Aggregator beendet");
        })
    }
}

fn ereignis_auswerten<T>(ergebnis: Result<T, RecvError>) -> bool {
    match ergebnis {
        Ok(_) => true,
        Err(RecvError::Lagged(verpasst)) => {
            tracing::debug!(verpasst, "Monitor-Aggregator hinkt hinterher");
            true
        }
        Err(RecvError::Closed) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidecast_core::ConnectionId;
    use guidecast_protocol::ServerNachricht;
    use std::collections::BTreeMap;
    use std::time::Duration;

    #[test]
    fn snapshot_zaehlt_touristen_nach_sprache() {
        let registry = ConnectionRegistry::neu();
        for sprache in ["en", "en", "ko"] {
            registry.registrieren(ConnectionId::new(), Rolle::Tourist, Some(sprache));
        }
        registry.registrieren(ConnectionId::new(), Rolle::Guide, None);

        let guide = GuideSession::neu();
        let update = monitor_update_bauen(&registry, &guide.snapshot());

        assert_eq!(update.total_tourists, 3);
        assert_eq!(
            update.tourists_by_language,
            BTreeMap::from([("en".to_string(), 2), ("ko".to_string(), 1)])
        );
        assert_eq!(update.tourist_list.len(), 3);
        assert!(!update.guide_online);
    }

    #[tokio::test]
    async fn aggregator_reagiert_auf_registry_events() {
        let registry = ConnectionRegistry::neu();
        let guide = Arc::new(GuideSession::neu());
        let fanout = EventFanout::neu(registry.clone());
        let metriken = GuidecastMetriken::neu().unwrap();

        let monitor = ConnectionId::new();
        let mut rx = fanout.client_registrieren(monitor);

        let task =
            MonitorAggregator::neu(registry.clone(), guide, fanout, metriken.clone()).starten();

        registry.registrieren(monitor, Rolle::Monitor, None);
        registry.registrieren(ConnectionId::new(), Rolle::Tourist, Some("ja"));

        let mut letztes = None;
        for _ in 0..2 {
            let nachricht = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("Monitor-Update erwartet")
                .expect("Queue offen");
            if let ServerNachricht::Ereignis(ServerEreignis::MonitorUpdate(u)) = nachricht {
                letztes = Some(u);
            }
        }

        let update = letztes.expect("Monitor-Update");
        assert_eq!(update.total_tourists, 1);
        assert_eq!(update.tourists_by_language["ja"], 1);
        assert_eq!(metriken.participants.with_label_values(&["monitor"]).get(), 1);
        task.abort();
    }
}
