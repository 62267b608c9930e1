//! Event-Fanout – Sendet Nachrichten an einzelne Clients oder Rollengruppen
//!
//! Jede Verbindung bekommt eine unbegrenzte Send-Queue. Die Gruppen
//! `guides`, `tourists` und `monitors` werden ausschliesslich aus den Rollen
//! der Registry abgeleitet. Zustellung ist best-effort: keine Bestaetigung,
//! keine Wiederholung.

use dashmap::DashMap;
use guidecast_core::{ConnectionId, Rolle};
use guidecast_protocol::ServerNachricht;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::registry::ConnectionRegistry;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    pub tx: mpsc::UnboundedSender<ServerNachricht>,
}

impl ClientSender {
    /// Reiht eine Nachricht ein; `false` wenn der Client getrennt ist
    pub fn senden(&self, nachricht: ServerNachricht) -> bool {
        if self.tx.send(nachricht).is_err() {
            tracing::debug!(connection_id = %self.connection_id, "Send-Queue geschlossen (Client getrennt)");
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// EventFanout
// ---------------------------------------------------------------------------

/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventFanout {
    inner: Arc<FanoutInner>,
}

struct FanoutInner {
    clients: DashMap<ConnectionId, ClientSender>,
    registry: ConnectionRegistry,
}

impl EventFanout {
    pub fn neu(registry: ConnectionRegistry) -> Self {
        Self {
            inner: Arc::new(FanoutInner {
                clients: DashMap::new(),
                registry,
            }),
        }
    }

    /// Registriert eine Verbindung und gibt ihre Empfangs-Queue zurueck
    pub fn client_registrieren(
        &self,
        connection_id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerNachricht> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .clients
            .insert(connection_id, ClientSender { connection_id, tx });
        tracing::debug!(connection_id = %connection_id, "Client im Fanout registriert");
        rx
    }

    pub fn client_entfernen(&self, connection_id: &ConnectionId) -> bool {
        let entfernt = self.inner.clients.remove(connection_id).is_some();
        if entfernt {
            tracing::debug!(connection_id = %connection_id, "Client aus Fanout entfernt");
        }
        entfernt
    }

    /// Unicast an eine beliebige Verbindung, auch unregistrierte Teilnehmer
    pub fn an_client_senden(
        &self,
        connection_id: &ConnectionId,
        nachricht: impl Into<ServerNachricht>,
    ) -> bool {
        match self.inner.clients.get(connection_id) {
            Some(sender) => sender.senden(nachricht.into()),
            None => {
                tracing::debug!(connection_id = %connection_id, "Senden an unbekannten Client");
                false
            }
        }
    }

    /// Sendet an alle Teilnehmer einer Rolle, gibt die Anzahl zurueck
    pub fn an_rolle_senden(&self, rolle: Rolle, nachricht: impl Into<ServerNachricht>) -> usize {
        self.an_rollen_senden(&[rolle], nachricht)
    }

    pub fn an_rollen_senden(
        &self,
        rollen: &[Rolle],
        nachricht: impl Into<ServerNachricht>,
    ) -> usize {
        let nachricht = nachricht.into();
        let mut gesendet = 0;
        for rolle in rollen {
            for connection_id in self.inner.registry.ids_mit_rolle(*rolle) {
                if let Some(sender) = self.inner.clients.get(&connection_id) {
                    if sender.senden(nachricht.clone()) {
                        gesendet += 1;
                    }
                }
            }
        }
        gesendet
    }

    pub fn ist_registriert(&self, connection_id: &ConnectionId) -> bool {
        self.inner.clients.contains_key(connection_id)
    }

    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidecast_protocol::{GuideStatus, ServerEreignis};

    fn status() -> ServerEreignis {
        ServerEreignis::GuideStatus(GuideStatus {
            online: true,
            broadcasting: false,
        })
    }

    #[test]
    fn unicast_an_unregistrierten_teilnehmer() {
        let fanout = EventFanout::neu(ConnectionRegistry::neu());
        let conn = ConnectionId::new();
        let mut rx = fanout.client_registrieren(conn);

        assert!(fanout.an_client_senden(&conn, status()));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn gruppe_folgt_registry_rollen() {
        let registry = ConnectionRegistry::neu();
        let fanout = EventFanout::neu(registry.clone());

        let tourist = ConnectionId::new();
        let monitor = ConnectionId::new();
        let mut rx_t = fanout.client_registrieren(tourist);
        let mut rx_m = fanout.client_registrieren(monitor);
        registry.registrieren(tourist, Rolle::Tourist, None);
        registry.registrieren(monitor, Rolle::Monitor, None);

        assert_eq!(fanout.an_rolle_senden(Rolle::Tourist, status()), 1);
        assert!(rx_t.try_recv().is_ok());
        assert!(rx_m.try_recv().is_err(), "Monitor darf nichts empfangen");

        // Rollenwechsel verschiebt die Gruppe
        registry.registrieren(tourist, Rolle::Monitor, None);
        assert_eq!(fanout.an_rolle_senden(Rolle::Monitor, status()), 2);
        assert_eq!(fanout.an_rolle_senden(Rolle::Tourist, status()), 0);
    }

    #[test]
    fn mehrere_rollen() {
        let registry = ConnectionRegistry::neu();
        let fanout = EventFanout::neu(registry.clone());
        let mut empfaenger = Vec::new();
        for rolle in [Rolle::Guide, Rolle::Tourist, Rolle::Monitor] {
            let conn = ConnectionId::new();
            empfaenger.push(fanout.client_registrieren(conn));
            registry.registrieren(conn, rolle, None);
        }
        assert_eq!(
            fanout.an_rollen_senden(&[Rolle::Tourist, Rolle::Guide], status()),
            2
        );
    }

    #[test]
    fn entfernter_client_bekommt_nichts() {
        let fanout = EventFanout::neu(ConnectionRegistry::neu());
        let conn = ConnectionId::new();
        let _rx = fanout.client_registrieren(conn);
        assert!(fanout.client_entfernen(&conn));
        assert!(!fanout.an_client_senden(&conn, status()));
        assert!(!fanout.ist_registriert(&conn));
    }

    #[test]
    fn geschlossene_queue_zaehlt_nicht() {
        let registry = ConnectionRegistry::neu();
        let fanout = EventFanout::neu(registry.clone());
        let conn = ConnectionId::new();
        drop(fanout.client_registrieren(conn));
        registry.registrieren(conn, Rolle::Tourist, None);
        assert_eq!(fanout.an_rolle_senden(Rolle::Tourist, status()), 0);
    }
}
