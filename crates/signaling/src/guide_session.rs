//! Guide-Session – Zustandsmaschine des einzigen Guides
//!
//! ```text
//! KeinGuide --beitreten--> GuideBereit --starten--> Sendet
//!                              ^                       |
//!                              +------stoppen----------+
//! jeder Zustand --guide_getrennt--> KeinGuide
//! ```
//!
//! Invariante: `sendet` impliziert einen gesetzten Guide. Alle Mutationen
//! laufen ueber [`GuideSession::aendern`], das den Lock kurz haelt und bei
//! einer Aenderung einen Snapshot an die Subscriber verteilt.

use chrono::{DateTime, Utc};
use guidecast_core::{ConnectionId, GuidecastError};
use guidecast_protocol::GuideStatus;
use parking_lot::Mutex;
use tokio::sync::broadcast;

const EVENT_KANAL_GROESSE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideZustand {
    KeinGuide,
    GuideBereit,
    Sendet,
}

/// Ergebnis von `als_guide_beitreten`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideBeitritt {
    /// Vorher gab es keinen Guide
    Neu,
    /// Dieselbe Verbindung ist bereits Guide
    Bestaetigt,
    /// Ein anderer Guide wurde ueberschrieben
    Ersetzt(ConnectionId),
}

/// Unveraenderliche Momentaufnahme der Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuideSnapshot {
    pub guide: Option<ConnectionId>,
    pub sendet: bool,
    pub gestartet: Option<DateTime<Utc>>,
    pub track_bereit: bool,
}

impl GuideSnapshot {
    pub fn zustand(&self) -> GuideZustand {
        match (self.guide, self.sendet) {
            (None, _) => GuideZustand::KeinGuide,
            (Some(_), false) => GuideZustand::GuideBereit,
            (Some(_), true) => GuideZustand::Sendet,
        }
    }

    pub fn status(&self) -> GuideStatus {
        GuideStatus {
            online: self.guide.is_some(),
            broadcasting: self.sendet,
        }
    }
}

/// Veraenderbare Daten, nur innerhalb von `aendern` erreichbar
#[derive(Debug, Default)]
pub struct GuideSessionDaten {
    guide: Option<ConnectionId>,
    sendet: bool,
    gestartet: Option<DateTime<Utc>>,
    track_bereit: bool,
}

impl GuideSessionDaten {
    pub fn snapshot(&self) -> GuideSnapshot {
        GuideSnapshot {
            guide: self.guide,
            sendet: self.sendet,
            gestartet: self.gestartet,
            track_bereit: self.track_bereit,
        }
    }

    pub fn guide(&self) -> Option<ConnectionId> {
        self.guide
    }

    pub fn ist_guide(&self, connection_id: &ConnectionId) -> bool {
        self.guide.as_ref() == Some(connection_id)
    }

    /// Nur der aktuelle Guide darf starten, stoppen und zuruecksetzen
    pub fn darf_steuern(&self, connection_id: &ConnectionId) -> Result<(), GuidecastError> {
        match self.guide {
            None => Err(GuidecastError::KeinGuide),
            Some(guide) if guide == *connection_id => Ok(()),
            Some(_) => Err(GuidecastError::NurGuide),
        }
    }

    pub fn als_guide_beitreten(&mut self, connection_id: ConnectionId) -> GuideBeitritt {
        match self.guide {
            Some(guide) if guide == connection_id => GuideBeitritt::Bestaetigt,
            vorher => {
                self.guide = Some(connection_id);
                self.sendet = false;
                self.gestartet = None;
                self.track_bereit = false;
                match vorher {
                    Some(alt) => GuideBeitritt::Ersetzt(alt),
                    None => GuideBeitritt::Neu,
                }
            }
        }
    }

    /// `GuideBereit | Sendet -> Sendet`, setzt den Startzeitpunkt neu
    pub fn senden_starten(
        &mut self,
        connection_id: &ConnectionId,
        jetzt: DateTime<Utc>,
    ) -> Result<(), GuidecastError> {
        self.darf_steuern(connection_id)?;
        self.sendet = true;
        self.gestartet = Some(jetzt);
        Ok(())
    }

    /// `Sendet -> GuideBereit`, der Guide bleibt gesetzt
    pub fn senden_stoppen(&mut self, connection_id: &ConnectionId) -> Result<(), GuidecastError> {
        self.darf_steuern(connection_id)?;
        self.sendet = false;
        self.gestartet = None;
        self.track_bereit = false;
        Ok(())
    }

    /// Gibt `true` zurueck wenn die Verbindung der aktuelle Guide war
    pub fn guide_getrennt(&mut self, connection_id: &ConnectionId) -> bool {
        if !self.ist_guide(connection_id) {
            return false;
        }
        *self = Self::default();
        true
    }

    pub fn track_bereit_setzen(&mut self, bereit: bool) {
        self.track_bereit = bereit && self.guide.is_some();
    }
}

pub struct GuideSession {
    daten: Mutex<GuideSessionDaten>,
    event_tx: broadcast::Sender<GuideSnapshot>,
}

impl GuideSession {
    pub fn neu() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_KANAL_GROESSE);
        Self {
            daten: Mutex::new(GuideSessionDaten::default()),
            event_tx,
        }
    }

    /// Fuehrt eine Mutation unter dem Session-Lock aus
    ///
    /// `f` darf weitere synchrone Locks nehmen (Relay), aber nie awaiten.
    /// Gibt das Ergebnis und den Snapshot nach der Mutation zurueck.
    pub fn aendern<R>(&self, f: impl FnOnce(&mut GuideSessionDaten) -> R) -> (R, GuideSnapshot) {
        let (ergebnis, vorher, nachher) = {
            let mut daten = self.daten.lock();
            let vorher = daten.snapshot();
            let ergebnis = f(&mut daten);
            (ergebnis, vorher, daten.snapshot())
        };

        if vorher != nachher {
            tracing::debug!(
                zustand = ?nachher.zustand(),
                guide = ?nachher.guide,
                track_bereit = nachher.track_bereit,
                "Guide-Session geaendert"
            );
            let _ = self.event_tx.send(nachher);
        }
        (ergebnis, nachher)
    }

    /// Liest unter dem Session-Lock ohne zu veroeffentlichen
    pub fn lesen<R>(&self, f: impl FnOnce(&GuideSessionDaten) -> R) -> R {
        f(&self.daten.lock())
    }

    pub fn snapshot(&self) -> GuideSnapshot {
        self.daten.lock().snapshot()
    }

    pub fn status(&self) -> GuideStatus {
        self.snapshot().status()
    }

    pub fn events_abonnieren(&self) -> broadcast::Receiver<GuideSnapshot> {
        self.event_tx.subscribe()
    }
}

impl Default for GuideSession {
    fn default() -> Self {
        Self::neu()
    }
}
