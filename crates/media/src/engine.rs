//! Traits der Medien-Engine
//!
//! Der Signaling-Layer kennt nur diese Primitive:
//! Verbindung erstellen, Beschreibung setzen/lesen, Antwort erstellen,
//! Track abonnieren, Track an viele Abonnenten relayen, Track aufnehmen.
//! ICE, DTLS, SRTP und Codec-Aushandlung bleiben vollstaendig in der Engine.

use async_trait::async_trait;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{MedienFehler, MedienResult};

// ---------------------------------------------------------------------------
// Sitzungsbeschreibung
// ---------------------------------------------------------------------------

/// Typ einer SDP-Beschreibung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpTyp {
    Offer,
    Answer,
    Pranswer,
}

impl SdpTyp {
    /// Parst den deklarierten Typ eines Clients
    pub fn parsen(wert: &str) -> MedienResult<Self> {
        match wert.trim().to_ascii_lowercase().as_str() {
            "offer" => Ok(Self::Offer),
            "answer" => Ok(Self::Answer),
            "pranswer" => Ok(Self::Pranswer),
            anderer => Err(MedienFehler::UngueltigeBeschreibung(format!(
                "unbekannter SDP-Typ '{anderer}'"
            ))),
        }
    }

    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Pranswer => "pranswer",
        }
    }
}

/// Opake SDP-Beschreibung mit deklariertem Typ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitzungsBeschreibung {
    pub typ: SdpTyp,
    pub sdp: String,
}

impl SitzungsBeschreibung {
    /// Baut eine Beschreibung aus Client-Eingaben und prueft die Pflichtfelder
    pub fn aus_client(sdp: &str, typ: &str) -> MedienResult<Self> {
        if sdp.trim().is_empty() {
            return Err(MedienFehler::UngueltigeBeschreibung("SDP ist leer".into()));
        }
        Ok(Self {
            typ: SdpTyp::parsen(typ)?,
            sdp: sdp.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

/// Art eines Medien-Tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackArt {
    Audio,
    Video,
}

/// Ein eingehender oder relayter Medien-Track
///
/// Tracks sind opake Handles der Engine. `as_any` erlaubt der Engine den
/// Zugriff auf ihre eigene Implementierung.
pub trait MedienTrack: Send + Sync + std::fmt::Debug {
    fn id(&self) -> &str;
    fn art(&self) -> TrackArt;
    fn as_any(&self) -> &dyn Any;
}

pub type TrackRef = Arc<dyn MedienTrack>;

// ---------------------------------------------------------------------------
// Verbindung
// ---------------------------------------------------------------------------

/// ICE-Verbindungszustand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceZustand {
    Neu,
    Pruefend,
    Verbunden,
    Abgeschlossen,
    Getrennt,
    Fehlgeschlagen,
    Geschlossen,
}

impl IceZustand {
    /// Zustaende nach denen die Verbindung nicht mehr nutzbar ist
    pub fn ist_endgueltig(&self) -> bool {
        matches!(self, Self::Fehlgeschlagen | Self::Geschlossen)
    }
}

/// Callback fuer eintreffende Tracks
pub type TrackHandler = Box<dyn Fn(TrackRef) + Send + Sync>;

/// Callback fuer ICE-Zustandswechsel
pub type IceHandler = Box<dyn Fn(IceZustand) + Send + Sync>;

/// Eine Peer-Verbindung der Medien-Engine
#[async_trait]
pub trait PeerVerbindung: Send + Sync {
    /// Registriert den Callback fuer eintreffende Tracks (ersetzt einen alten)
    fn bei_track(&self, handler: TrackHandler);

    /// Registriert den Callback fuer ICE-Zustandswechsel (ersetzt einen alten)
    fn bei_ice_zustand(&self, handler: IceHandler);

    async fn remote_beschreibung_setzen(&self, beschreibung: SitzungsBeschreibung)
        -> MedienResult<()>;

    async fn antwort_erstellen(&self) -> MedienResult<SitzungsBeschreibung>;

    async fn lokale_beschreibung_setzen(&self, beschreibung: SitzungsBeschreibung)
        -> MedienResult<()>;

    async fn lokale_beschreibung(&self) -> Option<SitzungsBeschreibung>;

    /// Haengt einen (relayten) Track an die Verbindung
    async fn track_hinzufuegen(&self, track: TrackRef) -> MedienResult<()>;

    /// Schliesst die Verbindung und gibt Engine-Ressourcen frei
    async fn schliessen(&self) -> MedienResult<()>;
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Fabrik fuer Peer-Verbindungen plus Relay und Aufnahme
#[async_trait]
pub trait MedienEngine: Send + Sync + 'static {
    async fn verbindung_erstellen(&self) -> MedienResult<Arc<dyn PeerVerbindung>>;

    /// Liefert ein unabhaengiges Abonnement auf einen eingehenden Track
    fn relay_abonnieren(&self, quelle: &TrackRef) -> MedienResult<TrackRef>;

    /// Startet eine Aufnahme des Tracks
    ///
    /// Gibt den Pfad der Aufnahme zurueck, `None` wenn Aufnahmen deaktiviert
    /// sind.
    async fn aufnahme_starten(&self, track: TrackRef) -> MedienResult<Option<PathBuf>>;
}

/// Standard-Antwortaustausch: Remote setzen, Antwort erstellen, lokal setzen
pub async fn antwort_aushandeln(
    verbindung: &dyn PeerVerbindung,
    angebot: SitzungsBeschreibung,
) -> MedienResult<SitzungsBeschreibung> {
    verbindung.remote_beschreibung_setzen(angebot).await?;
    let antwort = verbindung.antwort_erstellen().await?;
    verbindung.lokale_beschreibung_setzen(antwort).await?;
    verbindung
        .lokale_beschreibung()
        .await
        .ok_or_else(|| MedienFehler::engine("keine lokale Beschreibung nach set_local"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdp_typ_parsen() {
        assert_eq!(SdpTyp::parsen("offer").unwrap(), SdpTyp::Offer);
        assert_eq!(SdpTyp::parsen(" Answer").unwrap(), SdpTyp::Answer);
        assert!(SdpTyp::parsen("rollback").is_err());
    }

    #[test]
    fn leeres_sdp_wird_abgelehnt() {
        let result = SitzungsBeschreibung::aus_client("   ", "offer");
        assert!(matches!(result, Err(MedienFehler::UngueltigeBeschreibung(_))));
    }

    #[test]
    fn ice_endgueltig() {
        assert!(IceZustand::Fehlgeschlagen.ist_endgueltig());
        assert!(IceZustand::Geschlossen.ist_endgueltig());
        assert!(!IceZustand::Getrennt.ist_endgueltig());
        assert!(!IceZustand::Verbunden.ist_endgueltig());
    }
}
