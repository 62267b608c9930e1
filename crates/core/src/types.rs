//! Gemeinsame Identifikations- und Rollentypen fuer Guidecast
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen zur Compilezeit
//! auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standardsprache wenn ein Client keine oder eine leere Sprache angibt
pub const STANDARD_SPRACHE: &str = "en";

/// Eindeutige ID einer Client-Verbindung (opakes Handle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Rolle eines Teilnehmers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rolle {
    Guide,
    Tourist,
    Monitor,
}

impl Rolle {
    /// Interpretiert einen Rollen-String nachsichtig
    ///
    /// Unbekannte oder fehlende Werte werden zu `Tourist`, nicht abgelehnt.
    pub fn nachsichtig(wert: Option<&str>) -> Self {
        match wert.map(|w| w.trim().to_ascii_lowercase()).as_deref() {
            Some("guide") => Self::Guide,
            Some("monitor") => Self::Monitor,
            _ => Self::Tourist,
        }
    }

    /// Name der Zielgruppe fuer diese Rolle
    pub fn gruppe(&self) -> &'static str {
        match self {
            Self::Guide => "guides",
            Self::Tourist => "tourists",
            Self::Monitor => "monitors",
        }
    }

    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Guide => "guide",
            Self::Tourist => "tourist",
            Self::Monitor => "monitor",
        }
    }
}

impl std::fmt::Display for Rolle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Normalisiert einen Sprachcode (leer -> Standardsprache)
pub fn sprache_normalisieren(sprache: Option<&str>) -> String {
    match sprache.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => STANDARD_SPRACHE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId(Uuid::nil());
        assert!(id.to_string().starts_with("conn:"));
    }

    #[test]
    fn rolle_nachsichtig_parsen() {
        assert_eq!(Rolle::nachsichtig(Some("guide")), Rolle::Guide);
        assert_eq!(Rolle::nachsichtig(Some(" Monitor ")), Rolle::Monitor);
        assert_eq!(Rolle::nachsichtig(Some("tourist")), Rolle::Tourist);
        // Unbekannt und fehlend werden zu Tourist
        assert_eq!(Rolle::nachsichtig(Some("admin")), Rolle::Tourist);
        assert_eq!(Rolle::nachsichtig(None), Rolle::Tourist);
    }

    #[test]
    fn rolle_serde_kleinbuchstaben() {
        let json = serde_json::to_string(&Rolle::Guide).unwrap();
        assert_eq!(json, "\"guide\"");
    }

    #[test]
    fn sprache_fallback() {
        assert_eq!(sprache_normalisieren(None), "en");
        assert_eq!(sprache_normalisieren(Some("  ")), "en");
        assert_eq!(sprache_normalisieren(Some("ko")), "ko");
    }
}
