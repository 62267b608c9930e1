//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Medien-Engine und Aufnahmen
    pub medien: MedienEinstellungen,
    /// Zielsprachen und Uebersetzungs-Backend
    pub uebersetzung: UebersetzungsEinstellungen,
    /// Transcript-Datei und Datenbank
    pub persistenz: PersistenzEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename fuer Logs
    pub name: String,
    /// Maximale Groesse eines WebSocket-Frames in Bytes
    pub max_frame_groesse: usize,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Guidecast".into(),
            max_frame_groesse: guidecast_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer HTTP und WebSocket
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub http_port: u16,
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 3000,
            cors_origins: vec![],
        }
    }
}

/// Medien-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MedienEinstellungen {
    /// Verzeichnis fuer Guide-Aufnahmen (leer = keine Aufnahmen)
    pub aufnahme_verzeichnis: String,
    /// STUN/TURN-Server fuer die WebRTC-Engine
    pub stun_server: Vec<String>,
}

impl Default for MedienEinstellungen {
    fn default() -> Self {
        Self {
            aufnahme_verzeichnis: "recordings".into(),
            stun_server: vec!["stun:stun.l.google.com:19302".into()],
        }
    }
}

/// Uebersetzungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UebersetzungsEinstellungen {
    /// Sprachen, in die immer uebersetzt wird
    pub zielsprachen: Vec<String>,
    /// Maximal gleichzeitige Uebersetzungen
    pub max_parallel: usize,
    /// Externes Programm; `{sprache}` in den Argumenten wird ersetzt.
    /// Leer = keine Uebersetzung, der Originaltext wird verteilt.
    pub befehl: Vec<String>,
}

impl Default for UebersetzungsEinstellungen {
    fn default() -> Self {
        Self {
            zielsprachen: guidecast_transcript::service::STANDARD_ZIELSPRACHEN
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_parallel: guidecast_transcript::pool::STANDARD_MAX_PARALLEL,
            befehl: vec![],
        }
    }
}

/// Persistenz-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenzEinstellungen {
    /// Textdatei fuer finale Transkripte (leer = deaktiviert)
    pub transcript_datei: String,
    /// SQLite-URL (leer = deaktiviert)
    pub datenbank_url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// Maximale Anzahl Eintraege fuer `/history`
    pub verlauf_limit: u32,
}

impl Default for PersistenzEinstellungen {
    fn default() -> Self {
        Self {
            transcript_datei: "guide_transcript.txt".into(),
            datenbank_url: "sqlite://guidecast.db".into(),
            max_verbindungen: 5,
            verlauf_limit: 500,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert `/metrics` und `/health`
    pub aktiviert: bool,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self { aktiviert: true }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.pruefen()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Plausibilitaetspruefung nach dem Laden
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.uebersetzung.max_parallel == 0 {
            anyhow::bail!("uebersetzung.max_parallel muss groesser als 0 sein");
        }
        if self.server.max_frame_groesse == 0 {
            anyhow::bail!("server.max_frame_groesse muss groesser als 0 sein");
        }
        if !guidecast_observability::logging::log_format_gueltig(&self.logging.format) {
            anyhow::bail!("logging.format '{}' unbekannt", self.logging.format);
        }
        Ok(())
    }

    /// Gibt die Bind-Adresse fuer HTTP und WebSocket zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.netzwerk.http_port, 3000);
        assert_eq!(cfg.medien.aufnahme_verzeichnis, "recordings");
        assert_eq!(cfg.uebersetzung.zielsprachen, vec!["en", "ko", "ja", "zh-CN"]);
        assert_eq!(cfg.uebersetzung.max_parallel, 5);
        assert_eq!(cfg.persistenz.transcript_datei, "guide_transcript.txt");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.pruefen().is_ok());
    }

    #[test]
    fn bind_adresse() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_bind_adresse(), "0.0.0.0:3000");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [netzwerk]
            http_port = 8000

            [uebersetzung]
            zielsprachen = ["de"]
            befehl = ["trans", "-b", ":{sprache}"]
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.netzwerk.http_port, 8000);
        assert_eq!(cfg.uebersetzung.zielsprachen, vec!["de"]);
        assert_eq!(cfg.uebersetzung.befehl.len(), 3);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.uebersetzung.max_parallel, 5);
        assert_eq!(cfg.persistenz.datenbank_url, "sqlite://guidecast.db");
    }

    #[test]
    fn null_parallelitaet_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.uebersetzung.max_parallel = 0;
        assert!(cfg.pruefen().is_err());
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let cfg = ServerConfig::laden("/gibt/es/nicht/guidecast.toml").unwrap();
        assert_eq!(cfg.netzwerk.http_port, 3000);
    }
}
