//! Control-Protokoll (Eventkanal)
//!
//! Definiert alle Ereignisse die als Text-Frames zwischen Client und Server
//! ausgetauscht werden.
//!
//! ## Design
//! - JSON-Umschlag `{"event": "<name>", "data": {...}}`
//! - Geschlossene Menge von Tagged Enums, Pflichtfelder werden beim
//!   Deserialisieren geprueft
//! - Nachsichtige Felder (`role`, `language`) sind optional und werden erst
//!   im Server auf Standardwerte abgebildet. Werte mit falschem Typ gelten
//!   als fehlend, ein unlesbarer `join_room` als Beitritt ohne Angaben.
//! - Ereignisse ohne Nutzdaten ignorieren ein mitgeschicktes `data`

use chrono::{DateTime, Utc};
use guidecast_core::ConnectionId;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Antworten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InternalError,
    InvalidRequest,
    NegotiationFailed,
    NotGuide,
    NoGuide,
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Raum beitreten (Rolle + Sprache)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    /// "guide", "tourist" oder "monitor"; alles andere wird zu Tourist
    #[serde(default, deserialize_with = "nachsichtiger_text")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "nachsichtiger_text")]
    pub language: Option<String>,
}

/// Nur Strings werden uebernommen, alles andere gilt als nicht angegeben
fn nachsichtiger_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

/// SDP-Angebot eines Clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRequest {
    pub sdp: String,
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default, deserialize_with = "nachsichtiger_text")]
    pub role: Option<String>,
}

/// Transkript-Text vom Guide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRequest {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "isFinal", default = "standard_final")]
    pub is_final: bool,
}

fn standard_final() -> bool {
    true
}

/// Sprachwechsel eines Teilnehmers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLanguageRequest {
    pub language: String,
}

/// Alle Ereignisse die ein Client als Text-Frame senden darf
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEreignis {
    JoinRoom(JoinRoomRequest),
    Offer(OfferRequest),
    RequestAudioInit,
    StartBroadcast,
    StopBroadcast,
    ResetAudioSession,
    RequestGuideStatus,
    TranscriptMsg(TranscriptRequest),
    UpdateLanguage(UpdateLanguageRequest),
    RequestReconnect,
}

/// Bekannte Ereignisnamen fuer Fehlermeldungen
const CLIENT_EREIGNISSE: &[&str] = &[
    "join_room",
    "offer",
    "request_audio_init",
    "start_broadcast",
    "stop_broadcast",
    "reset_audio_session",
    "request_guide_status",
    "transcript_msg",
    "update_language",
    "request_reconnect",
];

/// Umschlag vor der Zuordnung zum Ereignis
#[derive(Deserialize)]
struct RohesEreignis {
    event: String,
    #[serde(default)]
    data: Value,
}

impl<'de> Deserialize<'de> for ClientEreignis {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let RohesEreignis { event, data } = RohesEreignis::deserialize(d)?;

        Ok(match event.as_str() {
            "join_room" => Self::JoinRoom(serde_json::from_value(data).unwrap_or_default()),
            "offer" => Self::Offer(serde_json::from_value(data).map_err(D::Error::custom)?),
            "request_audio_init" => Self::RequestAudioInit,
            "start_broadcast" => Self::StartBroadcast,
            "stop_broadcast" => Self::StopBroadcast,
            "reset_audio_session" => Self::ResetAudioSession,
            "request_guide_status" => Self::RequestGuideStatus,
            "transcript_msg" => Self::TranscriptMsg(serde_json::from_value(data).map_err(D::Error::custom)?),
            "update_language" => Self::UpdateLanguage(serde_json::from_value(data).map_err(D::Error::custom)?),
            "request_reconnect" => Self::RequestReconnect,
            andere => return Err(D::Error::unknown_variant(andere, CLIENT_EREIGNISSE)),
        })
    }
}

impl ClientEreignis {
    /// Ereignisname fuer Logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "join_room",
            Self::Offer(_) => "offer",
            Self::RequestAudioInit => "request_audio_init",
            Self::StartBroadcast => "start_broadcast",
            Self::StopBroadcast => "stop_broadcast",
            Self::ResetAudioSession => "reset_audio_session",
            Self::RequestGuideStatus => "request_guide_status",
            Self::TranscriptMsg(_) => "transcript_msg",
            Self::UpdateLanguage(_) => "update_language",
            Self::RequestReconnect => "request_reconnect",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Lokale Sitzungsbeschreibung als Antwort auf ein Angebot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub sdp: String,
    #[serde(rename = "type")]
    pub typ: String,
}

/// Guide-Status fuer Touristen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideStatus {
    pub online: bool,
    pub broadcasting: bool,
}

/// Transkript mit Uebersetzungen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptBroadcast {
    pub original: String,
    pub translations: BTreeMap<String, String>,
    #[serde(rename = "isFinal")]
    pub is_final: bool,
}

/// Eintrag der Touristenliste im Monitor-Update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouristEintrag {
    pub sid: ConnectionId,
    pub language: String,
    pub joined_at: DateTime<Utc>,
}

/// Momentaufnahme fuer Monitor-Clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorUpdate {
    pub guide_online: bool,
    pub guide_broadcasting: bool,
    pub guide_started_at: Option<DateTime<Utc>>,
    pub total_tourists: usize,
    pub tourists_by_language: BTreeMap<String, usize>,
    pub tourist_list: Vec<TouristEintrag>,
    pub timestamp: DateTime<Utc>,
}

/// Standardisierte Fehler-Antwort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

/// Alle Ereignisse die der Server als Text-Frame sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEreignis {
    ConnectionSuccess { sid: ConnectionId },
    Answer(AnswerResponse),
    GuideStatus(GuideStatus),
    GuideReady,
    Transcript(TranscriptBroadcast),
    MonitorUpdate(MonitorUpdate),
    ReconnectAck,
    Error(ErrorResponse),
}

impl ServerEreignis {
    /// Erstellt eine Fehler-Antwort
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorResponse {
            code,
            message: message.into(),
        })
    }

    /// Serialisiert das Ereignis als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert ein Ereignis aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_room_ohne_rolle_wird_akzeptiert() {
        let json = r#"{"event":"join_room","data":{"language":"ko"}}"#;
        let ereignis: ClientEreignis = serde_json::from_str(json).unwrap();
        if let ClientEreignis::JoinRoom(req) = ereignis {
            assert!(req.role.is_none());
            assert_eq!(req.language.as_deref(), Some("ko"));
        } else {
            panic!("Erwartet JoinRoom");
        }
    }

    #[test]
    fn einheits_ereignis_ohne_data() {
        let ereignis: ClientEreignis =
            serde_json::from_str(r#"{"event":"start_broadcast"}"#).unwrap();
        assert!(matches!(ereignis, ClientEreignis::StartBroadcast));
    }

    #[test]
    fn join_room_mit_falschen_typen_bleibt_gueltig() {
        let json = r#"{"event":"join_room","data":{"role":123,"language":["ko"]}}"#;
        match serde_json::from_str::<ClientEreignis>(json).unwrap() {
            ClientEreignis::JoinRoom(req) => {
                assert!(req.role.is_none());
                assert!(req.language.is_none());
            }
            anderes => panic!("Erwartet JoinRoom, bekam {anderes:?}"),
        }
    }

    #[test]
    fn join_room_ohne_oder_mit_kaputtem_data() {
        for json in [
            r#"{"event":"join_room"}"#,
            r#"{"event":"join_room","data":null}"#,
            r#"{"event":"join_room","data":"guide"}"#,
        ] {
            match serde_json::from_str::<ClientEreignis>(json).unwrap() {
                ClientEreignis::JoinRoom(req) => assert!(req.role.is_none()),
                anderes => panic!("Erwartet JoinRoom, bekam {anderes:?}"),
            }
        }
    }

    #[test]
    fn einheits_ereignis_mit_leerem_data() {
        let ereignis: ClientEreignis =
            serde_json::from_str(r#"{"event":"request_audio_init","data":{}}"#).unwrap();
        assert!(matches!(ereignis, ClientEreignis::RequestAudioInit));
        let ereignis: ClientEreignis =
            serde_json::from_str(r#"{"event":"request_reconnect","data":null}"#).unwrap();
        assert!(matches!(ereignis, ClientEreignis::RequestReconnect));
    }

    #[test]
    fn offer_mit_numerischer_rolle() {
        let json = r#"{"event":"offer","data":{"sdp":"v=0","type":"offer","role":7}}"#;
        match serde_json::from_str::<ClientEreignis>(json).unwrap() {
            ClientEreignis::Offer(o) => assert!(o.role.is_none()),
            anderes => panic!("Erwartet Offer, bekam {anderes:?}"),
        }
    }

    #[test]
    fn ereignis_ohne_namen_wird_abgelehnt() {
        assert!(serde_json::from_str::<ClientEreignis>(r#"{"data":{}}"#).is_err());
    }

    #[test]
    fn offer_ohne_sdp_wird_abgelehnt() {
        let json = r#"{"event":"offer","data":{"type":"offer"}}"#;
        assert!(serde_json::from_str::<ClientEreignis>(json).is_err());
    }

    #[test]
    fn offer_feldnamen() {
        let json = r#"{"event":"offer","data":{"sdp":"v=0","type":"offer","role":"guide"}}"#;
        let ereignis: ClientEreignis = serde_json::from_str(json).unwrap();
        if let ClientEreignis::Offer(o) = ereignis {
            assert_eq!(o.sdp, "v=0");
            assert_eq!(o.typ, "offer");
            assert_eq!(o.role.as_deref(), Some("guide"));
        } else {
            panic!("Erwartet Offer");
        }
    }

    #[test]
    fn transcript_is_final_standard_wahr() {
        let json = r#"{"event":"transcript_msg","data":{"text":"hallo"}}"#;
        let ereignis: ClientEreignis = serde_json::from_str(json).unwrap();
        if let ClientEreignis::TranscriptMsg(t) = ereignis {
            assert!(t.is_final);
            assert_eq!(t.text, "hallo");
        } else {
            panic!("Erwartet TranscriptMsg");
        }
    }

    #[test]
    fn unbekanntes_ereignis_wird_abgelehnt() {
        let json = r#"{"event":"delete_everything"}"#;
        assert!(serde_json::from_str::<ClientEreignis>(json).is_err());
    }

    #[test]
    fn guide_status_format() {
        let json = ServerEreignis::GuideStatus(GuideStatus {
            online: true,
            broadcasting: false,
        })
        .to_json()
        .unwrap();
        let wert: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wert["event"], "guide_status");
        assert_eq!(wert["data"]["online"], true);
        assert_eq!(wert["data"]["broadcasting"], false);
    }

    #[test]
    fn transcript_broadcast_verwendet_is_final_camel_case() {
        let mut translations = BTreeMap::new();
        translations.insert("ko".to_string(), "annyeong".to_string());
        let json = ServerEreignis::Transcript(TranscriptBroadcast {
            original: "hello".into(),
            translations,
            is_final: true,
        })
        .to_json()
        .unwrap();
        let wert: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wert["data"]["isFinal"], true);
        assert_eq!(wert["data"]["translations"]["ko"], "annyeong");
    }

    #[test]
    fn error_antwort_serialisierung() {
        let msg = ServerEreignis::error(ErrorCode::NotGuide, "Nur fuer den Guide");
        let decoded = ServerEreignis::from_json(&msg.to_json().unwrap()).unwrap();
        if let ServerEreignis::Error(e) = decoded {
            assert_eq!(e.code, ErrorCode::NotGuide);
            assert_eq!(e.message, "Nur fuer den Guide");
        } else {
            panic!("Erwartet Error-Payload");
        }
    }
}
