//! Fehlertypen fuer den Signaling-Service

use guidecast_core::GuidecastError;
use guidecast_protocol::{ErrorCode, ProtokollFehler};
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Frame liess sich nicht kodieren oder dekodieren
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtokollFehler),

    /// WebSocket-Transport
    #[error("WebSocket-Fehler: {0}")]
    WebSocket(#[from] axum::Error),

    /// Abgelehnte Operation der Sitzung
    #[error(transparent)]
    Sitzung(#[from] GuidecastError),

    /// Verbindung wurde getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,
}

impl SignalingError {
    /// Fehlercode fuer die `error`-Antwort an den Client
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Protokoll(_) => ErrorCode::InvalidRequest,
            Self::Sitzung(e) => fehlercode(e),
            Self::WebSocket(_) | Self::VerbindungGetrennt => ErrorCode::InternalError,
        }
    }
}

/// Bildet abgelehnte Operationen auf Client-Fehlercodes ab
pub fn fehlercode(fehler: &GuidecastError) -> ErrorCode {
    match fehler {
        GuidecastError::NurGuide => ErrorCode::NotGuide,
        GuidecastError::KeinGuide => ErrorCode::NoGuide,
        GuidecastError::Aushandlung(_) => ErrorCode::NegotiationFailed,
        GuidecastError::UngueltigeNachricht(_) => ErrorCode::InvalidRequest,
        _ => ErrorCode::InternalError,
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
