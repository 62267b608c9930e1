//! guidecast-signaling – Koordination zwischen Guide und Touristen
//!
//! Ein Guide sendet Audio und Transkripte, beliebig viele Touristen
//! empfangen sie, Monitore beobachten den Raum.
//!
//! ## Architektur
//!
//! ```text
//! WebSocket /ws (ws_router)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     v
//! Sitzung
//!     +-- ConnectionRegistry  (Rolle + Sprache je Verbindung)
//!     +-- GuideSession        (KeinGuide / GuideBereit / Sendet)
//!     +-- AudioRelay          (Chunk-Pfad, geteilter Guide-Track)
//!     +-- Aushandlungen       (WebRTC-Kontext je Verbindung)
//!     +-- TranscriptService   (Uebersetzen, Archivieren)
//!     +-- EventFanout         (Unicast und Rollengruppen)
//!
//! MonitorAggregator – Snapshot an Monitore bei jeder Aenderung
//! ```

pub mod audio_relay;
pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod guide_session;
pub mod monitor;
pub mod negotiation;
pub mod registry;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use broadcast::EventFanout;
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use guide_session::{GuideSession, GuideSnapshot, GuideZustand};
pub use registry::ConnectionRegistry;
pub use server_state::{Sitzung, SitzungsKonfig};
pub use ws::ws_router;
