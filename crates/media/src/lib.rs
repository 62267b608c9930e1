//! guidecast-media – Schnittstelle zur Medien-Engine
//!
//! Der Signaling-Layer spricht die Engine nur ueber die Traits in
//! [`engine`] an. Implementierungen:
//!
//! - [`DeaktivierteEngine`] – keine Aushandlung, nur Chunk-Pfad
//! - `testing::TestEngine` – In-Memory, Feature `testing`
//! - `webrtc_engine::WebrtcEngine` – webrtc-rs, Feature `webrtc`

pub mod deaktiviert;
pub mod engine;
pub mod error;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(feature = "webrtc")]
pub mod webrtc_engine;

pub use deaktiviert::DeaktivierteEngine;
pub use engine::{
    antwort_aushandeln, IceZustand, MedienEngine, MedienTrack, PeerVerbindung, SdpTyp,
    SitzungsBeschreibung, TrackArt, TrackRef,
};
pub use error::{MedienFehler, MedienResult};
