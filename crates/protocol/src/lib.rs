//! guidecast-protocol – Eventkanal-Definitionen
//!
//! Dieses Crate definiert alle Ereignisse und Frame-Formate die zwischen
//! Client und Server ausgetauscht werden.

pub mod control;
pub mod wire;

pub use control::{ClientEreignis, ErrorCode, GuideStatus, MonitorUpdate, ServerEreignis};
pub use wire::{ClientNachricht, ProtokollFehler, Rahmen, ServerNachricht};
