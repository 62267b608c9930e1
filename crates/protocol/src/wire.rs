//! Wire-Format fuer den Eventkanal
//!
//! Der Eventkanal transportiert zwei Arten von Frames:
//! - Text-Frames: JSON-Ereignisse (`ClientEreignis` / `ServerEreignis`)
//! - Binaer-Frames: Audiodaten
//!
//! ## Binaer-Frames Server -> Client
//!
//! ```text
//! +--------+--------+--------+--------+--------+----...----+
//! | Art    | Sequenz (u32 BE)                  | Payload    |
//! +--------+--------+--------+--------+--------+----...----+
//! ```
//!
//! `Art` ist `0x01` fuer `audio_chunk` und `0x02` fuer `audio_init`. Die
//! Sequenz beginnt nach jedem Reset wieder bei 0; `audio_init` traegt immer 0.
//!
//! Binaer-Frames Client -> Server sind rohe `binary_audio`-Daten ohne Header.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::control::{ClientEreignis, ServerEreignis};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Audio-Headers in Bytes (Art + Sequenz)
pub const AUDIO_HEADER_SIZE: usize = 5;

/// Frame-Art fuer einen Audio-Chunk
pub const ART_AUDIO_CHUNK: u8 = 0x01;

/// Frame-Art fuer das Init-Segment
pub const ART_AUDIO_INIT: u8 = 0x02;

// ---------------------------------------------------------------------------
// Typen
// ---------------------------------------------------------------------------

/// Fehler beim Kodieren/Dekodieren von Frames
#[derive(Debug, Error)]
pub enum ProtokollFehler {
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    ZuGross { groesse: usize, maximum: usize },

    #[error("Leerer Audio-Frame")]
    LeeresAudio,

    #[error("Ungueltiger Audio-Frame: {0}")]
    UngueltigesAudio(String),
}

/// Transportunabhaengiger Frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rahmen {
    Text(String),
    Binaer(Bytes),
}

/// Dekodierte Nachricht eines Clients
#[derive(Debug, Clone)]
pub enum ClientNachricht {
    Ereignis(ClientEreignis),
    BinaryAudio(Bytes),
}

/// Ausgehende Nachricht an einen Client
///
/// Audiodaten werden als `Bytes` gehalten; ein Broadcast an viele Clients
/// klont nur den Referenzzaehler.
#[derive(Debug, Clone)]
pub enum ServerNachricht {
    Ereignis(ServerEreignis),
    AudioChunk { sequenz: u32, daten: Bytes },
    AudioInit { daten: Bytes },
}

impl From<ServerEreignis> for ServerNachricht {
    fn from(ereignis: ServerEreignis) -> Self {
        Self::Ereignis(ereignis)
    }
}

/// Geparster Audio-Frame (Client-Sicht, fuer Tests und Tools)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRahmen {
    pub art: u8,
    pub sequenz: u32,
    pub daten: Bytes,
}

// ---------------------------------------------------------------------------
// Kodieren / Dekodieren
// ---------------------------------------------------------------------------

/// Kodiert eine ausgehende Nachricht als Frame
pub fn kodieren(nachricht: &ServerNachricht) -> Result<Rahmen, ProtokollFehler> {
    match nachricht {
        ServerNachricht::Ereignis(ereignis) => Ok(Rahmen::Text(ereignis.to_json()?)),
        ServerNachricht::AudioChunk { sequenz, daten } => {
            Ok(Rahmen::Binaer(audio_frame(ART_AUDIO_CHUNK, *sequenz, daten)))
        }
        ServerNachricht::AudioInit { daten } => {
            Ok(Rahmen::Binaer(audio_frame(ART_AUDIO_INIT, 0, daten)))
        }
    }
}

/// Dekodiert einen eingehenden Frame mit Groessenpruefung
pub fn dekodieren(rahmen: Rahmen, max_frame_size: usize) -> Result<ClientNachricht, ProtokollFehler> {
    match rahmen {
        Rahmen::Text(text) => {
            groesse_pruefen(text.len(), max_frame_size)?;
            Ok(ClientNachricht::Ereignis(serde_json::from_str(&text)?))
        }
        Rahmen::Binaer(daten) => {
            groesse_pruefen(daten.len(), max_frame_size)?;
            if daten.is_empty() {
                return Err(ProtokollFehler::LeeresAudio);
            }
            Ok(ClientNachricht::BinaryAudio(daten))
        }
    }
}

/// Liest einen Audio-Frame vom Server (Header + Payload)
pub fn audio_rahmen_lesen(daten: &Bytes) -> Result<AudioRahmen, ProtokollFehler> {
    if daten.len() < AUDIO_HEADER_SIZE {
        return Err(ProtokollFehler::UngueltigesAudio(format!(
            "nur {} Bytes, Header braucht {}",
            daten.len(),
            AUDIO_HEADER_SIZE
        )));
    }

    let art = daten[0];
    if art != ART_AUDIO_CHUNK && art != ART_AUDIO_INIT {
        return Err(ProtokollFehler::UngueltigesAudio(format!(
            "unbekannte Art 0x{art:02x}"
        )));
    }

    let sequenz = u32::from_be_bytes([daten[1], daten[2], daten[3], daten[4]]);
    Ok(AudioRahmen {
        art,
        sequenz,
        daten: daten.slice(AUDIO_HEADER_SIZE..),
    })
}

fn audio_frame(art: u8, sequenz: u32, daten: &Bytes) -> Bytes {
    let mut buf = BytesMut::with_capacity(AUDIO_HEADER_SIZE + daten.len());
    buf.put_u8(art);
    buf.put_u32(sequenz);
    buf.put_slice(daten);
    buf.freeze()
}

fn groesse_pruefen(groesse: usize, maximum: usize) -> Result<(), ProtokollFehler> {
    if groesse > maximum {
        return Err(ProtokollFehler::ZuGross { groesse, maximum });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
