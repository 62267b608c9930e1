//! Message-Dispatcher – Routet Client-Nachrichten an die Sitzung
//!
//! Gibt die direkte Antwort zurueck, falls es eine gibt. Broadcasts laufen
//! ueber den Fanout und nicht ueber den Rueckgabewert. Abgelehnte
//! Operationen werden als `error`-Ereignis nur an den Absender gemeldet.

use guidecast_core::{ConnectionId, GuidecastError};
use guidecast_protocol::{ClientEreignis, ClientNachricht, ServerEreignis};
use std::sync::Arc;

use crate::error::fehlercode;
use crate::server_state::Sitzung;

pub struct MessageDispatcher {
    sitzung: Arc<Sitzung>,
}

impl MessageDispatcher {
    pub fn neu(sitzung: Arc<Sitzung>) -> Self {
        Self { sitzung }
    }

    /// Verarbeitet eine Nachricht und gibt die Antwort zurueck
    ///
    /// Transkripte werden in einem eigenen Task uebersetzt, damit Audio-Chunks
    /// derselben Verbindung nicht auf die Uebersetzung warten.
    pub async fn dispatch(
        &self,
        connection_id: ConnectionId,
        nachricht: ClientNachricht,
    ) -> Option<ServerEreignis> {
        let ereignis = match nachricht {
            ClientNachricht::BinaryAudio(daten) => {
                return self
                    .sitzung
                    .chunk_einspeisen(&connection_id, daten)
                    .err()
                    .map(|e| fehler_antwort(&e));
            }
            ClientNachricht::Ereignis(ereignis) => ereignis,
        };

        tracing::trace!(connection_id = %connection_id, ereignis = ereignis.name(), "Ereignis empfangen");

        match ereignis {
            ClientEreignis::JoinRoom(anfrage) => {
                self.sitzung.raum_beitreten(connection_id, &anfrage);
                None
            }

            ClientEreignis::Offer(angebot) => {
                match self.sitzung.angebot_verarbeiten(connection_id, angebot).await {
                    Ok(antwort) => Some(ServerEreignis::Answer(antwort)),
                    Err(GuidecastError::Getrennt(_)) => None,
                    Err(e) => Some(fehler_antwort(&e)),
                }
            }

            ClientEreignis::RequestAudioInit => {
                self.sitzung.init_anfordern(&connection_id);
                None
            }

            ClientEreignis::StartBroadcast => {
                self.sitzung.senden_starten(&connection_id).err().map(|e| fehler_antwort(&e))
            }

            ClientEreignis::StopBroadcast => {
                self.sitzung.senden_stoppen(&connection_id).err().map(|e| fehler_antwort(&e))
            }

            ClientEreignis::ResetAudioSession => self
                .sitzung
                .audio_zuruecksetzen(&connection_id)
                .err()
                .map(|e| fehler_antwort(&e)),

            ClientEreignis::RequestGuideStatus => {
                Some(ServerEreignis::GuideStatus(self.sitzung.guide.status()))
            }

            ClientEreignis::TranscriptMsg(anfrage) => {
                let sitzung = Arc::clone(&self.sitzung);
                tokio::spawn(async move {
                    sitzung.transcript_verarbeiten(&connection_id, anfrage).await;
                });
                None
            }

            ClientEreignis::UpdateLanguage(anfrage) => {
                self.sitzung.sprache_aendern(&connection_id, &anfrage.language);
                None
            }

            ClientEreignis::RequestReconnect => Some(ServerEreignis::ReconnectAck),
        }
    }
}

/// `error`-Ereignis fuer eine abgelehnte Operation
pub fn fehler_antwort(fehler: &GuidecastError) -> ServerEreignis {
    ServerEreignis::error(fehlercode(fehler), fehler.to_string())
}
