//! Client-Connection – Verarbeitungsschleife einer einzelnen Verbindung
//!
//! Transportunabhaengig: eingehende und ausgehende Seite sind ein Stream
//! bzw. Sink von [`Rahmen`]. Der WebSocket-Adapter steht in [`crate::ws`].
//!
//! ## Ablauf
//! ```text
//! verbindung_oeffnen (connection_success)
//!     |
//!     v
//! select { eingehender Rahmen -> dekodieren -> dispatch -> Antwort
//!          Send-Queue        -> kodieren  -> senden }
//!     |
//!     v
//! verbindung_schliessen (Registry, Guide, Aushandlung)
//! ```

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use guidecast_core::ConnectionId;
use guidecast_protocol::wire::{self, Rahmen};
use guidecast_protocol::{ErrorCode, ServerEreignis, ServerNachricht};
use std::fmt::Display;
use std::pin::{pin, Pin};
use std::sync::Arc;

use crate::dispatcher::MessageDispatcher;
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::Sitzung;

pub struct ClientConnection {
    sitzung: Arc<Sitzung>,
}

impl ClientConnection {
    pub fn neu(sitzung: Arc<Sitzung>) -> Self {
        Self { sitzung }
    }

    /// Laeuft bis der Client trennt oder das Senden fehlschlaegt
    pub async fn verarbeiten<E, F, A>(self, eingang: E, ausgang: A)
    where
        E: Stream<Item = Result<Rahmen, F>>,
        F: Display,
        A: Sink<Rahmen>,
        SignalingError: From<A::Error>,
    {
        let (connection_id, mut sende_rx) = self.sitzung.verbindung_oeffnen();
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.sitzung));
        let max_frame_groesse = self.sitzung.config.max_frame_groesse;

        let mut eingang = pin!(eingang);
        let mut ausgang = pin!(ausgang);

        loop {
            tokio::select! {
                rahmen = eingang.next() => {
                    let rahmen = match rahmen {
                        Some(Ok(rahmen)) => rahmen,
                        Some(Err(e)) => {
                            tracing::warn!(connection_id = %connection_id, fehler = %e, "Lesefehler");
                            break;
                        }
                        None => {
                            tracing::debug!(connection_id = %connection_id, "Verbindung vom Client getrennt");
                            break;
                        }
                    };

                    let antwort = match wire::dekodieren(rahmen, max_frame_groesse) {
                        Ok(nachricht) => dispatcher.dispatch(connection_id, nachricht).await,
                        Err(e) => {
                            tracing::debug!(connection_id = %connection_id, fehler = %e, "Ungueltiger Frame");
                            Some(ServerEreignis::error(ErrorCode::InvalidRequest, e.to_string()))
                        }
                    };

                    if let Some(antwort) = antwort {
                        if let Err(e) = senden(connection_id, &mut ausgang, antwort.into()).await {
                            tracing::warn!(connection_id = %connection_id, fehler = %e, "Senden fehlgeschlagen");
                            break;
                        }
                    }
                }

                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = senden(connection_id, &mut ausgang, ausgehend).await {
                        tracing::warn!(connection_id = %connection_id, fehler = %e, "Queue-Senden fehlgeschlagen");
                        break;
                    }
                }
            }
        }

        self.sitzung.verbindung_schliessen(connection_id).await;
    }
}

/// Kodiert und sendet; Kodierfehler betreffen nur diese eine Nachricht
async fn senden<A>(
    connection_id: ConnectionId,
    ausgang: &mut Pin<&mut A>,
    nachricht: ServerNachricht,
) -> SignalingResult<()>
where
    A: Sink<Rahmen>,
    SignalingError: From<A::Error>,
{
    let rahmen = match wire::kodieren(&nachricht) {
        Ok(rahmen) => rahmen,
        Err(e) => {
            tracing::error!(connection_id = %connection_id, fehler = %e, "Nachricht nicht kodierbar");
            return Ok(());
        }
    };
    ausgang.send(rahmen).await?;
    Ok(())
}
