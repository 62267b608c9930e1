//! WebSocket-Endpunkt `/ws`
//!
//! Text-Frames tragen JSON-Ereignisse, Binaer-Frames Audio. Ping, Pong und
//! Close beantwortet axum selbst.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures_util::{future, SinkExt, StreamExt};
use guidecast_protocol::wire::Rahmen;
use std::sync::Arc;

use crate::connection::ClientConnection;
use crate::server_state::Sitzung;

/// Router mit der WebSocket-Route
pub fn ws_router(sitzung: Arc<Sitzung>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(sitzung)
}

async fn ws_handler(ws: WebSocketUpgrade, State(sitzung): State<Arc<Sitzung>>) -> impl IntoResponse {
    let max = sitzung.config.max_frame_groesse;
    ws.max_message_size(max)
        .on_upgrade(move |socket| socket_verarbeiten(socket, sitzung))
}

async fn socket_verarbeiten(socket: WebSocket, sitzung: Arc<Sitzung>) {
    let (sender, empfaenger) = socket.split();
    let ausgang = sender.with(|rahmen: Rahmen| future::ready(Ok::<_, axum::Error>(rahmen_zu_message(rahmen))));
    let eingang = empfaenger.filter_map(|m| future::ready(message_zu_rahmen(m)));

    ClientConnection::neu(sitzung).verarbeiten(eingang, ausgang).await;
}

fn rahmen_zu_message(rahmen: Rahmen) -> Message {
    match rahmen {
        Rahmen::Text(text) => Message::Text(text),
        Rahmen::Binaer(daten) => Message::Binary(daten.to_vec()),
    }
}

/// Kontroll-Frames werden uebersprungen
fn message_zu_rahmen(
    message: Result<Message, axum::Error>,
) -> Option<Result<Rahmen, axum::Error>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(Rahmen::Text(text))),
        Ok(Message::Binary(daten)) => Some(Ok(Rahmen::Binaer(Bytes::from(daten)))),
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Close(_)) => None,
        Err(e) => Some(Err(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kontrollframes_werden_uebersprungen() {
        assert!(message_zu_rahmen(Ok(Message::Ping(vec![1]))).is_none());
        assert!(message_zu_rahmen(Ok(Message::Close(None))).is_none());
    }

    #[test]
    fn binaer_bleibt_binaer() {
        let rahmen = message_zu_rahmen(Ok(Message::Binary(vec![1, 2, 3])))
            .unwrap()
            .unwrap();
        assert_eq!(rahmen, Rahmen::Binaer(Bytes::from_static(&[1, 2, 3])));
        assert!(matches!(
            rahmen_zu_message(Rahmen::Text("{}".into())),
            Message::Text(t) if t == "{}"
        ));
    }
}
