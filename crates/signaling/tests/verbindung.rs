//! Verbindungsschleife mit Kanal-Transport

mod common;

use bytes::Bytes;
use common::sitzung;
use futures_util::{sink, stream};
use guidecast_core::Rolle;
use guidecast_media::testing::TestEngine;
use guidecast_protocol::wire::{audio_rahmen_lesen, Rahmen, ART_AUDIO_CHUNK, ART_AUDIO_INIT};
use guidecast_protocol::{ErrorCode, ServerEreignis};
use guidecast_signaling::{ClientConnection, SignalingError, Sitzung};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct KanalClient {
    tx: Option<mpsc::UnboundedSender<Rahmen>>,
    rx: mpsc::UnboundedReceiver<Rahmen>,
    task: JoinHandle<()>,
}

impl KanalClient {
    fn starten(sitzung: &Arc<Sitzung>) -> Self {
        let (ein_tx, ein_rx) = mpsc::unbounded_channel::<Rahmen>();
        let (aus_tx, aus_rx) = mpsc::unbounded_channel::<Rahmen>();

        let eingang = stream::unfold(ein_rx, |mut rx| async move {
            rx.recv()
                .await
                .map(|rahmen| (Ok::<_, SignalingError>(rahmen), rx))
        });
        let ausgang = sink::unfold(aus_tx, |tx, rahmen: Rahmen| async move {
            tx.send(rahmen)
                .map_err(|_| SignalingError::VerbindungGetrennt)?;
            Ok::<_, SignalingError>(tx)
        });

        let task = tokio::spawn(
            ClientConnection::neu(Arc::clone(sitzung)).verarbeiten(eingang, ausgang),
        );
        Self {
            tx: Some(ein_tx),
            rx: aus_rx,
            task,
        }
    }

    fn text(&self, json: &str) {
        self.tx
            .as_ref()
            .unwrap()
            .send(Rahmen::Text(json.to_string()))
            .unwrap();
    }

    fn binaer(&self, daten: &'static [u8]) {
        self.tx
            .as_ref()
            .unwrap()
            .send(Rahmen::Binaer(Bytes::from_static(daten)))
            .unwrap();
    }

    async fn naechster(&mut self) -> Rahmen {
        tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("Frame erwartet")
            .expect("Verbindung offen")
    }

    /// Naechstes Text-Ereignis, Binaer-Frames werden uebersprungen
    async fn ereignis(&mut self) -> ServerEreignis {
        loop {
            if let Rahmen::Text(json) = self.naechster().await {
                return ServerEreignis::from_json(&json).unwrap();
            }
        }
    }

    /// Naechster Binaer-Frame, Text-Frames werden uebersprungen
    async fn binaer_frame(&mut self) -> Bytes {
        loop {
            if let Rahmen::Binaer(daten) = self.naechster().await {
                return daten;
            }
        }
    }

    async fn trennen(mut self) {
        self.tx.take();
        tokio::time::timeout(Duration::from_secs(2), self.task)
            .await
            .expect("Task endet")
            .unwrap();
    }
}

#[tokio::test]
async fn erster_frame_ist_connection_success() {
    let s = sitzung(TestEngine::neu());
    let mut client = KanalClient::starten(&s);

    match client.ereignis().await {
        ServerEreignis::ConnectionSuccess { sid } => assert!(s.ist_verbunden(&sid)),
        anderes => panic!("unerwartet: {anderes:?}"),
    }
}

#[tokio::test]
async fn ungueltiges_json_nur_an_absender() {
    let s = sitzung(TestEngine::neu());
    let mut client = KanalClient::starten(&s);
    client.ereignis().await;

    client.text("{kein json");
    match client.ereignis().await {
        ServerEreignis::Error(e) => assert_eq!(e.code, ErrorCode::InvalidRequest),
        anderes => panic!("unerwartet: {anderes:?}"),
    }

    client.text(r#"{"event":"unbekannt"}"#);
    assert!(matches!(client.ereignis().await, ServerEreignis::Error(_)));

    // Verbindung bleibt nutzbar
    client.text(r#"{"event":"request_guide_status"}"#);
    match client.ereignis().await {
        ServerEreignis::GuideStatus(status) => assert!(!status.online),
        anderes => panic!("unerwartet: {anderes:?}"),
    }
}

#[tokio::test]
async fn reconnect_wird_bestaetigt() {
    let s = sitzung(TestEngine::neu());
    let mut client = KanalClient::starten(&s);
    client.ereignis().await;

    client.text(r#"{"event":"request_reconnect"}"#);
    assert!(matches!(client.ereignis().await, ServerEreignis::ReconnectAck));
}

#[tokio::test]
async fn tourist_darf_nicht_starten() {
    let s = sitzung(TestEngine::neu());
    let mut guide = KanalClient::starten(&s);
    let mut tourist = KanalClient::starten(&s);
    guide.ereignis().await;
    tourist.ereignis().await;

    guide.text(r#"{"event":"join_room","data":{"role":"guide"}}"#);
    tourist.text(r#"{"event":"join_room","data":{"role":"tourist","language":"ko"}}"#);
    // unicast beim Beitritt
    assert!(matches!(tourist.ereignis().await, ServerEreignis::GuideStatus(_)));

    tourist.text(r#"{"event":"start_broadcast"}"#);
    loop {
        match tourist.ereignis().await {
            // Broadcast des Guide-Beitritts, je nach Reihenfolge der Tasks
            ServerEreignis::GuideStatus(_) => continue,
            ServerEreignis::Error(e) => {
                assert_eq!(e.code, ErrorCode::NotGuide);
                break;
            }
            anderes => panic!("unerwartet: {anderes:?}"),
        }
    }
    assert!(!s.guide.snapshot().sendet);
}

#[tokio::test]
async fn audio_vom_guide_erreicht_touristen() {
    let s = sitzung(TestEngine::neu());
    let mut guide = KanalClient::starten(&s);
    let mut tourist = KanalClient::starten(&s);
    guide.ereignis().await;
    tourist.ereignis().await;

    tourist.text(r#"{"event":"join_room","data":{"role":"tourist","language":"en"}}"#);
    tourist.ereignis().await;

    guide.text(r#"{"event":"join_room","data":{"role":"guide"}}"#);
    guide.text(r#"{"event":"start_broadcast"}"#);
    guide.binaer(b"C1");
    guide.binaer(b"C2");

    let erster = audio_rahmen_lesen(&tourist.binaer_frame().await).unwrap();
    assert_eq!(erster.art, ART_AUDIO_CHUNK);
    assert_eq!(erster.sequenz, 0);
    assert_eq!(erster.daten.as_ref(), b"C1");

    let zweiter = audio_rahmen_lesen(&tourist.binaer_frame().await).unwrap();
    assert_eq!(zweiter.sequenz, 1);

    tourist.text(r#"{"event":"request_audio_init"}"#);
    let init = audio_rahmen_lesen(&tourist.binaer_frame().await).unwrap();
    assert_eq!(init.art, ART_AUDIO_INIT);
    assert_eq!(init.daten.as_ref(), b"C1");
}

#[tokio::test]
async fn trennen_raeumt_auf() {
    let s = sitzung(TestEngine::neu());
    let mut guide = KanalClient::starten(&s);
    guide.ereignis().await;

    guide.text(r#"{"event":"join_room","data":{"role":"guide"}}"#);
    guide.text(r#"{"event":"request_guide_status"}"#);
    match guide.ereignis().await {
        ServerEreignis::GuideStatus(status) => assert!(status.online),
        anderes => panic!("unerwartet: {anderes:?}"),
    }

    guide.trennen().await;
    assert_eq!(s.registry.gesamt(), 0);
    assert!(s.guide.snapshot().guide.is_none());
    assert_eq!(s.fanout.client_anzahl(), 0);
}

#[tokio::test]
async fn kaputter_beitritt_wird_tourist() {
    let s = sitzung(TestEngine::neu());
    let mut client = KanalClient::starten(&s);
    let sid = match client.ereignis().await {
        ServerEreignis::ConnectionSuccess { sid } => sid,
        anderes => panic!("unerwartet: {anderes:?}"),
    };

    client.text(r#"{"event":"join_room","data":{"role":123,"language":false}}"#);
    match client.ereignis().await {
        ServerEreignis::GuideStatus(status) => assert!(!status.online),
        anderes => panic!("unerwartet: {anderes:?}"),
    }
    assert_eq!(s.registry.rolle_von(&sid), Some(Rolle::Tourist));

    // Einheitsereignis mit leerem data
    client.text(r#"{"event":"request_reconnect","data":{}}"#);
    assert!(matches!(client.ereignis().await, ServerEreignis::ReconnectAck));
}

#[tokio::test]
async fn beitritt_ohne_data() {
    let s = sitzung(TestEngine::neu());
    let mut client = KanalClient::starten(&s);
    client.ereignis().await;

    client.text(r#"{"event":"join_room"}"#);
    assert!(matches!(client.ereignis().await, ServerEreignis::GuideStatus(_)));
    assert_eq!(s.registry.anzahl(Rolle::Tourist), 1);
}

#[tokio::test]
async fn audio_vom_touristen_wird_abgelehnt() {
    let s = sitzung(TestEngine::neu());
    let mut tourist = KanalClient::starten(&s);
    tourist.ereignis().await;
    tourist.text(r#"{"event":"join_room","data":{"role":"tourist"}}"#);
    tourist.ereignis().await;

    tourist.binaer(b"C1");
    match tourist.ereignis().await {
        ServerEreignis::Error(e) => assert_eq!(e.code, ErrorCode::NotGuide),
        anderes => panic!("unerwartet: {anderes:?}"),
    }
    assert_eq!(s.relay.sequenz(), 0);
}
