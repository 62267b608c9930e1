#![allow(dead_code)]

use guidecast_core::ConnectionId;
use guidecast_media::testing::TestEngine;
use guidecast_media::MedienEngine;
use guidecast_observability::GuidecastMetriken;
use guidecast_protocol::control::{JoinRoomRequest, OfferRequest, TranscriptRequest};
use guidecast_protocol::{GuideStatus, ServerEreignis, ServerNachricht};
use guidecast_signaling::{Sitzung, SitzungsKonfig};
use guidecast_transcript::{
    KeineUebersetzung, TranscriptService, Uebersetzer, UebersetzungsPool, Verteiler,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub fn sitzung(engine: Arc<TestEngine>) -> Arc<Sitzung> {
    sitzung_mit(engine, Arc::new(KeineUebersetzung), Verteiler::default())
}

pub fn sitzung_mit(
    engine: Arc<TestEngine>,
    uebersetzer: Arc<dyn Uebersetzer>,
    verteiler: Verteiler,
) -> Arc<Sitzung> {
    let engine: Arc<dyn MedienEngine> = engine;
    let transcripts = TranscriptService::neu(
        UebersetzungsPool::neu(uebersetzer, 5),
        verteiler,
        vec!["en".to_string()],
    );
    Sitzung::neu(
        SitzungsKonfig::default(),
        engine,
        transcripts,
        GuidecastMetriken::neu().unwrap(),
    )
}

pub fn beitritt(rolle: &str, sprache: Option<&str>) -> JoinRoomRequest {
    JoinRoomRequest {
        role: Some(rolle.to_string()),
        language: sprache.map(str::to_string),
    }
}

pub fn angebot(rolle: &str) -> OfferRequest {
    OfferRequest {
        sdp: "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n".to_string(),
        typ: "offer".to_string(),
        role: Some(rolle.to_string()),
    }
}

pub fn transcript(text: &str, is_final: bool) -> TranscriptRequest {
    TranscriptRequest {
        text: text.to_string(),
        is_final,
    }
}

/// Eine Verbindung ohne Transport, liest direkt aus der Send-Queue
pub struct TestClient {
    pub id: ConnectionId,
    pub rx: UnboundedReceiver<ServerNachricht>,
}

impl TestClient {
    pub fn verbinden(sitzung: &Sitzung) -> Self {
        let (id, rx) = sitzung.verbindung_oeffnen();
        Self { id, rx }
    }

    /// Alles was bisher in der Queue liegt
    pub fn leeren(&mut self) -> Vec<ServerNachricht> {
        let mut nachrichten = Vec::new();
        while let Ok(n) = self.rx.try_recv() {
            nachrichten.push(n);
        }
        nachrichten
    }

    pub fn ereignisse(&mut self) -> Vec<ServerEreignis> {
        self.leeren()
            .into_iter()
            .filter_map(|n| match n {
                ServerNachricht::Ereignis(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn guide_status(&mut self) -> Vec<GuideStatus> {
        self.ereignisse()
            .into_iter()
            .filter_map(|e| match e {
                ServerEreignis::GuideStatus(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    /// Wartet auf die erste Nachricht, die `f` akzeptiert
    pub async fn warten_auf<T>(&mut self, mut f: impl FnMut(ServerNachricht) -> Option<T>) -> T {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let nachricht = self.rx.recv().await.expect("Queue offen");
                if let Some(wert) = f(nachricht) {
                    return wert;
                }
            }
        })
        .await
        .expect("Nachricht erwartet")
    }
}

/// Pollt bis die Bedingung erfuellt ist
pub async fn bis(mut bedingung: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !bedingung() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Bedingung nicht rechtzeitig erfuellt");
}
