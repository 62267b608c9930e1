//! Begrenzter Pool fuer parallele Uebersetzungen
//!
//! Jede Zielsprache laeuft als eigener Task. Ein `Semaphore` begrenzt die
//! Anzahl gleichzeitiger Aufrufe. Schlaegt eine Sprache fehl (Fehler oder
//! Panic), bekommt sie den Originaltext; die anderen laufen weiter.

use futures_util::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::TranscriptFehler;
use crate::uebersetzer::Uebersetzer;

/// Standardgrenze fuer gleichzeitige Uebersetzungen
pub const STANDARD_MAX_PARALLEL: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UebersetzungsErgebnis {
    /// Sprachcode -> Text (bei Fehlern der Originaltext)
    pub uebersetzungen: BTreeMap<String, String>,
    /// Sprachen bei denen auf den Originaltext zurueckgefallen wurde
    pub fehlgeschlagen: Vec<String>,
}

#[derive(Clone)]
pub struct UebersetzungsPool {
    uebersetzer: Arc<dyn Uebersetzer>,
    semaphore: Arc<Semaphore>,
}

impl UebersetzungsPool {
    pub fn neu(uebersetzer: Arc<dyn Uebersetzer>, max_parallel: usize) -> Self {
        Self {
            uebersetzer,
            semaphore: Arc::new(Semaphore::new(max_parallel.max(1))),
        }
    }

    /// Uebersetzt `text` in alle `sprachen`
    pub async fn alle_uebersetzen(
        &self,
        text: &str,
        sprachen: &BTreeSet<String>,
    ) -> UebersetzungsErgebnis {
        let (namen, aufgaben): (Vec<_>, Vec<_>) = sprachen
            .iter()
            .map(|sprache| {
                let uebersetzer = Arc::clone(&self.uebersetzer);
                let semaphore = Arc::clone(&self.semaphore);
                let text = text.to_string();
                let ziel = sprache.clone();

                let aufgabe = tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| TranscriptFehler::uebersetzung(&ziel, "Pool geschlossen"))?;
                    uebersetzer.uebersetzen(&text, &ziel).await
                });
                (sprache.clone(), aufgabe)
            })
            .unzip();

        let mut ergebnis = UebersetzungsErgebnis::default();
        for (sprache, ausgang) in namen.into_iter().zip(join_all(aufgaben).await) {
            let uebersetzt = match ausgang {
                Ok(Ok(uebersetzt)) => uebersetzt,
                Ok(Err(e)) => {
                    tracing::warn!(sprache = %sprache, fehler = %e, "Uebersetzung fehlgeschlagen");
                    ergebnis.fehlgeschlagen.push(sprache.clone());
                    text.to_string()
                }
                Err(e) => {
                    tracing::error!(sprache = %sprache, fehler = %e, "Uebersetzungs-Task abgebrochen");
                    ergebnis.fehlgeschlagen.push(sprache.clone());
                    text.to_string()
                }
            };
            ergebnis.uebersetzungen.insert(sprache, uebersetzt);
        }
        ergebnis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranscriptResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Praefix-Uebersetzer; `kaputt` schlaegt fehl, `panik` panict
    struct Praefix;

    #[async_trait]
    impl Uebersetzer for Praefix {
        async fn uebersetzen(&self, text: &str, ziel: &str) -> TranscriptResult<String> {
            match ziel {
                "kaputt" => Err(TranscriptFehler::uebersetzung(ziel, "Testfehler")),
                "panik" => panic!("Testpanik"),
                _ => Ok(format!("[{ziel}] {text}")),
            }
        }
    }

    #[derive(Default)]
    struct Zaehler {
        aktiv: AtomicUsize,
        maximum: AtomicUsize,
    }

    #[async_trait]
    impl Uebersetzer for Arc<Zaehler> {
        async fn uebersetzen(&self, text: &str, _ziel: &str) -> TranscriptResult<String> {
            let jetzt = self.aktiv.fetch_add(1, Ordering::SeqCst) + 1;
            self.maximum.fetch_max(jetzt, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.aktiv.fetch_sub(1, Ordering::SeqCst);
            Ok(text.to_string())
        }
    }

    fn sprachen(liste: &[&str]) -> BTreeSet<String> {
        liste.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn eine_von_hundert_faellt_zurueck() {
        let pool = UebersetzungsPool::neu(Arc::new(Praefix), 5);
        let mut ziele: BTreeSet<String> = (0..99).map(|i| format!("l{i}")).collect();
        ziele.insert("kaputt".into());
        assert_eq!(ziele.len(), 100);

        let ergebnis = pool.alle_uebersetzen("Hallo", &ziele).await;

        assert_eq!(ergebnis.uebersetzungen.len(), 100);
        assert_eq!(ergebnis.uebersetzungen["kaputt"], "Hallo");
        assert_eq!(ergebnis.fehlgeschlagen, vec!["kaputt".to_string()]);

        let andere: BTreeSet<_> = ergebnis
            .uebersetzungen
            .iter()
            .filter(|(k, _)| k.as_str() != "kaputt")
            .map(|(_, v)| v.clone())
            .collect();
        assert_eq!(andere.len(), 99);
        assert!(!andere.contains("Hallo"));
    }

    #[tokio::test]
    async fn panik_bricht_geschwister_nicht_ab() {
        let pool = UebersetzungsPool::neu(Arc::new(Praefix), 2);
        let ergebnis = pool
            .alle_uebersetzen("Text", &sprachen(&["en", "panik", "ko"]))
            .await;

        assert_eq!(ergebnis.uebersetzungen["panik"], "Text");
        assert_eq!(ergebnis.uebersetzungen["en"], "[en] Text");
        assert_eq!(ergebnis.uebersetzungen["ko"], "[ko] Text");
        assert_eq!(ergebnis.fehlgeschlagen, vec!["panik".to_string()]);
    }

    #[tokio::test]
    async fn parallelitaet_ist_begrenzt() {
        let zaehler = Arc::new(Zaehler::default());
        let pool = UebersetzungsPool::neu(Arc::new(Arc::clone(&zaehler)), 3);
        let ziele: BTreeSet<String> = (0..12).map(|i| format!("s{i}")).collect();

        pool.alle_uebersetzen("x", &ziele).await;

        let maximum = zaehler.maximum.load(Ordering::SeqCst);
        assert!(maximum >= 1 && maximum <= 3, "maximum = {maximum}");
    }

    #[tokio::test]
    async fn keine_sprachen_kein_ergebnis() {
        let pool = UebersetzungsPool::neu(Arc::new(Praefix), 5);
        let ergebnis = pool.alle_uebersetzen("x", &BTreeSet::new()).await;
        assert!(ergebnis.uebersetzungen.is_empty());
    }
}
