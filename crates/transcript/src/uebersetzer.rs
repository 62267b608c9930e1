//! Uebersetzungs-Backends
//!
//! Ein Aufruf pro Zielsprache und finaler Aeusserung. Fehler werden vom
//! [`crate::UebersetzungsPool`] abgefangen und durch den Originaltext ersetzt.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{TranscriptFehler, TranscriptResult};

/// Platzhalter fuer die Zielsprache in Befehlsargumenten
pub const SPRACH_PLATZHALTER: &str = "{sprache}";

#[async_trait]
pub trait Uebersetzer: Send + Sync + 'static {
    async fn uebersetzen(&self, text: &str, zielsprache: &str) -> TranscriptResult<String>;
}

/// Gibt den Text unveraendert zurueck
#[derive(Debug, Default, Clone, Copy)]
pub struct KeineUebersetzung;

#[async_trait]
impl Uebersetzer for KeineUebersetzung {
    async fn uebersetzen(&self, text: &str, _zielsprache: &str) -> TranscriptResult<String> {
        Ok(text.to_string())
    }
}

/// Ruft ein externes Programm auf
///
/// Der Text geht ueber stdin hinein, die Uebersetzung kommt ueber stdout.
/// `{sprache}` in den Argumenten wird durch den Zielsprachcode ersetzt.
#[derive(Debug, Clone)]
pub struct BefehlsUebersetzer {
    programm: String,
    argumente: Vec<String>,
}

impl BefehlsUebersetzer {
    pub fn neu(programm: impl Into<String>, argumente: Vec<String>) -> Self {
        Self {
            programm: programm.into(),
            argumente,
        }
    }

    fn argumente_fuer(&self, zielsprache: &str) -> Vec<String> {
        self.argumente
            .iter()
            .map(|a| a.replace(SPRACH_PLATZHALTER, zielsprache))
            .collect()
    }
}

#[async_trait]
impl Uebersetzer for BefehlsUebersetzer {
    async fn uebersetzen(&self, text: &str, zielsprache: &str) -> TranscriptResult<String> {
        let mut kind = Command::new(&self.programm)
            .args(self.argumente_fuer(zielsprache))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranscriptFehler::Befehl(format!("{}: {e}", self.programm)))?;

        if let Some(mut stdin) = kind.stdin.take() {
            // Das Programm darf stdin ignorieren; ausschlaggebend ist der Exit-Code
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                tracing::debug!(programm = %self.programm, fehler = %e, "stdin nicht lesbar");
            }
        }

        let ausgabe = kind.wait_with_output().await?;
        if !ausgabe.status.success() {
            let stderr = String::from_utf8_lossy(&ausgabe.stderr);
            return Err(TranscriptFehler::uebersetzung(
                zielsprache,
                format!("{} ({})", ausgabe.status, stderr.trim()),
            ));
        }

        let uebersetzt = String::from_utf8_lossy(&ausgabe.stdout).trim_end().to_string();
        if uebersetzt.is_empty() {
            return Err(TranscriptFehler::uebersetzung(zielsprache, "leere Ausgabe"));
        }
        Ok(uebersetzt)
    }
}
