//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `GC_LOG_LEVEL`: Log-Level oder Filter-Direktive, Standard aus der Config
//! - `GC_LOG_FORMAT`: Format (text/json), Standard aus der Config

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "GC_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "GC_LOG_FORMAT";

/// Initialisiert das Logging-System
///
/// Umgebungsvariablen haben Vorrang vor den uebergebenen Werten.
pub fn logging_initialisieren(level: &str, format: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = wert_aufloesen(std::env::var(ENV_LOG_FORMAT).ok(), format);

    let ergebnis = match format.as_str() {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(true).try_init(),
    };

    ergebnis.map_err(|e| anyhow::anyhow!("Logging bereits initialisiert: {e}"))
}

/// Waehlt den Umgebungswert, falls gesetzt und nicht leer
pub fn wert_aufloesen(aus_env: Option<String>, standard: &str) -> String {
    match aus_env {
        Some(wert) if !wert.trim().is_empty() => wert.trim().to_string(),
        _ => standard.to_string(),
    }
}

/// Validiert ob ein Log-Level-String gueltig ist
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
