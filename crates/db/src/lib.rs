//! guidecast-db – Persistenz des Transcript-Verlaufs
//!
//! Das Repository-Pattern entkoppelt den Transcript-Dienst von der
//! konkreten Datenbank. Aktuell gibt es nur das SQLite-Backend.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use models::{NeuerTranscript, TranscriptRecord};
pub use repository::{DatabaseConfig, DbResult, TranscriptRepository};
pub use sqlite::SqliteDb;
