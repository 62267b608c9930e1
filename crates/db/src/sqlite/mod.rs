//! SQLite-Backend

pub mod pool;
pub mod transcripts;

pub use pool::SqliteDb;
