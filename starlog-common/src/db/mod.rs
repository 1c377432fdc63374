//! Database access layer
//!
//! SQLite via sqlx. Query modules expose free async functions over a
//! `&SqlitePool`; row mapping is done by hand with UUIDs stored as TEXT.

pub mod init;
pub mod log_entries;
pub mod messages;
pub mod models;

pub use init::init_database;
