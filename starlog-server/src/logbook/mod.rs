//! Log entry domain service

pub mod service;

pub use service::{LogEntryService, UpsertLogEntry, UpsertStatus};
