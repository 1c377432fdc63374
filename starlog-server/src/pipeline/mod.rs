//! Log entry processing pipeline
//!
//! Drives an uploaded entry through transcription and enrichment,
//! persisting and emitting a change event at every transition. Step
//! failures are captured as data on the entry (error columns + FAILED
//! status) so observers always see a terminal notification.

pub mod enrich;
pub mod orchestrator;
pub mod transcribe;

pub use orchestrator::PipelineRunner;
