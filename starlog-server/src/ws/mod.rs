//! Real-time delivery channel
//!
//! One WebSocket per authenticated user at `/ws/entity-changed-messages`.
//! The registry holds at most one live channel handle per user; the
//! gateway replays pending messages on connect and accepts ack frames.

pub mod gateway;
pub mod payloads;
pub mod registry;

pub use registry::{ConnectionHandle, ConnectionRegistry};
