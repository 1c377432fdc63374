//! HTTP API
//!
//! REST surface for log entries plus the WebSocket upgrade route.

pub mod handlers;
pub mod server;

pub use server::{create_router, AppContext};
