//! Change message services
//!
//! Fan-out turns one change event into durable per-receiver messages;
//! delivery pushes them best-effort over live channels; the ack service
//! owns the single pending -> acknowledged transition.

pub mod ack;
pub mod delivery;
pub mod fanout;

pub use ack::MessageService;
pub use delivery::DeliveryService;
pub use fanout::{ChangeNotifier, MessageFanout};
