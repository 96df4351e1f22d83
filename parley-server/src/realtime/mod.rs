//! The real-time core: live connections, derived presence, and the mutation
//! pipeline that keeps the durable store and the push stream consistent.

pub mod hub;
pub mod presence;
pub mod router;

pub use hub::{ConnectionHub, SharedHub};
pub use presence::PresenceRegistry;
pub use router::{MessageRouter, RouterError, SharedRouter};
