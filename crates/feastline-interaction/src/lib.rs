//! Event channel plumbing: Engine.IO/Socket.IO framing, transports, and the
//! channel manager that owns the single connection of a session.

pub mod channel;
pub mod codec;
pub mod endpoint;
pub mod transport;

pub use channel::EventChannelManager;
pub use endpoint::Endpoint;
pub use transport::{Transport, TransportStream};
