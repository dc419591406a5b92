//! Transports carrying Engine.IO packets.
//!
//! A [`Transport`] opens streams; a [`TransportStream`] moves packets for one
//! connection attempt. The channel manager negotiates across transports in
//! configured order.

pub mod memory;
pub mod polling;
pub mod websocket;

use crate::codec::EnginePacket;
use crate::endpoint::Endpoint;
use async_trait::async_trait;
use feastline_core::connection::TransportKind;
use feastline_core::error::Result;

pub use memory::{MemoryPeer, MemoryServer, MemoryTransport};
pub use polling::PollingTransport;
pub use websocket::WebSocketTransport;

#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Opens a new stream. The server's `open` packet is the first thing
    /// [`TransportStream::recv`] yields.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn TransportStream>>;
}

#[async_trait]
pub trait TransportStream: Send {
    async fn send(&mut self, packet: EnginePacket) -> Result<()>;

    /// Next packet from the server; `Ok(None)` once the peer has closed.
    async fn recv(&mut self) -> Result<Option<EnginePacket>>;

    /// Best-effort close; never fails.
    async fn close(&mut self);
}
