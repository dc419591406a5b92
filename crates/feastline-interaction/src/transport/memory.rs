//! In-process transport driven by a scripted server.
//!
//! Tests hold the [`MemoryServer`] side: they accept connections, run the
//! handshake, emit events and drop connections at will.

use super::{Transport, TransportStream};
use crate::codec::{EnginePacket, HandshakeInfo, SocketPacket};
use crate::endpoint::Endpoint;
use async_trait::async_trait;
use feastline_core::FeastlineError;
use feastline_core::connection::TransportKind;
use feastline_core::error::Result;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::{Mutex, mpsc};

#[derive(Default)]
struct Control {
    refuse_next: AtomicU32,
    refuse_all: AtomicBool,
    connects: AtomicU32,
}

/// Client half, handed to the channel manager.
pub struct MemoryTransport {
    kind: TransportKind,
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    control: Arc<Control>,
}

/// Server half, kept by the test.
pub struct MemoryServer {
    accept_rx: Mutex<mpsc::UnboundedReceiver<MemoryPeer>>,
    control: Arc<Control>,
}

impl MemoryTransport {
    /// Creates a connected transport/server pair posing as `kind`.
    pub fn pair(kind: TransportKind) -> (Self, MemoryServer) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let control = Arc::new(Control::default());
        (
            Self {
                kind,
                accept_tx,
                control: control.clone(),
            },
            MemoryServer {
                accept_rx: Mutex::new(accept_rx),
                control,
            },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn connect(&self, _endpoint: &Endpoint) -> Result<Box<dyn TransportStream>> {
        self.control.connects.fetch_add(1, Ordering::SeqCst);
        if self.control.refuse_all.load(Ordering::SeqCst) {
            return Err(FeastlineError::transport("connection refused"));
        }
        let refused = self
            .control
            .refuse_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(FeastlineError::transport("connection refused"));
        }

        let (to_client, from_server) = mpsc::unbounded_channel();
        let (to_server, from_client) = mpsc::unbounded_channel();
        self.accept_tx
            .send(MemoryPeer {
                to_client,
                from_client,
            })
            .map_err(|_| FeastlineError::transport("memory server is gone"))?;
        Ok(Box::new(MemoryStream {
            to_server: Some(to_server),
            from_server,
        }))
    }
}

impl MemoryServer {
    /// Waits for the next client connection.
    pub async fn accept(&self) -> Option<MemoryPeer> {
        self.accept_rx.lock().await.recv().await
    }

    /// Accepts a connection and completes the handshake, returning the auth payload.
    pub async fn accept_and_handshake(&self) -> Option<(MemoryPeer, Option<Value>)> {
        let mut peer = self.accept().await?;
        let auth = peer.handshake().await?;
        Some((peer, auth))
    }

    /// Refuses the next `n` connection attempts.
    pub fn refuse_next(&self, n: u32) {
        self.control.refuse_next.store(n, Ordering::SeqCst);
    }

    pub fn refuse_all(&self, refuse: bool) {
        self.control.refuse_all.store(refuse, Ordering::SeqCst);
    }

    /// Number of connection attempts seen, refused ones included.
    pub fn connect_count(&self) -> u32 {
        self.control.connects.load(Ordering::SeqCst)
    }
}

/// One accepted connection, seen from the server.
pub struct MemoryPeer {
    to_client: mpsc::UnboundedSender<EnginePacket>,
    from_client: mpsc::UnboundedReceiver<EnginePacket>,
}

impl MemoryPeer {
    pub fn send(&self, packet: EnginePacket) -> bool {
        self.to_client.send(packet).is_ok()
    }

    pub async fn recv(&mut self) -> Option<EnginePacket> {
        self.from_client.recv().await
    }

    /// Sends `open`, waits for the Socket connect, and acknowledges it.
    ///
    /// Returns the client's auth payload, or `None` if the client went away.
    pub async fn handshake(&mut self) -> Option<Option<Value>> {
        self.send(EnginePacket::Open(HandshakeInfo {
            sid: "memory-sid".to_string(),
            upgrades: Vec::new(),
            ping_interval: 25_000,
            ping_timeout: 20_000,
            max_payload: None,
        }));
        loop {
            if let EnginePacket::Message(body) = self.recv().await?
                && let Ok(SocketPacket::Connect(auth)) = SocketPacket::decode(&body)
            {
                self.send(SocketPacket::Connect(Some(json!({"sid": "memory-socket"}))).into_engine());
                return Some(auth);
            }
        }
    }

    /// Emits a Socket event with a single payload argument.
    pub fn emit(&self, name: &str, payload: Value) -> bool {
        self.send(SocketPacket::event(name, vec![payload]).into_engine())
    }

    /// Next Socket event the client sent, skipping everything else.
    pub async fn next_event(&mut self) -> Option<(String, Vec<Value>)> {
        loop {
            if let EnginePacket::Message(body) = self.recv().await?
                && let Ok(SocketPacket::Event { name, args, .. }) = SocketPacket::decode(&body)
            {
                return Some((name, args));
            }
        }
    }

    /// Drains every Socket event already sent by the client.
    pub fn drain_events(&mut self) -> Vec<(String, Vec<Value>)> {
        let mut events = Vec::new();
        while let Ok(packet) = self.from_client.try_recv() {
            if let EnginePacket::Message(body) = packet
                && let Ok(SocketPacket::Event { name, args, .. }) = SocketPacket::decode(&body)
            {
                events.push((name, args));
            }
        }
        events
    }
}

struct MemoryStream {
    to_server: Option<mpsc::UnboundedSender<EnginePacket>>,
    from_server: mpsc::UnboundedReceiver<EnginePacket>,
}

#[async_trait]
impl TransportStream for MemoryStream {
    async fn send(&mut self, packet: EnginePacket) -> Result<()> {
        self.to_server
            .as_ref()
            .ok_or(FeastlineError::ChannelClosed)?
            .send(packet)
            .map_err(|_| FeastlineError::transport("memory peer dropped"))
    }

    async fn recv(&mut self) -> Result<Option<EnginePacket>> {
        Ok(self.from_server.recv().await)
    }

    async fn close(&mut self) {
        if let Some(tx) = self.to_server.take() {
            let _ = tx.send(EnginePacket::Close);
        }
        self.from_server.close();
    }
}
