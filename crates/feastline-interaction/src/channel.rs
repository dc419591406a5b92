//! Event channel manager.
//!
//! Owns the single connection of a session. [`EventChannelManager::open`]
//! spawns a connection task that negotiates a transport, performs the
//! Socket.IO handshake, joins the session's rooms, forwards inbound events
//! and reconnects with linear-then-capped backoff. Connection state is
//! published on a watch channel; inbound events flow through the
//! unbounded receiver returned by [`EventChannelManager::new`].

use crate::codec::{EnginePacket, HandshakeInfo, SocketPacket};
use crate::endpoint::Endpoint;
use crate::transport::{PollingTransport, Transport, TransportStream, WebSocketTransport};
use feastline_core::FeastlineError;
use feastline_core::config::ChannelConfig;
use feastline_core::connection::{ConnectionInfo, ConnectionState, TransportKind};
use feastline_core::error::Result;
use feastline_core::event::{EventName, InboundEvent, OutboundMessage};
use feastline_core::session::Session;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How long `close` waits for the connection task to say goodbye.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

struct ActiveConnection {
    session: Session,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct EventChannelManager {
    config: ChannelConfig,
    transports: Vec<Arc<dyn Transport>>,
    events: mpsc::UnboundedSender<InboundEvent>,
    info: Arc<watch::Sender<Option<ConnectionInfo>>>,
    active: Mutex<Option<ActiveConnection>>,
}

impl EventChannelManager {
    /// Creates a manager over `transports`, tried in the order given by
    /// `config.transports`.
    ///
    /// # Returns
    ///
    /// The manager and the receiver every inbound event is delivered to.
    pub fn new(
        config: ChannelConfig,
        transports: Vec<Arc<dyn Transport>>,
    ) -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let (info, _) = watch::channel(None);
        let transports = order_transports(&config.transports, transports);
        (
            Self {
                config,
                transports,
                events,
                info: Arc::new(info),
                active: Mutex::new(None),
            },
            receiver,
        )
    }

    /// Creates a manager with the WebSocket and long-polling transports.
    pub fn with_default_transports(
        config: ChannelConfig,
    ) -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let transports: Vec<Arc<dyn Transport>> = vec![
            Arc::new(WebSocketTransport::new()),
            Arc::new(PollingTransport::new()),
        ];
        Self::new(config, transports)
    }

    /// Opens the channel for `session`.
    ///
    /// Returns the existing connection unchanged when one is already live
    /// for the same session. A failed connection, or one owned by another
    /// session, is closed and replaced. The handshake runs in the
    /// background; the returned snapshot is in `connecting`.
    pub async fn open(&self, session: &Session) -> Result<ConnectionInfo> {
        let mut active = self.active.lock().await;

        if let Some(current) = active.as_ref()
            && current.session == *session
            && let Some(info) = self.info()
            && info.state.is_active()
        {
            tracing::debug!("[Channel] open() for {} reuses connection {}", session.user_id, info.id);
            return Ok(info);
        }

        if let Some(previous) = active.take() {
            tracing::info!("[Channel] Replacing connection for {}", previous.session.user_id);
            self.shutdown(previous).await;
        }

        let endpoint = Endpoint::from_config(&self.config)?;
        let mut info = ConnectionInfo::new(session.clone());
        info.state = ConnectionState::Connecting;
        self.info.send_replace(Some(info.clone()));

        let cancel = CancellationToken::new();
        let worker = ConnectionWorker {
            id: info.id,
            config: self.config.clone(),
            endpoint,
            transports: self.transports.clone(),
            session: session.clone(),
            events: self.events.clone(),
            info: self.info.clone(),
            cancel: cancel.clone(),
        };
        tracing::info!(
            "[Channel] Opening connection {} for {} ({})",
            info.id,
            session.user_id,
            session.role
        );
        let task = tokio::spawn(worker.run());

        *active = Some(ActiveConnection {
            session: session.clone(),
            cancel,
            task,
        });
        Ok(info)
    }

    /// Tears the connection down and clears room membership. No-op when
    /// already closed.
    pub async fn close(&self) {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(previous) => self.shutdown(previous).await,
            None => tracing::debug!("[Channel] close() with no open connection"),
        }
    }

    /// Re-opens a failed channel with the session it was opened for.
    pub async fn retry(&self) -> Result<ConnectionInfo> {
        let session = {
            let active = self.active.lock().await;
            match (active.as_ref(), self.state()) {
                (Some(current), ConnectionState::Failed) => current.session.clone(),
                (_, state) => {
                    return Err(FeastlineError::internal(format!(
                        "retry is only possible from failed, channel is {}",
                        state
                    )));
                }
            }
        };
        tracing::info!("[Channel] Manual retry for {}", session.user_id);
        self.open(&session).await
    }

    pub fn state(&self) -> ConnectionState {
        self.info
            .borrow()
            .as_ref()
            .map(|info| info.state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Current connection snapshot, `None` before the first `open`.
    pub fn info(&self) -> Option<ConnectionInfo> {
        self.info.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ConnectionInfo>> {
        self.info.subscribe()
    }

    /// Waits until the channel reaches `target`.
    pub async fn wait_for_state(
        &self,
        target: ConnectionState,
        timeout: Duration,
    ) -> Result<ConnectionInfo> {
        let mut receiver = self.subscribe();
        let reached = tokio::time::timeout(
            timeout,
            receiver.wait_for(|info| info.as_ref().is_some_and(|info| info.state == target)),
        )
        .await;

        match reached {
            Ok(Ok(info)) => info.clone().ok_or(FeastlineError::ChannelClosed),
            Ok(Err(_)) => Err(FeastlineError::ChannelClosed),
            Err(_) => Err(FeastlineError::timeout(format!(
                "channel did not reach {} within {:?}",
                target, timeout
            ))),
        }
    }

    async fn shutdown(&self, mut previous: ActiveConnection) {
        previous.cancel.cancel();
        if tokio::time::timeout(CLOSE_GRACE, &mut previous.task).await.is_err() {
            tracing::warn!("[Channel] Connection task did not stop in time, aborting");
            previous.task.abort();
        }
        self.info.send_modify(|slot| {
            if let Some(info) = slot.as_mut() {
                info.state = ConnectionState::Disconnected;
                info.rooms.clear();
                info.transport = None;
            }
        });
        tracing::info!("[Channel] Closed connection for {}", previous.session.user_id);
    }
}

impl Drop for EventChannelManager {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.cancel.cancel();
        }
    }
}

fn order_transports(
    preference: &[TransportKind],
    transports: Vec<Arc<dyn Transport>>,
) -> Vec<Arc<dyn Transport>> {
    if preference.is_empty() {
        return transports;
    }
    preference
        .iter()
        .flat_map(|kind| transports.iter().filter(move |t| t.kind() == *kind).cloned())
        .collect()
}

struct Established {
    stream: Box<dyn TransportStream>,
    handshake: HandshakeInfo,
    kind: TransportKind,
}

enum PumpEnd {
    Cancelled,
    Lost,
}

/// Drives one connection from first attempt to close or exhaustion.
struct ConnectionWorker {
    id: Uuid,
    config: ChannelConfig,
    endpoint: Endpoint,
    transports: Vec<Arc<dyn Transport>>,
    session: Session,
    events: mpsc::UnboundedSender<InboundEvent>,
    info: Arc<watch::Sender<Option<ConnectionInfo>>>,
    cancel: CancellationToken,
}

impl ConnectionWorker {
    async fn run(self) {
        let policy = self.config.reconnect.clone();
        // consecutive failed tries; the first one is not a reconnect
        let mut attempts: u32 = 0;

        loop {
            let established = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.establish() => result,
            };

            match established {
                Ok(established) => {
                    attempts = 0;
                    if let PumpEnd::Cancelled = self.pump(established).await {
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!("[Channel] Connect failed: {}", err);
                    self.emit(InboundEvent::lifecycle(
                        EventName::ConnectError,
                        json!({ "message": err.to_string() }),
                    ));
                }
            }

            attempts += 1;
            if policy.is_exhausted(attempts) {
                tracing::error!(
                    "[Channel] Giving up after {} reconnect attempts",
                    policy.max_attempts
                );
                self.publish(|info| {
                    info.state = ConnectionState::Failed;
                    info.reconnect_attempts = policy.max_attempts;
                    info.rooms.clear();
                    info.transport = None;
                });
                return;
            }

            let delay = policy.delay_for(attempts);
            tracing::info!(
                "[Channel] Reconnect attempt {}/{} in {:?}",
                attempts,
                policy.max_attempts,
                delay
            );
            self.publish(|info| {
                info.state = ConnectionState::Reconnecting;
                info.reconnect_attempts = attempts;
            });

            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Tries each transport in turn; the first completed handshake wins.
    async fn establish(&self) -> Result<Established> {
        let timeout = self.config.handshake_timeout();
        let mut last_error = None;

        for transport in &self.transports {
            let kind = transport.kind();
            match tokio::time::timeout(timeout, self.handshake(transport.as_ref())).await {
                Ok(Ok(established)) => return Ok(established),
                Ok(Err(err)) => {
                    tracing::debug!("[Channel] {} transport failed: {}", kind, err);
                    last_error = Some(err);
                }
                Err(_) => {
                    tracing::debug!("[Channel] {} handshake timed out", kind);
                    last_error = Some(FeastlineError::timeout(format!(
                        "{} handshake timed out after {:?}",
                        kind, timeout
                    )));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FeastlineError::transport("no transports configured")))
    }

    async fn handshake(&self, transport: &dyn Transport) -> Result<Established> {
        let kind = transport.kind();
        let mut stream = transport.connect(&self.endpoint).await?;

        let handshake = match stream.recv().await? {
            Some(EnginePacket::Open(handshake)) => handshake,
            Some(other) => {
                stream.close().await;
                return Err(FeastlineError::handshake(format!(
                    "expected open packet, got {:?}",
                    other
                )));
            }
            None => return Err(FeastlineError::handshake("closed before open packet")),
        };

        let auth = json!({ "userId": self.session.user_id });
        stream
            .send(SocketPacket::Connect(Some(auth)).into_engine())
            .await?;

        loop {
            match stream.recv().await? {
                Some(EnginePacket::Ping(data)) => stream.send(EnginePacket::Pong(data)).await?,
                Some(EnginePacket::Message(body)) => match SocketPacket::decode(&body)? {
                    SocketPacket::Connect(_) => {
                        return Ok(Established {
                            stream,
                            handshake,
                            kind,
                        });
                    }
                    SocketPacket::ConnectError(data) => {
                        stream.close().await;
                        return Err(FeastlineError::handshake(format!(
                            "server refused connection: {}",
                            data
                        )));
                    }
                    _ => {}
                },
                Some(EnginePacket::Close) | None => {
                    return Err(FeastlineError::handshake("closed during handshake"));
                }
                Some(_) => {}
            }
        }
    }

    /// Runs a connected stream until it is lost or the worker is cancelled.
    async fn pump(&self, established: Established) -> PumpEnd {
        let Established {
            mut stream,
            handshake,
            kind,
        } = established;

        self.publish(|info| {
            info.state = ConnectionState::Connected;
            info.reconnect_attempts = 0;
            info.transport = Some(kind);
            info.rooms.clear();
        });
        tracing::info!(
            "[Channel] Connected via {} (sid {}) as {}",
            kind,
            handshake.sid,
            self.session.user_id
        );
        self.emit(InboundEvent::lifecycle(EventName::Connect, Value::Null));

        for room in ConnectionInfo::rooms_for(&self.session) {
            let message = OutboundMessage::for_room(&room);
            let packet = SocketPacket::event(message.name(), message.args()).into_engine();
            if let Err(err) = stream.send(packet).await {
                return self
                    .lose(stream, &format!("join {} failed: {}", room, err))
                    .await;
            }
            tracing::debug!("[Channel] Joined room {}", room);
            self.publish(|info| {
                info.rooms.insert(room.clone());
            });
        }

        let window = handshake.liveness_window();
        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => None,
                received = tokio::time::timeout(window, stream.recv()) => Some(received),
            };
            let Some(received) = received else {
                self.hang_up(stream).await;
                return PumpEnd::Cancelled;
            };

            let packet = match received {
                Err(_) => return self.lose(stream, "ping timeout").await,
                Ok(Err(err)) => {
                    return self
                        .lose(stream, &format!("transport error: {}", err))
                        .await;
                }
                Ok(Ok(None)) | Ok(Ok(Some(EnginePacket::Close))) => {
                    return self.lose(stream, "transport close").await;
                }
                Ok(Ok(Some(packet))) => packet,
            };

            match packet {
                EnginePacket::Ping(data) => {
                    if let Err(err) = stream.send(EnginePacket::Pong(data)).await {
                        return self
                            .lose(stream, &format!("transport error: {}", err))
                            .await;
                    }
                }
                EnginePacket::Message(body) => match SocketPacket::decode(&body) {
                    Ok(SocketPacket::Event { name, args, .. }) => {
                        let payload = args.into_iter().next().unwrap_or(Value::Null);
                        tracing::trace!("[Channel] <- {}", name);
                        self.emit(InboundEvent::new(name, payload));
                    }
                    Ok(SocketPacket::Disconnect) => {
                        return self.lose(stream, "io server disconnect").await;
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!("[Channel] Ignoring unreadable frame: {}", err),
                },
                _ => {}
            }
        }
    }

    async fn lose(&self, mut stream: Box<dyn TransportStream>, reason: &str) -> PumpEnd {
        tracing::warn!("[Channel] Connection lost: {}", reason);
        stream.close().await;
        self.publish(|info| {
            info.rooms.clear();
            info.transport = None;
        });
        self.emit(InboundEvent::lifecycle(EventName::Disconnect, json!(reason)));
        PumpEnd::Lost
    }

    async fn hang_up(&self, mut stream: Box<dyn TransportStream>) {
        if let Err(err) = stream.send(SocketPacket::Disconnect.into_engine()).await {
            tracing::debug!("[Channel] Disconnect packet not sent: {}", err);
        }
        stream.close().await;
    }

    fn emit(&self, event: InboundEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("[Channel] Event receiver dropped");
        }
    }

    /// Applies `change` to the published snapshot if it still belongs to
    /// this connection.
    fn publish(&self, change: impl FnOnce(&mut ConnectionInfo)) {
        self.info.send_if_modified(|slot| match slot.as_mut() {
            Some(info) if info.id == self.id => {
                let from = info.state;
                change(info);
                if from != info.state && !from.can_transition_to(info.state) {
                    tracing::warn!("[Channel] Unexpected transition {} -> {}", from, info.state);
                }
                true
            }
            _ => false,
        });
    }
}
