//! Session-gated synchronization service.
//!
//! Wires the event channel to the router, reconciler and dispatcher, and
//! ties their lifetime to a signed-in session. All inbound events are
//! consumed by one task, so store mutations happen strictly in arrival
//! order.

use crate::dispatcher::{AudioCue, SideEffectDispatcher, ToastSink};
use crate::reconciler::StateReconciler;
use crate::router::{EventRouter, Subscription};
use crate::store::SharedStore;
use feastline_core::FeastlineError;
use feastline_core::cache::NotificationCache;
use feastline_core::config::AppConfig;
use feastline_core::connection::{ConnectionInfo, ConnectionState};
use feastline_core::error::Result;
use feastline_core::event::InboundEvent;
use feastline_core::policy::DeliveryPolicy;
use feastline_core::session::Session;
use feastline_interaction::{EventChannelManager, Transport};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Inbox = mpsc::UnboundedReceiver<InboundEvent>;

/// Collaborators handed to [`SyncService::new`].
pub struct SyncDependencies {
    /// Transports to negotiate over; empty means WebSocket then polling.
    pub transports: Vec<Arc<dyn Transport>>,
    pub cache: Arc<dyn NotificationCache>,
    pub toasts: Arc<dyn ToastSink>,
    pub audio: Option<Arc<dyn AudioCue>>,
}

struct RunningSession {
    session: Session,
    cancel: CancellationToken,
    consumer: JoinHandle<Inbox>,
}

pub struct SyncService {
    channel: Arc<EventChannelManager>,
    router: Arc<EventRouter>,
    reconciler: Arc<StateReconciler>,
    inbox: Mutex<Option<Inbox>>,
    running: Mutex<Option<RunningSession>>,
    _subscriptions: Vec<Subscription>,
}

impl SyncService {
    /// Builds the pipeline and seeds the store from the local cache.
    pub fn new(config: &AppConfig, dependencies: SyncDependencies) -> Self {
        let SyncDependencies {
            transports,
            cache,
            toasts,
            audio,
        } = dependencies;

        let (channel, inbox) = if transports.is_empty() {
            EventChannelManager::with_default_transports(config.channel.clone())
        } else {
            EventChannelManager::new(config.channel.clone(), transports)
        };

        let store = SharedStore::new(config.notifications.max_records);
        let reconciler = Arc::new(StateReconciler::new(store, cache));
        reconciler.restore_from_cache();

        let dispatcher = Arc::new(SideEffectDispatcher::new(
            config.notifications.clone(),
            toasts,
            audio,
        ));
        let router = Arc::new(EventRouter::new(DeliveryPolicy::with_overrides(
            &config.delivery,
        )));
        // fan-out follows registration order
        let subscriptions = vec![
            router.register(reconciler.clone()),
            router.register(dispatcher),
        ];

        Self {
            channel: Arc::new(channel),
            router,
            reconciler,
            inbox: Mutex::new(Some(inbox)),
            running: Mutex::new(None),
            _subscriptions: subscriptions,
        }
    }

    pub fn store(&self) -> &SharedStore {
        self.reconciler.store()
    }

    pub fn reconciler(&self) -> &Arc<StateReconciler> {
        &self.reconciler
    }

    pub fn channel(&self) -> &Arc<EventChannelManager> {
        &self.channel
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<Option<ConnectionInfo>> {
        self.channel.subscribe()
    }

    /// Starts syncing for `session`.
    ///
    /// Calling again with the same session re-opens a failed channel and is
    /// otherwise a no-op. A different session stops the current one first
    /// and erases its cached notifications.
    pub async fn start(&self, session: &Session) -> Result<ConnectionInfo> {
        let mut running = self.running.lock().await;

        if let Some(current) = running.as_ref()
            && current.session == *session
        {
            return self.channel.open(session).await;
        }

        if let Some(previous) = running.take() {
            tracing::info!(
                "[Sync] Switching session {} -> {}",
                previous.session.user_id,
                session.user_id
            );
            self.channel.close().await;
            self.stop_consumer(previous).await;
            self.reconciler.reset_session(true);
        }

        self.reconciler.restore_from_cache();

        let mut inbox = self
            .inbox
            .lock()
            .await
            .take()
            .ok_or_else(|| FeastlineError::internal("event inbox was lost"))?;
        let stale = std::iter::from_fn(|| inbox.try_recv().ok()).count();
        if stale > 0 {
            tracing::debug!("[Sync] Discarded {} events from a previous session", stale);
        }

        let cancel = CancellationToken::new();
        let consumer = tokio::spawn(consume(
            self.router.clone(),
            session.clone(),
            inbox,
            cancel.clone(),
        ));
        let started = RunningSession {
            session: session.clone(),
            cancel,
            consumer,
        };

        match self.channel.open(session).await {
            Ok(info) => {
                tracing::info!("[Sync] Started for {} ({})", session.user_id, session.role);
                *running = Some(started);
                Ok(info)
            }
            Err(err) => {
                self.stop_consumer(started).await;
                Err(err)
            }
        }
    }

    /// Stops syncing. With `clear_cache` (logout) the cached notifications
    /// are erased and the in-memory list is emptied.
    pub async fn stop(&self, clear_cache: bool) {
        let mut running = self.running.lock().await;
        self.channel.close().await;
        if let Some(previous) = running.take() {
            tracing::info!("[Sync] Stopped for {}", previous.session.user_id);
            self.stop_consumer(previous).await;
        }
        if clear_cache {
            self.reconciler.reset_session(true);
        }
    }

    /// Manual retry after the channel gave up reconnecting.
    pub async fn retry(&self) -> Result<ConnectionInfo> {
        self.channel.retry().await
    }

    async fn stop_consumer(&self, running: RunningSession) {
        running.cancel.cancel();
        match running.consumer.await {
            Ok(inbox) => *self.inbox.lock().await = Some(inbox),
            Err(err) => tracing::error!("[Sync] Event consumer ended abnormally: {}", err),
        }
    }
}

/// The single consumer: one event at a time, in arrival order.
async fn consume(
    router: Arc<EventRouter>,
    session: Session,
    mut inbox: Inbox,
    cancel: CancellationToken,
) -> Inbox {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = inbox.recv() => match event {
                Some(event) => {
                    router.handle(&event, &session);
                }
                None => break,
            },
        }
    }
    inbox
}
