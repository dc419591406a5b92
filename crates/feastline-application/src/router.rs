//! Event router and handler table.
//!
//! Every inbound event passes through [`EventRouter::handle`]: lifecycle
//! names are logged, the delivery policy decides whether the session's role
//! sees the event at all, and the payload is normalized into a
//! [`DomainEvent`] which is fanned out to registered listeners in
//! registration order. A listener may return [`Propagation::Stop`] to keep
//! the event from later listeners. A payload that fails validation is
//! dropped and logged; nothing here returns an error to the channel loop.

use chrono::{DateTime, Utc};
use feastline_core::FeastlineError;
use feastline_core::entity::{Order, OrderPatch, Product, Wallet};
use feastline_core::error::Result;
use feastline_core::event::payload::{
    NotificationPayload, OrderEventPayload, PaymentEventPayload, TrackingEventPayload,
    WalletEventPayload, WireTimestamp, deleted_product_id, nested_order_id,
};
use feastline_core::event::{DomainEvent, EventKind, EventName, InboundEvent};
use feastline_core::notification::{NotificationRecord, NotificationType};
use feastline_core::policy::DeliveryPolicy;
use feastline_core::session::Session;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

/// Whether later listeners see the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

/// Consumer of normalized events.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &DomainEvent, session: &Session) -> Propagation;
}

type ListenerTable = RwLock<Vec<(u64, Arc<dyn EventListener>)>>;

/// Disposer returned by [`EventRouter::register`].
///
/// The listener stays registered until this is dropped or
/// [`Subscription::unsubscribe`] is called.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    id: u64,
    table: Weak<ListenerTable>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            table
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// Maps a backend event name to its policy row.
pub fn event_kind(name: EventName) -> Option<EventKind> {
    match name {
        EventName::NewNotification => Some(EventKind::General),
        EventName::NewOrder => Some(EventKind::NewOrder),
        EventName::OrderStatusUpdated => Some(EventKind::OrderStatusUpdated),
        EventName::DeliveryTrackingUpdate => Some(EventKind::DeliveryTrackingUpdate),
        EventName::OrderCancelled => Some(EventKind::OrderCancelled),
        EventName::PaymentConfirmed => Some(EventKind::PaymentConfirmed),
        EventName::ProductCreated => Some(EventKind::ProductCreated),
        EventName::ProductUpdated => Some(EventKind::ProductUpdated),
        EventName::ProductDeleted => Some(EventKind::ProductDeleted),
        EventName::WalletUpdated => Some(EventKind::WalletUpdated),
        EventName::Connect
        | EventName::Disconnect
        | EventName::ConnectError
        | EventName::AdminRoomJoined => None,
    }
}

pub struct EventRouter {
    policy: DeliveryPolicy,
    normalizer: Normalizer,
    listeners: Arc<ListenerTable>,
    next_listener: AtomicU64,
}

impl EventRouter {
    pub fn new(policy: DeliveryPolicy) -> Self {
        Self {
            policy,
            normalizer: Normalizer::default(),
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_listener: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    /// Registers a listener; it receives events until the returned
    /// subscription is dropped.
    pub fn register(&self, listener: Arc<dyn EventListener>) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        Subscription {
            id,
            table: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Routes one inbound event for `session`.
    ///
    /// # Returns
    ///
    /// The delivered event, or `None` when it was a lifecycle event,
    /// filtered by policy, unknown, or malformed.
    pub fn handle(&self, event: &InboundEvent, session: &Session) -> Option<DomainEvent> {
        let Some(name) = event.event_name() else {
            tracing::debug!("[Router] No handler for '{}'", event.name);
            return None;
        };

        let Some(kind) = event_kind(name) else {
            log_lifecycle(name, &event.payload);
            return None;
        };

        if !self.policy.delivers(kind, session.role) {
            tracing::debug!("[Router] Dropping {} for role {}", kind, session.role);
            return None;
        }

        let domain = match self.normalizer.normalize(name, event) {
            Ok(domain) => domain,
            Err(err) => {
                tracing::warn!("[Router] Dropped malformed event: {}", err);
                return None;
            }
        };

        // snapshot so listeners may (un)register from inside a callback
        let listeners: Vec<Arc<dyn EventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            if listener.on_event(&domain, session) == Propagation::Stop {
                tracing::debug!("[Router] {} stopped after a listener", kind);
                break;
            }
        }
        Some(domain)
    }
}

fn log_lifecycle(name: EventName, payload: &Value) {
    match name {
        EventName::Connect => tracing::info!("[Router] Channel connected"),
        EventName::Disconnect => tracing::warn!("[Router] Channel disconnected: {}", payload),
        EventName::ConnectError => tracing::warn!("[Router] Channel error: {}", payload),
        EventName::AdminRoomJoined => tracing::info!("[Router] Admin room joined: {}", payload),
        _ => {}
    }
}

/// Turns raw payloads into validated domain events.
///
/// Missing notification ids are synthesized as
/// `{prefix}_{entity id}_{millis}_{sequence}`; the sequence keeps ids
/// unique across events arriving within the same millisecond.
#[derive(Default)]
pub struct Normalizer {
    sequence: AtomicU64,
}

impl Normalizer {
    pub fn normalize(&self, name: EventName, event: &InboundEvent) -> Result<DomainEvent> {
        let wire = name.as_ref();
        match name {
            EventName::NewNotification => {
                let payload: NotificationPayload = parse(wire, &event.payload)?;
                let timestamp = arrival(payload.timestamp.as_ref(), event.received_at);
                let id = payload
                    .id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(|| self.synthesize_id("notif", "general", timestamp));
                let kind = payload
                    .kind
                    .map(NotificationType::from)
                    .unwrap_or(NotificationType::General);
                let message = payload
                    .message
                    .unwrap_or_else(|| "You have a new notification".to_string());
                let mut record = NotificationRecord::new(id, kind, message, timestamp)
                    .with_payload(event.payload.clone());
                record.title = payload.title;
                Ok(DomainEvent::Notification(record))
            }
            EventName::NewOrder => {
                let payload: OrderEventPayload = parse(wire, &event.payload)?;
                let order = required_order(wire, payload.order)?;
                let timestamp = arrival(payload.timestamp.as_ref(), event.received_at);
                let notification = self.record(
                    NotificationType::NewOrder,
                    "order",
                    &order.id,
                    timestamp,
                    payload.message,
                    payload.title.or_else(|| Some("New Order".to_string())),
                    format!("New order #{} received", order.id),
                    &event.payload,
                );
                Ok(DomainEvent::NewOrder { notification, order })
            }
            EventName::OrderStatusUpdated => {
                let payload: OrderEventPayload = parse(wire, &event.payload)?;
                let order = required_order(wire, payload.order)?;
                let timestamp = arrival(payload.timestamp.as_ref(), event.received_at);
                let fallback = match &order.status {
                    Some(status) => format!("Order #{} is now {}", order.id, status),
                    None => format!("Order #{} was updated", order.id),
                };
                let notification = self.record(
                    NotificationType::OrderStatusUpdated,
                    "status",
                    &order.id,
                    timestamp,
                    payload.message,
                    payload.title.or_else(|| Some("Order Update".to_string())),
                    fallback,
                    &event.payload,
                );
                Ok(DomainEvent::OrderStatusUpdated {
                    notification,
                    patch: into_patch(order),
                })
            }
            EventName::DeliveryTrackingUpdate => {
                let payload: TrackingEventPayload = parse(wire, &event.payload)?;
                let order_id = nested_order_id(payload.tracking.as_ref())
                    .ok_or_else(|| FeastlineError::malformed(wire, "tracking.orderId is missing"))?;
                let timestamp = arrival(payload.timestamp.as_ref(), event.received_at);
                let notification = self.record(
                    NotificationType::DeliveryTrackingUpdate,
                    "tracking",
                    &order_id,
                    timestamp,
                    payload.message,
                    payload.title.or_else(|| Some("Delivery Update".to_string())),
                    format!("Delivery for order #{} was updated", order_id),
                    &event.payload,
                );
                Ok(DomainEvent::DeliveryTracking {
                    notification,
                    order_id,
                })
            }
            EventName::OrderCancelled => {
                let payload: OrderEventPayload = parse(wire, &event.payload)?;
                let mut order = required_order(wire, payload.order)?;
                order.status = Some("cancelled".to_string());
                let timestamp = arrival(payload.timestamp.as_ref(), event.received_at);
                let notification = self.record(
                    NotificationType::OrderCancelled,
                    "cancel",
                    &order.id,
                    timestamp,
                    payload.message,
                    payload.title.or_else(|| Some("Order Cancelled".to_string())),
                    format!("Order #{} has been cancelled", order.id),
                    &event.payload,
                );
                Ok(DomainEvent::OrderCancelled {
                    notification,
                    patch: into_patch(order),
                })
            }
            EventName::PaymentConfirmed => {
                let payload: PaymentEventPayload = parse(wire, &event.payload)?;
                let order_id = nested_order_id(payload.payment.as_ref())
                    .ok_or_else(|| FeastlineError::malformed(wire, "payment.orderId is missing"))?;
                let timestamp = arrival(payload.timestamp.as_ref(), event.received_at);
                let notification = self.record(
                    NotificationType::PaymentConfirmed,
                    "payment",
                    &order_id,
                    timestamp,
                    payload.message,
                    payload.title.or_else(|| Some("Payment Confirmed".to_string())),
                    format!("Payment for order #{} confirmed", order_id),
                    &event.payload,
                );
                Ok(DomainEvent::PaymentConfirmed {
                    notification,
                    order_id,
                })
            }
            EventName::ProductCreated => Ok(DomainEvent::ProductCreated(required_product(
                wire,
                &event.payload,
            )?)),
            EventName::ProductUpdated => Ok(DomainEvent::ProductUpdated(required_product(
                wire,
                &event.payload,
            )?)),
            EventName::ProductDeleted => {
                let product_id = deleted_product_id(&event.payload)
                    .ok_or_else(|| FeastlineError::malformed(wire, "product id is missing"))?;
                Ok(DomainEvent::ProductDeleted { product_id })
            }
            EventName::WalletUpdated => {
                let payload: WalletEventPayload = parse(wire, &event.payload)?;
                Ok(DomainEvent::WalletUpdated(Wallet {
                    balance: payload.balance,
                    transactions: payload.transactions.unwrap_or_default(),
                }))
            }
            EventName::Connect
            | EventName::Disconnect
            | EventName::ConnectError
            | EventName::AdminRoomJoined => Err(FeastlineError::malformed(
                wire,
                "lifecycle events carry no domain payload",
            )),
        }
    }

    fn synthesize_id(&self, prefix: &str, entity_id: &str, timestamp: DateTime<Utc>) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}_{}_{}_{}",
            prefix,
            entity_id,
            timestamp.timestamp_millis(),
            sequence
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        kind: NotificationType,
        prefix: &str,
        entity_id: &str,
        timestamp: DateTime<Utc>,
        message: Option<String>,
        title: Option<String>,
        fallback: String,
        payload: &Value,
    ) -> NotificationRecord {
        let id = self.synthesize_id(prefix, entity_id, timestamp);
        let mut record = NotificationRecord::new(id, kind, message.unwrap_or(fallback), timestamp)
            .with_payload(payload.clone());
        record.title = title;
        record
    }
}

fn parse<T: DeserializeOwned>(event: &str, payload: &Value) -> Result<T> {
    serde_json::from_value(payload.clone())
        .map_err(|e| FeastlineError::malformed(event, e.to_string()))
}

fn arrival(timestamp: Option<&WireTimestamp>, received_at: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .and_then(WireTimestamp::to_datetime)
        .unwrap_or(received_at)
}

fn required_order(event: &str, order: Option<Value>) -> Result<Order> {
    let order = order.ok_or_else(|| FeastlineError::malformed(event, "order is missing"))?;
    Order::try_from(order).map_err(|reason| FeastlineError::malformed(event, reason))
}

fn required_product(event: &str, payload: &Value) -> Result<Product> {
    Product::try_from(payload.clone()).map_err(|reason| FeastlineError::malformed(event, reason))
}

fn into_patch(order: Order) -> OrderPatch {
    OrderPatch {
        id: order.id,
        status: order.status,
        fields: order.fields,
    }
}
