use crate::entity::{DomainEntityUpdate, Order, OrderPatch, OrderStatus, Product, Wallet};
use crate::notification::NotificationRecord;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Event category, the row key of the delivery policy table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    General,
    NewOrder,
    OrderStatusUpdated,
    DeliveryTrackingUpdate,
    OrderCancelled,
    PaymentConfirmed,
    ProductCreated,
    ProductUpdated,
    ProductDeleted,
    WalletUpdated,
}

/// A validated inbound event carrying exactly what its consumers need.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Notification(NotificationRecord),
    NewOrder {
        notification: NotificationRecord,
        order: Order,
    },
    OrderStatusUpdated {
        notification: NotificationRecord,
        patch: OrderPatch,
    },
    DeliveryTracking {
        notification: NotificationRecord,
        order_id: String,
    },
    OrderCancelled {
        notification: NotificationRecord,
        patch: OrderPatch,
    },
    PaymentConfirmed {
        notification: NotificationRecord,
        order_id: String,
    },
    ProductCreated(Product),
    ProductUpdated(Product),
    ProductDeleted {
        product_id: String,
    },
    WalletUpdated(Wallet),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::Notification(_) => EventKind::General,
            DomainEvent::NewOrder { .. } => EventKind::NewOrder,
            DomainEvent::OrderStatusUpdated { .. } => EventKind::OrderStatusUpdated,
            DomainEvent::DeliveryTracking { .. } => EventKind::DeliveryTrackingUpdate,
            DomainEvent::OrderCancelled { .. } => EventKind::OrderCancelled,
            DomainEvent::PaymentConfirmed { .. } => EventKind::PaymentConfirmed,
            DomainEvent::ProductCreated(_) => EventKind::ProductCreated,
            DomainEvent::ProductUpdated(_) => EventKind::ProductUpdated,
            DomainEvent::ProductDeleted { .. } => EventKind::ProductDeleted,
            DomainEvent::WalletUpdated(_) => EventKind::WalletUpdated,
        }
    }

    /// The notification this event produces, if any.
    pub fn notification(&self) -> Option<&NotificationRecord> {
        match self {
            DomainEvent::Notification(notification)
            | DomainEvent::NewOrder { notification, .. }
            | DomainEvent::OrderStatusUpdated { notification, .. }
            | DomainEvent::DeliveryTracking { notification, .. }
            | DomainEvent::OrderCancelled { notification, .. }
            | DomainEvent::PaymentConfirmed { notification, .. } => Some(notification),
            _ => None,
        }
    }

    /// The entity mutation this event carries, if any.
    pub fn entity_update(&self) -> Option<DomainEntityUpdate> {
        match self {
            DomainEvent::NewOrder { order, .. } => Some(DomainEntityUpdate::OrderUpsert(order.clone())),
            DomainEvent::OrderStatusUpdated { patch, .. } | DomainEvent::OrderCancelled { patch, .. } => {
                Some(DomainEntityUpdate::OrderPatch(patch.clone()))
            }
            DomainEvent::ProductCreated(product) | DomainEvent::ProductUpdated(product) => {
                Some(DomainEntityUpdate::ProductUpsert(product.clone()))
            }
            DomainEvent::ProductDeleted { product_id } => Some(DomainEntityUpdate::ProductRemove {
                id: product_id.clone(),
            }),
            DomainEvent::WalletUpdated(wallet) => Some(DomainEntityUpdate::WalletReplace(wallet.clone())),
            _ => None,
        }
    }

    /// Order status this event reports, used to pick toast presentation.
    pub fn order_status(&self) -> Option<OrderStatus> {
        match self {
            DomainEvent::NewOrder { order, .. } => order.status_kind(),
            DomainEvent::OrderStatusUpdated { patch, .. } => {
                patch.status.as_deref().and_then(|s| s.parse().ok())
            }
            DomainEvent::OrderCancelled { .. } => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NotificationType;
    use chrono::Utc;
    use serde_json::Map;

    fn note(kind: NotificationType) -> NotificationRecord {
        NotificationRecord::new("n1", kind, "msg", Utc::now())
    }

    #[test]
    fn test_status_update_exposes_patch_and_status() {
        let event = DomainEvent::OrderStatusUpdated {
            notification: note(NotificationType::OrderStatusUpdated),
            patch: OrderPatch {
                id: "o1".into(),
                status: Some("out_for_delivery".into()),
                fields: Map::new(),
            },
        };
        assert_eq!(event.kind(), EventKind::OrderStatusUpdated);
        assert_eq!(event.order_status(), Some(OrderStatus::OutForDelivery));
        assert_eq!(event.entity_update().unwrap().entity_id(), Some("o1"));
        assert!(event.notification().is_some());
    }

    #[test]
    fn test_product_events_have_no_notification() {
        let event = DomainEvent::ProductDeleted {
            product_id: "p1".into(),
        };
        assert!(event.notification().is_none());
        assert_eq!(
            event.entity_update(),
            Some(DomainEntityUpdate::ProductRemove { id: "p1".into() })
        );
    }

    #[test]
    fn test_cancelled_reports_cancelled_status() {
        let event = DomainEvent::OrderCancelled {
            notification: note(NotificationType::OrderCancelled),
            patch: OrderPatch {
                id: "o1".into(),
                status: None,
                fields: Map::new(),
            },
        };
        assert_eq!(event.order_status(), Some(OrderStatus::Cancelled));
    }
}
