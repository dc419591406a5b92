//! Notification records shown in the bell menu and toasts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Notification category.
///
/// Known categories map to dedicated presentation; anything else the
/// backend sends in a generic notification is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationType {
    General,
    NewOrder,
    OrderStatusUpdated,
    DeliveryTrackingUpdate,
    OrderCancelled,
    PaymentConfirmed,
    Other(String),
}

impl NotificationType {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationType::General => "general",
            NotificationType::NewOrder => "new_order",
            NotificationType::OrderStatusUpdated => "order_status_updated",
            NotificationType::DeliveryTrackingUpdate => "delivery_tracking_update",
            NotificationType::OrderCancelled => "order_cancelled",
            NotificationType::PaymentConfirmed => "payment_confirmed",
            NotificationType::Other(other) => other,
        }
    }
}

impl From<String> for NotificationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "general" => NotificationType::General,
            "new_order" => NotificationType::NewOrder,
            "order_status_updated" => NotificationType::OrderStatusUpdated,
            "delivery_tracking_update" => NotificationType::DeliveryTrackingUpdate,
            "order_cancelled" => NotificationType::OrderCancelled,
            "payment_confirmed" => NotificationType::PaymentConfirmed,
            _ => NotificationType::Other(value),
        }
    }
}

impl From<NotificationType> for String {
    fn from(value: NotificationType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in the notification collection.
///
/// Ids are unique within the collection; the collection is newest-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// The inbound payload as received.
    #[serde(default)]
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

impl NotificationRecord {
    pub fn new(
        id: impl Into<String>,
        kind: NotificationType,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            title: None,
            kind,
            payload: Value::Null,
            timestamp,
            read: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_round_trips_unknown_values() {
        let kind: NotificationType = serde_json::from_str("\"promo\"").unwrap();
        assert_eq!(kind, NotificationType::Other("promo".into()));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"promo\"");
    }

    #[test]
    fn test_record_serializes_type_key() {
        let record = NotificationRecord::new("n1", NotificationType::NewOrder, "hi", Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "new_order");
        assert_eq!(json["read"], false);
    }
}
