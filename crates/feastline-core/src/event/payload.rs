//! Wire shapes of inbound event payloads.
//!
//! These mirror what the backend emits and are deliberately permissive:
//! everything optional is `Option`, and required entity ids are checked by
//! the router's normalizer, which rejects rather than guesses.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Timestamps arrive as RFC 3339 text or epoch milliseconds. Any other
/// shape is kept as `Unrecognized` and reads as missing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(i64),
    FractionalMillis(f64),
    Text(String),
    Unrecognized(Value),
}

impl WireTimestamp {
    /// Parses the timestamp; `None` when it is not a recognizable instant.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            WireTimestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            WireTimestamp::FractionalMillis(ms) if ms.is_finite() => {
                Utc.timestamp_millis_opt(ms.trunc() as i64).single()
            }
            WireTimestamp::FractionalMillis(_) | WireTimestamp::Unrecognized(_) => None,
            WireTimestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Reads an id sent as a string or a number. Other shapes read as absent.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// `new_notification`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "_id", default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

/// `new_order`, `order_status_updated`, `order_cancelled`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderEventPayload {
    #[serde(default)]
    pub order: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

/// `delivery_tracking_update`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackingEventPayload {
    #[serde(default)]
    pub tracking: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

/// `payment_confirmed`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentEventPayload {
    #[serde(default)]
    pub payment: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
}

/// `walletUpdated`
#[derive(Debug, Clone, Deserialize)]
pub struct WalletEventPayload {
    pub balance: f64,
    #[serde(default)]
    pub transactions: Option<Vec<Value>>,
}

/// Extracts an order id from a nested object (`tracking`, `payment`).
pub fn nested_order_id(value: Option<&Value>) -> Option<String> {
    let object = value?.as_object()?;
    ["orderId", "order_id", "_id"].iter().find_map(|key| match object.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// `product-deleted` sends either the bare id or an object carrying it.
pub fn deleted_product_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["productId", "_id", "id"]
            .iter()
            .find_map(|key| map.get(*key).and_then(deleted_product_id)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamp_formats() {
        let millis: WireTimestamp = serde_json::from_value(json!(1_700_000_000_000i64)).unwrap();
        assert_eq!(millis.to_datetime().unwrap().timestamp(), 1_700_000_000);

        let text: WireTimestamp = serde_json::from_value(json!("2024-05-01T10:00:00Z")).unwrap();
        assert_eq!(text.to_datetime().unwrap().timestamp(), 1_714_557_600);

        let junk: WireTimestamp = serde_json::from_value(json!("yesterday")).unwrap();
        assert!(junk.to_datetime().is_none());

        let fractional: WireTimestamp = serde_json::from_value(json!(1_700_000_000_000.0)).unwrap();
        assert_eq!(fractional.to_datetime().unwrap().timestamp(), 1_700_000_000);

        let object: WireTimestamp = serde_json::from_value(json!({"$date": "2024"})).unwrap();
        assert!(object.to_datetime().is_none());
    }

    #[test]
    fn test_notification_id_shapes() {
        let numeric: NotificationPayload = serde_json::from_value(json!({"_id": 17})).unwrap();
        assert_eq!(numeric.id.as_deref(), Some("17"));

        let object: NotificationPayload =
            serde_json::from_value(json!({"_id": {"$oid": "abc"}, "message": "m"})).unwrap();
        assert_eq!(object.id, None);
        assert_eq!(object.message.as_deref(), Some("m"));

        let missing: NotificationPayload = serde_json::from_value(json!({})).unwrap();
        assert_eq!(missing.id, None);
    }

    #[test]
    fn test_nested_order_id() {
        assert_eq!(nested_order_id(Some(&json!({"orderId": "o9"}))), Some("o9".into()));
        assert_eq!(nested_order_id(Some(&json!({"eta": 5}))), None);
        assert_eq!(nested_order_id(None), None);
    }

    #[test]
    fn test_deleted_product_id_shapes() {
        assert_eq!(deleted_product_id(&json!("p1")), Some("p1".into()));
        assert_eq!(deleted_product_id(&json!({"productId": "p2"})), Some("p2".into()));
        assert_eq!(deleted_product_id(&json!({"_id": 3})), Some("3".into()));
        assert_eq!(deleted_product_id(&json!(null)), None);
        assert_eq!(deleted_product_id(&json!("")), None);
    }

    #[test]
    fn test_wallet_requires_balance() {
        assert!(serde_json::from_value::<WalletEventPayload>(json!({"transactions": []})).is_err());
    }
}
