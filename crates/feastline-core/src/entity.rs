//! Domain entities the event channel keeps fresh: orders, products, wallet.
//!
//! Entities keep the backend's full JSON document in `fields` so that an
//! in-place replacement never drops attributes the client does not model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString};

/// Anything stored in an id-keyed collection.
pub trait Entity: Clone {
    fn id(&self) -> &str;
}

/// Order lifecycle values the backend emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum OrderStatus {
    Pending,
    Accepted,
    Confirmed,
    Preparing,
    Ready,
    OutForDelivery,
    Delivered,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// Statuses that end the order unsuccessfully.
    pub fn is_failure(self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Rejected)
    }
}

/// Reads the first present id key, accepting string or numeric ids.
fn take_id(map: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        let id = match map.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        map.remove(*key);
        return Some(id);
    }
    None
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Order {
    pub id: String,
    pub status: Option<String>,
    /// Remaining attributes of the backend document.
    pub fields: Map<String, Value>,
}

impl Order {
    pub const ID_KEYS: [&'static str; 3] = ["orderId", "_id", "id"];
}

impl TryFrom<Value> for Order {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut fields) = value else {
            return Err("order must be an object".to_string());
        };
        let id = take_id(&mut fields, &Self::ID_KEYS).ok_or_else(|| "missing order id".to_string())?;
        let status = match fields.remove("status") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        Ok(Self { id, status, fields })
    }
}

impl From<Order> for Value {
    fn from(order: Order) -> Self {
        let mut map = order.fields;
        map.insert("orderId".to_string(), Value::String(order.id));
        if let Some(status) = order.status {
            map.insert("status".to_string(), Value::String(status));
        }
        Value::Object(map)
    }
}

impl Order {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: None,
            fields: Map::new(),
        }
    }

    /// Parsed status, if the backend sent one this client knows.
    pub fn status_kind(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    /// Merges a partial update into this order. Keys in `patch` win.
    pub fn apply_patch(&mut self, patch: &OrderPatch) {
        if let Some(status) = &patch.status {
            self.status = Some(status.clone());
        }
        for (key, value) in &patch.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }
}

impl Entity for Order {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Partial order update carried by status/cancel events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPatch {
    pub id: String,
    pub status: Option<String>,
    pub fields: Map<String, Value>,
}

impl OrderPatch {
    /// Materializes the patch as a standalone order (creation case).
    pub fn into_order(self) -> Order {
        Order {
            id: self.id,
            status: self.status,
            fields: self.fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Product {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl TryFrom<Value> for Product {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut fields) = value else {
            return Err("product must be an object".to_string());
        };
        let id = take_id(&mut fields, &Self::ID_KEYS).ok_or_else(|| "missing product id".to_string())?;
        Ok(Self { id, fields })
    }
}

impl From<Product> for Value {
    fn from(product: Product) -> Self {
        let mut map = product.fields;
        map.insert("_id".to_string(), Value::String(product.id));
        Value::Object(map)
    }
}

impl Product {
    pub const ID_KEYS: [&'static str; 3] = ["_id", "id", "productId"];

    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }
}

impl Entity for Product {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Authoritative wallet snapshot. Always replaced whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: f64,
    #[serde(default)]
    pub transactions: Vec<Value>,
}

/// Envelope carrying a partial or full replacement of a domain entity.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEntityUpdate {
    OrderUpsert(Order),
    OrderPatch(OrderPatch),
    ProductUpsert(Product),
    ProductRemove { id: String },
    WalletReplace(Wallet),
}

impl DomainEntityUpdate {
    /// Id of the entity this update targets. Wallets have no id.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            DomainEntityUpdate::OrderUpsert(order) => Some(&order.id),
            DomainEntityUpdate::OrderPatch(patch) => Some(&patch.id),
            DomainEntityUpdate::ProductUpsert(product) => Some(&product.id),
            DomainEntityUpdate::ProductRemove { id } => Some(id),
            DomainEntityUpdate::WalletReplace(_) => None,
        }
    }
}
