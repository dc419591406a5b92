use crate::connection::Room;
use serde_json::{Value, json};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Inbound message names, exactly as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
pub enum EventName {
    #[strum(serialize = "connect")]
    Connect,
    #[strum(serialize = "disconnect")]
    Disconnect,
    #[strum(serialize = "connect_error")]
    ConnectError,
    #[strum(serialize = "admin_room_joined")]
    AdminRoomJoined,
    #[strum(serialize = "new_notification")]
    NewNotification,
    #[strum(serialize = "new_order")]
    NewOrder,
    #[strum(serialize = "order_status_updated")]
    OrderStatusUpdated,
    #[strum(serialize = "delivery_tracking_update")]
    DeliveryTrackingUpdate,
    #[strum(serialize = "order_cancelled")]
    OrderCancelled,
    #[strum(serialize = "payment_confirmed")]
    PaymentConfirmed,
    #[strum(serialize = "product-created")]
    ProductCreated,
    #[strum(serialize = "product-updated")]
    ProductUpdated,
    #[strum(serialize = "product-deleted")]
    ProductDeleted,
    #[strum(serialize = "walletUpdated")]
    WalletUpdated,
}

/// Messages the client emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    JoinUserRoom { user_id: String },
    JoinAdminRoom,
}

impl OutboundMessage {
    pub fn for_room(room: &Room) -> Self {
        match room {
            Room::User(id) => OutboundMessage::JoinUserRoom { user_id: id.clone() },
            Room::Admin => OutboundMessage::JoinAdminRoom,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutboundMessage::JoinUserRoom { .. } => "join_user_room",
            OutboundMessage::JoinAdminRoom => "join_admin_room",
        }
    }

    /// Event arguments following the name.
    pub fn args(&self) -> Vec<Value> {
        match self {
            OutboundMessage::JoinUserRoom { user_id } => vec![json!(user_id)],
            OutboundMessage::JoinAdminRoom => Vec::new(),
        }
    }
}
