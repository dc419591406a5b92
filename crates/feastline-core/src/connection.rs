//! Connection model for the event channel.
//!
//! A [`ConnectionInfo`] is the observable snapshot of the single live
//! channel a session owns. Only the channel manager mutates it.

use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle state of the event channel.
///
/// ```text
/// disconnected --open--> connecting --handshake ok--> connected
/// connected --transport drop--> reconnecting --retries exhausted--> failed
/// connected | reconnecting | failed --close--> disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Disconnected, Connecting) => true,
            (Connecting, Connected) => true,
            // initial handshake failures retry through the same policy
            (Connecting, Reconnecting) => true,
            (Connected, Reconnecting) => true,
            (Reconnecting, Connected) => true,
            (Reconnecting, Reconnecting) => true,
            (Reconnecting, Failed) => true,
            (Connecting, Failed) => true,
            // manual retry
            (Failed, Connecting) => true,
            (_, Disconnected) => self != Disconnected,
            _ => false,
        }
    }

    /// Returns true while the manager still holds a live or pending connection.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Reconnecting
        )
    }
}

/// Server-side subscription scoping which events a connection receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Room {
    User(String),
    Admin,
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::User(id) => write!(f, "user:{}", id),
            Room::Admin => write!(f, "admin"),
        }
    }
}

/// Concrete transport carrying the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransportKind {
    Websocket,
    Polling,
}

/// Snapshot of the single connection owned by the channel manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub id: Uuid,
    pub state: ConnectionState,
    /// Consecutive failed attempts since the last successful handshake.
    pub reconnect_attempts: u32,
    pub rooms: BTreeSet<Room>,
    pub transport: Option<TransportKind>,
    pub session: Session,
}

impl ConnectionInfo {
    pub fn new(session: Session) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            rooms: BTreeSet::new(),
            transport: None,
            session,
        }
    }

    /// Rooms this connection should join after a successful handshake.
    pub fn rooms_for(session: &Session) -> Vec<Room> {
        let mut rooms = vec![Room::User(session.user_id.clone())];
        if session.role.is_admin() {
            rooms.push(Room::Admin);
        }
        rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[test]
    fn test_documented_transitions_are_legal() {
        use ConnectionState::*;
        assert!(Disconnected.can_transition_to(Connecting));
        assert!(Connecting.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Reconnecting));
        assert!(Reconnecting.can_transition_to(Failed));
        assert!(Connected.can_transition_to(Disconnected));
        assert!(Failed.can_transition_to(Disconnected));
    }

    #[test]
    fn test_illegal_transitions() {
        use ConnectionState::*;
        assert!(!Disconnected.can_transition_to(Connected));
        assert!(!Failed.can_transition_to(Connected));
        assert!(!Disconnected.can_transition_to(Disconnected));
    }

    #[test]
    fn test_rooms_for_customer_and_admin() {
        let customer = Session::new("u1", Role::Customer);
        assert_eq!(ConnectionInfo::rooms_for(&customer), vec![Room::User("u1".into())]);

        let admin = Session::new("a1", Role::SuperAdmin);
        assert_eq!(
            ConnectionInfo::rooms_for(&admin),
            vec![Room::User("a1".into()), Room::Admin]
        );
    }

    #[test]
    fn test_room_display() {
        assert_eq!(Room::User("42".into()).to_string(), "user:42");
        assert_eq!(Room::Admin.to_string(), "admin");
    }
}
