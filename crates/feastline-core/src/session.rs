//! Authenticated session model.
//!
//! Sessions are owned by the authentication subsystem; the sync core only
//! reads them to decide room membership and notification filtering.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Server-declared role of the signed-in user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
pub enum Role {
    #[serde(rename = "customer")]
    #[strum(to_string = "customer", serialize = "user")]
    Customer,
    #[serde(rename = "admin")]
    #[strum(serialize = "admin")]
    Admin,
    #[serde(rename = "super-admin", alias = "superadmin", alias = "super_admin")]
    #[strum(to_string = "super-admin", serialize = "superadmin", serialize = "super_admin")]
    SuperAdmin,
}

impl Role {
    /// All roles, in policy-table order.
    pub const ALL: [Role; 3] = [Role::Customer, Role::Admin, Role::SuperAdmin];

    /// Returns true for roles that join the admin room.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

/// The authenticated identity driving room membership and event filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Backend user id; the user room is keyed by it.
    pub user_id: String,
    pub role: Role,
    /// Presence flag as reported by the auth layer.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            active: true,
        }
    }
}
