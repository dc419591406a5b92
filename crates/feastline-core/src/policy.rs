//! Delivery policy: which roles see which event kinds.
//!
//! The table is consulted by the router before any handler runs, so audience
//! filtering is testable without a transport.

use crate::event::EventKind;
use crate::session::Role;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use strum::IntoEnumIterator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    Deliver,
    Drop,
}

/// Per-kind, per-role overrides as written in configuration.
pub type DeliveryOverrides = BTreeMap<EventKind, BTreeMap<Role, Delivery>>;

/// Event kind × role → deliver/drop.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPolicy {
    rules: HashMap<(EventKind, Role), Delivery>,
}

impl Default for DeliveryPolicy {
    /// The stock table.
    ///
    /// New-order alerts go to staff only, status changes to customers only.
    /// Super-admins are treated as admins.
    fn default() -> Self {
        let mut rules = HashMap::new();
        for kind in EventKind::iter() {
            for role in Role::ALL {
                let delivery = match kind {
                    EventKind::NewOrder if !role.is_admin() => Delivery::Drop,
                    EventKind::OrderStatusUpdated if role.is_admin() => Delivery::Drop,
                    _ => Delivery::Deliver,
                };
                rules.insert((kind, role), delivery);
            }
        }
        Self { rules }
    }
}

impl DeliveryPolicy {
    /// Stock table with configuration overrides applied on top.
    pub fn with_overrides(overrides: &DeliveryOverrides) -> Self {
        let mut policy = Self::default();
        for (kind, roles) in overrides {
            for (role, delivery) in roles {
                policy.set(*kind, *role, *delivery);
            }
        }
        policy
    }

    pub fn set(&mut self, kind: EventKind, role: Role, delivery: Delivery) {
        self.rules.insert((kind, role), delivery);
    }

    pub fn decide(&self, kind: EventKind, role: Role) -> Delivery {
        self.rules
            .get(&(kind, role))
            .copied()
            .unwrap_or(Delivery::Deliver)
    }

    pub fn delivers(&self, kind: EventKind, role: Role) -> bool {
        self.decide(kind, role) == Delivery::Deliver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_order_is_staff_only() {
        let policy = DeliveryPolicy::default();
        assert!(!policy.delivers(EventKind::NewOrder, Role::Customer));
        assert!(policy.delivers(EventKind::NewOrder, Role::Admin));
        assert!(policy.delivers(EventKind::NewOrder, Role::SuperAdmin));
    }

    #[test]
    fn test_status_updates_are_customer_only() {
        let policy = DeliveryPolicy::default();
        assert!(policy.delivers(EventKind::OrderStatusUpdated, Role::Customer));
        assert!(!policy.delivers(EventKind::OrderStatusUpdated, Role::Admin));
        assert!(!policy.delivers(EventKind::OrderStatusUpdated, Role::SuperAdmin));
    }

    #[test]
    fn test_everything_else_is_delivered() {
        let policy = DeliveryPolicy::default();
        for kind in [
            EventKind::General,
            EventKind::DeliveryTrackingUpdate,
            EventKind::OrderCancelled,
            EventKind::PaymentConfirmed,
            EventKind::ProductCreated,
            EventKind::ProductUpdated,
            EventKind::ProductDeleted,
            EventKind::WalletUpdated,
        ] {
            for role in Role::ALL {
                assert!(policy.delivers(kind, role), "{kind} should reach {role}");
            }
        }
    }

    #[test]
    fn test_overrides_from_toml() {
        let overrides: DeliveryOverrides = toml::from_str(
            r#"
            [order_status_updated]
            super-admin = "deliver"
            "#,
        )
        .unwrap();
        let policy = DeliveryPolicy::with_overrides(&overrides);
        assert!(policy.delivers(EventKind::OrderStatusUpdated, Role::SuperAdmin));
        assert!(!policy.delivers(EventKind::OrderStatusUpdated, Role::Admin));
    }
}
