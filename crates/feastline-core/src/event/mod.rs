//! Event channel catalog.
//!
//! [`EventName`] lists every message the channel understands, [`payload`]
//! holds the wire shapes, and [`DomainEvent`] is the normalized tagged union
//! the router hands to the reconciler and the side-effect dispatcher.

pub mod domain;
pub mod inbound;
pub mod name;
pub mod payload;

pub use domain::{DomainEvent, EventKind};
pub use inbound::InboundEvent;
pub use name::{EventName, OutboundMessage};
