use super::EventName;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// One message as delivered by the channel, before routing.
///
/// Socket events may carry several arguments; only the first is the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub name: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            received_at: Utc::now(),
        }
    }

    /// Builds a channel-synthesized lifecycle event.
    pub fn lifecycle(name: EventName, payload: Value) -> Self {
        Self::new(name.as_ref(), payload)
    }

    /// Parsed name, `None` for events this client does not know.
    pub fn event_name(&self) -> Option<EventName> {
        self.name.parse().ok()
    }
}
