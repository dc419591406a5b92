//! Configuration model, loaded from `config.toml` by the infrastructure layer.

use crate::connection::TransportKind;
use crate::event::EventKind;
use crate::policy::DeliveryOverrides;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Endpoint used when neither the config file nor the environment sets one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Environment variable overriding `channel.base_url`.
pub const BASE_URL_ENV: &str = "FEASTLINE_SOCKET_URL";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub channel: ChannelConfig,
    pub notifications: NotificationSettings,
    pub delivery: DeliveryOverrides,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ChannelConfig {
    pub base_url: String,
    /// Handshake path on the server, Socket.IO's default unless overridden.
    pub path: String,
    /// Transports tried in order on every attempt.
    pub transports: Vec<TransportKind>,
    pub handshake_timeout_ms: u64,
    pub reconnect: ReconnectPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            path: "/socket.io/".to_string(),
            transports: vec![TransportKind::Websocket, TransportKind::Polling],
            handshake_timeout_ms: 20_000,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ChannelConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

/// Linear-then-capped reconnect backoff.
///
/// Attempt `n` (1-based) waits `min(base_delay * n, max_delay)`, optionally
/// randomized by `jitter` (a fraction of the delay, `0.0` for none). The
/// channel gives up once `max_attempts` retries have failed.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 5_000,
            max_attempts: 5,
            jitter: 0.0,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` without jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let linear = self.base_delay_ms.saturating_mul(u64::from(attempt.max(1)));
        Duration::from_millis(linear.min(self.max_delay_ms))
    }

    /// Delay before attempt `attempt`, jitter applied.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return base;
        }
        let spread = base.as_millis() as f64 * jitter;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis((base.as_millis() as f64 + offset).max(0.0) as u64)
    }

    /// True once `attempts` consecutive failures exceed the retry budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts > self.max_attempts
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NotificationSettings {
    pub sound_enabled: bool,
    pub toast_duration_ms: u64,
    /// Oldest records beyond this are dropped from the collection.
    pub max_records: usize,
    pub events: BTreeMap<EventKind, EventPresentation>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            toast_duration_ms: 4_000,
            max_records: 100,
            events: BTreeMap::new(),
        }
    }
}

impl NotificationSettings {
    pub fn presentation_for(&self, kind: EventKind) -> EventPresentation {
        self.events.get(&kind).cloned().unwrap_or_default()
    }
}

/// Per-event presentation override.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EventPresentation {
    pub toast: bool,
    pub sound: bool,
    pub duration_ms: Option<u64>,
}

impl Default for EventPresentation {
    fn default() -> Self {
        Self {
            toast: true,
            sound: true,
            duration_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.channel.base_url, DEFAULT_BASE_URL);
        assert_eq!(
            config.channel.transports,
            vec![TransportKind::Websocket, TransportKind::Polling]
        );
        assert_eq!(config.channel.reconnect.max_attempts, 5);
    }

    #[test]
    fn test_linear_then_capped_backoff() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4_000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(5_000));
        assert_eq!(policy.delay_for(9), Duration::from_millis(5_000));
    }

    #[test]
    fn test_jitter_stays_within_spread() {
        let policy = ReconnectPolicy {
            jitter: 0.5,
            ..Default::default()
        };
        for _ in 0..50 {
            let delay = policy.delay_for(2).as_millis();
            assert!((1_000..=3_000).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_exhaustion() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.is_exhausted(5));
        assert!(policy.is_exhausted(6));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [channel]
            base_url = "https://api.example.com"
            transports = ["polling"]

            [notifications.events.wallet_updated]
            sound = false
            "#,
        )
        .unwrap();
        assert_eq!(config.channel.base_url, "https://api.example.com");
        assert_eq!(config.channel.transports, vec![TransportKind::Polling]);
        assert_eq!(config.channel.reconnect, ReconnectPolicy::default());
        let wallet = config.notifications.presentation_for(EventKind::WalletUpdated);
        assert!(wallet.toast);
        assert!(!wallet.sound);
    }
}
