//! Transient user feedback for delivered events.
//!
//! The dispatcher turns a [`DomainEvent`] into a [`Notice`] and hands it to
//! a [`ToastSink`], then optionally plays an [`AudioCue`]. It never touches
//! the store. Sound failures are logged at debug level only.

use crate::router::{EventListener, Propagation};
use feastline_core::config::NotificationSettings;
use feastline_core::entity::OrderStatus;
use feastline_core::error::Result;
use feastline_core::event::{DomainEvent, EventKind};
use feastline_core::session::Session;
use std::sync::Arc;
use std::time::Duration;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NoticeTone {
    Success,
    Info,
    Error,
}

/// A toast ready to be shown.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: EventKind,
    pub title: String,
    pub message: String,
    pub icon: &'static str,
    pub tone: NoticeTone,
    /// Whether an audible cue accompanies the toast.
    pub sound: bool,
    pub duration: Duration,
}

/// Presents toasts (terminal, desktop notification, test recorder...).
pub trait ToastSink: Send + Sync {
    fn show(&self, notice: &Notice);
}

/// Plays the notification sound.
pub trait AudioCue: Send + Sync {
    fn play(&self, notice: &Notice) -> Result<()>;
}

/// Icon and tone for an order status.
pub fn status_presentation(status: OrderStatus) -> (&'static str, NoticeTone) {
    let icon = match status {
        OrderStatus::Pending => "⏳",
        OrderStatus::Accepted => "👍",
        OrderStatus::Confirmed => "✅",
        OrderStatus::Preparing => "👨‍🍳",
        OrderStatus::Ready => "📦",
        OrderStatus::OutForDelivery => "🚚",
        OrderStatus::Delivered => "🎉",
        OrderStatus::Cancelled => "❌",
        OrderStatus::Rejected => "🚫",
    };
    let tone = if status.is_failure() {
        NoticeTone::Error
    } else {
        NoticeTone::Success
    };
    (icon, tone)
}

fn kind_presentation(kind: EventKind) -> (&'static str, NoticeTone) {
    match kind {
        EventKind::General => ("🔔", NoticeTone::Info),
        EventKind::NewOrder => ("🛒", NoticeTone::Success),
        EventKind::OrderStatusUpdated => ("📋", NoticeTone::Info),
        EventKind::DeliveryTrackingUpdate => ("📍", NoticeTone::Info),
        EventKind::OrderCancelled => ("❌", NoticeTone::Error),
        EventKind::PaymentConfirmed => ("💳", NoticeTone::Success),
        EventKind::WalletUpdated => ("👛", NoticeTone::Info),
        EventKind::ProductCreated | EventKind::ProductUpdated | EventKind::ProductDeleted => {
            ("🍽", NoticeTone::Info)
        }
    }
}

pub struct SideEffectDispatcher {
    settings: NotificationSettings,
    toasts: Arc<dyn ToastSink>,
    audio: Option<Arc<dyn AudioCue>>,
}

impl SideEffectDispatcher {
    pub fn new(
        settings: NotificationSettings,
        toasts: Arc<dyn ToastSink>,
        audio: Option<Arc<dyn AudioCue>>,
    ) -> Self {
        Self {
            settings,
            toasts,
            audio,
        }
    }

    /// Builds the notice for `event`, or `None` if it shows nothing.
    ///
    /// Notification-bearing events and wallet updates produce notices;
    /// catalog changes are silent.
    pub fn notice_for(&self, event: &DomainEvent) -> Option<Notice> {
        let kind = event.kind();
        let presentation = self.settings.presentation_for(kind);
        if !presentation.toast {
            return None;
        }

        let (title, message) = match (event.notification(), event) {
            (Some(record), _) => (
                record.title.clone().unwrap_or_else(|| "Notification".to_string()),
                record.message.clone(),
            ),
            (None, DomainEvent::WalletUpdated(wallet)) => (
                "Wallet Updated".to_string(),
                format!("Your balance is now {:.2}", wallet.balance),
            ),
            (None, _) => return None,
        };

        let (icon, tone) = match event {
            DomainEvent::OrderStatusUpdated { .. } | DomainEvent::NewOrder { .. } => event
                .order_status()
                .map(status_presentation)
                .unwrap_or_else(|| kind_presentation(kind)),
            _ => kind_presentation(kind),
        };

        Some(Notice {
            kind,
            title,
            message,
            icon,
            tone,
            sound: self.settings.sound_enabled && presentation.sound,
            duration: Duration::from_millis(
                presentation
                    .duration_ms
                    .unwrap_or(self.settings.toast_duration_ms),
            ),
        })
    }

    pub fn dispatch(&self, event: &DomainEvent) {
        let Some(notice) = self.notice_for(event) else {
            return;
        };

        tracing::debug!("[Notice] {} {}: {}", notice.icon, notice.title, notice.message);
        self.toasts.show(&notice);

        if notice.sound
            && let Some(audio) = &self.audio
            && let Err(err) = audio.play(&notice)
        {
            tracing::debug!("[Notice] Sound not played: {}", err);
        }
    }
}

impl EventListener for SideEffectDispatcher {
    fn on_event(&self, event: &DomainEvent, _session: &Session) -> Propagation {
        self.dispatch(event);
        Propagation::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use feastline_core::FeastlineError;
    use feastline_core::config::EventPresentation;
    use feastline_core::entity::{OrderPatch, Product, Wallet};
    use feastline_core::notification::{NotificationRecord, NotificationType};
    use serde_json::Map;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        shown: Mutex<Vec<Notice>>,
    }

    impl ToastSink for RecordingSink {
        fn show(&self, notice: &Notice) {
            self.shown.lock().unwrap().push(notice.clone());
        }
    }

    struct BlockedAudio {
        attempts: Mutex<u32>,
    }

    impl AudioCue for BlockedAudio {
        fn play(&self, _notice: &Notice) -> Result<()> {
            *self.attempts.lock().unwrap() += 1;
            Err(FeastlineError::Audio("autoplay blocked".to_string()))
        }
    }

    fn status_event(status: &str) -> DomainEvent {
        DomainEvent::OrderStatusUpdated {
            notification: NotificationRecord::new(
                "n1",
                NotificationType::OrderStatusUpdated,
                "update",
                Utc::now(),
            )
            .with_title("Order Update"),
            patch: OrderPatch {
                id: "o1".to_string(),
                status: Some(status.to_string()),
                fields: Map::new(),
            },
        }
    }

    fn dispatcher(settings: NotificationSettings) -> (SideEffectDispatcher, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        (SideEffectDispatcher::new(settings, sink.clone(), None), sink)
    }

    #[test]
    fn test_status_icons_are_distinct() {
        use strum::IntoEnumIterator;
        let icons: std::collections::HashSet<_> =
            OrderStatus::iter().map(|s| status_presentation(s).0).collect();
        assert_eq!(icons.len(), OrderStatus::iter().count());
    }

    #[test]
    fn test_status_tone_follows_status() {
        let (dispatcher, _) = dispatcher(NotificationSettings::default());
        let delivered = dispatcher.notice_for(&status_event("delivered")).unwrap();
        assert_eq!(delivered.tone, NoticeTone::Success);
        assert_eq!(delivered.icon, "🎉");

        let rejected = dispatcher.notice_for(&status_event("rejected")).unwrap();
        assert_eq!(rejected.tone, NoticeTone::Error);
        assert_eq!(rejected.title, "Order Update");
    }

    #[test]
    fn test_audio_failure_does_not_block_toast() {
        let sink = Arc::new(RecordingSink::default());
        let audio = Arc::new(BlockedAudio {
            attempts: Mutex::new(0),
        });
        let dispatcher = SideEffectDispatcher::new(
            NotificationSettings::default(),
            sink.clone(),
            Some(audio.clone() as Arc<dyn AudioCue>),
        );

        dispatcher.dispatch(&status_event("ready"));
        assert_eq!(sink.shown.lock().unwrap().len(), 1);
        assert_eq!(*audio.attempts.lock().unwrap(), 1);
    }

    #[test]
    fn test_per_event_overrides() {
        let mut settings = NotificationSettings::default();
        settings.events.insert(
            EventKind::OrderStatusUpdated,
            EventPresentation {
                toast: true,
                sound: false,
                duration_ms: Some(1500),
            },
        );
        settings.events.insert(
            EventKind::PaymentConfirmed,
            EventPresentation {
                toast: false,
                sound: false,
                duration_ms: None,
            },
        );
        let (dispatcher, sink) = dispatcher(settings);

        let notice = dispatcher.notice_for(&status_event("ready")).unwrap();
        assert!(!notice.sound);
        assert_eq!(notice.duration, Duration::from_millis(1500));

        dispatcher.dispatch(&DomainEvent::PaymentConfirmed {
            notification: NotificationRecord::new(
                "n2",
                NotificationType::PaymentConfirmed,
                "paid",
                Utc::now(),
            ),
            order_id: "o1".to_string(),
        });
        assert!(sink.shown.lock().unwrap().is_empty());
    }

    #[test]
    fn test_sound_disabled_globally() {
        let settings = NotificationSettings {
            sound_enabled: false,
            ..Default::default()
        };
        let (dispatcher, _) = dispatcher(settings);
        assert!(!dispatcher.notice_for(&status_event("ready")).unwrap().sound);
    }

    #[test]
    fn test_catalog_changes_are_silent_and_wallet_is_not() {
        let (dispatcher, _) = dispatcher(NotificationSettings::default());
        assert!(dispatcher.notice_for(&DomainEvent::ProductCreated(Product::new("p1"))).is_none());

        let notice = dispatcher
            .notice_for(&DomainEvent::WalletUpdated(Wallet {
                balance: 3.5,
                transactions: Vec::new(),
            }))
            .unwrap();
        assert_eq!(notice.message, "Your balance is now 3.50");
    }
}
