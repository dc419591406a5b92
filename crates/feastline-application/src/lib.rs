//! Application layer for Feastline.
//!
//! Coordinates the event channel with the client-side store: the router
//! classifies inbound events, the reconciler applies them to the shared
//! store, and the dispatcher raises toasts. [`SyncService`] ties the whole
//! pipeline to a signed-in session.

pub mod dispatcher;
pub mod reconciler;
pub mod router;
pub mod store;
pub mod sync_service;

pub use dispatcher::{AudioCue, Notice, NoticeTone, SideEffectDispatcher, ToastSink};
pub use reconciler::StateReconciler;
pub use router::{EventListener, EventRouter, Propagation, Subscription};
pub use store::SharedStore;
pub use sync_service::{SyncDependencies, SyncService};
