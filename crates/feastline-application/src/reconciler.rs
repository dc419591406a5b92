//! State reconciler: the only writer of the shared store.
//!
//! Applies normalized events and user actions to the store in arrival order
//! and mirrors notification state into the local cache after every change.
//! Cache failures are logged and never surface to callers.

use crate::router::{EventListener, Propagation};
use crate::store::SharedStore;
use feastline_core::cache::NotificationCache;
use feastline_core::entity::{DomainEntityUpdate, Order, Product};
use feastline_core::event::DomainEvent;
use feastline_core::notification::NotificationRecord;
use feastline_core::session::Session;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};

pub struct StateReconciler {
    store: SharedStore,
    cache: Arc<dyn NotificationCache>,
}

impl StateReconciler {
    pub fn new(store: SharedStore, cache: Arc<dyn NotificationCache>) -> Self {
        Self { store, cache }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Seeds notification state from the cache.
    ///
    /// Missing or unreadable data yields an empty list and a zero counter.
    pub fn restore_from_cache(&self) {
        let cached = match self.cache.load() {
            Ok(cached) => cached,
            Err(err) => {
                tracing::warn!("[Reconciler] Cache unreadable, starting empty: {}", err);
                Default::default()
            }
        };
        let count = cached.notifications.len();
        self.store.mutate(|state| {
            state
                .notifications
                .restore(cached.notifications, cached.unread_count);
            (true, ())
        });
        tracing::debug!(
            "[Reconciler] Restored {} notifications ({} unread)",
            count,
            self.store.unread_count()
        );
    }

    /// Applies one normalized event.
    ///
    /// Returns false when the event carried a notification already in the
    /// list; its entity update, if any, is still applied.
    pub fn apply(&self, event: &DomainEvent) -> bool {
        let fresh = match event.notification() {
            Some(record) => self.insert_notification(record.clone()),
            None => true,
        };
        if let Some(update) = event.entity_update() {
            self.apply_update(update);
        }
        fresh
    }

    /// Prepends a notification and bumps the unread counter.
    ///
    /// Returns false when a record with the same id is already present.
    pub fn insert_notification(&self, record: NotificationRecord) -> bool {
        let id = record.id.clone();
        let inserted = self.mutate_notifications(|state| state.notifications.insert(record));
        if !inserted {
            tracing::debug!("[Reconciler] Ignoring duplicate notification {}", id);
        }
        inserted
    }

    pub fn apply_update(&self, update: DomainEntityUpdate) {
        self.store.mutate(|state| {
            let changed = match update {
                DomainEntityUpdate::OrderUpsert(order) => {
                    state.orders.upsert(order);
                    true
                }
                DomainEntityUpdate::OrderPatch(patch) => {
                    state.orders.patch(&patch);
                    true
                }
                DomainEntityUpdate::ProductUpsert(product) => {
                    state.catalog.upsert(product);
                    true
                }
                DomainEntityUpdate::ProductRemove { id } => {
                    let removed = state.catalog.remove(&id);
                    if !removed {
                        tracing::debug!("[Reconciler] Product {} was not loaded", id);
                    }
                    removed
                }
                DomainEntityUpdate::WalletReplace(wallet) => {
                    state.wallet = wallet;
                    true
                }
            };
            (changed, ())
        });
    }

    /// Marks one notification read. No-op for unknown or already-read ids.
    pub fn mark_as_read(&self, id: &str) -> bool {
        self.mutate_notifications(|state| state.notifications.mark_as_read(id))
    }

    pub fn mark_all_as_read(&self) -> bool {
        self.mutate_notifications(|state| state.notifications.mark_all_as_read())
    }

    pub fn remove_notification(&self, id: &str) -> bool {
        self.mutate_notifications(|state| state.notifications.remove(id))
    }

    /// Empties the notification list and zeroes the counter.
    pub fn clear_all(&self) {
        self.mutate_notifications(|state| {
            state.notifications.clear();
            true
        });
    }

    /// Drops session-scoped notification state, optionally erasing the cache.
    pub fn reset_session(&self, erase_cache: bool) {
        self.store.mutate(|state| {
            state.notifications.clear();
            (true, ())
        });
        if erase_cache {
            if let Err(err) = self.cache.clear() {
                tracing::warn!("[Reconciler] Failed to erase cache: {}", err);
            } else {
                tracing::info!("[Reconciler] Erased cached notifications");
            }
        }
    }

    /// Loads orders fetched over REST.
    pub fn seed_orders(&self, orders: Vec<Order>) {
        self.store.mutate(|state| {
            state.orders.seed(orders);
            (true, ())
        });
    }

    /// Loads a catalog page fetched over REST.
    pub fn seed_products(&self, products: Vec<Product>, featured: Vec<Product>, total: u64) {
        self.store.mutate(|state| {
            state.catalog.seed(products, featured, total);
            (true, ())
        });
    }

    pub fn select_order(&self, id: Option<&str>) -> bool {
        self.store.mutate(|state| {
            let found = state.orders.select(id);
            (true, found)
        })
    }

    pub fn select_product(&self, id: Option<&str>) -> bool {
        self.store.mutate(|state| {
            let found = state.catalog.products.select(id);
            (true, found)
        })
    }

    fn mutate_notifications(
        &self,
        f: impl FnOnce(&mut feastline_core::store::StoreState) -> bool,
    ) -> bool {
        let changed = self.store.mutate(|state| {
            let changed = f(state);
            (changed, changed)
        });
        if changed {
            self.persist();
        }
        changed
    }

    fn persist(&self) {
        let (records, unread) = self.store.read(|state| {
            (
                state.notifications.records().to_vec(),
                state.notifications.unread_count(),
            )
        });
        let write = || {
            if let Err(err) = self.cache.save_notifications(&records) {
                tracing::warn!("[Reconciler] Failed to persist notifications: {}", err);
            }
            if let Err(err) = self.cache.save_unread_count(unread) {
                tracing::warn!("[Reconciler] Failed to persist unread count: {}", err);
            }
        };
        // file writes fsync; let the runtime hand other tasks to another worker
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(write)
            }
            _ => write(),
        }
    }
}

impl EventListener for StateReconciler {
    /// A repeated notification stops here, so it raises no second toast.
    fn on_event(&self, event: &DomainEvent, _session: &Session) -> Propagation {
        if self.apply(event) {
            Propagation::Continue
        } else {
            Propagation::Stop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use feastline_core::cache::CachedNotifications;
    use feastline_core::entity::{OrderPatch, Wallet};
    use feastline_core::error::Result;
    use feastline_core::notification::NotificationType;
    use serde_json::{Map, json};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockCache {
        state: Mutex<CachedNotifications>,
        fail: bool,
    }

    impl NotificationCache for MockCache {
        fn load(&self) -> Result<CachedNotifications> {
            if self.fail {
                return Err(feastline_core::FeastlineError::io("disk gone"));
            }
            Ok(self.state.lock().unwrap().clone())
        }

        fn save_notifications(&self, notifications: &[NotificationRecord]) -> Result<()> {
            if self.fail {
                return Err(feastline_core::FeastlineError::io("disk gone"));
            }
            self.state.lock().unwrap().notifications = notifications.to_vec();
            Ok(())
        }

        fn save_unread_count(&self, unread_count: u32) -> Result<()> {
            if self.fail {
                return Err(feastline_core::FeastlineError::io("disk gone"));
            }
            self.state.lock().unwrap().unread_count = unread_count;
            Ok(())
        }

        fn clear(&self) -> Result<()> {
            *self.state.lock().unwrap() = CachedNotifications::default();
            Ok(())
        }
    }

    fn record(id: &str) -> NotificationRecord {
        NotificationRecord::new(id, NotificationType::General, "hello", Utc::now())
    }

    fn reconciler() -> (StateReconciler, Arc<MockCache>) {
        let cache = Arc::new(MockCache::default());
        (StateReconciler::new(SharedStore::default(), cache.clone()), cache)
    }

    fn product(id: &str, name: &str) -> Product {
        let mut product = Product::new(id);
        product.fields.insert("name".to_string(), json!(name));
        product
    }

    #[test]
    fn test_insert_is_newest_first_and_persisted() {
        let (reconciler, cache) = reconciler();
        reconciler.insert_notification(record("n1"));
        reconciler.insert_notification(record("n2"));

        let ids: Vec<String> = reconciler.store().notifications().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["n2", "n1"]);
        assert_eq!(reconciler.store().unread_count(), 2);

        let cached = cache.state.lock().unwrap().clone();
        assert_eq!(cached.notifications.len(), 2);
        assert_eq!(cached.unread_count, 2);
    }

    #[test]
    fn test_duplicate_id_is_ignored() {
        let (reconciler, _cache) = reconciler();
        assert!(reconciler.insert_notification(record("n1")));
        assert!(!reconciler.insert_notification(record("n1")));
        assert_eq!(reconciler.store().unread_count(), 1);
    }

    #[test]
    fn test_mark_as_read_unknown_id_is_noop() {
        let (reconciler, _cache) = reconciler();
        reconciler.insert_notification(record("n1"));
        let revision = reconciler.store().revision();

        assert!(!reconciler.mark_as_read("missing"));
        assert_eq!(reconciler.store().unread_count(), 1);
        assert_eq!(reconciler.store().revision(), revision);

        assert!(reconciler.mark_as_read("n1"));
        assert!(!reconciler.mark_as_read("n1"));
        assert_eq!(reconciler.store().unread_count(), 0);
    }

    #[test]
    fn test_clear_and_mark_all() {
        let (reconciler, cache) = reconciler();
        reconciler.insert_notification(record("n1"));
        reconciler.insert_notification(record("n2"));

        assert!(reconciler.mark_all_as_read());
        assert_eq!(reconciler.store().unread_count(), 0);

        reconciler.clear_all();
        assert!(reconciler.store().notifications().is_empty());
        assert_eq!(cache.state.lock().unwrap().notifications.len(), 0);
    }

    #[test]
    fn test_remove_unread_decrements_counter() {
        let (reconciler, _cache) = reconciler();
        reconciler.insert_notification(record("n1"));
        reconciler.insert_notification(record("n2"));
        assert!(reconciler.remove_notification("n1"));
        assert!(!reconciler.remove_notification("n1"));
        assert_eq!(reconciler.store().unread_count(), 1);
    }

    #[test]
    fn test_restore_from_cache() {
        let (reconciler, cache) = reconciler();
        *cache.state.lock().unwrap() = CachedNotifications {
            notifications: vec![record("a"), record("b"), record("c")],
            unread_count: 2,
        };
        reconciler.restore_from_cache();
        assert_eq!(reconciler.store().notifications().len(), 3);
        assert_eq!(reconciler.store().unread_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_persists_from_multi_thread_runtime() {
        let (reconciler, cache) = reconciler();
        let reconciler = Arc::new(reconciler);

        let worker = reconciler.clone();
        tokio::spawn(async move {
            worker.insert_notification(record("n1"));
            worker.insert_notification(record("n2"));
        })
        .await
        .unwrap();

        let cached = cache.state.lock().unwrap().clone();
        assert_eq!(cached.notifications.len(), 2);
        assert_eq!(cached.unread_count, 2);
    }

    #[tokio::test]
    async fn test_persists_from_current_thread_runtime() {
        let (reconciler, cache) = reconciler();
        reconciler.insert_notification(record("n1"));
        assert_eq!(cache.state.lock().unwrap().unread_count, 1);
    }

    #[test]
    fn test_cache_failures_are_contained() {
        let cache = Arc::new(MockCache {
            fail: true,
            ..Default::default()
        });
        let reconciler = StateReconciler::new(SharedStore::default(), cache);
        reconciler.restore_from_cache();
        assert!(reconciler.store().notifications().is_empty());

        assert!(reconciler.insert_notification(record("n1")));
        assert_eq!(reconciler.store().unread_count(), 1);
    }

    #[test]
    fn test_product_lifecycle_in_arrival_order() {
        let (reconciler, _cache) = reconciler();
        reconciler.seed_products(vec![product("p0", "Soup")], vec![], 1);

        reconciler.apply(&DomainEvent::ProductCreated(product("p1", "Pho")));
        reconciler.apply(&DomainEvent::ProductUpdated(product("p1", "X")));
        let snapshot = reconciler.store().snapshot();
        assert_eq!(snapshot.catalog.products.items()[0].name(), Some("X"));
        assert_eq!(snapshot.catalog.total, 2);

        reconciler.apply(&DomainEvent::ProductDeleted {
            product_id: "p1".to_string(),
        });
        let snapshot = reconciler.store().snapshot();
        assert!(snapshot.catalog.products.get("p1").is_none());
        assert_eq!(snapshot.catalog.total, 1);
    }

    #[test]
    fn test_delete_clears_selection_and_featured() {
        let (reconciler, _cache) = reconciler();
        reconciler.seed_products(
            vec![product("p1", "Pho"), product("p2", "Bun")],
            vec![product("p1", "Pho")],
            2,
        );
        assert!(reconciler.select_product(Some("p1")));

        reconciler.apply_update(DomainEntityUpdate::ProductRemove { id: "p1".to_string() });
        let catalog = reconciler.store().snapshot().catalog;
        assert!(catalog.products.selected().is_none());
        assert!(catalog.featured.is_empty());
        assert_eq!(catalog.products.len(), 1);
    }

    #[test]
    fn test_order_patch_updates_selected_view() {
        let (reconciler, _cache) = reconciler();
        reconciler.seed_orders(vec![Order::new("o1"), Order::new("o2")]);
        reconciler.select_order(Some("o2"));

        reconciler.apply_update(DomainEntityUpdate::OrderPatch(OrderPatch {
            id: "o2".to_string(),
            status: Some("delivered".to_string()),
            fields: Map::new(),
        }));
        let orders = reconciler.store().snapshot().orders;
        assert_eq!(orders.items()[1].status.as_deref(), Some("delivered"));
        assert_eq!(orders.selected().unwrap().status.as_deref(), Some("delivered"));
    }

    #[test]
    fn test_wallet_is_replaced_whole() {
        let (reconciler, _cache) = reconciler();
        reconciler.apply(&DomainEvent::WalletUpdated(Wallet {
            balance: 5.0,
            transactions: vec![json!({"amount": 5})],
        }));
        reconciler.apply(&DomainEvent::WalletUpdated(Wallet {
            balance: 7.5,
            transactions: Vec::new(),
        }));
        let wallet = reconciler.store().snapshot().wallet;
        assert_eq!(wallet.balance, 7.5);
        assert!(wallet.transactions.is_empty());
    }

    #[test]
    fn test_reset_session_erases_cache() {
        let (reconciler, cache) = reconciler();
        reconciler.insert_notification(record("n1"));
        reconciler.reset_session(true);
        assert!(reconciler.store().notifications().is_empty());
        assert!(cache.state.lock().unwrap().notifications.is_empty());
    }
}
