//! In-memory collections the reconciler mutates.
//!
//! These types are pure data plus their merge rules; they know nothing about
//! the channel, persistence or observers.

use crate::entity::{Entity, Order, OrderPatch, Product, Wallet};
use crate::notification::NotificationRecord;
use serde::{Deserialize, Serialize};

/// Default cap on retained notification records.
pub const DEFAULT_MAX_NOTIFICATIONS: usize = 100;

/// Newest-first notification list with its unread counter.
///
/// Ids are unique, and the counter never goes below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationList {
    records: Vec<NotificationRecord>,
    unread_count: u32,
    max_records: usize,
}

impl Default for NotificationList {
    fn default() -> Self {
        Self::with_capacity_limit(DEFAULT_MAX_NOTIFICATIONS)
    }
}

impl NotificationList {
    pub fn with_capacity_limit(max_records: usize) -> Self {
        Self {
            records: Vec::new(),
            unread_count: 0,
            max_records: max_records.max(1),
        }
    }

    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&NotificationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Replaces the whole list with persisted state.
    ///
    /// Duplicate ids keep their first (newest) occurrence. The persisted
    /// counter is clamped to the unread records actually kept.
    pub fn restore(&mut self, records: Vec<NotificationRecord>, unread_count: u32) {
        let mut seen = std::collections::HashSet::new();
        self.records = records
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .take(self.max_records)
            .collect();
        let kept_unread = self.records.iter().filter(|r| !r.read).count();
        self.unread_count = unread_count.min(u32::try_from(kept_unread).unwrap_or(u32::MAX));
    }

    /// Prepends a record and bumps the counter.
    ///
    /// Returns false (and changes nothing) if the id is already present.
    pub fn insert(&mut self, record: NotificationRecord) -> bool {
        if self.get(&record.id).is_some() {
            return false;
        }
        let unread = !record.read;
        self.records.insert(0, record);
        if unread {
            self.unread_count = self.unread_count.saturating_add(1);
        }
        while self.records.len() > self.max_records {
            if let Some(evicted) = self.records.pop()
                && !evicted.read
            {
                self.unread_count = self.unread_count.saturating_sub(1);
            }
        }
        true
    }

    /// Marks one record read. No-op if absent or already read.
    pub fn mark_as_read(&mut self, id: &str) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) if !record.read => {
                record.read = true;
                self.unread_count = self.unread_count.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    /// Marks every record read and zeroes the counter.
    pub fn mark_all_as_read(&mut self) -> bool {
        let changed = self.unread_count != 0 || self.records.iter().any(|r| !r.read);
        for record in &mut self.records {
            record.read = true;
        }
        self.unread_count = 0;
        changed
    }

    /// Deletes one record, adjusting the counter if it was unread.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(index) = self.records.iter().position(|r| r.id == id) else {
            return false;
        };
        let removed = self.records.remove(index);
        if !removed.read {
            self.unread_count = self.unread_count.saturating_sub(1);
        }
        true
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.unread_count = 0;
    }
}

/// Id-keyed collection with an optional "currently selected" entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityList<T> {
    items: Vec<T>,
    selected: Option<T>,
}

impl<T> Default for EntityList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected: None,
        }
    }
}

impl<T: Entity> EntityList<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn selected(&self) -> Option<&T> {
        self.selected.as_ref()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replaces the collection (REST hand-off).
    pub fn seed(&mut self, items: Vec<T>) {
        self.items = items;
        if let Some(selected) = &self.selected {
            self.selected = self.get(selected.id()).cloned();
        }
    }

    /// Selects an entity from the collection; `None` clears the selection.
    pub fn select(&mut self, id: Option<&str>) -> bool {
        self.selected = id.and_then(|id| self.get(id).cloned());
        self.selected.is_some()
    }

    /// Replaces in place, or inserts at the front when new.
    ///
    /// Returns true if the entity was newly inserted.
    pub fn upsert(&mut self, item: T) -> bool {
        if let Some(selected) = &mut self.selected
            && selected.id() == item.id()
        {
            *selected = item.clone();
        }
        match self.items.iter_mut().find(|existing| existing.id() == item.id()) {
            Some(existing) => {
                *existing = item;
                false
            }
            None => {
                self.items.insert(0, item);
                true
            }
        }
    }

    /// Removes by id, clearing the selection if it matches.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        if self.selected.as_ref().is_some_and(|s| s.id() == id) {
            self.selected = None;
        }
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(index))
    }
}

impl EntityList<Order> {
    /// Merges a partial update into an existing order, or inserts it.
    pub fn patch(&mut self, patch: &OrderPatch) -> bool {
        let merged = match self.get(&patch.id) {
            Some(existing) => {
                let mut order = existing.clone();
                order.apply_patch(patch);
                order
            }
            None => match self.selected.as_ref().filter(|s| s.id == patch.id) {
                Some(selected) => {
                    let mut order = selected.clone();
                    order.apply_patch(patch);
                    order
                }
                None => patch.clone().into_order(),
            },
        };
        self.upsert(merged)
    }
}

/// Product catalog state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductCatalog {
    pub products: EntityList<Product>,
    pub featured: Vec<Product>,
    /// Server-side total, used for pagination.
    pub total: u64,
}

impl ProductCatalog {
    pub fn seed(&mut self, products: Vec<Product>, featured: Vec<Product>, total: u64) {
        self.products.seed(products);
        self.featured = featured;
        self.total = total;
    }

    pub fn upsert(&mut self, product: Product) {
        if let Some(featured) = self.featured.iter_mut().find(|p| p.id == product.id) {
            *featured = product.clone();
        }
        if self.products.upsert(product) {
            self.total = self.total.saturating_add(1);
        }
    }

    /// Removes the product everywhere it appears.
    pub fn remove(&mut self, id: &str) -> bool {
        self.featured.retain(|p| p.id != id);
        let removed = self.products.remove(id).is_some();
        if removed {
            self.total = self.total.saturating_sub(1);
        }
        removed
    }
}

/// Everything the reconciler owns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    pub notifications: NotificationList,
    pub orders: EntityList<Order>,
    pub catalog: ProductCatalog,
    pub wallet: Wallet,
}

impl StoreState {
    pub fn with_notification_limit(max_records: usize) -> Self {
        Self {
            notifications: NotificationList::with_capacity_limit(max_records),
            ..Default::default()
        }
    }
}
