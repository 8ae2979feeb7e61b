use std::sync::Mutex;

use crate::config::ItemConfig;
use crate::models::{Item, StockStatus};

struct Entry {
    item: Item,
    last_status: Mutex<Option<StockStatus>>,
}

/// Fixed set of watched items, in configuration order, each carrying the last
/// status observed for it.
///
/// The item list never changes after construction. Only the status cells are
/// mutated, one per item, through [`ItemRegistry::update_status`].
pub struct ItemRegistry {
    entries: Vec<Entry>,
}

impl ItemRegistry {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            entries: items
                .into_iter()
                .map(|item| Entry {
                    item,
                    last_status: Mutex::new(None),
                })
                .collect(),
        }
    }

    pub fn from_config(items: &[ItemConfig]) -> Self {
        Self::new(items.iter().map(Item::from).collect())
    }

    pub fn all(&self) -> impl Iterator<Item = &Item> + '_ {
        self.entries.iter().map(|e| &e.item)
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.entries.get(index).map(|e| &e.item)
    }

    pub fn last_status(&self, index: usize) -> Option<StockStatus> {
        let entry = self.entries.get(index)?;
        *lock(&entry.last_status)
    }

    /// Store `status` for the item and return what was recorded before.
    ///
    /// The read and the write happen under one lock, so two concurrent updates
    /// for the same item always see each other's value.
    pub fn update_status(&self, index: usize, status: StockStatus) -> Option<StockStatus> {
        let entry = self.entries.get(index)?;
        lock(&entry.last_status).replace(status)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn lock(cell: &Mutex<Option<StockStatus>>) -> std::sync::MutexGuard<'_, Option<StockStatus>> {
    // The cell holds a Copy value, so a poisoned lock still holds a usable status.
    cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
