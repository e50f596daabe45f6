//! Local-only page source over the cached rows.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;

use crate::storage::Storage;
use crate::types::{SortOrder, TodoShow};

/// One window of cached rows.
#[derive(Debug, Clone, Default)]
pub struct LocalPage {
    pub items: Vec<TodoShow>,
    /// Offset of the following window; `None` once the scan is exhausted
    pub next_offset: Option<usize>,
}

/// Pages through the store's ordered scan.
///
/// A source is bound to the store contents it was created against. Once the
/// store commits a write the source reports itself invalid, and the caller
/// must start over with a fresh one.
pub struct LocalPageSource {
    storage: Arc<dyn Storage>,
    order: SortOrder,
    invalidation: watch::Receiver<u64>,
}

impl LocalPageSource {
    pub fn new(storage: Arc<dyn Storage>, order: SortOrder) -> Self {
        let invalidation = storage.subscribe();
        LocalPageSource {
            storage,
            order,
            invalidation,
        }
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn is_invalid(&self) -> bool {
        // A dropped sender means the store is gone; nothing left is valid.
        self.invalidation.has_changed().unwrap_or(true)
    }

    pub fn load(&self, offset: usize, limit: usize) -> Result<LocalPage> {
        let items = self.storage.scan_todos(self.order, offset, limit)?;
        let next_offset = if items.len() < limit {
            None
        } else {
            Some(offset + items.len())
        };
        Ok(LocalPage { items, next_offset })
    }

    /// Reads up to `limit` rows from the start, one window at a time.
    pub fn collect(&self, limit: usize, window: usize) -> Result<Vec<TodoShow>> {
        let window = window.max(1);
        let mut rows = Vec::new();
        let mut offset = Some(0);

        while let Some(current) = offset {
            if rows.len() >= limit {
                break;
            }
            let page = self.load(current, window.min(limit - rows.len()))?;
            rows.extend(page.items);
            offset = page.next_offset;
        }
        Ok(rows)
    }
}
