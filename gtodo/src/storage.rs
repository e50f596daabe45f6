//! Storage layer interface and implementations

pub mod sqlite;

use crate::types::*;
use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::watch;

/// Metadata key holding [`QueryParams::fingerprint`](crate::query::QueryParams::fingerprint)
/// of the query the cached rows were fetched for.
pub const QUERY_FINGERPRINT_KEY: &str = "query_fingerprint";

/// Storage covers the local issue store and the page-key table.
///
/// Writers other than the sync mediator are limited to [`Storage::clear_all`]
/// (cache invalidation on logout). Every committed write bumps the
/// invalidation generation published through [`Storage::subscribe`].
pub trait Storage: Send + Sync {
    // Todo rows
    fn upsert_todos(&self, todos: &[TodoShow]) -> Result<()>;
    fn scan_todos(&self, order: SortOrder, offset: usize, limit: usize) -> Result<Vec<TodoShow>>;
    fn find_todo_by_number(&self, number: &str) -> Result<Option<TodoShow>>;
    fn count_todos(&self) -> Result<usize>;
    fn clear_todos(&self) -> Result<()>;

    // Page keys
    fn upsert_page_keys(&self, keys: &[NewPageKey]) -> Result<()>;
    fn find_page_key_by_issue_id(&self, issue_id: i64) -> Result<Option<PageKey>>;
    fn find_most_recent_page_key(&self) -> Result<Option<PageKey>>;
    fn clear_page_keys(&self) -> Result<()>;

    // Reconciliation
    /// Writes one fetched page atomically. REFRESH clears both tables and the
    /// query fingerprint first; on any error nothing of this call is visible.
    fn apply_page(&self, kind: LoadKind, keys: &[NewPageKey], todos: &[TodoShow]) -> Result<()>;
    /// Clears both tables and all metadata in one transaction.
    fn clear_all(&self) -> Result<()>;

    // Metadata
    fn set_metadata(&self, key: &str, value: &str) -> Result<()>;
    fn get_metadata(&self, key: &str) -> Result<Option<String>>;

    // Invalidation
    fn subscribe(&self) -> watch::Receiver<u64>;

    // Database path
    fn path(&self) -> &str;
}

/// Config holds database configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: String,
    pub path: PathBuf,
}

impl Config {
    pub fn sqlite(path: PathBuf) -> Self {
        Config {
            backend: "sqlite".to_string(),
            path,
        }
    }

    /// Open the configured backend.
    pub fn open(&self) -> Result<sqlite::SqliteStorage> {
        match self.backend.as_str() {
            "sqlite" => sqlite::SqliteStorage::new(self.path.clone()),
            other => anyhow::bail!("unsupported storage backend: {}", other),
        }
    }
}
