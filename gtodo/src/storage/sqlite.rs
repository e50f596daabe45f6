//! SQLite storage implementation

use crate::storage::{Storage, QUERY_FINGERPRINT_KEY};
use crate::types::*;
use anyhow::{anyhow, Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

const SCHEMA: &str = include_str!("sqlite_schema.sql");

/// Bump when the layout in `sqlite_schema.sql` changes. The cache can always
/// be rebuilt from the remote, so a mismatch drops the tables instead of
/// migrating them.
const SCHEMA_VERSION: i32 = 2;

const TODO_COLUMNS: &str = "id, number, title, state, updated_at, created_at, labels, header_title";

/// SQLite storage implementation
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    invalidation: watch::Sender<u64>,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create database directory {:?}", parent))?;
            }
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;
        Self::with_connection(conn, path)
    }

    /// Create a storage instance that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, path: PathBuf) -> Result<Self> {
        let (invalidation, _) = watch::channel(0);
        let storage = SqliteStorage {
            conn: Arc::new(Mutex::new(conn)),
            path,
            invalidation,
        };

        storage.initialize_schema()?;
        Ok(storage)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("storage connection mutex poisoned"))
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version != 0 && version != SCHEMA_VERSION {
            log::warn!(
                "cache schema version {} does not match {}, rebuilding cache",
                version,
                SCHEMA_VERSION
            );
            conn.execute_batch(
                "DROP TABLE IF EXISTS page_keys;
                 DROP TABLE IF EXISTS todo_shows;
                 DROP TABLE IF EXISTS metadata;",
            )?;
        }

        conn.execute_batch(SCHEMA)?;
        conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
        Ok(())
    }

    /// Publish that committed contents changed.
    fn invalidate(&self) {
        self.invalidation.send_modify(|generation| *generation += 1);
    }
}

fn todo_from_row(row: &Row<'_>) -> rusqlite::Result<TodoShow> {
    let state: String = row.get(3)?;
    let labels: String = row.get(6)?;
    let labels: Vec<TodoLabel> = serde_json::from_str(&labels)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(TodoShow {
        id: row.get(0)?,
        number: row.get(1)?,
        title: row.get(2)?,
        state: TodoState::parse(&state).unwrap_or(TodoState::Unknown),
        updated_at: row.get(4)?,
        created_at: row.get(5)?,
        labels,
        header_title: row.get(7)?,
    })
}

fn page_key_from_row(row: &Row<'_>) -> rusqlite::Result<PageKey> {
    Ok(PageKey {
        id: row.get(0)?,
        issue_id: row.get(1)?,
        prev_key: row.get(2)?,
        next_key: row.get(3)?,
    })
}

fn insert_todos(conn: &Connection, todos: &[TodoShow]) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO todo_shows (
            id, number, title, state, updated_at, created_at, labels, header_title
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )?;

    for todo in todos {
        stmt.execute(params![
            todo.id,
            todo.number,
            todo.title,
            todo.state.as_str(),
            todo.updated_at,
            todo.created_at,
            serde_json::to_string(&todo.labels)?,
            todo.header_title,
        ])
        .with_context(|| format!("Failed to write todo {}", todo.id))?;
    }
    Ok(())
}

fn insert_page_keys(conn: &Connection, keys: &[NewPageKey]) -> Result<()> {
    // REPLACE deletes the old row for the issue, so the new one gets a fresh
    // surrogate id and becomes the most recent.
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO page_keys (issue_id, prev_key, next_key) VALUES (?, ?, ?)",
    )?;

    for key in keys {
        stmt.execute(params![key.issue_id, key.prev_key, key.next_key])
            .with_context(|| format!("Failed to write page key for issue {}", key.issue_id))?;
    }
    Ok(())
}

fn delete_everything(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM page_keys", [])?;
    conn.execute("DELETE FROM todo_shows", [])?;
    Ok(())
}

impl Storage for SqliteStorage {
    fn upsert_todos(&self, todos: &[TodoShow]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        insert_todos(&tx, todos)?;
        tx.commit()?;
        drop(conn);

        self.invalidate();
        Ok(())
    }

    fn scan_todos(&self, order: SortOrder, offset: usize, limit: usize) -> Result<Vec<TodoShow>> {
        let conn = self.lock()?;

        let direction = match order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let query = format!(
            "SELECT {} FROM todo_shows ORDER BY updated_at {dir}, id {dir} LIMIT ? OFFSET ?",
            TODO_COLUMNS,
            dir = direction
        );

        let mut stmt = conn.prepare_cached(&query)?;
        let todos = stmt
            .query_map(params![limit as i64, offset as i64], todo_from_row)?
            .collect::<Result<Vec<TodoShow>, _>>()?;
        Ok(todos)
    }

    fn find_todo_by_number(&self, number: &str) -> Result<Option<TodoShow>> {
        let conn = self.lock()?;

        let todo = conn
            .query_row(
                &format!("SELECT {} FROM todo_shows WHERE number = ?", TODO_COLUMNS),
                params![number],
                todo_from_row,
            )
            .optional()?;
        Ok(todo)
    }

    fn count_todos(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM todo_shows", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn clear_todos(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM todo_shows", [])?;
        drop(conn);

        self.invalidate();
        Ok(())
    }

    fn upsert_page_keys(&self, keys: &[NewPageKey]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        insert_page_keys(&tx, keys)?;
        tx.commit()?;
        Ok(())
    }

    fn find_page_key_by_issue_id(&self, issue_id: i64) -> Result<Option<PageKey>> {
        let conn = self.lock()?;
        let key = conn
            .query_row(
                "SELECT id, issue_id, prev_key, next_key FROM page_keys WHERE issue_id = ?",
                params![issue_id],
                page_key_from_row,
            )
            .optional()?;
        Ok(key)
    }

    fn find_most_recent_page_key(&self) -> Result<Option<PageKey>> {
        let conn = self.lock()?;
        let key = conn
            .query_row(
                "SELECT id, issue_id, prev_key, next_key FROM page_keys ORDER BY id DESC LIMIT 1",
                [],
                page_key_from_row,
            )
            .optional()?;
        Ok(key)
    }

    fn clear_page_keys(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM page_keys", [])?;
        Ok(())
    }

    fn apply_page(&self, kind: LoadKind, keys: &[NewPageKey], todos: &[TodoShow]) -> Result<()> {
        let mut conn = self.lock()?;

        // Dropping `tx` on any early return rolls back, including the clear.
        let tx = conn.transaction()?;
        if kind == LoadKind::Refresh {
            delete_everything(&tx).context("Failed to clear previous generation")?;
            tx.execute(
                "DELETE FROM metadata WHERE key = ?",
                params![QUERY_FINGERPRINT_KEY],
            )?;
        }
        insert_page_keys(&tx, keys)?;
        insert_todos(&tx, todos)?;
        tx.commit().context("Failed to commit page")?;
        drop(conn);

        self.invalidate();
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        delete_everything(&tx)?;
        tx.execute("DELETE FROM metadata", [])?;
        tx.commit()?;
        drop(conn);

        self.invalidate();
        Ok(())
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM metadata WHERE key = ?", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.invalidation.subscribe()
    }

    fn path(&self) -> &str {
        self.path.to_str().unwrap_or("")
    }
}
