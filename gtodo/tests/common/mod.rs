//! Shared fixtures: a scripted remote issue source and a store that can be
//! told to fail its writes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use tokio::sync::watch;

use gtodo::mediator::SyncMediator;
use gtodo::query::QueryParams;
use gtodo::remote::{IssuePage, IssuePageRequest, RemoteError, RemoteIssue, RemoteIssueSource, RemoteLabel};
use gtodo::storage::sqlite::SqliteStorage;
use gtodo::storage::Storage;
use gtodo::types::*;

pub const REPO: &str = "octo/tasks";

enum Scripted {
    Issues(Vec<RemoteIssue>),
    Fail(u16),
}

/// Remote source that replays scripted pages and records every request.
#[derive(Default)]
pub struct FakeRemote {
    pages: Mutex<HashMap<u32, Scripted>>,
    total_page: Mutex<Option<String>>,
    hang: AtomicBool,
    requests: Mutex<Vec<IssuePageRequest>>,
}

impl FakeRemote {
    /// `total_pages` pages of `per_page` distinct issues, newest first, with
    /// a matching `total_page` header.
    pub fn with_pages(total_pages: u32, per_page: usize) -> Arc<Self> {
        let remote = FakeRemote::default();
        for page in 1..=total_pages {
            let issues = (0..per_page)
                .map(|i| {
                    let position = (page as usize - 1) * per_page + i;
                    issue(page as i64 * 1000 + i as i64, position as i64, "open")
                })
                .collect();
            remote.set_page(page, issues);
        }
        remote.set_total_page(Some(&total_pages.to_string()));
        Arc::new(remote)
    }

    pub fn set_page(&self, page: u32, issues: Vec<RemoteIssue>) {
        self.pages
            .lock()
            .unwrap()
            .insert(page, Scripted::Issues(issues));
    }

    pub fn fail_page(&self, page: u32, status: u16) {
        self.pages.lock().unwrap().insert(page, Scripted::Fail(status));
    }

    pub fn set_total_page(&self, raw: Option<&str>) {
        *self.total_page.lock().unwrap() = raw.map(str::to_string);
    }

    /// Makes every following fetch wait forever.
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requests.lock().unwrap().iter().map(|r| r.page).collect()
    }

    pub fn requests(&self) -> Vec<IssuePageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteIssueSource for FakeRemote {
    async fn fetch_issues(&self, request: &IssuePageRequest) -> Result<IssuePage, RemoteError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let issues = match self.pages.lock().unwrap().get(&request.page) {
            Some(Scripted::Fail(status)) => {
                return Err(RemoteError::Api {
                    status: *status,
                    message: "scripted failure".to_string(),
                })
            }
            Some(Scripted::Issues(issues)) => issues.clone(),
            None => Vec::new(),
        };

        Ok(IssuePage {
            issues,
            total_page: self.total_page.lock().unwrap().clone(),
        })
    }
}

/// Remote holding `total` issues, newest first, that pages them by the
/// requested `per_page` the way the real tracker does.
pub struct SlicingRemote {
    issues: Vec<RemoteIssue>,
    requests: Mutex<Vec<IssuePageRequest>>,
}

impl SlicingRemote {
    pub fn new(total: usize) -> Arc<Self> {
        let issues = (0..total)
            .map(|position| issue(position as i64 + 1, position as i64, "open"))
            .collect();
        Arc::new(SlicingRemote {
            issues,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requests.lock().unwrap().iter().map(|r| r.page).collect()
    }

    pub fn requests(&self) -> Vec<IssuePageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteIssueSource for SlicingRemote {
    async fn fetch_issues(&self, request: &IssuePageRequest) -> Result<IssuePage, RemoteError> {
        self.requests.lock().unwrap().push(request.clone());
        let per_page = request.per_page as usize;
        let start = (request.page as usize - 1) * per_page;
        let issues = self
            .issues
            .iter()
            .skip(start)
            .take(per_page)
            .cloned()
            .collect();
        let total_page = (self.issues.len() + per_page - 1) / per_page;

        Ok(IssuePage {
            issues,
            total_page: Some(total_page.to_string()),
        })
    }
}

/// Remote issue updated `position` minutes before a fixed instant, so a
/// lower position sorts as more recently updated.
pub fn issue(id: i64, position: i64, state: &str) -> RemoteIssue {
    let base = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
    let updated_at = (base - Duration::minutes(position)).to_rfc3339();
    RemoteIssue {
        id,
        number: format!("I{}", id),
        title: format!("task {}", id),
        state: state.to_string(),
        created_at: "2024-01-01T00:00:00+00:00".to_string(),
        updated_at,
        labels: vec![RemoteLabel {
            name: "home".to_string(),
            color: "00aa00".to_string(),
        }],
    }
}

pub fn memory_storage() -> Arc<SqliteStorage> {
    Arc::new(SqliteStorage::open_in_memory().unwrap())
}

pub fn mediator(remote: Arc<FakeRemote>, storage: Arc<dyn Storage>) -> SyncMediator {
    SyncMediator::new(remote, storage, QueryParams::new(REPO))
}

pub fn paging(page_size: u32, initial_load_size: u32) -> PagingState {
    PagingState::new(page_size, initial_load_size)
}

pub fn all_rows(storage: &dyn Storage) -> Vec<TodoShow> {
    storage.scan_todos(SortOrder::Descending, 0, usize::MAX >> 1).unwrap()
}

/// Store wrapper whose writes fail once `fail_writes` is called.
pub struct FailingWrites {
    inner: SqliteStorage,
    fail: AtomicBool,
}

impl FailingWrites {
    pub fn new() -> Arc<Self> {
        Arc::new(FailingWrites {
            inner: SqliteStorage::open_in_memory().unwrap(),
            fail: AtomicBool::new(false),
        })
    }

    pub fn fail_writes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            bail!("disk I/O error");
        }
        Ok(())
    }
}

impl Storage for FailingWrites {
    fn upsert_todos(&self, todos: &[TodoShow]) -> Result<()> {
        self.check()?;
        self.inner.upsert_todos(todos)
    }

    fn scan_todos(&self, order: SortOrder, offset: usize, limit: usize) -> Result<Vec<TodoShow>> {
        self.inner.scan_todos(order, offset, limit)
    }

    fn find_todo_by_number(&self, number: &str) -> Result<Option<TodoShow>> {
        self.inner.find_todo_by_number(number)
    }

    fn count_todos(&self) -> Result<usize> {
        self.inner.count_todos()
    }

    fn clear_todos(&self) -> Result<()> {
        self.check()?;
        self.inner.clear_todos()
    }

    fn upsert_page_keys(&self, keys: &[NewPageKey]) -> Result<()> {
        self.check()?;
        self.inner.upsert_page_keys(keys)
    }

    fn find_page_key_by_issue_id(&self, issue_id: i64) -> Result<Option<PageKey>> {
        self.inner.find_page_key_by_issue_id(issue_id)
    }

    fn find_most_recent_page_key(&self) -> Result<Option<PageKey>> {
        self.inner.find_most_recent_page_key()
    }

    fn clear_page_keys(&self) -> Result<()> {
        self.check()?;
        self.inner.clear_page_keys()
    }

    fn apply_page(&self, kind: LoadKind, keys: &[NewPageKey], todos: &[TodoShow]) -> Result<()> {
        self.check()?;
        self.inner.apply_page(kind, keys, todos)
    }

    fn clear_all(&self) -> Result<()> {
        self.check()?;
        self.inner.clear_all()
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.check()?;
        self.inner.set_metadata(key, value)
    }

    fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_metadata(key)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.subscribe()
    }

    fn path(&self) -> &str {
        self.inner.path()
    }
}
