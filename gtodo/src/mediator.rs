//! Sync mediator: turns list load requests into remote page fetches and
//! reconciles each fetched page into the local cache.
//!
//! Each call to [`SyncMediator::load`] is one independent request:
//!
//! - PREPEND always succeeds with end of pagination and does no I/O. The list
//!   only grows forward.
//! - REFRESH fetches page 1 with the initial load size and replaces the whole
//!   cache in one transaction. The initial load spans a whole number of
//!   steady-state pages, and its rows point past all of them.
//! - APPEND resumes from the page key of the last row the list shows (or the
//!   most recently written page key when the list has no rows in hand). A
//!   missing page key is [`SyncError::EmptyAnchor`]; a page key without a next
//!   page is end of pagination without a fetch.
//!
//! Page keys count in steady-state pages. Every row of a fetched page gets
//! the same prev/next pair. APPEND only ever
//! resumes from the newest page, so per-row positions are never needed.
//!
//! The only suspension point is the remote fetch. Reconciliation runs
//! synchronously after it, so dropping a load future either happens before
//! any write or not at all.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::SyncError;
use crate::query::QueryParams;
use crate::remote::{RemoteIssue, RemoteIssueSource};
use crate::storage::{Storage, QUERY_FINGERPRINT_KEY};
use crate::types::*;

/// Outcome of one load request.
#[derive(Debug)]
pub enum MediatorResult {
    Success { end_of_pagination_reached: bool },
    Error(SyncError),
}

impl MediatorResult {
    pub fn is_success(&self) -> bool {
        matches!(self, MediatorResult::Success { .. })
    }

    pub fn into_result(self) -> Result<bool, SyncError> {
        match self {
            MediatorResult::Success {
                end_of_pagination_reached,
            } => Ok(end_of_pagination_reached),
            MediatorResult::Error(err) => Err(err),
        }
    }
}

/// Page keys shared by every row of one fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    pub prev_key: Option<u32>,
    pub next_key: Option<u32>,
    pub end_of_pagination_reached: bool,
}

/// Neighbouring pages of `page`, given the remote's total page count.
///
/// An unknown total stops pagination after this page.
pub fn page_bounds(page: u32, total_pages: Option<u32>) -> PageBounds {
    let prev_key = if page <= 1 { None } else { Some(page - 1) };
    let end_of_pagination_reached = match total_pages {
        Some(total) => page >= total,
        None => true,
    };
    let next_key = if end_of_pagination_reached {
        None
    } else {
        Some(page + 1)
    };

    PageBounds {
        prev_key,
        next_key,
        end_of_pagination_reached,
    }
}

/// Page keys for the initial load of a REFRESH, which covers
/// `initial_pages` steady-state pages as one remote page.
///
/// `total_pages` counts pages of the initial load size, so it only decides
/// whether anything lies past the initial load.
pub fn refresh_bounds(initial_pages: u32, total_pages: Option<u32>) -> PageBounds {
    let mut bounds = page_bounds(1, total_pages);
    bounds.next_key = bounds.next_key.map(|_| initial_pages + 1);
    bounds
}

// Fixed-width UTC, so text order is time order.
fn utc_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => at
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        Err(_) => raw.to_string(),
    }
}

/// Local cache row for a remote issue.
///
/// `updated_at` is stored in UTC; `header_title` keeps the remote's own date.
pub fn project(issue: RemoteIssue) -> TodoShow {
    let header_title = TodoShow::header_title_for(&issue.updated_at);
    TodoShow {
        id: issue.id,
        number: issue.number,
        title: issue.title,
        state: TodoState::from_remote(&issue.state),
        updated_at: utc_timestamp(&issue.updated_at),
        created_at: issue.created_at,
        labels: issue
            .labels
            .into_iter()
            .map(|label| TodoLabel {
                name: label.name,
                color: label.color,
            })
            .collect(),
        header_title,
    }
}

pub struct SyncMediator {
    remote: Arc<dyn RemoteIssueSource>,
    storage: Arc<dyn Storage>,
    query: QueryParams,
}

impl SyncMediator {
    pub fn new(
        remote: Arc<dyn RemoteIssueSource>,
        storage: Arc<dyn Storage>,
        query: QueryParams,
    ) -> Self {
        SyncMediator {
            remote,
            storage,
            query,
        }
    }

    /// A valid cache is shown as-is on attach; only an explicit or
    /// scroll-driven load touches the network.
    pub fn initialize(&self) -> InitializeAction {
        InitializeAction::SkipInitialRefresh
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Replaces the query; returns whether it differs from the current one.
    pub fn set_query(&mut self, query: QueryParams) -> bool {
        if self.query == query {
            return false;
        }
        self.query = query;
        true
    }

    pub async fn load(&self, kind: LoadKind, state: &PagingState) -> MediatorResult {
        match self.try_load(kind, state).await {
            Ok(end_of_pagination_reached) => MediatorResult::Success {
                end_of_pagination_reached,
            },
            Err(err) => {
                log::warn!("{} of {} failed: {}", kind, self.query.repo_path, err);
                MediatorResult::Error(err)
            }
        }
    }

    async fn try_load(&self, kind: LoadKind, state: &PagingState) -> Result<bool, SyncError> {
        let (page, per_page) = match kind {
            LoadKind::Prepend => return Ok(true),
            LoadKind::Refresh => (1, state.initial_load_size),
            LoadKind::Append => match self.resolve_append_page(state)? {
                Some(page) => (page, state.page_size),
                None => {
                    log::debug!("append: last page already loaded");
                    return Ok(true);
                }
            },
        };

        let initial_pages = state.initial_pages().map_err(SyncError::InvalidPaging)?;
        let request = self.query.page_request(page, per_page)?;
        log::info!(
            "{}: fetching page {} ({} per page) of {}",
            kind,
            page,
            per_page,
            self.query.repo_path
        );

        let fetched = self.remote.fetch_issues(&request).await?;
        let total_pages = fetched.total_pages();
        let mut bounds = match kind {
            LoadKind::Refresh => refresh_bounds(initial_pages, total_pages),
            _ => page_bounds(page, total_pages),
        };
        if fetched.issues.is_empty() && !bounds.end_of_pagination_reached {
            // No row would carry the next key, so there is nothing to
            // resume from.
            log::debug!("page {} is empty despite total {:?}", page, total_pages);
            bounds.next_key = None;
            bounds.end_of_pagination_reached = true;
        }

        let todos: Vec<TodoShow> = fetched.issues.into_iter().map(project).collect();
        let keys: Vec<NewPageKey> = todos
            .iter()
            .map(|todo| NewPageKey {
                issue_id: todo.id,
                prev_key: bounds.prev_key,
                next_key: bounds.next_key,
            })
            .collect();

        self.storage
            .apply_page(kind, &keys, &todos)
            .map_err(SyncError::Storage)?;
        if kind == LoadKind::Refresh {
            self.storage
                .set_metadata(QUERY_FINGERPRINT_KEY, &self.query.fingerprint())
                .map_err(SyncError::Storage)?;
        }

        log::info!(
            "{}: stored {} rows from page {} (total pages {:?}, end {})",
            kind,
            todos.len(),
            page,
            total_pages,
            bounds.end_of_pagination_reached
        );
        Ok(bounds.end_of_pagination_reached)
    }

    fn resolve_append_page(&self, state: &PagingState) -> Result<Option<u32>, SyncError> {
        let anchor = match &state.last_item {
            Some(item) => self.storage.find_page_key_by_issue_id(item.id),
            None => self.storage.find_most_recent_page_key(),
        }
        .map_err(SyncError::Storage)?;

        let anchor = anchor.ok_or(SyncError::EmptyAnchor)?;
        Ok(anchor.next_key)
    }
}
