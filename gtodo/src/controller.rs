//! Incremental list controller: drives the mediator and reads the cache.

use std::sync::Arc;

use crate::error::SyncError;
use crate::local::LocalPageSource;
use crate::mediator::{MediatorResult, SyncMediator};
use crate::query::QueryParams;
use crate::storage::{Storage, QUERY_FINGERPRINT_KEY};
use crate::types::*;

/// Load state of one direction, as a list UI would render it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    NotLoading { end_of_pagination_reached: bool },
    Loading,
    Error(String),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

impl Default for LoadState {
    fn default() -> Self {
        LoadState::NotLoading {
            end_of_pagination_reached: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStates {
    pub refresh: LoadState,
    pub prepend: LoadState,
    pub append: LoadState,
}

impl LoadStates {
    fn slot(&mut self, kind: LoadKind) -> &mut LoadState {
        match kind {
            LoadKind::Refresh => &mut self.refresh,
            LoadKind::Prepend => &mut self.prepend,
            LoadKind::Append => &mut self.append,
        }
    }
}

/// Owns one mediator and serializes its loads through `&mut self`.
pub struct ListController {
    mediator: SyncMediator,
    storage: Arc<dyn Storage>,
    page_size: u32,
    initial_load_size: u32,
    source: LocalPageSource,
    states: LoadStates,
    refresh_pending: bool,
}

impl ListController {
    pub fn attach(
        mediator: SyncMediator,
        storage: Arc<dyn Storage>,
        page_size: u32,
        initial_load_size: u32,
    ) -> Self {
        let refresh_pending = match mediator.initialize() {
            InitializeAction::LaunchInitialRefresh => true,
            InitializeAction::SkipInitialRefresh => {
                cached_for_other_query(storage.as_ref(), mediator.query())
            }
        };
        let source = LocalPageSource::new(storage.clone(), mediator.query().direction.scan_order());

        ListController {
            mediator,
            storage,
            page_size,
            initial_load_size,
            source,
            states: LoadStates::default(),
            refresh_pending,
        }
    }

    pub fn states(&self) -> &LoadStates {
        &self.states
    }

    pub fn query(&self) -> &QueryParams {
        self.mediator.query()
    }

    /// True when the cached window no longer matches the query, either
    /// since `set_query` or because the cache was filled for another one.
    pub fn refresh_pending(&self) -> bool {
        self.refresh_pending
    }

    /// Switches to `query`. A different query restarts pagination: the
    /// local source is rebuilt and the next load is a REFRESH.
    pub fn set_query(&mut self, query: QueryParams) -> bool {
        if !self.mediator.set_query(query) {
            return false;
        }
        self.refresh_pending = true;
        self.states = LoadStates::default();
        self.restart_source();
        true
    }

    pub async fn refresh(&mut self) -> Result<bool, SyncError> {
        self.run(LoadKind::Refresh).await
    }

    /// Loads the next page; runs a REFRESH instead while one is pending.
    pub async fn append(&mut self) -> Result<bool, SyncError> {
        if self.refresh_pending {
            log::debug!("append requested while refresh pending, refreshing instead");
            return self.run(LoadKind::Refresh).await;
        }
        self.run(LoadKind::Append).await
    }

    pub async fn prepend(&mut self) -> Result<bool, SyncError> {
        self.run(LoadKind::Prepend).await
    }

    /// Up to `limit` cached rows in the query's order.
    pub fn snapshot(&mut self, limit: usize) -> anyhow::Result<Vec<TodoShow>> {
        if self.source.is_invalid() {
            self.restart_source();
        }
        self.source.collect(limit, self.page_size as usize)
    }

    async fn run(&mut self, kind: LoadKind) -> Result<bool, SyncError> {
        *self.states.slot(kind) = LoadState::Loading;

        let last_item = match kind {
            LoadKind::Append => match self.last_visible() {
                Ok(item) => item,
                Err(err) => return Err(self.finish_with_error(kind, SyncError::Storage(err))),
            },
            _ => None,
        };
        let state =
            PagingState::new(self.page_size, self.initial_load_size).with_last_item(last_item);

        let result = self.mediator.load(kind, &state).await;
        if let MediatorResult::Success { .. } = result {
            if kind == LoadKind::Refresh {
                self.refresh_pending = false;
            }
        }
        if self.source.is_invalid() {
            self.restart_source();
        }

        match result.into_result() {
            Ok(end_of_pagination_reached) => {
                *self.states.slot(kind) = LoadState::NotLoading {
                    end_of_pagination_reached,
                };
                Ok(end_of_pagination_reached)
            }
            Err(err) => Err(self.finish_with_error(kind, err)),
        }
    }

    fn finish_with_error(&mut self, kind: LoadKind, err: SyncError) -> SyncError {
        *self.states.slot(kind) = LoadState::Error(err.to_string());
        err
    }

    fn last_visible(&self) -> anyhow::Result<Option<TodoShow>> {
        let count = self.storage.count_todos()?;
        if count == 0 {
            return Ok(None);
        }
        let mut rows = self.storage.scan_todos(self.source.order(), count - 1, 1)?;
        Ok(rows.pop())
    }

    fn restart_source(&mut self) {
        let order = self.mediator.query().direction.scan_order();
        self.source = LocalPageSource::new(self.storage.clone(), order);
    }
}

// Rows without a recorded query come from an interrupted REFRESH, so only an
// empty cache is trusted without one.
fn cached_for_other_query(storage: &dyn Storage, query: &QueryParams) -> bool {
    let cached = storage
        .get_metadata(QUERY_FINGERPRINT_KEY)
        .and_then(|fingerprint| Ok((fingerprint, storage.count_todos()?)));
    match cached {
        Ok((Some(fingerprint), _)) => {
            let stale = fingerprint != query.fingerprint();
            if stale {
                log::info!("cache was filled for another query, next load refreshes");
            }
            stale
        }
        Ok((None, rows)) => rows > 0,
        Err(err) => {
            log::warn!("cannot read cached query, next load refreshes: {:#}", err);
            true
        }
    }
}
