//! Core data structures for the gtodo sync cache.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// TodoShow is the denormalized cache row for one remote issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoShow {
    pub id: i64,
    pub number: String,
    pub title: String,
    pub state: TodoState,
    pub updated_at: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub labels: Vec<TodoLabel>,
    pub header_title: String,
}

impl TodoShow {
    /// Groups rows by the calendar day of their last update.
    ///
    /// The date is taken in the offset carried by the timestamp itself, so a
    /// row updated at `2024-03-01T00:30:00+08:00` groups under `2024-03-01`.
    /// Unparseable timestamps fall back to the raw string.
    pub fn header_title_for(updated_at: &str) -> String {
        match DateTime::parse_from_rfc3339(updated_at) {
            Ok(ts) => ts.format("%Y-%m-%d").to_string(),
            Err(_) => updated_at.to_string(),
        }
    }
}

/// TodoState is the workflow state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoState {
    Open,
    Progressing,
    Closed,
    Rejected,
    Unknown,
}

impl TodoState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoState::Open => "open",
            TodoState::Progressing => "progressing",
            TodoState::Closed => "closed",
            TodoState::Rejected => "rejected",
            TodoState::Unknown => "unknown",
        }
    }

    /// Strict parse used for round-tripping local rows.
    pub fn parse(value: &str) -> Option<TodoState> {
        match value {
            "open" => Some(TodoState::Open),
            "progressing" => Some(TodoState::Progressing),
            "closed" => Some(TodoState::Closed),
            "rejected" => Some(TodoState::Rejected),
            "unknown" => Some(TodoState::Unknown),
            _ => None,
        }
    }

    /// Maps a remote state string, treating anything unrecognized as open.
    pub fn from_remote(value: &str) -> TodoState {
        match value.to_ascii_lowercase().as_str() {
            "open" => TodoState::Open,
            "progressing" => TodoState::Progressing,
            "closed" => TodoState::Closed,
            "rejected" => TodoState::Rejected,
            other => {
                log::debug!("unrecognized remote state {:?}, treating as open", other);
                TodoState::Open
            }
        }
    }
}

impl fmt::Display for TodoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// TodoLabel is a tag attached to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoLabel {
    pub name: String,
    pub color: String,
}

/// PageKey records which remote page a cached issue came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageKey {
    pub id: i64,
    pub issue_id: i64,
    pub prev_key: Option<u32>,
    pub next_key: Option<u32>,
}

/// NewPageKey is a page key before the store assigns its surrogate id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewPageKey {
    pub issue_id: i64,
    pub prev_key: Option<u32>,
    pub next_key: Option<u32>,
}

/// LoadKind is the direction a paginated list asks to load in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadKind {
    Refresh,
    Prepend,
    Append,
}

impl LoadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadKind::Refresh => "refresh",
            LoadKind::Prepend => "prepend",
            LoadKind::Append => "append",
        }
    }
}

impl fmt::Display for LoadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the mediator wants done when it is first attached to a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializeAction {
    LaunchInitialRefresh,
    SkipInitialRefresh,
}

/// SortDirection is the remote sort direction on update time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// Local scan order matching this remote direction.
    pub fn scan_order(&self) -> SortOrder {
        match self {
            SortDirection::Asc => SortOrder::Ascending,
            SortDirection::Desc => SortOrder::Descending,
        }
    }
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Desc
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("invalid direction: {} (expected asc or desc)", other)),
        }
    }
}

/// SortOrder selects the ordered scan over cached rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest update first
    Ascending,
    /// Newest update first
    Descending,
}

/// PagingState is what the list controller hands the mediator on each load
#[derive(Debug, Clone, Default)]
pub struct PagingState {
    pub page_size: u32,
    pub initial_load_size: u32,
    /// Last row the controller currently shows, if any
    pub last_item: Option<TodoShow>,
}

impl PagingState {
    pub fn new(page_size: u32, initial_load_size: u32) -> Self {
        PagingState {
            page_size,
            initial_load_size,
            last_item: None,
        }
    }

    pub fn with_last_item(mut self, last_item: Option<TodoShow>) -> Self {
        self.last_item = last_item;
        self
    }

    /// How many `page_size` pages the initial load covers.
    ///
    /// The remote numbers pages by the requested page size, so APPEND can only
    /// resume right after a REFRESH when the initial load is a whole number of
    /// steady-state pages.
    pub fn initial_pages(&self) -> Result<u32, String> {
        if self.page_size == 0 {
            return Err("page size must be positive".to_string());
        }
        if self.initial_load_size == 0 || self.initial_load_size % self.page_size != 0 {
            return Err(format!(
                "initial load size {} is not a positive multiple of page size {}",
                self.initial_load_size, self.page_size
            ));
        }
        Ok(self.initial_load_size / self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_state_is_lenient() {
        assert_eq!(TodoState::from_remote("bogus"), TodoState::Open);
        assert_eq!(TodoState::from_remote(""), TodoState::Open);
        assert_eq!(TodoState::from_remote("progressing"), TodoState::Progressing);
        assert_eq!(TodoState::from_remote("CLOSED"), TodoState::Closed);
        assert_eq!(TodoState::from_remote("rejected"), TodoState::Rejected);
    }

    #[test]
    fn local_state_parse_is_strict() {
        for state in [
            TodoState::Open,
            TodoState::Progressing,
            TodoState::Closed,
            TodoState::Rejected,
            TodoState::Unknown,
        ] {
            assert_eq!(TodoState::parse(state.as_str()), Some(state));
        }
        assert_eq!(TodoState::parse("bogus"), None);
    }

    #[test]
    fn header_title_uses_timestamp_offset() {
        assert_eq!(
            TodoShow::header_title_for("2024-03-01T00:30:00+08:00"),
            "2024-03-01"
        );
        assert_eq!(TodoShow::header_title_for("2023-12-31T23:59:59Z"), "2023-12-31");
    }

    #[test]
    fn header_title_falls_back_to_raw_value() {
        assert_eq!(TodoShow::header_title_for("yesterday"), "yesterday");
    }

    #[test]
    fn initial_load_must_cover_whole_pages() {
        assert_eq!(PagingState::new(20, 60).initial_pages(), Ok(3));
        assert_eq!(PagingState::new(20, 20).initial_pages(), Ok(1));
        assert!(PagingState::new(20, 50).initial_pages().is_err());
        assert!(PagingState::new(20, 0).initial_pages().is_err());
        assert!(PagingState::new(0, 60).initial_pages().is_err());
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("ASC".parse::<SortDirection>(), Ok(SortDirection::Asc));
        assert_eq!("desc".parse::<SortDirection>(), Ok(SortDirection::Desc));
        assert!("up".parse::<SortDirection>().is_err());
        assert_eq!(SortDirection::Asc.scan_order(), SortOrder::Ascending);
    }
}
