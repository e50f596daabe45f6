//! Remote issue source interface

pub mod gitee;
pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use self::http::HttpError;

/// One page of issues requested from the remote tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuePageRequest {
    pub owner: String,
    pub repo: String,
    pub access_token: Option<String>,
    /// Comma-joined label names
    pub labels: Option<String>,
    pub state: Option<String>,
    pub direction: String,
    /// Range-encoded creation date filter, passed through as given
    pub created_at: Option<String>,
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
}

/// One page of issues together with its pagination metadata
#[derive(Debug, Clone, Default)]
pub struct IssuePage {
    pub issues: Vec<RemoteIssue>,
    /// Raw `total_page` response header, if the server sent one
    pub total_page: Option<String>,
}

impl IssuePage {
    /// Total page count; `None` when the header is absent or not a number.
    pub fn total_pages(&self) -> Option<u32> {
        self.total_page
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
    }
}

/// Issue record as returned by the remote tracker
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteIssue {
    pub id: i64,
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub labels: Vec<RemoteLabel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteLabel {
    pub name: String,
    #[serde(default)]
    pub color: String,
}

/// Errors that can occur while fetching from the remote tracker.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport failed before a response arrived (includes timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Server answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request URL could not be built from the configured base.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// RemoteIssueSource fetches exactly one page of issues per call.
///
/// Implementations must not retry; every non-success outcome is returned
/// to the caller as an error.
#[async_trait]
pub trait RemoteIssueSource: Send + Sync {
    async fn fetch_issues(&self, request: &IssuePageRequest) -> Result<IssuePage, RemoteError>;
}
