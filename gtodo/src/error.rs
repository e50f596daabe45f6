//! Error taxonomy for a single load request

use thiserror::Error;

use crate::remote::RemoteError;

/// Why one load request failed.
///
/// Every kind is fatal to the current request only; the mediator itself
/// stays usable and never retries on its own.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Repository path is not a usable `owner/repo` pair. Found before any I/O.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Page sizes cannot describe the remote's page numbering. Found before any I/O.
    #[error("invalid paging: {0}")]
    InvalidPaging(String),

    /// Remote source failed or answered with something unusable.
    #[error("remote failure: {0}")]
    Remote(#[from] RemoteError),

    /// APPEND found no page key to resume from; the caller should refresh.
    #[error("result is empty: no page key to append after")]
    EmptyAnchor,

    /// Reconciliation could not commit. Prior cache contents are intact.
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

impl SyncError {
    /// True when the caller should force a REFRESH before trying again.
    pub fn needs_refresh(&self) -> bool {
        matches!(self, SyncError::EmptyAnchor)
    }
}
