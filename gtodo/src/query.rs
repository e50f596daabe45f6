//! Query parameters that parameterize one sync session.

use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::remote::IssuePageRequest;
use crate::types::{SortDirection, TodoState};

/// Repository path stored when no repository has been picked yet.
pub const NO_REPOSITORY: &str = "null/null";

/// Filter and sort descriptor for a task list.
///
/// Two sessions with equal parameters share a pagination window; any change
/// means the cached window is stale and pagination restarts with a REFRESH.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct QueryParams {
    /// `owner/repo`
    pub repo_path: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// `None` lists every state
    #[serde(default)]
    pub state: Option<TodoState>,
    #[serde(default)]
    pub direction: SortDirection,
    /// Range-encoded creation date filter, passed to the remote untouched
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

impl QueryParams {
    pub fn new(repo_path: impl Into<String>) -> Self {
        QueryParams {
            repo_path: repo_path.into(),
            ..Default::default()
        }
    }

    /// Splits the repository path into `(owner, repo)`.
    ///
    /// Both halves must be non-empty, free of whitespace and further slashes,
    /// and not the literal `null` placeholder.
    pub fn owner_repo(&self) -> Result<(&str, &str), SyncError> {
        let invalid =
            || SyncError::InvalidQuery(format!("malformed repository path {:?}", self.repo_path));

        if self.repo_path == NO_REPOSITORY {
            return Err(SyncError::InvalidQuery("no repository selected".to_string()));
        }
        let (owner, repo) = self.repo_path.split_once('/').ok_or_else(invalid)?;
        let well_formed = |part: &str| {
            !part.is_empty()
                && part != "null"
                && !part.contains('/')
                && !part.chars().any(char::is_whitespace)
        };
        if !well_formed(owner) || !well_formed(repo) {
            return Err(invalid());
        }
        Ok((owner, repo))
    }

    /// Stable text identifying the rows this query selects, recorded with the
    /// cache on every REFRESH. The access token is left out.
    pub fn fingerprint(&self) -> String {
        serde_json::json!({
            "repo_path": self.repo_path,
            "labels": self.labels,
            "state": self.state,
            "direction": self.direction,
            "created_at": self.created_at,
        })
        .to_string()
    }

    /// Remote request for one page under these parameters.
    pub fn page_request(&self, page: u32, per_page: u32) -> Result<IssuePageRequest, SyncError> {
        let (owner, repo) = self.owner_repo()?;
        let labels = if self.labels.is_empty() {
            None
        } else {
            Some(self.labels.join(","))
        };

        Ok(IssuePageRequest {
            owner: owner.to_string(),
            repo: repo.to_string(),
            access_token: self.access_token.clone(),
            labels,
            state: self.state.map(|s| s.as_str().to_string()),
            direction: self.direction.as_str().to_string(),
            created_at: self.created_at.clone(),
            page,
            per_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_owner_and_repo() {
        let query = QueryParams::new("octo/tasks");
        assert_eq!(query.owner_repo().unwrap(), ("octo", "tasks"));
    }

    #[test]
    fn rejects_placeholder_and_malformed_paths() {
        for path in [
            NO_REPOSITORY,
            "",
            "octo",
            "/tasks",
            "octo/",
            "octo/null",
            "a/b/c",
            "oc to/tasks",
        ] {
            let query = QueryParams::new(path);
            assert!(
                matches!(query.owner_repo(), Err(SyncError::InvalidQuery(_))),
                "{:?} should be rejected",
                path
            );
        }
    }

    #[test]
    fn page_request_carries_every_filter() {
        let query = QueryParams {
            repo_path: "octo/tasks".to_string(),
            labels: vec!["bug".to_string(), "ui".to_string()],
            state: Some(TodoState::Progressing),
            direction: SortDirection::Asc,
            created_at: Some("2024-01-01..2024-02-01".to_string()),
            access_token: Some("secret".to_string()),
        };

        let req = query.page_request(3, 40).unwrap();
        assert_eq!(req.owner, "octo");
        assert_eq!(req.repo, "tasks");
        assert_eq!(req.labels.as_deref(), Some("bug,ui"));
        assert_eq!(req.state.as_deref(), Some("progressing"));
        assert_eq!(req.direction, "asc");
        assert_eq!(req.created_at.as_deref(), Some("2024-01-01..2024-02-01"));
        assert_eq!(req.access_token.as_deref(), Some("secret"));
        assert_eq!((req.page, req.per_page), (3, 40));
    }

    #[test]
    fn empty_label_filter_is_omitted() {
        let req = QueryParams::new("octo/tasks").page_request(1, 20).unwrap();
        assert_eq!(req.labels, None);
        assert_eq!(req.state, None);
        assert_eq!(req.direction, "desc");
    }

    #[test]
    fn fingerprint_ignores_only_the_token() {
        let base = QueryParams::new("octo/tasks");
        let mut token = base.clone();
        token.access_token = Some("secret".to_string());
        assert_eq!(base.fingerprint(), token.fingerprint());
        assert!(!token.fingerprint().contains("secret"));

        for change in [
            QueryParams::new("octo/other"),
            QueryParams {
                labels: vec!["bug".to_string()],
                ..base.clone()
            },
            QueryParams {
                state: Some(TodoState::Closed),
                ..base.clone()
            },
            QueryParams {
                direction: SortDirection::Asc,
                ..base.clone()
            },
            QueryParams {
                created_at: Some("2024-01-01..2024-02-01".to_string()),
                ..base.clone()
            },
        ] {
            assert_ne!(base.fingerprint(), change.fingerprint(), "{:?}", change);
        }
    }

    #[test]
    fn equality_tracks_every_field() {
        let base = QueryParams::new("octo/tasks");
        let mut other = base.clone();
        assert_eq!(base, other);
        other.labels.push("bug".to_string());
        assert_ne!(base, other);
    }
}
