//! Remote issue source for Gitee-compatible v5 APIs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use super::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use super::{IssuePage, IssuePageRequest, RemoteError, RemoteIssue, RemoteIssueSource};

/// Default public host.
pub const GITEE_HOST: &str = "https://gitee.com";

/// Header carrying the total page count of a listing.
const TOTAL_PAGE_HEADER: &str = "total_page";

/// Issue listing client for the `/api/v5/repos/{owner}/{repo}/issues` endpoint.
#[derive(Clone)]
pub struct GiteeClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl GiteeClient {
    /// Create a client backed by reqwest with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let transport = ReqwestTransport::with_timeout(timeout)?;
        Ok(Self::new_with_transport(base_url, Arc::new(transport)))
    }

    pub fn new_with_transport(base_url: &str, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn issues_url(&self, request: &IssuePageRequest) -> Result<Url, RemoteError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;

        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend([
                "api",
                "v5",
                "repos",
                request.owner.as_str(),
                request.repo.as_str(),
                "issues",
            ]);

        {
            let mut query = url.query_pairs_mut();
            if let Some(token) = non_empty(request.access_token.as_deref()) {
                query.append_pair("access_token", token);
            }
            query.append_pair("state", non_empty(request.state.as_deref()).unwrap_or("all"));
            if let Some(labels) = non_empty(request.labels.as_deref()) {
                query.append_pair("labels", labels);
            }
            query.append_pair("sort", "updated");
            query.append_pair("direction", &request.direction);
            if let Some(created_at) = non_empty(request.created_at.as_deref()) {
                query.append_pair("created_at", created_at);
            }
            query.append_pair("page", &request.page.to_string());
            query.append_pair("per_page", &request.per_page.to_string());
        }

        Ok(url)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn decode_page(response: HttpResponse) -> Result<IssuePage, RemoteError> {
    if !response.is_success() {
        let message = String::from_utf8_lossy(&response.body).to_string();
        return Err(RemoteError::Api {
            status: response.status,
            message,
        });
    }

    let total_page = response.header(TOTAL_PAGE_HEADER).map(str::to_string);
    let issues: Vec<RemoteIssue> = serde_json::from_slice(&response.body)?;
    Ok(IssuePage { issues, total_page })
}

#[async_trait]
impl RemoteIssueSource for GiteeClient {
    async fn fetch_issues(&self, request: &IssuePageRequest) -> Result<IssuePage, RemoteError> {
        let url = self.issues_url(request)?;
        log::debug!(
            "GET issues {}/{} page={} per_page={}",
            request.owner,
            request.repo,
            request.page,
            request.per_page
        );

        let response = self
            .transport
            .get(HttpRequest {
                url: url.to_string(),
                headers: vec![
                    ("Accept".to_string(), "application/json".to_string()),
                    ("User-Agent".to_string(), "gtodo".to_string()),
                ],
            })
            .await?;

        decode_page(response)
    }
}
