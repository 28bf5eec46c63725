use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::path::Path;
use tracing::{debug, info, instrument};

use super::types::{CommitState, CommitStatus, IdentityScheme, PullRequest};
use super::{clone, Forge, ForgeError};
use crate::config::{Repository, Source};

const USER_AGENT: &str = "pr-resource";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const PER_PAGE: usize = 100;

/// Forge backed by the GitHub REST API (github.com or an enterprise endpoint).
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    repository: Repository,
    token: Option<String>,
    insecure: bool,
    scheme: IdentityScheme,
}

#[derive(Debug, Deserialize)]
struct ApiPull {
    number: u64,
    title: String,
    body: Option<String>,
    html_url: String,
    updated_at: DateTime<Utc>,
    head: ApiHead,
    #[serde(default)]
    labels: Vec<ApiLabel>,
}

#[derive(Debug, Deserialize)]
struct ApiHead {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    clone_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    state: String,
}

impl ApiPull {
    fn into_pull_request(self, scheme: IdentityScheme) -> PullRequest {
        PullRequest {
            number: self.number,
            id: scheme.identify(&self.head.sha, self.updated_at),
            latest_commit: self.head.sha,
            title: self.title,
            body: self.body.unwrap_or_default(),
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            url: self.html_url,
            updated_at: self.updated_at,
        }
    }
}

impl GitHubClient {
    pub fn from_source(source: &Source) -> Result<Self, ForgeError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(source.skip_ssl_verification)
            .build()
            .map_err(ForgeError::ClientBuild)?;

        Ok(Self {
            http,
            api_base: source.api_base()?,
            repository: source.repository()?,
            token: source.github_token(),
            insecure: source.skip_ssl_verification,
            scheme: source.version_id,
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.api_base, self.repository.owner, self.repository.repo, suffix
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(ACCEPT, GITHUB_ACCEPT);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        operation: &'static str,
    ) -> Result<T, ForgeError> {
        let failed = |source| ForgeError::Request { operation, source };
        self.authorized(self.http.get(url))
            .query(query)
            .send()
            .await
            .map_err(failed)?
            .error_for_status()
            .map_err(failed)?
            .json::<T>()
            .await
            .map_err(failed)
    }
}

/// Query for one page of open pull requests, least recently updated first.
fn list_query(page: u32) -> [(&'static str, String); 5] {
    [
        ("state", "open".to_string()),
        ("sort", "updated".to_string()),
        ("direction", "asc".to_string()),
        ("per_page", PER_PAGE.to_string()),
        ("page", page.to_string()),
    ]
}

/// Request pages starting at 1 until one comes back shorter than
/// `PER_PAGE`, and concatenate them in order.
async fn collect_pages<T, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, ForgeError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ForgeError>>,
{
    let mut items = Vec::new();
    for page in 1u32.. {
        let batch = fetch_page(page).await?;
        let last_page = batch.len() < PER_PAGE;
        items.extend(batch);
        if last_page {
            break;
        }
    }
    Ok(items)
}

fn echoed_state(state: &str) -> Result<CommitState, ForgeError> {
    state
        .parse::<CommitState>()
        .map_err(|e| ForgeError::UnexpectedResponse(e.to_string()))
}

#[async_trait]
impl Forge for GitHubClient {
    #[instrument(skip(self), fields(repo = %self.repository))]
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>, ForgeError> {
        let url = self.repo_url("/pulls");
        let url = url.as_str();

        // A PR updated between two page requests can move pages and be seen
        // twice or not at all; the next check picks it up again.
        let batches: Vec<ApiPull> = collect_pages(|page| async move {
            let batch: Vec<ApiPull> = self
                .get_json(url, &list_query(page), "listing pull requests")
                .await?;
            debug!(page, count = batch.len(), "received pull request page");
            Ok(batch)
        })
        .await?;

        let pulls: Vec<PullRequest> = batches
            .into_iter()
            .map(|p| p.into_pull_request(self.scheme))
            .collect();
        info!(count = pulls.len(), "listed open pull requests");
        Ok(pulls)
    }

    #[instrument(skip(self), fields(repo = %self.repository))]
    async fn fetch_pull_request(&self, number: u64) -> Result<PullRequest, ForgeError> {
        let url = self.repo_url(&format!("/pulls/{}", number));
        let pull: ApiPull = self.get_json(&url, &[], "fetching pull request").await?;
        debug!(title = %pull.title, labels = pull.labels.len(), "received pull request");
        Ok(pull.into_pull_request(self.scheme))
    }

    #[instrument(skip(self, dest), fields(repo = %self.repository, dest = %dest.display()))]
    async fn clone_pull_request_head(&self, dest: &Path, number: u64) -> Result<(), ForgeError> {
        let repository: ApiRepository = self
            .get_json(&self.repo_url(""), &[], "fetching repository")
            .await?;
        debug!(clone_url = %repository.clone_url, "resolved clone url");

        clone::clone_pull_request(
            &repository.clone_url,
            self.token.as_deref(),
            self.insecure,
            dest,
            number,
        )
        .await
    }

    #[instrument(skip(self, status), fields(repo = %self.repository, state = %status.state))]
    async fn create_commit_status(
        &self,
        commit: &str,
        status: &CommitStatus,
    ) -> Result<CommitState, ForgeError> {
        if self.token.is_none() {
            return Err(ForgeError::MissingToken);
        }

        let failed = |source| ForgeError::Request {
            operation: "creating commit status",
            source,
        };
        let url = self.repo_url(&format!("/statuses/{}", commit));
        let created = self
            .authorized(self.http.post(&url))
            .json(status)
            .send()
            .await
            .map_err(failed)?
            .error_for_status()
            .map_err(failed)?
            .json::<ApiStatus>()
            .await
            .map_err(failed)?;

        debug!(echoed = %created.state, "commit status created");
        echoed_state(&created.state)
    }
}
