pub mod clone;
#[cfg(test)]
pub mod fake;
pub mod github;
pub mod types;

pub use github::GitHubClient;
pub use types::{CommitState, CommitStatus, IdentityScheme, PullRequest, UnknownCommitState};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("GitHub API request failed while {operation}: {source}")]
    Request {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected GitHub response: {0}")]
    UnexpectedResponse(String),

    #[error("GitHub token not found in source or environment")]
    MissingToken,

    #[error("Invalid clone url: {0}")]
    InvalidCloneUrl(String),

    #[error("Failed to run git {step}: {source}")]
    GitSpawn {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("git {step} failed: {stderr}")]
    Git { step: &'static str, stderr: String },
}

/// Everything the three commands need from the code host.
#[async_trait]
pub trait Forge: Send + Sync {
    /// Open pull requests, least recently updated first.
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>, ForgeError>;

    async fn fetch_pull_request(&self, number: u64) -> Result<PullRequest, ForgeError>;

    /// Clone the repository into `dest` and check out the head of PR `number`.
    async fn clone_pull_request_head(&self, dest: &Path, number: u64) -> Result<(), ForgeError>;

    /// Create a status on `commit`; returns the state GitHub recorded.
    async fn create_commit_status(
        &self,
        commit: &str,
        status: &CommitStatus,
    ) -> Result<CommitState, ForgeError>;
}
