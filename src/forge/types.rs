use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of leading commit hash characters kept in a composite identity.
const SHORT_SHA_LEN: usize = 7;

/// An open pull request, as seen by the resource.
/// Built once from the GitHub API response, so nothing downstream depends
/// on the wire shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    /// PR number (e.g., 42)
    pub number: u64,
    /// Identity emitted as the version ref (see [`IdentityScheme`])
    pub id: String,
    /// SHA of the head commit
    pub latest_commit: String,
    /// PR title
    pub title: String,
    /// PR description, empty when GitHub has none
    pub body: String,
    /// Label names, in the order GitHub returns them
    pub labels: Vec<String>,
    /// Browser URL of the PR
    pub url: String,
    /// Last time anything on the PR changed
    pub updated_at: DateTime<Utc>,
}

/// How a pull request is turned into a version ref.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum IdentityScheme {
    /// `<short sha>-<updated_at as unix seconds>`
    #[default]
    #[serde(rename = "composite")]
    Composite,
    /// The raw head commit SHA
    #[serde(rename = "sha")]
    CommitSha,
}

impl IdentityScheme {
    pub fn identify(self, commit: &str, updated_at: DateTime<Utc>) -> String {
        match self {
            IdentityScheme::Composite => {
                let short = commit.get(..SHORT_SHA_LEN).unwrap_or(commit);
                format!("{}-{}", short, updated_at.timestamp())
            }
            IdentityScheme::CommitSha => commit.to_string(),
        }
    }
}

/// Commit status states accepted by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Error,
    Failure,
    Pending,
    Success,
}

#[derive(Debug, Error)]
#[error("{0} is not a valid status (expected error, failure, pending or success)")]
pub struct UnknownCommitState(pub String);

impl std::str::FromStr for CommitState {
    type Err = UnknownCommitState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(CommitState::Error),
            "failure" => Ok(CommitState::Failure),
            "pending" => Ok(CommitState::Pending),
            "success" => Ok(CommitState::Success),
            other => Err(UnknownCommitState(other.to_string())),
        }
    }
}

impl std::fmt::Display for CommitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitState::Error => write!(f, "error"),
            CommitState::Failure => write!(f, "failure"),
            CommitState::Pending => write!(f, "pending"),
            CommitState::Success => write!(f, "success"),
        }
    }
}

/// Body of a create-status call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitStatus {
    pub state: CommitState,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}
