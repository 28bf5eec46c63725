//! In-memory forge for command tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::types::{CommitState, CommitStatus, PullRequest};
use super::{Forge, ForgeError};

/// Scripted forge: returns the configured pulls and errors, and records
/// every clone and status call it receives.
#[derive(Default)]
pub struct FakeForge {
    pub pulls: Vec<PullRequest>,
    pub list_error: Option<String>,
    pub clone_error: Option<String>,
    pub status_error: Option<String>,
    /// State echoed by create-status; echoes the requested state when None
    pub echoed_state: Option<CommitState>,
    pub cloned: Mutex<Vec<(PathBuf, u64)>>,
    pub statuses: Mutex<Vec<(String, CommitStatus)>>,
}

impl FakeForge {
    pub fn with_pulls(pulls: Vec<PullRequest>) -> Self {
        Self {
            pulls,
            ..Self::default()
        }
    }
}

/// A pull whose identity and head commit are both `sha`.
pub fn pull(number: u64, sha: &str) -> PullRequest {
    PullRequest {
        number,
        id: sha.to_string(),
        latest_commit: sha.to_string(),
        title: format!("Pull request {}", number),
        body: format!("Body of {}", number),
        labels: vec!["ci".to_string()],
        url: format!("https://github.com/org/repo/pull/{}", number),
        updated_at: Utc.timestamp_opt(1_700_000_000 + number as i64, 0).unwrap(),
    }
}

#[async_trait]
impl Forge for FakeForge {
    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequest>, ForgeError> {
        match &self.list_error {
            Some(message) => Err(ForgeError::UnexpectedResponse(message.clone())),
            None => Ok(self.pulls.clone()),
        }
    }

    async fn fetch_pull_request(&self, number: u64) -> Result<PullRequest, ForgeError> {
        self.pulls
            .iter()
            .find(|p| p.number == number)
            .cloned()
            .ok_or_else(|| ForgeError::UnexpectedResponse(format!("pull request {} not found", number)))
    }

    async fn clone_pull_request_head(&self, dest: &Path, number: u64) -> Result<(), ForgeError> {
        self.cloned.lock().unwrap().push((dest.to_path_buf(), number));
        match &self.clone_error {
            Some(message) => Err(ForgeError::Git {
                step: "clone",
                stderr: message.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn create_commit_status(
        &self,
        commit: &str,
        status: &CommitStatus,
    ) -> Result<CommitState, ForgeError> {
        self.statuses
            .lock()
            .unwrap()
            .push((commit.to_string(), status.clone()));
        match &self.status_error {
            Some(message) => Err(ForgeError::UnexpectedResponse(message.clone())),
            None => Ok(self.echoed_state.unwrap_or(status.state)),
        }
    }
}
