use std::fs;
use std::path::Path;
use tracing::{info, instrument};

use super::record::PrRecord;
use super::{InRequest, InResponse, Metadata, ResourceError, Version};
use crate::forge::{Forge, PullRequest};

/// Result of a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub version: Version,
    pub record: PrRecord,
}

/// The `in` command.
pub struct Fetcher<'a> {
    forge: &'a dyn Forge,
}

impl<'a> Fetcher<'a> {
    pub fn new(forge: &'a dyn Forge) -> Self {
        Self { forge }
    }

    #[instrument(skip_all, fields(dest = %dest.display(), version = %request.version.reference))]
    pub async fn run(&self, dest: &Path, request: &InRequest) -> Result<InResponse, ResourceError> {
        let pulls = self.forge.list_open_pull_requests().await?;
        let fetched = self.fetch(dest, &request.version, &pulls).await?;

        let record = &fetched.record;
        let metadata = vec![
            Metadata::new("pr", record.number.to_string()),
            Metadata::new("url", record.url.clone()),
            Metadata::new("title", record.title.clone()),
            Metadata::new("commit", record.commit.clone()),
            Metadata::new("labels", record.labels.join(", ")),
        ];

        Ok(InResponse {
            version: fetched.version,
            metadata,
        })
    }

    /// Materialise the pull request identified by `requested` into `dest`:
    /// a checkout of its head plus the PR record files.
    ///
    /// A version can disappear between check and fetch (PR updated, closed
    /// or merged); that is reported as `VersionNotFound`, never substituted.
    pub async fn fetch(
        &self,
        dest: &Path,
        requested: &Version,
        open_pulls: &[PullRequest],
    ) -> Result<Fetched, ResourceError> {
        fs::create_dir_all(dest).map_err(|source| ResourceError::CreateDir {
            path: dest.to_path_buf(),
            source,
        })?;

        let pull = open_pulls
            .iter()
            .find(|p| p.id == requested.reference)
            .ok_or_else(|| ResourceError::VersionNotFound(requested.reference.clone()))?;

        info!(
            pr = pull.number,
            commit = %pull.latest_commit,
            updated_at = %pull.updated_at,
            "cloning pull request head"
        );
        self.forge.clone_pull_request_head(dest, pull.number).await?;

        let details = self.forge.fetch_pull_request(pull.number).await?;
        let record = PrRecord::new(pull, &details);
        record.write(dest)?;
        info!(pr = pull.number, labels = record.labels.len(), "wrote pull request record");

        Ok(Fetched {
            version: Version::of(pull),
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Source;
    use crate::forge::fake::{pull, FakeForge};
    use crate::resource::record::{read_field, COMMIT_FILE, ID_FILE, NUMBER_FILE};

    fn two_pulls() -> Vec<PullRequest> {
        vec![pull(1, "fake-sha1"), pull(2, "fake-sha2")]
    }

    fn version(reference: &str) -> Version {
        Version {
            reference: reference.to_string(),
            pr: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_matching_version() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("pr-repo");
        let forge = FakeForge::with_pulls(two_pulls());

        let fetched = Fetcher::new(&forge)
            .fetch(&dest, &version("fake-sha1"), &forge.pulls)
            .await
            .unwrap();

        assert_eq!(fetched.version.reference, "fake-sha1");
        assert_eq!(fetched.version.pr.as_deref(), Some("1"));
        assert_eq!(*forge.cloned.lock().unwrap(), vec![(dest.clone(), 1)]);
        assert_eq!(read_field(&dest, NUMBER_FILE).unwrap(), "1");
        assert_eq!(read_field(&dest, ID_FILE).unwrap(), "fake-sha1");
        assert_eq!(read_field(&dest, COMMIT_FILE).unwrap(), "fake-sha1");
    }

    #[tokio::test]
    async fn test_fetch_creates_nested_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a").join("b");
        let forge = FakeForge::with_pulls(two_pulls());

        Fetcher::new(&forge)
            .fetch(&dest, &version("fake-sha2"), &forge.pulls)
            .await
            .unwrap();
        assert!(dest.is_dir());
    }

    #[tokio::test]
    async fn test_fetch_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let forge = FakeForge::with_pulls(two_pulls());

        let err = Fetcher::new(&forge)
            .fetch(dir.path(), &version("fake-sha3"), &forge.pulls)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "version fake-sha3 not found");
        assert!(forge.cloned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_without_open_pulls() {
        let dir = tempfile::tempdir().unwrap();
        let forge = FakeForge::default();

        let err = Fetcher::new(&forge)
            .fetch(dir.path(), &version("fake-sha1"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::VersionNotFound(ref r) if r == "fake-sha1"));
    }

    #[tokio::test]
    async fn test_fetch_directory_creation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();
        let forge = FakeForge::with_pulls(two_pulls());

        let err = Fetcher::new(&forge)
            .fetch(&blocker.join("dest"), &version("fake-sha1"), &forge.pulls)
            .await
            .unwrap_err();

        assert!(matches!(err, ResourceError::CreateDir { .. }));
        assert!(forge.cloned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_clone_failure() {
        let dir = tempfile::tempdir().unwrap();
        let forge = FakeForge {
            clone_error: Some("fake-error".to_string()),
            ..FakeForge::with_pulls(two_pulls())
        };

        let err = Fetcher::new(&forge)
            .fetch(dir.path(), &version("fake-sha1"), &forge.pulls)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("fake-error"));
        assert!(!dir.path().join(NUMBER_FILE).exists());
    }

    #[tokio::test]
    async fn test_run_lists_and_reports_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let forge = FakeForge::with_pulls(two_pulls());
        let request = InRequest {
            source: Source::default(),
            version: version("fake-sha2"),
        };

        let response = Fetcher::new(&forge).run(dir.path(), &request).await.unwrap();
        assert_eq!(response.version.reference, "fake-sha2");

        let pr = response.metadata.iter().find(|m| m.name == "pr").unwrap();
        assert_eq!(pr.value, "2");
        let labels = response.metadata.iter().find(|m| m.name == "labels").unwrap();
        assert_eq!(labels.value, "ci");
    }

    #[tokio::test]
    async fn test_run_propagates_list_error() {
        let dir = tempfile::tempdir().unwrap();
        let forge = FakeForge {
            list_error: Some("fake-list-error".to_string()),
            ..FakeForge::default()
        };
        let request = InRequest {
            source: Source::default(),
            version: version("fake-sha1"),
        };

        let err = Fetcher::new(&forge).run(dir.path(), &request).await.unwrap_err();
        assert!(matches!(err, ResourceError::Forge(_)));
    }
}
