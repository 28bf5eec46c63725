//! The per-field files `in` leaves next to the checkout, and `out` reads back.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use super::ResourceError;
use crate::forge::PullRequest;

pub const NUMBER_FILE: &str = "pr_number";
pub const ID_FILE: &str = "pr_id";
pub const COMMIT_FILE: &str = "pr_commit";
pub const TITLE_FILE: &str = "pr_title";
pub const BODY_FILE: &str = "pr_body";
/// Older name for the body, still written for pipelines that read it.
pub const COMMENT_FILE: &str = "pr_comment";
pub const LABELS_FILE: &str = "pr_labels";
pub const URL_FILE: &str = "pr_url";

/// Everything written about a fetched pull request.
#[derive(Debug, Clone, PartialEq)]
pub struct PrRecord {
    pub number: u64,
    pub id: String,
    pub commit: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub url: String,
}

impl PrRecord {
    /// Identity and commit come from `listed`, the snapshot the version was
    /// resolved against; descriptive fields come from `details`.
    pub fn new(listed: &PullRequest, details: &PullRequest) -> Self {
        Self {
            number: listed.number,
            id: listed.id.clone(),
            commit: listed.latest_commit.clone(),
            title: details.title.clone(),
            body: details.body.clone(),
            labels: details.labels.clone(),
            url: details.url.clone(),
        }
    }

    pub fn write(&self, dir: &Path) -> Result<(), ResourceError> {
        let fields = [
            (NUMBER_FILE, self.number.to_string()),
            (ID_FILE, self.id.clone()),
            (COMMIT_FILE, self.commit.clone()),
            (TITLE_FILE, self.title.clone()),
            (BODY_FILE, self.body.clone()),
            (COMMENT_FILE, self.body.clone()),
            (LABELS_FILE, self.labels.join("\n")),
            (URL_FILE, self.url.clone()),
        ];

        for (name, contents) in fields {
            let path = dir.join(name);
            fs::write(&path, contents).map_err(|source| ResourceError::RecordWrite { path, source })?;
        }
        Ok(())
    }
}

/// The subset of the record needed to publish a status.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedHead {
    pub number: u64,
    pub id: String,
    pub commit: String,
}

impl RecordedHead {
    pub fn read(dir: &Path) -> Result<Self, ResourceError> {
        let commit = read_field(dir, COMMIT_FILE)?;
        let id = read_field(dir, ID_FILE)?;
        let raw_number = read_field(dir, NUMBER_FILE)?;
        let number = raw_number.trim().parse::<u64>().map_err(|_| ResourceError::InvalidRecord {
            path: dir.join(NUMBER_FILE),
            reason: format!("{:?} is not a pull request number", raw_number),
        })?;

        Ok(Self { number, id, commit })
    }
}

/// Read one record file, without its trailing line break.
pub fn read_field(dir: &Path, name: &str) -> Result<String, ResourceError> {
    let path = dir.join(name);
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(contents.trim_end_matches(['\n', '\r']).to_string()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(ResourceError::RecordMissing { path }),
        Err(source) => Err(ResourceError::RecordRead { path, source }),
    }
}
