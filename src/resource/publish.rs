use std::path::Path;
use tracing::{info, instrument};

use super::record::RecordedHead;
use super::{Metadata, OutParams, OutRequest, OutResponse, ResourceError, Version};
use crate::forge::{CommitState, CommitStatus, Forge};

/// Status context used when the pipeline does not name one.
pub const DEFAULT_CONTEXT: &str = "concourse-ci";

/// Result of a confirmed status update.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub version: Version,
    pub commit: String,
    pub state: CommitState,
}

/// The `out` command.
pub struct Publisher<'a> {
    forge: &'a dyn Forge,
}

impl<'a> Publisher<'a> {
    pub fn new(forge: &'a dyn Forge) -> Self {
        Self { forge }
    }

    #[instrument(skip_all, fields(source_dir = %source_dir.display(), status = %request.params.status))]
    pub async fn run(&self, source_dir: &Path, request: &OutRequest) -> Result<OutResponse, ResourceError> {
        let published = self.publish(source_dir, &request.params).await?;

        Ok(OutResponse {
            version: published.version,
            metadata: vec![
                Metadata::new("commit", published.commit),
                Metadata::new("status", published.state.to_string()),
            ],
        })
    }

    /// Mark the commit recorded under `source_dir/params.path` with
    /// `params.status`.
    ///
    /// The status is validated before anything is read or sent, and the
    /// state GitHub echoes back must match the one requested.
    pub async fn publish(&self, source_dir: &Path, params: &OutParams) -> Result<Published, ResourceError> {
        let state: CommitState = params.status.parse()?;

        let record_dir = source_dir.join(&params.path);
        let head = RecordedHead::read(&record_dir)?;

        let status = CommitStatus {
            state,
            context: params
                .context
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
            description: params.description.clone(),
            target_url: params.target_url.clone(),
        };

        let confirmed = self.forge.create_commit_status(&head.commit, &status).await?;
        if confirmed != state {
            return Err(ResourceError::StatusNotConfirmed {
                requested: state,
                confirmed,
            });
        }
        info!(pr = head.number, commit = %head.commit, %state, "commit status updated");

        Ok(Published {
            version: Version {
                reference: head.id,
                pr: Some(head.number.to_string()),
            },
            commit: head.commit,
            state,
        })
    }
}
