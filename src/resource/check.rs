use tracing::{debug, info, instrument};

use super::{CheckRequest, ResourceError, Version};
use crate::forge::{Forge, PullRequest};

/// Work out which versions a check should emit.
///
/// `open_pulls` must be ordered least recently updated first; that order is
/// the emission order. Rules:
/// - no open pulls: nothing
/// - no previous ref, or one that no longer matches an open pull: only the
///   newest pull
/// - previous ref found at index `i`: `open_pulls[i..]`, so the previous
///   version is always re-emitted first
///
/// Identities are not deduplicated. If the forge reports the same identity
/// twice, the oldest occurrence is the match and the duplicate is emitted.
pub fn reconcile(previous: Option<&Version>, open_pulls: &[PullRequest]) -> Vec<Version> {
    let Some(newest) = open_pulls.last() else {
        return Vec::new();
    };

    let start = previous
        .map(|v| v.reference.as_str())
        .filter(|reference| !reference.is_empty())
        .and_then(|reference| open_pulls.iter().position(|p| p.id == reference));

    match start {
        Some(index) => open_pulls[index..].iter().map(Version::of).collect(),
        None => vec![Version::of(newest)],
    }
}

/// The `check` command.
pub struct Checker<'a> {
    forge: &'a dyn Forge,
}

impl<'a> Checker<'a> {
    pub fn new(forge: &'a dyn Forge) -> Self {
        Self { forge }
    }

    #[instrument(skip_all)]
    pub async fn run(&self, request: &CheckRequest) -> Result<Vec<Version>, ResourceError> {
        let pulls = self.forge.list_open_pull_requests().await?;
        debug!(
            previous = request.version.as_ref().map(|v| v.reference.as_str()).unwrap_or(""),
            open = pulls.len(),
            "reconciling versions"
        );

        let versions = reconcile(request.version.as_ref(), &pulls);
        info!(versions = versions.len(), "check complete");
        Ok(versions)
    }
}
