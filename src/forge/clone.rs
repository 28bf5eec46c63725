//! Materialise a pull request's head on disk with the system `git`.
//!
//! Each step is a separate `git` process owned by this invocation; nothing is
//! written outside the destination directory.

use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::ForgeError;

/// Local branch the PR head is checked out on.
pub const PR_BRANCH: &str = "pr";

const TOKEN_USER: &str = "x-access-token";
const REDACTED: &str = "***";

/// Clone `clone_url` into `dest` and check out `pull/<number>/head`.
pub async fn clone_pull_request(
    clone_url: &str,
    token: Option<&str>,
    insecure: bool,
    dest: &Path,
    number: u64,
) -> Result<(), ForgeError> {
    let remote = authenticated_url(clone_url, token)?;
    // git may echo the remote in either the raw or the percent-encoded form
    let secrets: Vec<&str> = token.into_iter().chain(remote.password()).collect();

    let mut clone = git(insecure);
    clone.args(["clone", "--quiet", remote.as_str()]).arg(dest);
    run(clone, "clone", &secrets).await?;

    let mut fetch = git(insecure);
    fetch
        .current_dir(dest)
        .args(["fetch", "--quiet", "origin", head_refspec(number).as_str()]);
    run(fetch, "fetch", &secrets).await?;

    let mut checkout = git(insecure);
    checkout
        .current_dir(dest)
        .args(["checkout", "--quiet", PR_BRANCH]);
    run(checkout, "checkout", &secrets).await
}

/// Embed the token as basic-auth credentials so git never prompts.
pub fn authenticated_url(clone_url: &str, token: Option<&str>) -> Result<reqwest::Url, ForgeError> {
    let invalid = || ForgeError::InvalidCloneUrl(clone_url.to_string());
    let mut url = reqwest::Url::parse(clone_url).map_err(|_| invalid())?;

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        url.set_username(TOKEN_USER).map_err(|_| invalid())?;
        url.set_password(Some(token)).map_err(|_| invalid())?;
    }

    Ok(url)
}

fn head_refspec(number: u64) -> String {
    format!("pull/{}/head:{}", number, PR_BRANCH)
}

fn git(insecure: bool) -> Command {
    let mut cmd = Command::new("git");
    if insecure {
        cmd.args(["-c", "http.sslVerify=false"]);
    }
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    cmd
}

async fn run(mut cmd: Command, step: &'static str, secrets: &[&str]) -> Result<(), ForgeError> {
    let output = cmd
        .output()
        .await
        .map_err(|source| ForgeError::GitSpawn { step, source })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ForgeError::Git {
            step,
            stderr: redact(stderr.trim(), secrets),
        });
    }

    debug!(step, "git step finished");
    Ok(())
}

/// Scrub credentials from git output before it reaches an error message.
fn redact(text: &str, secrets: &[&str]) -> String {
    let mut secrets: Vec<&str> = secrets.iter().copied().filter(|s| !s.is_empty()).collect();
    // longest first, so a secret containing another is scrubbed whole
    secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
    secrets
        .into_iter()
        .fold(text.to_string(), |text, secret| text.replace(secret, REDACTED))
}
