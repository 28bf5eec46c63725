use serde::Deserialize;
use thiserror::Error;

use crate::forge::IdentityScheme;

/// API root used when `api_endpoint` is not configured.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.github.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Source must set both owner and repo, or a repository uri")]
    MissingRepository,

    #[error("Invalid repository uri: {0}")]
    InvalidUri(String),

    #[error("Invalid api_endpoint: {0}")]
    InvalidApiEndpoint(String),
}

/// The `source` block Concourse passes to every invocation.
///
/// Every field is optional on the wire; missing and empty strings are treated
/// the same way, since pipelines often template them in as `""`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Source {
    /// Repository owner (user or organisation)
    pub owner: Option<String>,
    /// Repository name
    pub repo: Option<String>,
    /// Repository URL, used when owner/repo are not given
    /// (e.g., https://github.com/org/repo.git)
    pub uri: Option<String>,
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub access_token: Option<String>,
    /// Base URL of a GitHub Enterprise API (e.g., https://ghe.example.com/api/v3)
    pub api_endpoint: Option<String>,
    /// Disable TLS certificate verification for both the API and git
    #[serde(default)]
    pub skip_ssl_verification: bool,
    /// How a pull request is turned into a version ref
    #[serde(default)]
    pub version_id: IdentityScheme,
}

/// An `owner/repo` pair on the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl Source {
    /// Resolve the target repository: explicit owner/repo take precedence,
    /// otherwise the `uri` is parsed.
    pub fn repository(&self) -> Result<Repository, ConfigError> {
        if let (Some(owner), Some(repo)) = (non_empty(&self.owner), non_empty(&self.repo)) {
            return Ok(Repository {
                owner: owner.to_string(),
                repo: repo.to_string(),
            });
        }

        match non_empty(&self.uri) {
            Some(uri) => parse_repository_uri(uri),
            None => Err(ConfigError::MissingRepository),
        }
    }

    /// Resolve the GitHub token: source value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        non_empty(&self.access_token)
            .map(str::to_string)
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()))
    }

    /// API root without a trailing slash, ready for path concatenation.
    pub fn api_base(&self) -> Result<String, ConfigError> {
        let raw = non_empty(&self.api_endpoint).unwrap_or(DEFAULT_API_ENDPOINT);
        let url = reqwest::Url::parse(raw)
            .map_err(|_| ConfigError::InvalidApiEndpoint(raw.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidApiEndpoint(raw.to_string()));
        }

        Ok(url.as_str().trim_end_matches('/').to_string())
    }
}

/// Parse a repository URL into its owner and name.
///
/// Any host is accepted so that enterprise installations work:
/// `https://{host}/{owner}/{repo}[.git]`
pub fn parse_repository_uri(uri: &str) -> Result<Repository, ConfigError> {
    let parsed = reqwest::Url::parse(uri).map_err(|_| ConfigError::InvalidUri(uri.to_string()))?;

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(|| ConfigError::InvalidUri(uri.to_string()))?
        .filter(|segment| !segment.is_empty())
        .collect();

    if segments.len() != 2 {
        return Err(ConfigError::InvalidUri(uri.to_string()));
    }

    let repo = segments[1].strip_suffix(".git").unwrap_or(segments[1]);
    if repo.is_empty() {
        return Err(ConfigError::InvalidUri(uri.to_string()));
    }

    Ok(Repository {
        owner: segments[0].to_string(),
        repo: repo.to_string(),
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_source() {
        let source = Source::default();
        assert!(source.owner.is_none());
        assert!(!source.skip_ssl_verification);
        assert_eq!(source.version_id, IdentityScheme::Composite);
        assert!(matches!(source.repository(), Err(ConfigError::MissingRepository)));
    }

    #[test]
    fn test_parse_source_json() {
        let json = r#"{
            "owner": "org",
            "repo": "service",
            "access_token": "ghp_abc",
            "api_endpoint": "https://ghe.example.com/api/v3/",
            "skip_ssl_verification": true,
            "version_id": "sha"
        }"#;
        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(
            source.repository().unwrap(),
            Repository {
                owner: "org".to_string(),
                repo: "service".to_string()
            }
        );
        assert_eq!(source.github_token().as_deref(), Some("ghp_abc"));
        assert_eq!(source.api_base().unwrap(), "https://ghe.example.com/api/v3");
        assert!(source.skip_ssl_verification);
        assert_eq!(source.version_id, IdentityScheme::CommitSha);
    }

    #[test]
    fn test_repository_falls_back_to_uri() {
        let source = Source {
            owner: Some(String::new()),
            uri: Some("https://github.com/org/repo.git".to_string()),
            ..Source::default()
        };
        let repository = source.repository().unwrap();
        assert_eq!(repository.to_string(), "org/repo");
    }

    #[test]
    fn test_parse_invalid_repository_uri() {
        assert!(parse_repository_uri("not-a-url").is_err());
        assert!(parse_repository_uri("https://github.com/org").is_err());
        assert!(parse_repository_uri("https://github.com/org/repo/pull/42").is_err());
        assert!(parse_repository_uri("https://github.com/org/.git").is_err());
    }

    #[test]
    fn test_default_api_base() {
        assert_eq!(Source::default().api_base().unwrap(), "https://api.github.com");
    }

    #[test]
    fn test_invalid_api_endpoint() {
        let source = Source {
            api_endpoint: Some("ftp://ghe.example.com".to_string()),
            ..Source::default()
        };
        assert!(matches!(
            source.api_base(),
            Err(ConfigError::InvalidApiEndpoint(_))
        ));
    }
}
