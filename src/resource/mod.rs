pub mod check;
pub mod fetch;
pub mod publish;
pub mod record;

pub use check::Checker;
pub use fetch::Fetcher;
pub use publish::Publisher;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::PathBuf;
use thiserror::Error;

use crate::config::Source;
use crate::forge::{CommitState, ForgeError, PullRequest, UnknownCommitState};

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    InvalidStatus(#[from] UnknownCommitState),

    #[error("version {0} not found")]
    VersionNotFound(String),

    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    RecordWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} not found, was the pull request fetched into this directory?")]
    RecordMissing { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    RecordRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid contents in {path}: {reason}")]
    InvalidRecord { path: PathBuf, reason: String },

    #[error("GitHub recorded status {confirmed} instead of {requested}")]
    StatusNotConfirmed {
        requested: CommitState,
        confirmed: CommitState,
    },

    #[error("Failed to read request from stdin: {0}")]
    ReadRequest(#[source] serde_json::Error),

    #[error("Failed to write response to stdout: {0}")]
    WriteResponse(#[source] serde_json::Error),
}

/// The unit Concourse tracks between polls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Pull request identity
    #[serde(rename = "ref", default)]
    pub reference: String,
    /// Pull request number, as a string like every Concourse version field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr: Option<String>,
}

impl Version {
    pub fn of(pull: &PullRequest) -> Self {
        Self {
            reference: pull.id.clone(),
            pr: Some(pull.number.to_string()),
        }
    }
}

/// A name/value pair shown in the Concourse UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub value: String,
}

impl Metadata {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub source: Source,
    /// Absent (or null) on the very first check
    #[serde(default)]
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InRequest {
    #[serde(default)]
    pub source: Source,
    pub version: Version,
}

#[derive(Debug, Clone, Serialize)]
pub struct InResponse {
    pub version: Version,
    pub metadata: Vec<Metadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutParams {
    /// One of error, failure, pending, success
    pub status: String,
    /// Directory, relative to the sources dir, that `in` fetched into
    #[serde(default)]
    pub path: String,
    pub context: Option<String>,
    pub description: Option<String>,
    pub target_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutRequest {
    #[serde(default)]
    pub source: Source,
    pub params: OutParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutResponse {
    pub version: Version,
    pub metadata: Vec<Metadata>,
}

/// Decode one JSON request object.
pub fn read_request<T: DeserializeOwned>(reader: impl Read) -> Result<T, ResourceError> {
    serde_json::from_reader(reader).map_err(ResourceError::ReadRequest)
}

/// Encode one JSON response value, newline-terminated.
pub fn write_response<T: Serialize>(mut writer: impl Write, response: &T) -> Result<(), ResourceError> {
    serde_json::to_writer(&mut writer, response).map_err(ResourceError::WriteResponse)?;
    writeln!(writer).map_err(|e| ResourceError::WriteResponse(serde_json::Error::io(e)))
}
