use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const VERSION_KEY: &str = "Version";
pub const COMMIT_SHA_KEY: &str = "CommitSha";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is missing the {0} key")]
    MissingKey(&'static str),
    #[error("record key {0} has an empty value")]
    EmptyValue(&'static str),
    #[error("record line {line} is not a Key=Value pair: {content:?}")]
    MalformedLine { line: usize, content: String },
}

/// The pair handed back to the build description.
///
/// `commit_sha` is always the full id of the commit checked out at resolution
/// time. `version` is an exact tag name, a `<tag>-<n>-g<sha>` descriptor, or the
/// full commit id when no tag is reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    pub version: String,
    pub commit_sha: String,
}

impl ResolvedVersion {
    pub fn new(version: impl Into<String>, commit_sha: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            commit_sha: commit_sha.into(),
        }
    }

    /// Serialize as newline-terminated `Key=Value` lines in a fixed order, so
    /// identical input always yields identical bytes.
    pub fn to_record(&self) -> String {
        format!(
            "{}={}\n{}={}\n",
            VERSION_KEY, self.version, COMMIT_SHA_KEY, self.commit_sha
        )
    }

    pub fn from_record(raw: &str) -> Result<Self, RecordError> {
        let mut version = None;
        let mut commit_sha = None;
        for (idx, line) in raw.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(RecordError::MalformedLine {
                    line: idx + 1,
                    content: line.to_string(),
                });
            };
            match key.trim() {
                VERSION_KEY => version = Some(value.trim().to_string()),
                COMMIT_SHA_KEY => commit_sha = Some(value.trim().to_string()),
                _ => {}
            }
        }
        Ok(Self {
            version: required(version, VERSION_KEY)?,
            commit_sha: required(commit_sha, COMMIT_SHA_KEY)?,
        })
    }
}

fn required(value: Option<String>, key: &'static str) -> Result<String, RecordError> {
    match value {
        None => Err(RecordError::MissingKey(key)),
        Some(value) if value.is_empty() => Err(RecordError::EmptyValue(key)),
        Some(value) => Ok(value),
    }
}
