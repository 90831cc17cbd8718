use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{CacheError, CacheStore};
use crate::describe::{DescribeOptions, OptionsError};
use crate::git::{Git, GitError, HeadLookup, RepositorySnapshot};
use crate::record::ResolvedVersion;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("working directory {0} does not exist")]
    MissingWorkingDirectory(PathBuf),
    #[error(
        "cannot resolve version for {working_dir}: no repository metadata and no cached version in {output_dir}"
    )]
    NoRepository {
        working_dir: PathBuf,
        output_dir: PathBuf,
    },
    #[error("repository metadata for {working_dir} is unusable: {source}")]
    Git {
        working_dir: PathBuf,
        #[source]
        source: GitError,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("invalid describe options: {0}")]
    InvalidOptions(#[from] OptionsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    Live,
    Cache,
}

impl VersionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            VersionSource::Live => "live",
            VersionSource::Cache => "cache",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    #[serde(flatten)]
    pub resolved: ResolvedVersion,
    pub source: VersionSource,
}

/// Why live metadata could not be consulted. Each of these sends resolution
/// to the cache tier; broken metadata is a [`GitError`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsentReason {
    GitUnavailable,
    NotARepository,
    NoCommits,
}

impl AbsentReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AbsentReason::GitUnavailable => "git_unavailable",
            AbsentReason::NotARepository => "not_a_repository",
            AbsentReason::NoCommits => "no_commits",
        }
    }
}

enum LiveLookup {
    Found(RepositorySnapshot),
    Absent(AbsentReason),
}

/// Stateless two-tier resolver: live repository metadata first, the output
/// directory's cached record second.
#[derive(Debug, Clone)]
pub struct Resolver {
    git: Option<Git>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self { git: Git::locate() }
    }

    /// `None` models a host without git, where only the cache can answer.
    pub fn with_git(git: Option<Git>) -> Self {
        Self { git }
    }

    pub fn resolve(
        &self,
        working_dir: &Path,
        output_dir: &Path,
        options: &DescribeOptions,
    ) -> Result<Resolution, ResolveError> {
        options.validate()?;
        if !working_dir.is_dir() {
            return Err(ResolveError::MissingWorkingDirectory(
                working_dir.to_path_buf(),
            ));
        }
        let cache = CacheStore::new(output_dir);

        let lookup = self
            .lookup_live(working_dir, options)
            .map_err(|source| ResolveError::Git {
                working_dir: working_dir.to_path_buf(),
                source,
            })?;

        match lookup {
            LiveLookup::Found(snapshot) => {
                let resolved = snapshot.into_resolved();
                cache.store(&resolved)?;
                info!(
                    dir = %working_dir.display(),
                    version = %resolved.version,
                    commit = %resolved.commit_sha,
                    "resolved version from repository"
                );
                Ok(Resolution {
                    resolved,
                    source: VersionSource::Live,
                })
            }
            LiveLookup::Absent(reason) => {
                debug!(
                    dir = %working_dir.display(),
                    reason = reason.as_str(),
                    "no live repository metadata, falling back to cached record"
                );
                let Some(resolved) = cache.load()? else {
                    return Err(ResolveError::NoRepository {
                        working_dir: working_dir.to_path_buf(),
                        output_dir: output_dir.to_path_buf(),
                    });
                };
                info!(
                    dir = %working_dir.display(),
                    version = %resolved.version,
                    commit = %resolved.commit_sha,
                    "resolved version from cache"
                );
                Ok(Resolution {
                    resolved,
                    source: VersionSource::Cache,
                })
            }
        }
    }

    fn lookup_live(
        &self,
        working_dir: &Path,
        options: &DescribeOptions,
    ) -> Result<LiveLookup, GitError> {
        let Some(git) = &self.git else {
            return Ok(LiveLookup::Absent(AbsentReason::GitUnavailable));
        };
        let head_commit = match git.head(working_dir)? {
            HeadLookup::Commit(sha) => sha,
            HeadLookup::NotARepository => {
                return Ok(LiveLookup::Absent(AbsentReason::NotARepository))
            }
            HeadLookup::Unborn => return Ok(LiveLookup::Absent(AbsentReason::NoCommits)),
        };
        // Describe the captured sha, not HEAD, so both values come from one state.
        let description = git.describe(working_dir, &head_commit, options)?;
        Ok(LiveLookup::Found(RepositorySnapshot {
            head_commit,
            description,
        }))
    }
}

/// Resolve with the `git` found on `PATH`.
pub fn resolve(
    working_dir: &Path,
    output_dir: &Path,
    options: &DescribeOptions,
) -> Result<Resolution, ResolveError> {
    Resolver::new().resolve(working_dir, output_dir, options)
}
