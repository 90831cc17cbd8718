use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::describe::DescribeOptions;
use crate::record::ResolvedVersion;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("git {command} failed under {dir}: {stderr}")]
    Failed {
        command: String,
        dir: PathBuf,
        stderr: String,
    },
    #[error("unexpected output from git {command}: {output:?}")]
    UnexpectedOutput { command: String, output: String },
}

/// Outcome of looking for a checked-out commit under a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadLookup {
    Commit(String),
    NotARepository,
    /// The repository exists but HEAD names a branch with no commits yet.
    Unborn,
}

/// Nearest-tag position of a commit, as reported by the describe query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Description {
    Tagged {
        tag: String,
        distance: u32,
        abbreviated: String,
    },
    Untagged,
}

/// Live repository state captured for a single resolution. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySnapshot {
    pub head_commit: String,
    pub description: Description,
}

impl RepositorySnapshot {
    pub fn into_resolved(self) -> ResolvedVersion {
        let version = match self.description {
            Description::Tagged { tag, distance: 0, .. } => tag,
            Description::Tagged {
                tag,
                distance,
                abbreviated,
            } => format!("{tag}-{distance}-g{abbreviated}"),
            Description::Untagged => self.head_commit.clone(),
        };
        ResolvedVersion {
            version,
            commit_sha: self.head_commit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Git {
    program: PathBuf,
}

impl Git {
    /// Find `git` on `PATH`. `None` means live metadata can never be read on
    /// this host.
    pub fn locate() -> Option<Self> {
        which::which("git").ok().map(|program| Self { program })
    }

    pub fn head(&self, dir: &Path) -> Result<HeadLookup, GitError> {
        let output = self.output(dir, ["rev-parse", "--git-dir"])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not a git repository") {
                return Ok(HeadLookup::NotARepository);
            }
            return Err(failed("rev-parse --git-dir", dir, &output));
        }

        let output = self.output(dir, ["rev-parse", "--verify", "--quiet", "HEAD"])?;
        if !output.status.success() {
            // --quiet keeps stderr empty when HEAD names a branch with no commits.
            if String::from_utf8_lossy(&output.stderr).trim().is_empty() {
                return Ok(HeadLookup::Unborn);
            }
            return Err(failed("rev-parse --verify HEAD", dir, &output));
        }
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !is_full_object_id(&sha) {
            return Err(GitError::UnexpectedOutput {
                command: "rev-parse --verify HEAD".to_string(),
                output: sha,
            });
        }
        Ok(HeadLookup::Commit(sha))
    }

    /// Describe `commit` relative to the nearest eligible tag. When several
    /// eligible tags sit on the described commit the lexically greatest wins.
    pub fn describe(
        &self,
        dir: &Path,
        commit: &str,
        options: &DescribeOptions,
    ) -> Result<Description, GitError> {
        let raw = self.run(dir, options.describe_args(commit))?;
        let description = parse_describe_output(&raw, commit)?;
        let Description::Tagged {
            tag,
            distance,
            abbreviated,
        } = description
        else {
            return Ok(Description::Untagged);
        };
        let tag = self.preferred_tag(dir, tag, options)?;
        Ok(Description::Tagged {
            tag,
            distance,
            abbreviated,
        })
    }

    fn preferred_tag(
        &self,
        dir: &Path,
        described: String,
        options: &DescribeOptions,
    ) -> Result<String, GitError> {
        let target = self.run(
            dir,
            [
                "rev-parse".to_string(),
                "--verify".to_string(),
                format!("refs/tags/{described}^{{commit}}"),
            ],
        )?;
        let listing = self.run(dir, options.tag_list_args(&target))?;
        let candidates = parse_tag_listing(&listing, options.include_lightweight_tags);
        Ok(candidates
            .into_iter()
            .chain(std::iter::once(described))
            .max()
            .unwrap_or_default())
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-C")
            .arg(dir)
            .env("LC_ALL", "C")
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE")
            .env_remove("GIT_CEILING_DIRECTORIES");
        cmd
    }

    fn output<I, S>(&self, dir: &Path, args: I) -> Result<Output, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        debug!(
            dir = %dir.display(),
            args = ?args.iter().map(|arg| arg.as_ref().to_string_lossy()).collect::<Vec<_>>(),
            "running git"
        );
        self.command(dir)
            .args(&args)
            .output()
            .map_err(|source| GitError::Spawn {
                program: self.program.display().to_string(),
                source,
            })
    }

    fn run<I, S>(&self, dir: &Path, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let output = self.output(dir, &args)?;
        if !output.status.success() {
            let command = args
                .iter()
                .map(|arg| arg.as_ref().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ");
            return Err(failed(&command, dir, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn failed(command: &str, dir: &Path, output: &Output) -> GitError {
    GitError::Failed {
        command: command.to_string(),
        dir: dir.to_path_buf(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn is_full_object_id(value: &str) -> bool {
    matches!(value.len(), 40 | 64) && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Parse `git describe --long --always` output for `commit`.
fn parse_describe_output(raw: &str, commit: &str) -> Result<Description, GitError> {
    let unexpected = || GitError::UnexpectedOutput {
        command: "describe".to_string(),
        output: raw.to_string(),
    };
    let re = Regex::new(r"^(?P<tag>.+)-(?P<distance>\d+)-g(?P<sha>[0-9a-f]+)$").expect("regex");
    if let Some(caps) = re.captures(raw) {
        let abbreviated = caps["sha"].to_string();
        if !commit.starts_with(&abbreviated) {
            return Err(unexpected());
        }
        let distance = caps["distance"].parse::<u32>().map_err(|_| unexpected())?;
        return Ok(Description::Tagged {
            tag: caps["tag"].to_string(),
            distance,
            abbreviated,
        });
    }
    // --always fallback: no tag reachable, git printed the abbreviated hash.
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_hexdigit()) && commit.starts_with(raw) {
        return Ok(Description::Untagged);
    }
    Err(unexpected())
}

fn parse_tag_listing(raw: &str, include_lightweight: bool) -> Vec<String> {
    raw.lines()
        .filter_map(|line| line.trim().split_once(' '))
        .filter(|(kind, _)| include_lightweight || *kind == "tag")
        .map(|(_, name)| name.to_string())
        .collect()
}
