use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::describe::{DescribeOptions, DescribeOverrides};

pub const CONFIG_FILE_NAME: &str = ".gitversion.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitVersionConfig {
    /// Project-wide describe defaults; per-call options still override these.
    #[serde(default)]
    pub describe: DescribeOverrides,
}

pub fn config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_FILE_NAME)
}

/// Read `.gitversion.toml` from `project_dir` itself. Ancestors are not
/// searched, so a subproject never inherits its parent's settings.
pub fn load_config(project_dir: &Path) -> Result<Option<GitVersionConfig>, ConfigError> {
    let path = config_path(project_dir);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(ConfigError::Io { path, source }),
    };
    let config = toml::from_str::<GitVersionConfig>(&text)
        .map_err(|source| ConfigError::Parse { path, source })?;
    Ok(Some(config))
}

/// Defaults with the project's config file layered on top.
pub fn load_describe_options(project_dir: &Path) -> Result<DescribeOptions, ConfigError> {
    let options = DescribeOptions::default();
    Ok(match load_config(project_dir)? {
        Some(config) => options.with_overrides(&config.describe),
        None => options,
    })
}
