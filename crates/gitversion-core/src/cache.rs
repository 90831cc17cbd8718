use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::record::ResolvedVersion;

pub const CACHE_FILE_NAME: &str = "gitversion.cache";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Written,
    /// The artifact already held identical bytes and was left untouched.
    Unchanged,
}

/// The persisted [`ResolvedVersion`] of one output directory.
///
/// Every output directory owns exactly one artifact, so a project and each of
/// its subprojects never share a record as long as they configure into
/// different directories.
#[derive(Debug, Clone)]
pub struct CacheStore {
    output_dir: PathBuf,
}

impl CacheStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.output_dir.join(CACHE_FILE_NAME)
    }

    pub fn store(&self, resolved: &ResolvedVersion) -> Result<StoreOutcome, CacheError> {
        let path = self.path();
        let written = write_atomic(&path, resolved.to_record().as_bytes())
            .map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;
        let outcome = if written {
            StoreOutcome::Written
        } else {
            StoreOutcome::Unchanged
        };
        debug!(path = %path.display(), ?outcome, "stored version record");
        Ok(outcome)
    }

    /// Load the record. A missing, non-UTF-8, or incomplete artifact reads as
    /// `None`; only real I/O failures are errors.
    pub fn load(&self) -> Result<Option<ResolvedVersion>, CacheError> {
        let path = self.path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let Ok(raw) = String::from_utf8(bytes) else {
            warn!(path = %path.display(), "discarding version record that is not UTF-8");
            return Ok(None);
        };
        match ResolvedVersion::from_record(&raw) {
            Ok(resolved) => Ok(Some(resolved)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding malformed version record");
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<bool, CacheError> {
        let path = self.path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }
}

/// Replace `path` with `contents` via a uniquely named sibling file and a
/// rename, so readers see either the old or the new file, never a partial one.
/// Returns `false` when the file already holds exactly `contents`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<bool> {
    if fs::read(path).is_ok_and(|existing| existing == contents) {
        return Ok(false);
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = parent.join(format!(".{file_name}.{}.tmp", Ulid::new()));
    if let Err(err) = write_then_rename(&tmp, path, contents) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(true)
}

fn write_then_rename(tmp: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, path)
}
