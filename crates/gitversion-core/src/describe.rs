use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ABBREVIATION_LENGTH: u8 = 7;
pub const MIN_ABBREVIATION_LENGTH: u8 = 4;
pub const MAX_ABBREVIATION_LENGTH: u8 = 40;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("abbreviation length {0} is outside 4..=40")]
    AbbreviationOutOfRange(u8),
    #[error("match pattern must not be empty")]
    EmptyMatchPattern,
    #[error("unsupported describe argument: {0}")]
    UnsupportedArgument(String),
    #[error("describe argument {0} requires a value")]
    MissingValue(String),
    #[error("invalid abbreviation length: {0}")]
    InvalidAbbreviation(String),
    #[error("cannot split describe arguments: {0}")]
    Split(#[from] shell_words::ParseError),
}

/// Which tags are eligible for the describe query and how the trailing short
/// hash is abbreviated. Supplied per resolution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeOptions {
    pub match_pattern: Option<String>,
    pub include_lightweight_tags: bool,
    pub abbreviation_length: u8,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self {
            match_pattern: None,
            include_lightweight_tags: false,
            abbreviation_length: DEFAULT_ABBREVIATION_LENGTH,
        }
    }
}

impl DescribeOptions {
    pub fn with_overrides(mut self, overrides: &DescribeOverrides) -> Self {
        if let Some(pattern) = &overrides.match_pattern {
            self.match_pattern = Some(pattern.clone());
        }
        if let Some(value) = overrides.include_lightweight_tags {
            self.include_lightweight_tags = value;
        }
        if let Some(value) = overrides.abbreviation_length {
            self.abbreviation_length = value;
        }
        self
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if !(MIN_ABBREVIATION_LENGTH..=MAX_ABBREVIATION_LENGTH).contains(&self.abbreviation_length)
        {
            return Err(OptionsError::AbbreviationOutOfRange(self.abbreviation_length));
        }
        if self
            .match_pattern
            .as_deref()
            .is_some_and(|pattern| pattern.trim().is_empty())
        {
            return Err(OptionsError::EmptyMatchPattern);
        }
        Ok(())
    }

    /// Arguments for `git describe` against `commit`.
    ///
    /// `--long` keeps the distance and hash even on an exact tag so the output
    /// always has one shape; `--always` turns "no tag reachable" into a bare
    /// abbreviated hash instead of a failure.
    pub fn describe_args(&self, commit: &str) -> Vec<String> {
        let mut args = vec![
            "describe".to_string(),
            "--long".to_string(),
            "--always".to_string(),
            format!("--abbrev={}", self.abbreviation_length),
        ];
        if self.include_lightweight_tags {
            args.push("--tags".to_string());
        }
        if let Some(pattern) = &self.match_pattern {
            args.push(format!("--match={pattern}"));
        }
        args.push(commit.to_string());
        args
    }

    /// Arguments listing the tags on `target` that the describe query may use.
    ///
    /// `git tag --list` matches the short tag name without pathname rules,
    /// as `describe --match` does, so `release*` also matches `release/1.0`.
    pub fn tag_list_args(&self, target: &str) -> Vec<String> {
        let mut args = vec![
            "tag".to_string(),
            "--list".to_string(),
            format!("--points-at={target}"),
            "--format=%(objecttype) %(refname:strip=2)".to_string(),
        ];
        if let Some(pattern) = &self.match_pattern {
            args.push(pattern.clone());
        }
        args
    }
}

/// Partial options layered over [`DescribeOptions`]; unset fields keep the
/// lower layer's value. Also the shape of the `[describe]` config table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeOverrides {
    #[serde(default)]
    pub match_pattern: Option<String>,
    #[serde(default)]
    pub include_lightweight_tags: Option<bool>,
    #[serde(default)]
    pub abbreviation_length: Option<u8>,
}

/// Parse describe arguments written the way `git describe` spells them, e.g.
/// `--abbrev=4;--tags` or `--tags --match 'v*'`.
pub fn parse_describe_args(raw: &str) -> Result<DescribeOverrides, OptionsError> {
    let mut words = Vec::new();
    for chunk in raw.split(';') {
        words.extend(shell_words::split(chunk)?);
    }

    let mut overrides = DescribeOverrides::default();
    let mut iter = words.into_iter();
    while let Some(word) = iter.next() {
        match word.as_str() {
            "--tags" => overrides.include_lightweight_tags = Some(true),
            // Always implied by the resolver.
            "--long" | "--always" => {}
            "--match" => {
                let value = iter
                    .next()
                    .ok_or_else(|| OptionsError::MissingValue(word.clone()))?;
                overrides.match_pattern = Some(value);
            }
            _ => {
                if let Some(value) = word.strip_prefix("--abbrev=") {
                    let length = value
                        .parse::<u8>()
                        .map_err(|_| OptionsError::InvalidAbbreviation(value.to_string()))?;
                    overrides.abbreviation_length = Some(length);
                } else if let Some(value) = word.strip_prefix("--match=") {
                    overrides.match_pattern = Some(value.to_string());
                } else {
                    return Err(OptionsError::UnsupportedArgument(word));
                }
            }
        }
    }
    Ok(overrides)
}
