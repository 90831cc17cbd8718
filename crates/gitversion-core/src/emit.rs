use crate::resolver::Resolution;

pub const CARGO_VERSION_VAR: &str = "GIT_VERSION";
pub const CARGO_COMMIT_SHA_VAR: &str = "GIT_COMMIT_SHA";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmitFormat {
    /// `Version=..` / `CommitSha=..` lines.
    #[default]
    KeyValue,
    Json,
    /// `cargo:rustc-env=` directives for a build script.
    Cargo,
}

impl EmitFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            EmitFormat::KeyValue => "kv",
            EmitFormat::Json => "json",
            EmitFormat::Cargo => "cargo",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "kv" | "env" => Some(Self::KeyValue),
            "json" => Some(Self::Json),
            "cargo" => Some(Self::Cargo),
            _ => None,
        }
    }
}

pub fn render(resolution: &Resolution, format: EmitFormat) -> Result<String, serde_json::Error> {
    let resolved = &resolution.resolved;
    Ok(match format {
        EmitFormat::KeyValue => resolved.to_record(),
        EmitFormat::Json => format!("{}\n", serde_json::to_string_pretty(resolution)?),
        EmitFormat::Cargo => format!(
            "cargo:rustc-env={CARGO_VERSION_VAR}={}\ncargo:rustc-env={CARGO_COMMIT_SHA_VAR}={}\n",
            resolved.version, resolved.commit_sha
        ),
    })
}
