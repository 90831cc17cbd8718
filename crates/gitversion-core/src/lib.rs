//! Project version resolution from git tags, with a cached fallback for
//! source trees that no longer carry repository metadata.

pub mod cache;
pub mod config;
pub mod describe;
pub mod emit;
pub mod git;
pub mod record;
pub mod resolver;

pub use describe::DescribeOptions;
pub use record::ResolvedVersion;
pub use resolver::{resolve, Resolution, ResolveError, Resolver, VersionSource};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
