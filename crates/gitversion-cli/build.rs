use std::path::PathBuf;
use std::process::Command;

use gitversion_core::cache::{CacheStore, CACHE_FILE_NAME};
use gitversion_core::describe::DescribeOptions;
use gitversion_core::resolver::Resolver;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string())
}

fn rerun_if_changed(path: &str) {
    let p = std::path::Path::new(path);
    // `git rev-parse --git-path <x>` is relative to the build script's cwd (the crate dir);
    // emit absolute paths so Cargo never has to guess.
    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(p))
            .unwrap_or_else(|_| p.to_path_buf())
    };
    println!("cargo:rerun-if-changed={}", abs.display());
}

fn main() {
    // HEAD moves on checkout, the symbolic ref on commit, packed-refs and refs/tags on tagging.
    if let Some(head) = git(&["rev-parse", "--git-path", "HEAD"]) {
        rerun_if_changed(&head);
    }
    if let Some(head_ref) = git(&["symbolic-ref", "-q", "HEAD"]) {
        if let Some(head_ref_path) = git(&["rev-parse", "--git-path", &head_ref]) {
            rerun_if_changed(&head_ref_path);
        }
    }
    for name in ["packed-refs", "refs/tags"] {
        if let Some(path) = git(&["rev-parse", "--git-path", name]) {
            rerun_if_changed(&path);
        }
    }

    let manifest_dir = PathBuf::from(std::env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default());
    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").unwrap_or_default());
    // A packaged tarball has no OUT_DIR from earlier builds; it can only carry a record
    // written next to the manifest (`gitversion resolve --build crates/gitversion-cli`).
    let shipped = CacheStore::new(&manifest_dir);
    let shipped_path = manifest_dir.join(CACHE_FILE_NAME);
    if shipped_path.is_file() {
        println!("cargo:rerun-if-changed={}", shipped_path.display());
    }
    let (version, commit_sha) =
        match Resolver::new().resolve(&manifest_dir, &out_dir, &DescribeOptions::default()) {
            Ok(resolution) => (resolution.resolved.version, resolution.resolved.commit_sha),
            Err(err) => match shipped.load() {
                Ok(Some(resolved)) => (resolved.version, resolved.commit_sha),
                _ => {
                    println!("cargo:warning=gitversion: {err}");
                    ("nogit".to_string(), "nogit".to_string())
                }
            },
        };

    println!("cargo:rustc-env=GITVERSION_DESCRIBE={}", version);
    println!("cargo:rustc-env=GITVERSION_COMMIT_SHA={}", commit_sha);
}
