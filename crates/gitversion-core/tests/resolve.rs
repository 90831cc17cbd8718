use std::fs;
use std::path::Path;
use std::process::Command;

use gitversion_core::cache::{CacheStore, CACHE_FILE_NAME};
use gitversion_core::describe::DescribeOptions;
use gitversion_core::record::ResolvedVersion;
use gitversion_core::resolver::{ResolveError, Resolver, VersionSource};
use pretty_assertions::assert_eq;
use regex::Regex;
use tempfile::TempDir;

fn run_git(repo: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
        .args(args)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn init_repo(repo: &Path) {
    fs::create_dir_all(repo).expect("repo dir");
    run_git(repo, &["init"]);
    run_git(repo, &["config", "user.name", "GitVersion Test"]);
    run_git(repo, &["config", "user.email", "gitversion-test@example.com"]);
}

fn commit_file(repo: &Path, name: &str) {
    let path = repo.join(name);
    let mut body = fs::read_to_string(&path).unwrap_or_default();
    body.push_str("Line\n");
    fs::write(&path, body).expect("write file");
    run_git(repo, &["add", name]);
    run_git(repo, &["commit", "-m", &format!("Dummy commit: {name}")]);
}

fn tag_annotated(repo: &Path, name: &str) {
    run_git(repo, &["tag", "-a", "-m", &format!("Version {name}"), name]);
}

fn tag_lightweight(repo: &Path, name: &str) {
    run_git(repo, &["tag", name]);
}

fn head(repo: &Path) -> String {
    run_git(repo, &["rev-parse", "HEAD"])
}

/// A checkout with one initial commit, mirroring a freshly set-up project.
fn seeded_repo() -> TempDir {
    let temp = TempDir::new().expect("tempdir");
    init_repo(temp.path());
    commit_file(temp.path(), "CMakeLists.txt");
    temp
}

fn resolver() -> Resolver {
    Resolver::new()
}

#[test]
fn version_without_tag_is_the_head_commit() {
    let repo = seeded_repo();
    let build = repo.path().join("build");
    let resolution = resolver()
        .resolve(repo.path(), &build, &DescribeOptions::default())
        .expect("resolve");
    let sha = head(repo.path());
    assert_eq!(resolution.resolved.commit_sha, sha);
    assert_eq!(resolution.resolved.version, sha);
    assert_eq!(resolution.source, VersionSource::Live);
}

#[test]
fn tagged_head_uses_the_tag_name() {
    let repo = seeded_repo();
    commit_file(repo.path(), "f1.txt");
    tag_annotated(repo.path(), "1.0");

    let resolution = resolver()
        .resolve(repo.path(), &repo.path().join("build"), &DescribeOptions::default())
        .expect("resolve");
    assert_eq!(resolution.resolved.commit_sha, head(repo.path()));
    assert_eq!(resolution.resolved.version, "1.0");
}

#[test]
fn commits_after_a_tag_append_distance_and_short_hash() {
    let repo = seeded_repo();
    commit_file(repo.path(), "f1.txt");
    tag_annotated(repo.path(), "1.0");
    commit_file(repo.path(), "f2.txt");
    commit_file(repo.path(), "f3.txt");

    let resolution = resolver()
        .resolve(repo.path(), &repo.path().join("build"), &DescribeOptions::default())
        .expect("resolve");
    let sha = head(repo.path());
    assert_eq!(resolution.resolved.commit_sha, sha);
    let re = Regex::new(r"^1\.0-2-g(?P<sha>[0-9a-f]{7})$").expect("regex");
    let caps = re
        .captures(&resolution.resolved.version)
        .unwrap_or_else(|| panic!("unexpected version {}", resolution.resolved.version));
    assert!(sha.starts_with(&caps["sha"]));
}

#[test]
fn cached_version_survives_removed_metadata() {
    let repo = seeded_repo();
    commit_file(repo.path(), "f1.txt");
    tag_annotated(repo.path(), "1.0");
    let build = repo.path().join("build2");

    let live = resolver()
        .resolve(repo.path(), &build, &DescribeOptions::default())
        .expect("live resolve");
    let commit = head(repo.path());
    fs::remove_dir_all(repo.path().join(".git")).expect("remove .git");

    let cached = resolver()
        .resolve(repo.path(), &build, &DescribeOptions::default())
        .expect("cached resolve");
    assert_eq!(cached.source, VersionSource::Cache);
    assert_eq!(cached.resolved, live.resolved);
    assert_eq!(cached.resolved, ResolvedVersion::new("1.0", commit));
}

#[test]
fn removed_metadata_without_cache_is_no_repository() {
    let repo = seeded_repo();
    resolver()
        .resolve(repo.path(), &repo.path().join("build"), &DescribeOptions::default())
        .expect("live resolve");
    fs::remove_dir_all(repo.path().join(".git")).expect("remove .git");

    let err = resolver()
        .resolve(
            repo.path(),
            &repo.path().join("other-build"),
            &DescribeOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoRepository { .. }), "{err}");
    assert!(err.to_string().contains("other-build"));
}

#[test]
fn malformed_cache_without_metadata_is_no_repository() {
    let temp = TempDir::new().expect("tempdir");
    let build = temp.path().join("build");
    fs::create_dir_all(&build).expect("build");
    fs::write(build.join(CACHE_FILE_NAME), "Version=1.0\n").expect("write");

    let err = resolver()
        .resolve(temp.path(), &build, &DescribeOptions::default())
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoRepository { .. }), "{err}");
}

#[test]
fn live_resolution_repairs_a_malformed_cache() {
    let repo = seeded_repo();
    let build = repo.path().join("build");
    fs::create_dir_all(&build).expect("build");
    fs::write(build.join(CACHE_FILE_NAME), "garbage").expect("write");

    let resolution = resolver()
        .resolve(repo.path(), &build, &DescribeOptions::default())
        .expect("resolve");
    let stored = CacheStore::new(&build).load().expect("load");
    assert_eq!(stored, Some(resolution.resolved));
}

#[test]
fn subprojects_resolve_against_their_own_repository() {
    let parent = seeded_repo();
    tag_annotated(parent.path(), "project-1.0");

    let sub = parent.path().join("subproject");
    init_repo(&sub);
    commit_file(&sub, "CMakeLists.txt");
    tag_annotated(&sub, "subproject-1.0");

    let build = parent.path().join("build");
    let sub_build = build.join("subproject");
    let options = DescribeOptions::default();

    let parent_resolution = resolver()
        .resolve(parent.path(), &build, &options)
        .expect("parent");
    let sub_resolution = resolver()
        .resolve(&sub, &sub_build, &options)
        .expect("subproject");

    assert_eq!(parent_resolution.resolved.version, "project-1.0");
    assert_eq!(parent_resolution.resolved.commit_sha, head(parent.path()));
    assert_eq!(sub_resolution.resolved.version, "subproject-1.0");
    assert_eq!(sub_resolution.resolved.commit_sha, head(&sub));

    assert_eq!(
        CacheStore::new(&build).load().expect("load").map(|r| r.version),
        Some("project-1.0".to_string())
    );
    assert_eq!(
        CacheStore::new(&sub_build).load().expect("load").map(|r| r.version),
        Some("subproject-1.0".to_string())
    );
}

#[test]
fn subproject_cache_survives_when_both_lose_metadata() {
    let parent = seeded_repo();
    tag_annotated(parent.path(), "project-1.0");
    let sub = parent.path().join("subproject");
    init_repo(&sub);
    commit_file(&sub, "CMakeLists.txt");
    tag_annotated(&sub, "subproject-1.0");

    let build = parent.path().join("build");
    let sub_build = build.join("subproject");
    let options = DescribeOptions::default();
    resolver().resolve(parent.path(), &build, &options).expect("parent");
    resolver().resolve(&sub, &sub_build, &options).expect("subproject");

    fs::remove_dir_all(sub.join(".git")).expect("remove sub .git");
    fs::remove_dir_all(parent.path().join(".git")).expect("remove parent .git");

    let parent_cached = resolver().resolve(parent.path(), &build, &options).expect("parent");
    let sub_cached = resolver().resolve(&sub, &sub_build, &options).expect("subproject");
    assert_eq!(parent_cached.resolved.version, "project-1.0");
    assert_eq!(sub_cached.resolved.version, "subproject-1.0");
}

#[test]
fn lightweight_tags_and_short_abbreviation_when_requested() {
    let repo = seeded_repo();
    commit_file(repo.path(), "f1.txt");
    tag_annotated(repo.path(), "1.0");
    commit_file(repo.path(), "f2.txt");
    tag_lightweight(repo.path(), "pre-2.0");
    commit_file(repo.path(), "f3.txt");

    let options = DescribeOptions {
        include_lightweight_tags: true,
        abbreviation_length: 4,
        ..DescribeOptions::default()
    };
    let resolution = resolver()
        .resolve(repo.path(), &repo.path().join("build2"), &options)
        .expect("resolve");
    assert_eq!(resolution.resolved.commit_sha, head(repo.path()));
    let re = Regex::new(r"^pre-2\.0-1-g[0-9a-f]{4}$").expect("regex");
    assert!(
        re.is_match(&resolution.resolved.version),
        "unexpected version {}",
        resolution.resolved.version
    );
}

#[test]
fn lightweight_tags_are_ignored_by_default() {
    let repo = seeded_repo();
    commit_file(repo.path(), "f1.txt");
    tag_annotated(repo.path(), "1.0");
    commit_file(repo.path(), "f2.txt");
    tag_lightweight(repo.path(), "pre-2.0");
    commit_file(repo.path(), "f3.txt");

    let resolution = resolver()
        .resolve(repo.path(), &repo.path().join("build"), &DescribeOptions::default())
        .expect("resolve");
    let re = Regex::new(r"^1\.0-2-g[0-9a-f]{7}$").expect("regex");
    assert!(
        re.is_match(&resolution.resolved.version),
        "unexpected version {}",
        resolution.resolved.version
    );
}

#[test]
fn only_lightweight_tags_resolve_to_the_commit_by_default() {
    let repo = seeded_repo();
    tag_lightweight(repo.path(), "nightly");
    let sha = head(repo.path());

    let resolution = resolver()
        .resolve(repo.path(), &repo.path().join("build"), &DescribeOptions::default())
        .expect("resolve");
    assert_eq!(resolution.resolved, ResolvedVersion::new(sha.clone(), sha));
}

#[test]
fn match_pattern_restricts_eligible_tags() {
    let repo = seeded_repo();
    tag_annotated(repo.path(), "v1.0");
    commit_file(repo.path(), "f1.txt");
    tag_annotated(repo.path(), "docs-2.0");
    commit_file(repo.path(), "f2.txt");

    let options = DescribeOptions {
        match_pattern: Some("v*".to_string()),
        ..DescribeOptions::default()
    };
    let resolution = resolver()
        .resolve(repo.path(), &repo.path().join("build"), &options)
        .expect("resolve");
    let re = Regex::new(r"^v1\.0-2-g[0-9a-f]{7}$").expect("regex");
    assert!(
        re.is_match(&resolution.resolved.version),
        "unexpected version {}",
        resolution.resolved.version
    );
}

#[test]
fn lexically_greatest_tag_wins_on_a_shared_commit() {
    let repo = seeded_repo();
    tag_annotated(repo.path(), "1.1");
    tag_annotated(repo.path(), "1.0");

    let exact = resolver()
        .resolve(repo.path(), &repo.path().join("build"), &DescribeOptions::default())
        .expect("resolve");
    assert_eq!(exact.resolved.version, "1.1");

    commit_file(repo.path(), "f1.txt");
    let ahead = resolver()
        .resolve(repo.path(), &repo.path().join("build"), &DescribeOptions::default())
        .expect("resolve");
    assert!(
        ahead.resolved.version.starts_with("1.1-1-g"),
        "unexpected version {}",
        ahead.resolved.version
    );

    // Hierarchical names: the pattern matches across `/` as describe does.
    commit_file(repo.path(), "f2.txt");
    tag_annotated(repo.path(), "release/2.0");
    tag_annotated(repo.path(), "release/1.0");
    let unfiltered = resolver()
        .resolve(repo.path(), &repo.path().join("build"), &DescribeOptions::default())
        .expect("resolve");
    assert_eq!(unfiltered.resolved.version, "release/2.0");

    let matched = resolver()
        .resolve(
            repo.path(),
            &repo.path().join("build"),
            &DescribeOptions {
                match_pattern: Some("release*".to_string()),
                ..DescribeOptions::default()
            },
        )
        .expect("resolve");
    assert_eq!(matched.resolved.version, "release/2.0");
}

#[test]
fn resolving_twice_is_idempotent() {
    let repo = seeded_repo();
    commit_file(repo.path(), "f1.txt");
    tag_annotated(repo.path(), "1.0");
    commit_file(repo.path(), "f2.txt");
    let build = repo.path().join("build");
    let options = DescribeOptions::default();

    let first = resolver().resolve(repo.path(), &build, &options).expect("first");
    let bytes = fs::read(build.join(CACHE_FILE_NAME)).expect("read");
    let second = resolver().resolve(repo.path(), &build, &options).expect("second");
    assert_eq!(first, second);
    assert_eq!(fs::read(build.join(CACHE_FILE_NAME)).expect("read"), bytes);
}

#[test]
fn unborn_head_falls_back_to_cache() {
    let temp = TempDir::new().expect("tempdir");
    init_repo(temp.path());
    let build = temp.path().join("build");

    let err = resolver()
        .resolve(temp.path(), &build, &DescribeOptions::default())
        .unwrap_err();
    assert!(matches!(err, ResolveError::NoRepository { .. }), "{err}");

    let stored = ResolvedVersion::new("1.0", "3f786850e387550fdab836ed7e6dc881de23001b");
    CacheStore::new(&build).store(&stored).expect("store");
    let resolution = resolver()
        .resolve(temp.path(), &build, &DescribeOptions::default())
        .expect("resolve");
    assert_eq!(resolution.source, VersionSource::Cache);
    assert_eq!(resolution.resolved, stored);
}

#[test]
fn host_without_git_reads_the_cache() {
    let repo = seeded_repo();
    let build = repo.path().join("build");
    let live = resolver()
        .resolve(repo.path(), &build, &DescribeOptions::default())
        .expect("live");

    let offline = Resolver::with_git(None)
        .resolve(repo.path(), &build, &DescribeOptions::default())
        .expect("offline");
    assert_eq!(offline.source, VersionSource::Cache);
    assert_eq!(offline.resolved, live.resolved);
}

#[test]
fn broken_metadata_fails_instead_of_using_the_cache() {
    let repo = seeded_repo();
    let build = repo.path().join("build");
    resolver()
        .resolve(repo.path(), &build, &DescribeOptions::default())
        .expect("live");

    let sha = head(repo.path());
    let object = repo
        .path()
        .join(".git")
        .join("objects")
        .join(&sha[..2])
        .join(&sha[2..]);
    fs::remove_file(object).expect("remove head commit object");

    let err = resolver()
        .resolve(repo.path(), &build, &DescribeOptions::default())
        .unwrap_err();
    assert!(matches!(err, ResolveError::Git { .. }), "{err}");
}

#[test]
fn invalid_options_are_rejected_before_touching_the_repository() {
    let repo = seeded_repo();
    let options = DescribeOptions {
        abbreviation_length: 2,
        ..DescribeOptions::default()
    };
    let err = resolver()
        .resolve(repo.path(), &repo.path().join("build"), &options)
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidOptions(_)), "{err}");
    assert!(!repo.path().join("build").exists());
}

#[test]
fn missing_working_directory_is_reported() {
    let temp = TempDir::new().expect("tempdir");
    let err = resolver()
        .resolve(
            &temp.path().join("nope"),
            &temp.path().join("build"),
            &DescribeOptions::default(),
        )
        .unwrap_err();
    assert!(
        matches!(err, ResolveError::MissingWorkingDirectory(_)),
        "{err}"
    );
}
