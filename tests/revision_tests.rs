//! Revision matching tests
//!
//! Scope resolution against the API plus HEAD lookup in a scratch
//! repository created with libgit2.

use std::path::Path;
use std::sync::Arc;

use git2::{Repository, Signature};
use serde_json::{json, Value};
use tempfile::TempDir;
use ucb_tool::host::Method;
use ucb_tool::mock::MockTransport;
use ucb_tool::revision::{self, MatchScope, MatchVerdict, RevisionMatcher};
use ucb_tool::{BuildStatus, CloudBuildClient, ErrorKind};

const HEAD: &str = "abc123";

fn build_json(target: &str, number: u64, status: &str, revision: &str) -> Value {
    json!({
        "build": number,
        "buildTargetId": target,
        "buildStatus": status,
        "lastBuiltRevision": revision
    })
}

fn matcher(mock: &Arc<MockTransport>) -> RevisionMatcher {
    RevisionMatcher::new(CloudBuildClient::new(mock.clone()))
}

fn script_targets(mock: &MockTransport) {
    mock.respond_json(
        Method::Get,
        "buildtargets",
        200,
        json!([
            {"buildtargetid": "ios", "enabled": true, "builds": [build_json("ios", 4, "success", "abc123")]},
            {"buildtargetid": "android", "enabled": true, "builds": [build_json("android", 8, "success", "abc124")]},
            {"buildtargetid": "webgl", "enabled": true, "builds": []},
            {"buildtargetid": "old", "enabled": false, "builds": [build_json("old", 1, "success", "000000")]}
        ]),
    );
}

// =============================================================================
// Scopes
// =============================================================================

#[test]
fn test_all_scope() {
    let mock = Arc::new(MockTransport::new());
    script_targets(&mock);

    let report = matcher(&mock).check(HEAD, &MatchScope::All).unwrap();

    let verdicts: Vec<(&str, &MatchVerdict)> =
        report.items.iter().map(|i| (i.target_id.as_str(), &i.verdict)).collect();
    assert_eq!(
        verdicts,
        vec![
            ("webgl", &MatchVerdict::Missing),
            (
                "android",
                &MatchVerdict::RevisionMismatch {
                    revision: Some("abc124".to_string())
                }
            ),
            ("ios", &MatchVerdict::Matches),
        ]
    );
    assert!(!report.all_match());
    // Only successful builds are considered; no per-target history requests
    assert_eq!(mock.call_count(), 1);
}

#[test]
fn test_latest_for_target_matches() {
    let mock = Arc::new(MockTransport::new());
    script_targets(&mock);

    let report = matcher(&mock)
        .check(HEAD, &MatchScope::LatestForTarget("ios".to_string()))
        .unwrap();
    assert_eq!(report.items.len(), 1);
    assert!(report.all_match());
}

#[test]
fn test_target_absent_from_listing_is_missing() {
    let mock = Arc::new(MockTransport::new());
    script_targets(&mock);

    let report = matcher(&mock)
        .check(HEAD, &MatchScope::LatestForTarget("switch".to_string()))
        .unwrap();
    assert_eq!(report.items[0].verdict, MatchVerdict::Missing);
    assert!(!report.all_match());
}

#[test]
fn test_disabled_target_is_not_considered() {
    let mock = Arc::new(MockTransport::new());
    script_targets(&mock);

    let report = matcher(&mock)
        .check(HEAD, &MatchScope::LatestForTarget("old".to_string()))
        .unwrap();
    assert_eq!(report.items[0].verdict, MatchVerdict::Missing);
}

#[test]
fn test_explicit_failed_build_never_matches() {
    let mock = Arc::new(MockTransport::new());
    mock.respond_json(
        Method::Get,
        "buildtargets/ios/builds/5",
        200,
        build_json("ios", 5, "failure", "abc123"),
    );

    let scope = MatchScope::Build {
        target_id: "ios".to_string(),
        number: 5,
    };
    let report = matcher(&mock).check(HEAD, &scope).unwrap();
    assert_eq!(
        report.items[0].verdict,
        MatchVerdict::NotSuccessful {
            status: BuildStatus::Failure
        }
    );
    assert!(!report.all_match());
}

#[test]
fn test_explicit_build_not_found() {
    let mock = Arc::new(MockTransport::new());
    mock.respond_json(Method::Get, "buildtargets/ios/builds/99", 404, json!({}));

    let scope = MatchScope::Build {
        target_id: "ios".to_string(),
        number: 99,
    };
    let err = matcher(&mock).check(HEAD, &scope).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// =============================================================================
// HEAD lookup
// =============================================================================

fn commit(repo: &Repository, name: &str, message: &str) -> git2::Oid {
    let workdir = repo.workdir().unwrap();
    std::fs::write(workdir.join(name), "hello\n").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = Signature::now("ucb", "ucb@example.com").unwrap();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[])
        .unwrap()
}

#[test]
fn test_head_of_scratch_repository() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let oid = commit(&repo, "README", "Initial import\n");

    let nested = dir.path().join("sub/dir");
    std::fs::create_dir_all(&nested).unwrap();

    let head = revision::head(&nested).unwrap();
    assert_eq!(head.revision, oid.to_string());
    assert_eq!(head.revision.len(), 40);
    assert_eq!(head.message, "Initial import");
}

#[test]
fn test_head_feeds_matcher() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let oid = commit(&repo, "README", "Release\n");

    let mock = Arc::new(MockTransport::new());
    mock.respond_json(
        Method::Get,
        "buildtargets/ios/builds/2",
        200,
        build_json("ios", 2, "success", &oid.to_string()),
    );

    let head = revision::head(dir.path()).unwrap();
    let scope = MatchScope::Build {
        target_id: "ios".to_string(),
        number: 2,
    };
    let report = matcher(&mock).check(&head.revision, &scope).unwrap();
    assert!(report.all_match());
}

#[test]
fn test_head_outside_repository() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nowhere");
    let err: ucb_tool::Error = revision::head(&missing).unwrap_err().into();
    assert_eq!(err.kind(), ErrorKind::Io);
}
