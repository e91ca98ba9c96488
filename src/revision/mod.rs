//! Revision matching
//!
//! Compares the source revision of builds against a commit, normally the
//! local HEAD.

pub mod git;

use serde::Serialize;
use tracing::debug;
use ucb_protocol::{Build, BuildStatus};

use crate::error::Result;
use crate::host::CloudBuildClient;

pub use git::{head, GitError, GitHead};

/// Which builds to compare
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchScope {
    /// Latest successful build of every enabled target
    All,
    Build { target_id: String, number: u64 },
    /// Latest successful build of one target
    LatestForTarget(String),
}

/// A build to compare, or a target that has nothing to compare
#[derive(Debug, Clone, PartialEq)]
pub enum MatchCandidate {
    Found(Build),
    Missing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum MatchVerdict {
    Matches,
    RevisionMismatch { revision: Option<String> },
    NotSuccessful { status: BuildStatus },
    /// Target has no successful build
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchItem {
    pub target_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(flatten)]
    pub verdict: MatchVerdict,
}

impl MatchItem {
    pub fn matches(&self) -> bool {
        self.verdict == MatchVerdict::Matches
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub revision: String,
    /// Missing targets first, then builds in candidate order
    pub items: Vec<MatchItem>,
}

impl MatchReport {
    pub fn all_match(&self) -> bool {
        self.items.iter().all(MatchItem::matches)
    }
}

/// Compare each candidate against `revision` by full string equality.
/// Only successful builds can match.
pub fn matches_head(revision: &str, candidates: Vec<MatchCandidate>) -> MatchReport {
    let (missing, found): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| matches!(c, MatchCandidate::Missing(_)));

    let mut items = Vec::with_capacity(missing.len() + found.len());
    for candidate in missing.into_iter().chain(found) {
        let item = match candidate {
            MatchCandidate::Missing(target_id) => MatchItem {
                target_id,
                number: None,
                verdict: MatchVerdict::Missing,
            },
            MatchCandidate::Found(build) => {
                let verdict = if !build.status.is_success() {
                    MatchVerdict::NotSuccessful {
                        status: build.status.clone(),
                    }
                } else if build.last_built_revision.as_deref() == Some(revision) {
                    MatchVerdict::Matches
                } else {
                    MatchVerdict::RevisionMismatch {
                        revision: build.last_built_revision.clone(),
                    }
                };
                MatchItem {
                    target_id: build.target_id,
                    number: Some(build.number),
                    verdict,
                }
            }
        };
        items.push(item);
    }

    MatchReport {
        revision: revision.to_string(),
        items,
    }
}

pub struct RevisionMatcher {
    client: CloudBuildClient,
}

impl RevisionMatcher {
    pub fn new(client: CloudBuildClient) -> Self {
        Self { client }
    }

    /// Builds in scope. A target absent from the listing counts as missing.
    pub fn candidates(&self, scope: &MatchScope) -> Result<Vec<MatchCandidate>> {
        let candidates = match scope {
            MatchScope::Build { target_id, number } => {
                vec![MatchCandidate::Found(self.client.build_status(target_id, *number)?)]
            }
            MatchScope::All => self
                .client
                .latest_builds(true, true)?
                .into_iter()
                .map(|(target_id, build)| match build {
                    Some(build) => MatchCandidate::Found(build),
                    None => MatchCandidate::Missing(target_id),
                })
                .collect(),
            MatchScope::LatestForTarget(target_id) => {
                let mut latest = self.client.latest_builds(true, true)?;
                match latest.remove(target_id).flatten() {
                    Some(build) => vec![MatchCandidate::Found(build)],
                    None => vec![MatchCandidate::Missing(target_id.clone())],
                }
            }
        };
        debug!(candidates = candidates.len(), "revision match candidates");
        Ok(candidates)
    }

    pub fn check(&self, revision: &str, scope: &MatchScope) -> Result<MatchReport> {
        Ok(matches_head(revision, self.candidates(scope)?))
    }
}
