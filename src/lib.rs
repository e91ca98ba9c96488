//! ucb - Cloud Build lifecycle client
//!
//! Queries build status, waits for builds to finish, retrieves their
//! artifacts and checks them against a source revision. The binary in
//! `main.rs` is a thin CLI over these modules.

pub mod artifact;
pub mod config;
pub mod error;
pub mod host;
pub mod mock;
pub mod monitor;
pub mod output;
pub mod revision;
pub mod telemetry;

pub use artifact::{ArtifactRetriever, BuildSelector, DownloadOutcome, DownloadRequest};
pub use config::{CloudBuildContext, ConfigError, ContextOverrides};
pub use error::{Error, ErrorKind, Result, ValidationError};
pub use host::{BuildFilter, CloudBuildClient, LatestBuilds};
pub use monitor::{CompletionMonitor, MonitorConfig, MonitorObserver, MonitorReport, WatchSelector};
pub use revision::{matches_head, MatchCandidate, MatchReport, MatchScope, MatchVerdict, RevisionMatcher};

pub use ucb_classifier::{classify, ClassifiedOutcome};
pub use ucb_protocol::{Build, BuildKey, BuildStatus, BuildTarget, Platform};
