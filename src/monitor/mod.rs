//! Completion monitor
//!
//! Polls a fixed set of builds until every one reaches a terminal status.
//! Rate limiting defers the rest of a tick; any other failure ends the watch.

mod observer;

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, warn};
use ucb_protocol::{Build, BuildKey, BuildStatus};

use crate::error::{Error, Result, ValidationError};
use crate::host::{BuildFilter, CloudBuildClient};

pub use observer::{MonitorObserver, SilentObserver};

/// Default delay between polling ticks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// Fail as soon as any build finishes unsuccessfully
    pub abort_on_fail: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            abort_on_fail: false,
        }
    }
}

/// Which builds to watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSelector {
    /// Every active latest build across enabled targets
    AllActive,
    Build { target_id: String, number: u64 },
    LatestForTarget(String),
}

/// A status change observed between two polls of the same build
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Transition {
    pub key: BuildKey,
    pub from: BuildStatus,
    pub to: BuildStatus,
}

#[derive(Debug, Clone, PartialEq)]
struct MonitorEntry {
    build: Build,
    finished: bool,
}

/// Outcome of a watch where every build finished
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MonitorReport {
    /// Final snapshots, in watch order
    pub builds: Vec<Build>,
    pub transitions: Vec<Transition>,
    /// Status requests issued, including rate-limited ones
    pub status_fetches: usize,
    pub ticks: usize,
}

pub struct CompletionMonitor {
    client: CloudBuildClient,
    config: MonitorConfig,
}

impl CompletionMonitor {
    pub fn new(client: CloudBuildClient, config: MonitorConfig) -> Self {
        Self { client, config }
    }

    /// Resolve a selector to build snapshots
    pub fn select(&self, selector: &WatchSelector) -> Result<Vec<Build>> {
        let builds = match selector {
            WatchSelector::AllActive => self
                .client
                .latest_builds(false, true)?
                .into_values()
                .flatten()
                .filter(Build::is_active)
                .collect(),
            WatchSelector::Build { target_id, number } => {
                vec![self.client.build_status(target_id, *number)?]
            }
            WatchSelector::LatestForTarget(target_id) => self
                .client
                .list_builds(target_id, &BuildFilter::default().with_limit(1))?,
        };

        if builds.is_empty() {
            return Err(ValidationError::NothingToWatch.into());
        }
        Ok(builds)
    }

    /// Select, then watch
    pub fn run(&self, selector: &WatchSelector, observer: &mut dyn MonitorObserver) -> Result<MonitorReport> {
        let builds = self.select(selector)?;
        self.watch(builds, observer)
    }

    /// Watch `builds` until all are finished.
    ///
    /// Rejects the set before polling if any build is already terminal.
    /// Returns `BuildFailed` for the first build, in watch order, that did
    /// not succeed.
    pub fn watch(&self, builds: Vec<Build>, observer: &mut dyn MonitorObserver) -> Result<MonitorReport> {
        let mut entries = self.prepare(builds)?;
        let snapshots: Vec<Build> = entries.iter().map(|e| e.build.clone()).collect();
        observer.on_watch(&snapshots);

        let mut report = MonitorReport::default();

        while entries.iter().any(|e| !e.finished) {
            std::thread::sleep(self.config.poll_interval);
            report.ticks += 1;

            for entry in entries.iter_mut().filter(|e| !e.finished) {
                let key = entry.build.key();
                report.status_fetches += 1;

                let current = match self.client.build_status(&key.target_id, key.number) {
                    Ok(build) => build,
                    Err(err) if err.is_transient() => {
                        warn!(build = %key, "rate limited, deferring to next tick");
                        observer.on_rate_limited(&key);
                        break;
                    }
                    Err(err) => return Err(err),
                };

                if current.status != entry.build.status {
                    let transition = Transition {
                        key: key.clone(),
                        from: entry.build.status.clone(),
                        to: current.status.clone(),
                    };
                    info!(build = %key, from = %transition.from, to = %transition.to, "status changed");
                    observer.on_transition(&transition, &current);
                    report.transitions.push(transition);
                }

                entry.build = current;

                if entry.build.status.is_terminal() {
                    entry.finished = true;
                    observer.on_finished(&entry.build);

                    if self.config.abort_on_fail && !entry.build.status.is_success() {
                        return Err(Error::AbortedOnFailure {
                            target_id: key.target_id,
                            number: key.number,
                            status: entry.build.status.clone(),
                        });
                    }
                }
            }

            debug!(
                tick = report.ticks,
                remaining = entries.iter().filter(|e| !e.finished).count(),
                "poll tick done"
            );
        }

        if let Some(failed) = entries.iter().find(|e| !e.build.status.is_success()) {
            return Err(Error::BuildFailed {
                target_id: failed.build.target_id.clone(),
                number: failed.build.number,
                status: failed.build.status.clone(),
            });
        }

        report.builds = entries.into_iter().map(|e| e.build).collect();
        Ok(report)
    }

    fn prepare(&self, builds: Vec<Build>) -> Result<Vec<MonitorEntry>> {
        if builds.is_empty() {
            return Err(ValidationError::NothingToWatch.into());
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(builds.len());
        for build in builds {
            if !seen.insert(build.key()) {
                continue;
            }
            if build.status.is_terminal() {
                return Err(ValidationError::AlreadyTerminal {
                    target_id: build.target_id,
                    number: build.number,
                    status: build.status,
                }
                .into());
            }
            entries.push(MonitorEntry {
                build,
                finished: false,
            });
        }
        Ok(entries)
    }
}
