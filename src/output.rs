//! Human-readable rendering for the CLI.
//!
//! JSON output is plain `serde_json` of the core types; only the human forms
//! live here.

use std::fmt::Write as _;
use std::io::Write;

use tracing::debug;
use ucb_protocol::{Build, BuildAttempt, BuildKey, BuildTarget};

use crate::host::LatestBuilds;
use crate::monitor::{MonitorObserver, Transition};
use crate::revision::{git, GitHead, MatchReport, MatchVerdict};

/// `750.0` seconds → `12m30s`
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h{}m{}s", h, m, s)
    } else if m > 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}s", s)
    }
}

pub fn render_build(build: &Build) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Target: {}, (Build #{})", build.target_id, build.number);
    if let Some(created) = &build.created {
        let _ = writeln!(out, "  Created:  {}", created.to_rfc3339());
    }
    if let Some(guid) = &build.guid {
        let _ = writeln!(out, "  GUID:     {}", guid);
    }
    let _ = writeln!(out, "  Status:   {}", build.status);
    let _ = writeln!(out, "  Time:     {}", format_duration(build.total_time_seconds));
    if let Some(revision) = build.last_built_revision.as_deref().filter(|r| !r.is_empty()) {
        let _ = writeln!(out, "  Revision: {}", revision);
    }
    if let Some(link) = build.download_link() {
        let _ = writeln!(out, "  Download: {}", link.href);
    }
    out
}

pub fn render_attempt(attempt: &BuildAttempt) -> String {
    match attempt.error.as_deref().filter(|e| !e.is_empty()) {
        Some(error) => format!("Target: {}\n  Error: {}\n", attempt.build.target_id, error),
        None => render_build(&attempt.build),
    }
}

pub fn render_target(target: &BuildTarget) -> String {
    let settings = target.settings.clone().unwrap_or_default();
    let mut out = String::new();
    let _ = writeln!(out, "Target: {}", target.name);
    let _ = writeln!(out, "  ID:        {}", target.id);
    let _ = writeln!(out, "  Enabled:   {}", target.enabled);
    let _ = writeln!(out, "  AutoBuild: {}", settings.auto_build);
    let _ = writeln!(out, "  Branch:    {}", settings.scm.branch);
    let _ = writeln!(out, "  Unity:     {}", settings.display_unity_version());
    out
}

pub fn render_latest(latest: &LatestBuilds) -> String {
    latest
        .iter()
        .map(|(target_id, build)| match build {
            Some(build) => render_build(build),
            None => format!("Target: {}\n  <No builds successful>\n", target_id),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_head(head: &GitHead) -> String {
    format!("Revision: {}\nMessage:  {}\n", head.revision, head.message)
}

pub fn render_match_report(report: &MatchReport) -> String {
    let mut out = format!("HEAD: {}\n", report.revision);
    for item in &report.items {
        let number = item.number.unwrap_or_default();
        let _ = match &item.verdict {
            MatchVerdict::Missing => writeln!(out, "Target {} does not have a successful build.", item.target_id),
            MatchVerdict::NotSuccessful { .. } => {
                writeln!(out, "Build {} #{} is not a successful build", item.target_id, number)
            }
            MatchVerdict::RevisionMismatch { revision } => writeln!(
                out,
                "Build {} #{} is revision {}, head is {}",
                item.target_id,
                number,
                revision.as_deref().map(git::short).unwrap_or("<none>"),
                git::short(&report.revision)
            ),
            MatchVerdict::Matches => writeln!(out, "Build {} #{} matches HEAD.", item.target_id, number),
        };
    }
    out
}

/// Prints monitor progress as it happens.
///
/// A failed write never interrupts the watch; it is logged and counted.
pub struct HumanObserver<W: Write> {
    out: W,
    write_failures: usize,
}

impl<W: Write> HumanObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out, write_failures: 0 }
    }

    pub fn write_failures(&self) -> usize {
        self.write_failures
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, args: std::fmt::Arguments<'_>) {
        if let Err(e) = self.out.write_fmt(args).and_then(|()| self.out.write_all(b"\n")) {
            self.write_failures += 1;
            debug!(error = %e, "failed to write monitor progress");
        }
    }
}

impl<W: Write> MonitorObserver for HumanObserver<W> {
    fn on_watch(&mut self, builds: &[Build]) {
        for build in builds {
            self.line(format_args!("Watching: {} #{}", build.target_id, build.number));
        }
    }

    fn on_transition(&mut self, transition: &Transition, _build: &Build) {
        self.line(format_args!(
            "Build: {} status changed from {} to {}",
            transition.key, transition.from, transition.to
        ));
    }

    fn on_finished(&mut self, build: &Build) {
        if build.status.is_success() {
            self.line(format_args!("Build: {} finished.", build.key()));
        } else {
            self.line(format_args!("Build: {} failed with status: {}", build.key(), build.status));
        }
    }

    fn on_rate_limited(&mut self, key: &BuildKey) {
        self.line(format_args!("Rate limited while checking {}, retrying next poll", key));
    }
}
