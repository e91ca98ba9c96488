use ucb_protocol::{Build, BuildKey};

use super::Transition;

/// Receives monitor events as they happen. Every hook defaults to a no-op.
pub trait MonitorObserver {
    /// Called once with the initial snapshots, before the first poll
    fn on_watch(&mut self, _builds: &[Build]) {}

    fn on_transition(&mut self, _transition: &Transition, _build: &Build) {}

    /// Called when a build reaches a terminal status
    fn on_finished(&mut self, _build: &Build) {}

    /// Called when polling `key` was rate limited; the tick is cut short
    fn on_rate_limited(&mut self, _key: &BuildKey) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver;

impl MonitorObserver for SilentObserver {}
