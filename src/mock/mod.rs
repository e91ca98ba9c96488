//! Scripted doubles for the transport collaborators
//!
//! Responses are queued per route and returned in order; the last queued
//! response for a route keeps being returned once the queue drains. Every
//! request is recorded so tests can assert on what went over the wire and
//! what did not.

mod artifact;
mod transport;

pub use artifact::MockArtifactSource;
pub use transport::MockTransport;
