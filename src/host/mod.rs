//! Host-Side Components
//!
//! Talks to the Cloud Build API: the transport seam and the client that
//! resolves build status and drives start/cancel.

pub mod client;
pub mod transport;

pub use client::{BuildFilter, CloudBuildClient, LatestBuilds};
pub use transport::{
    ApiRequest, ApiResponse, ArtifactResponse, ArtifactSource, HttpArtifactSource, HttpTransport,
    HttpTransportConfig, Method, Transport, TransportError,
};
