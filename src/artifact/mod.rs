//! Artifact retrieval
//!
//! Downloads the primary artifact of a successful build and optionally
//! unpacks it into the destination directory.

mod download;
mod extract;
mod filename;

pub use download::{ArtifactRetriever, BuildSelector, DownloadOutcome, DownloadRequest};
pub use extract::ArchiveFormat;
pub use filename::artifact_filename;
