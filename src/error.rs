//! Error taxonomy and stable exit codes
//!
//! Every fallible core operation returns [`Error`]. Callers match on
//! [`Error::kind`] rather than comparing against sentinel values.

use std::path::PathBuf;

use ucb_protocol::{BuildStatus, UnknownPlatform};

use crate::host::transport::TransportError;
use crate::revision::git::GitError;

/// Core result type
pub type Result<T> = std::result::Result<T, Error>;

/// Bad local input; never sent over the wire
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    UnknownPlatform(#[from] UnknownPlatform),

    #[error("{0} is not a directory or does not exist")]
    NotADirectory(PathBuf),

    #[error("Build #{number} for target {target_id} is not active (status: {status})")]
    AlreadyTerminal {
        target_id: String,
        number: u64,
        status: BuildStatus,
    },

    #[error("No builds found")]
    NothingToWatch,

    #[error("Cannot download build {target_id} #{number}, status is '{status}'")]
    NotSuccessful {
        target_id: String,
        number: u64,
        status: BuildStatus,
    },

    #[error("Missing download link for build {target_id} #{number}")]
    MissingDownloadLink { target_id: String, number: u64 },

    #[error("Cannot unpack build, file type is '{content_type}'")]
    NotAnArchive { content_type: String },

    #[error("No successful build for target {0}")]
    NoSuccessfulBuild(String),

    #[error("Missing {0}")]
    MissingArgument(&'static str),
}

/// Core error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("API rate limit reached")]
    RateLimited,

    #[error("[HTTP {status}] {message}")]
    Server { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Build not started for target {target_id}: {message}")]
    StartRejected { target_id: String, message: String },

    #[error("Malformed server response: {0}")]
    Integrity(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error("Build: {target_id} #{number} failed with status: {status}")]
    BuildFailed {
        target_id: String,
        number: u64,
        status: BuildStatus,
    },

    #[error("Aborting early, build: {target_id} #{number} failed with status: {status}")]
    AbortedOnFailure {
        target_id: String,
        number: u64,
        status: BuildStatus,
    },
}

/// Error classification used for exit codes and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A watched build ended in a non-success state (exit code 1)
    BuildFailed = 1,
    /// Bad local input (exit code 2)
    Validation = 2,
    /// Resource absent (exit code 3)
    NotFound = 3,
    /// Server asked us to slow down (exit code 4)
    RateLimited = 4,
    /// Non-2xx server response (exit code 5)
    Server = 5,
    /// Connection-level failure (exit code 6)
    Transport = 6,
    /// Payload did not match the expected shape (exit code 7)
    Integrity = 7,
    /// Local filesystem or git failure (exit code 8)
    Io = 8,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BuildFailed => "build_failed",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Server => "server",
            ErrorKind::Transport => "transport",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Io => "io",
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::RateLimited => ErrorKind::RateLimited,
            Error::Server { .. } | Error::StartRejected { .. } => ErrorKind::Server,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Integrity(_) => ErrorKind::Integrity,
            Error::Io { .. } | Error::Git(_) => ErrorKind::Io,
            Error::BuildFailed { .. } | Error::AbortedOnFailure { .. } => ErrorKind::BuildFailed,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind() as i32
    }

    /// Only rate limiting may be waited out; everything else is final for the operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::RateLimited)
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
