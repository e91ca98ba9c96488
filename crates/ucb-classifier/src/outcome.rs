//! Classified API outcome.

/// Result of interpreting one API response.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedOutcome<T> {
    /// 2xx; payload is absent for empty bodies and 204
    Success(Option<T>),
    /// 404
    ResourceNotFound,
    /// 429; the caller should back off, this is not a hard failure
    RateLimited,
    /// Any other status
    Failure { code: u16, message: String },
}

impl<T> ClassifiedOutcome<T> {
    /// Re-type a non-success outcome. A success payload is dropped.
    pub(crate) fn map_success<U>(self) -> ClassifiedOutcome<U> {
        match self {
            ClassifiedOutcome::Success(_) => ClassifiedOutcome::Success(None),
            ClassifiedOutcome::ResourceNotFound => ClassifiedOutcome::ResourceNotFound,
            ClassifiedOutcome::RateLimited => ClassifiedOutcome::RateLimited,
            ClassifiedOutcome::Failure { code, message } => ClassifiedOutcome::Failure { code, message },
        }
    }
}
