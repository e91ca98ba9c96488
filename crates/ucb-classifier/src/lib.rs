//! Response classifier for the Cloud Build API.
//!
//! Every API call funnels its status code and body through [`classify`] (or
//! [`classify_discarding`] when the success body is irrelevant), so callers
//! see one consistent outcome type instead of raw HTTP details.

mod outcome;
mod rate_limit;

pub use outcome::ClassifiedOutcome;
pub use rate_limit::RateLimitInfo;

use serde::de::DeserializeOwned;
use ucb_protocol::ErrorMessage;

/// The server answered 2xx but the body does not have the expected shape.
#[derive(Debug, thiserror::Error)]
#[error("Malformed response body (HTTP {status}): {source}")]
pub struct DecodeError {
    pub status: u16,
    #[source]
    pub source: serde_json::Error,
}

/// Classify a response, decoding a success body into `T`.
///
/// - 200/202 with a body: `Success(Some(T))`, or `DecodeError` if the body
///   does not decode
/// - 200/202 without a body, 204: `Success(None)`
/// - 404: `ResourceNotFound`
/// - 429: `RateLimited`
/// - anything else: `Failure` with the server's `{"error": ...}` message
pub fn classify<T: DeserializeOwned>(
    status: u16,
    body: &[u8],
) -> Result<ClassifiedOutcome<T>, DecodeError> {
    match status {
        200 | 202 => {
            if is_blank(body) {
                return Ok(ClassifiedOutcome::Success(None));
            }
            serde_json::from_slice(body)
                .map(|payload| ClassifiedOutcome::Success(Some(payload)))
                .map_err(|source| DecodeError { status, source })
        }
        _ => Ok(classify_discarding(status, body).map_success()),
    }
}

/// Classify a response whose success body is ignored.
pub fn classify_discarding(status: u16, body: &[u8]) -> ClassifiedOutcome<()> {
    match status {
        200 | 202 | 204 => ClassifiedOutcome::Success(None),
        404 => ClassifiedOutcome::ResourceNotFound,
        429 => ClassifiedOutcome::RateLimited,
        code => ClassifiedOutcome::Failure {
            code,
            message: error_message(code, body),
        },
    }
}

/// Extract the server's error message, falling back to a generic one.
fn error_message(code: u16, body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorMessage>(body) {
        Ok(msg) if !msg.error.is_empty() => msg.error,
        _ => format!("Request failed with HTTP status {}", code),
    }
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(|b| b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_success_decodes_payload() {
        let outcome: ClassifiedOutcome<Value> = classify(200, br#"{"a": 1}"#).unwrap();
        assert_eq!(outcome, ClassifiedOutcome::Success(Some(json!({"a": 1}))));

        let outcome: ClassifiedOutcome<Value> = classify(202, b"[]").unwrap();
        assert_eq!(outcome, ClassifiedOutcome::Success(Some(json!([]))));
    }

    #[test]
    fn test_success_without_body() {
        let outcome: ClassifiedOutcome<Value> = classify(204, b"").unwrap();
        assert_eq!(outcome, ClassifiedOutcome::Success(None));

        let outcome: ClassifiedOutcome<Value> = classify(200, b"  \n").unwrap();
        assert_eq!(outcome, ClassifiedOutcome::Success(None));
    }

    #[test]
    fn test_decode_failure_is_error() {
        let err = classify::<Vec<u32>>(200, br#"{"not": "a list"}"#).unwrap_err();
        assert_eq!(err.status, 200);
    }

    #[test]
    fn test_not_found_and_rate_limited() {
        let outcome: ClassifiedOutcome<Value> = classify(404, b"{}").unwrap();
        assert_eq!(outcome, ClassifiedOutcome::ResourceNotFound);

        let outcome: ClassifiedOutcome<Value> = classify(429, b"slow down").unwrap();
        assert_eq!(outcome, ClassifiedOutcome::RateLimited);
    }

    #[test]
    fn test_failure_uses_error_body() {
        let outcome = classify_discarding(400, br#"{"error": "Target is disabled"}"#);
        assert_eq!(
            outcome,
            ClassifiedOutcome::Failure {
                code: 400,
                message: "Target is disabled".to_string()
            }
        );
    }

    #[test]
    fn test_failure_without_error_body() {
        let outcome: ClassifiedOutcome<Value> = classify(500, b"<html>oops</html>").unwrap();
        match outcome {
            ClassifiedOutcome::Failure { code, message } => {
                assert_eq!(code, 500);
                assert!(message.contains("500"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_discarding_ignores_success_body() {
        assert_eq!(classify_discarding(200, b"not json"), ClassifiedOutcome::Success(None));
    }
}
