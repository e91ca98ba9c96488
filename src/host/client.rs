//! Cloud Build API client
//!
//! Build status resolution plus the target/start/cancel operations. Every
//! call goes through [`ucb_classifier`] so error semantics are identical
//! across operations. Rate limiting is surfaced, never retried here.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};
use ucb_classifier::{classify, classify_discarding, ClassifiedOutcome, RateLimitInfo};
use ucb_protocol::{paths, Build, BuildAttempt, BuildStatus, BuildTarget, Platform, ALL_TARGETS};

use crate::error::{Error, Result, ValidationError};

use super::transport::{ApiRequest, ApiResponse, Transport};

/// Filters for a build history listing
#[derive(Debug, Clone, Default)]
pub struct BuildFilter {
    pub status: Option<BuildStatus>,
    /// Canonical platform name or shorthand alias (`osx`, `win`, `win64`, `linux`)
    pub platform: Option<String>,
    /// Keep only the `limit` most recent builds; 0 keeps all
    pub limit: usize,
}

impl BuildFilter {
    pub fn with_status(mut self, status: BuildStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Latest build per target id; `None` means the target has never built
pub type LatestBuilds = BTreeMap<String, Option<Build>>;

/// Client for the project-scoped Cloud Build API
#[derive(Clone)]
pub struct CloudBuildClient {
    transport: Arc<dyn Transport>,
}

impl CloudBuildClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    // === Build status resolution ===

    /// Current record of one build
    pub fn build_status(&self, target_id: &str, number: u64) -> Result<Build> {
        let request = ApiRequest::get(paths::build(target_id, number));
        let resource = format!("build {} #{}", target_id, number);
        self.call::<Build>(&request, &resource)?
            .ok_or_else(|| Error::Integrity(format!("empty status response for {}", resource)))
    }

    /// Build history of a target (or `_all`), newest first
    pub fn list_builds(&self, target_id: &str, filter: &BuildFilter) -> Result<Vec<Build>> {
        let mut request = ApiRequest::get(paths::target_builds(target_id));

        if let Some(status) = &filter.status {
            request = request.with_query(paths::query::BUILD_STATUS, status.as_str());
        }
        if let Some(alias) = filter.platform.as_deref().filter(|p| !p.is_empty()) {
            let platform = Platform::resolve(alias).map_err(ValidationError::from)?;
            request = request.with_query(paths::query::PLATFORM, platform.as_str());
        }

        let resource = format!("builds of target {}", target_id);
        let mut builds: Vec<Build> = self.call(&request, &resource)?.unwrap_or_default();
        if filter.limit > 0 {
            builds.truncate(filter.limit);
        }
        Ok(builds)
    }

    /// Most recent build of every target.
    ///
    /// The listing's `include_last_success` only reports the last successful
    /// build, so unless `only_successful` is set each target's history is
    /// queried again for its most recent attempt of any outcome.
    pub fn latest_builds(&self, only_successful: bool, only_enabled: bool) -> Result<LatestBuilds> {
        let request = ApiRequest::get(paths::build_targets())
            .with_query(paths::query::INCLUDE_LAST_SUCCESS, "true");
        let targets: Vec<BuildTarget> = self.call(&request, "build targets")?.unwrap_or_default();

        let considered: Vec<BuildTarget> = targets
            .into_iter()
            .filter(|t| !only_enabled || t.enabled)
            .collect();

        let mut latest = LatestBuilds::new();
        for target in &considered {
            latest.insert(target.id.clone(), target.builds.first().cloned());
        }

        if !only_successful {
            let most_recent = BuildFilter::default().with_limit(1);
            for target in &considered {
                let history = match self.list_builds(&target.id, &most_recent) {
                    Ok(history) => history,
                    Err(Error::NotFound { resource }) => {
                        debug!(target = %target.id, %resource, "no build history, keeping listing entry");
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                if let Some(build) = history.into_iter().next() {
                    latest.insert(target.id.clone(), Some(build));
                }
            }
        }

        debug!(targets = latest.len(), only_successful, only_enabled, "resolved latest builds");
        Ok(latest)
    }

    // === Targets ===

    pub fn list_targets(&self) -> Result<Vec<BuildTarget>> {
        let request = ApiRequest::get(paths::build_targets()).with_query(paths::query::INCLUDE, "settings");
        Ok(self.call(&request, "build targets")?.unwrap_or_default())
    }

    // === Start / cancel ===

    pub fn start_build(&self, target_id: &str, clean: bool) -> Result<BuildAttempt> {
        let request = ApiRequest::post(paths::target_builds(target_id), json!({ "clean": clean }));
        let resource = format!("build target {}", target_id);
        let attempts: Vec<BuildAttempt> = self.call(&request, &resource)?.unwrap_or_default();

        let attempt = attempts
            .into_iter()
            .next()
            .ok_or_else(|| Error::Integrity(format!("no build started for target {}", target_id)))?;

        if let Some(message) = attempt.error.as_ref().filter(|e| !e.is_empty()) {
            return Err(Error::StartRejected {
                target_id: target_id.to_string(),
                message: message.clone(),
            });
        }
        Ok(attempt)
    }

    /// Start builds on every enabled target. Per-target rejections are
    /// reported in the returned attempts, not as an error.
    pub fn start_all_builds(&self, clean: bool) -> Result<Vec<BuildAttempt>> {
        let request = ApiRequest::post(paths::target_builds(ALL_TARGETS), json!({ "clean": clean }));
        let attempts: Vec<BuildAttempt> = self.call(&request, "all build targets")?.unwrap_or_default();
        if attempts.is_empty() {
            return Err(Error::Integrity("no builds started".to_string()));
        }
        for attempt in attempts.iter().filter(|a| a.is_error()) {
            warn!(target = %attempt.build.target_id, error = ?attempt.error, "build not started");
        }
        Ok(attempts)
    }

    pub fn cancel_build(&self, target_id: &str, number: u64) -> Result<()> {
        let request = ApiRequest::delete(paths::build(target_id, number));
        self.call_discarding(&request, &format!("{} build #{}", target_id, number))
    }

    /// Cancel every build of every target, or of `only_target` when given.
    ///
    /// Issued per target; the service's `_all` cancel endpoint answers 500.
    /// A target answering 404 has nothing to cancel and is skipped. Returns
    /// the target ids that were cancelled.
    pub fn cancel_all_builds(&self, only_target: Option<&str>) -> Result<Vec<String>> {
        let targets = self.list_targets()?;
        let mut cancelled = Vec::new();
        for target in targets
            .iter()
            .filter(|t| only_target.map(|id| id == t.id).unwrap_or(true))
        {
            let request = ApiRequest::delete(paths::target_builds(&target.id));
            match self.call_discarding(&request, &format!("builds of target {}", target.id)) {
                Ok(()) => cancelled.push(target.id.clone()),
                Err(Error::NotFound { resource }) => {
                    debug!(target = %target.id, %resource, "nothing to cancel");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(cancelled)
    }

    // === Internal Helpers ===

    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let response = self.transport.execute(request)?;
        let quota = RateLimitInfo::from_headers(
            response.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );
        if let Some(remaining) = quota.remaining {
            debug!(remaining, path = %request.path, "X-RateLimit-Remaining");
        }
        Ok(response)
    }

    /// Execute and classify, decoding a success body into `T`
    fn call<T: DeserializeOwned>(&self, request: &ApiRequest, resource: &str) -> Result<Option<T>> {
        let response = self.send(request)?;
        let outcome = classify::<T>(response.status, &response.body)
            .map_err(|e| Error::Integrity(format!("{}: {}", resource, e)))?;
        into_result(outcome, resource)
    }

    /// Execute and classify, ignoring any success body
    fn call_discarding(&self, request: &ApiRequest, resource: &str) -> Result<()> {
        let response = self.send(request)?;
        into_result(classify_discarding(response.status, &response.body), resource).map(|_| ())
    }
}

fn into_result<T>(outcome: ClassifiedOutcome<T>, resource: &str) -> Result<Option<T>> {
    match outcome {
        ClassifiedOutcome::Success(payload) => Ok(payload),
        ClassifiedOutcome::ResourceNotFound => Err(Error::NotFound {
            resource: resource.to_string(),
        }),
        ClassifiedOutcome::RateLimited => Err(Error::RateLimited),
        ClassifiedOutcome::Failure { code, message } => Err(Error::Server { status: code, message }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::host::transport::Method;
    use crate::mock::MockTransport;
    use serde_json::{json, Value};

    fn build_json(target: &str, number: u64, status: &str) -> Value {
        json!({"build": number, "buildTargetId": target, "buildStatus": status})
    }

    fn client_with(mock: &Arc<MockTransport>) -> CloudBuildClient {
        CloudBuildClient::new(mock.clone())
    }

    #[test]
    fn test_build_status() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::Get, "buildtargets/ios/builds/3", 200, build_json("ios", 3, "started"));

        let build = client_with(&mock).build_status("ios", 3).unwrap();
        assert_eq!(build.number, 3);
        assert_eq!(build.status, BuildStatus::Started);
    }

    #[test]
    fn test_quota_headers_are_advisory() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            Method::Get,
            "buildtargets/ios/builds/3",
            ApiResponse::json(200, &build_json("ios", 3, "queued"))
                .with_header("X-RateLimit-Remaining", "0")
                .with_header("X-RateLimit-Limit", "100"),
        );

        let build = client_with(&mock).build_status("ios", 3).unwrap();
        assert_eq!(build.status, BuildStatus::Queued);
    }

    #[test]
    fn test_build_status_error_mapping() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::Get, "buildtargets/ios/builds/1", 404, json!({}));
        mock.respond_json(Method::Get, "buildtargets/ios/builds/2", 429, json!({}));
        mock.respond_json(Method::Get, "buildtargets/ios/builds/3", 500, json!({"error": "db down"}));
        mock.respond(Method::Get, "buildtargets/ios/builds/4", ApiResponse::new(200, "not json"));
        let client = client_with(&mock);

        let err = client.build_status("ios", 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("ios #1"));

        assert!(matches!(client.build_status("ios", 2), Err(Error::RateLimited)));

        match client.build_status("ios", 3) {
            Err(Error::Server { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "db down");
            }
            other => panic!("unexpected {:?}", other),
        }

        assert_eq!(client.build_status("ios", 4).unwrap_err().kind(), ErrorKind::Integrity);
    }

    #[test]
    fn test_list_builds_filters_and_limit() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(
            Method::Get,
            "buildtargets/win/builds",
            200,
            json!([
                build_json("win", 9, "success"),
                build_json("win", 8, "success"),
                build_json("win", 7, "success")
            ]),
        );

        let filter = BuildFilter::default()
            .with_status(BuildStatus::Success)
            .with_platform("win64")
            .with_limit(2);
        let builds = client_with(&mock).list_builds("win", &filter).unwrap();
        assert_eq!(builds.iter().map(|b| b.number).collect::<Vec<_>>(), vec![9, 8]);

        let sent = &mock.calls()[0];
        assert_eq!(sent.query_value("buildStatus"), Some("success"));
        assert_eq!(sent.query_value("platform"), Some("standalonewindows64"));
    }

    #[test]
    fn test_unknown_platform_rejected_before_request() {
        let mock = Arc::new(MockTransport::new());
        let filter = BuildFilter::default().with_platform("ps5");
        let err = client_with(&mock).list_builds("any", &filter).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_start_build_rejected() {
        let mock = Arc::new(MockTransport::new());
        let mut attempt = build_json("ios", 0, "unknown");
        attempt["error"] = json!("Target disabled");
        mock.respond_json(Method::Post, "buildtargets/ios/builds", 202, json!([attempt]));

        match client_with(&mock).start_build("ios", true) {
            Err(Error::StartRejected { target_id, message }) => {
                assert_eq!(target_id, "ios");
                assert_eq!(message, "Target disabled");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(mock.calls()[0].body, Some(json!({"clean": true})));
    }

    #[test]
    fn test_start_build_empty_response() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::Post, "buildtargets/ios/builds", 202, json!([]));
        assert_eq!(
            client_with(&mock).start_build("ios", false).unwrap_err().kind(),
            ErrorKind::Integrity
        );
    }

    #[test]
    fn test_cancel_build_not_found_names_build() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::Delete, "buildtargets/ios/builds/5", 404, json!({}));
        let err = client_with(&mock).cancel_build("ios", 5).unwrap_err();
        assert_eq!(err.to_string(), "Resource not found: ios build #5");
    }

    #[test]
    fn test_cancel_all_restricted_to_target() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(
            Method::Get,
            "buildtargets",
            200,
            json!([{"buildtargetid": "a", "enabled": true}, {"buildtargetid": "b", "enabled": true}]),
        );
        mock.respond(Method::Delete, "buildtargets/b/builds", ApiResponse::new(204, ""));

        let cancelled = client_with(&mock).cancel_all_builds(Some("b")).unwrap();
        assert_eq!(cancelled, vec!["b".to_string()]);
        assert_eq!(mock.calls_to(Method::Delete, "buildtargets/a/builds"), 0);
        assert_eq!(mock.calls_to(Method::Delete, "buildtargets/b/builds"), 1);
    }

    #[test]
    fn test_cancel_all_skips_target_without_builds() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(
            Method::Get,
            "buildtargets",
            200,
            json!([{"buildtargetid": "a", "enabled": true}, {"buildtargetid": "b", "enabled": true}]),
        );
        mock.respond_json(Method::Delete, "buildtargets/a/builds", 404, json!({}));
        mock.respond(Method::Delete, "buildtargets/b/builds", ApiResponse::new(204, ""));

        let cancelled = client_with(&mock).cancel_all_builds(None).unwrap();
        assert_eq!(cancelled, vec!["b".to_string()]);
        assert_eq!(mock.calls_to(Method::Delete, "buildtargets/b/builds"), 1);
    }

    #[test]
    fn test_cancel_all_stops_on_server_error() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(
            Method::Get,
            "buildtargets",
            200,
            json!([{"buildtargetid": "a", "enabled": true}, {"buildtargetid": "b", "enabled": true}]),
        );
        mock.respond_json(Method::Delete, "buildtargets/a/builds", 500, json!({"error": "boom"}));

        let err = client_with(&mock).cancel_all_builds(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(mock.calls_to(Method::Delete, "buildtargets/b/builds"), 0);
    }
}
