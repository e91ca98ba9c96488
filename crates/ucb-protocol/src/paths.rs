//! Resource paths, relative to `orgs/{org}/projects/{project}/`.

/// All build targets of the project.
pub fn build_targets() -> String {
    "buildtargets".to_string()
}

/// Builds of one target (or of every target when `target_id` is `_all`).
pub fn target_builds(target_id: &str) -> String {
    format!("buildtargets/{}/builds", target_id)
}

/// A single build by number.
pub fn build(target_id: &str, number: u64) -> String {
    format!("buildtargets/{}/builds/{}", target_id, number)
}

/// Query parameter names used by the listing endpoints.
pub mod query {
    pub const INCLUDE: &str = "include";
    pub const INCLUDE_LAST_SUCCESS: &str = "include_last_success";
    pub const BUILD_STATUS: &str = "buildStatus";
    pub const PLATFORM: &str = "platform";
}
