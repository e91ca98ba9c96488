//! Advisory rate-limit headers.

/// Quota information the service attaches to responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    /// Epoch seconds at which the window resets
    pub reset: Option<u64>,
}

impl RateLimitInfo {
    /// Read `X-RateLimit-*` headers. Header names are matched case-insensitively.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut info = RateLimitInfo::default();
        for (name, value) in headers {
            let parsed = value.trim().parse::<u64>().ok();
            match name.to_ascii_lowercase().as_str() {
                "x-ratelimit-limit" => info.limit = parsed,
                "x-ratelimit-remaining" => info.remaining = parsed,
                "x-ratelimit-reset" => info.reset = parsed,
                _ => {}
            }
        }
        info
    }
}
