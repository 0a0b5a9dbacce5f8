use std::env;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/refresh";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the testing platform's API lives and how long to wait for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub refresh_path: String,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ApiConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: DEFAULT_REFRESH_PATH.into(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `QUIZ_API_BASE_URL`, `QUIZ_REFRESH_PATH` and
    /// `QUIZ_REQUEST_TIMEOUT_SECS`, falling back to defaults for anything
    /// missing, blank or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = non_blank("QUIZ_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let refresh_path =
            non_blank("QUIZ_REFRESH_PATH").unwrap_or_else(|| DEFAULT_REFRESH_PATH.into());
        let timeout_secs = non_blank("QUIZ_REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            base_url,
            refresh_path,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}
