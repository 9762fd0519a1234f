use std::time::Duration;

use shipyard_core::PlatformError;

pub const ENV_PLATFORM_URL: &str = "SHIPYARD_PLATFORM_URL";
pub const ENV_PLATFORM_TOKEN: &str = "SHIPYARD_PLATFORM_TOKEN";

#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Base URL of the platform API; `None` runs without one.
    pub url: Option<String>,
    pub token: Option<String>,
    /// Upper bound for a single request.
    pub request_timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PlatformConfig {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            url: non_blank(ENV_PLATFORM_URL).map(|u| u.trim_end_matches('/').to_string()),
            token: non_blank(ENV_PLATFORM_TOKEN),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[inline]
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    pub fn validate(&self) -> Result<(), PlatformError> {
        let Some(url) = &self.url else {
            return Err(PlatformError::Request(format!("{ENV_PLATFORM_URL} is not set")));
        };
        reqwest::Url::parse(url)
            .map_err(|e| PlatformError::Request(format!("invalid platform url {url:?}: {e}")))?;
        if self.request_timeout.is_zero() {
            return Err(PlatformError::Request("request timeout must be > 0".into()));
        }
        Ok(())
    }
}
