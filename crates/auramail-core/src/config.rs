//! Sync configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default base URL of the mail service.
pub const DEFAULT_API_URL: &str = "https://api.aurafarming.co";

/// Default poll interval in seconds.
pub const DEFAULT_POLL_SECS: u64 = 10;

/// Settings for talking to the mail service and polling it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the mail service.
    pub api_url: String,
    /// Seconds between scheduled refreshes.
    pub poll_interval_secs: u64,
    /// Listing page requested from the folder endpoints.
    pub page: u32,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval_secs: DEFAULT_POLL_SECS,
            page: 1,
            request_timeout_secs: 30,
        }
    }
}

impl SyncConfig {
    /// Interval between scheduled refreshes.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Applies `AURAMAIL_API_URL` and `AURAMAIL_POLL_SECS` from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is present but invalid.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup("AURAMAIL_API_URL") {
            self.api_url = url;
        }
        if let Some(secs) = lookup("AURAMAIL_POLL_SECS") {
            self.poll_interval_secs = secs
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("AURAMAIL_POLL_SECS is not a number: {secs}")))?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api_url must be an http(s) URL: {}",
                self.api_url
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be positive".into()));
        }
        Ok(())
    }
}
