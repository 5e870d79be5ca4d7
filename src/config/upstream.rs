use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where the upstream API lives and how long we wait for it.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct UpstreamConfig {
    /// Base URL of the upstream API, e.g. "https://upstream.example.com".
    pub base_url: String,
    /// Per-request timeout for outbound calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Credentials and refresh tuning for the bot account we authenticate
/// with against the upstream API.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct BotAuthConfig {
    /// Endpoint that exchanges credentials for a token.
    pub login_url: String,
    /// Endpoint that trades the current token for a renewed one.
    pub refresh_url: String,
    pub login: String,
    pub password: String,
    /// How long before expiry the background loop renews the token, in seconds.
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,
    /// How many consecutive failed refresh attempts the background loop
    /// makes before giving up until the next request forces one.
    #[serde(default = "default_refresh_retries")]
    pub refresh_retries: u32,
    /// Delay between those attempts, in seconds.
    #[serde(default = "default_refresh_retry_delay_secs")]
    pub refresh_retry_delay_secs: u64,
    /// Upper bound on how long a caller waits for an in-flight refresh
    /// before failing, in seconds.
    #[serde(default = "default_refresh_wait_secs")]
    pub refresh_wait_secs: u64,
}

impl BotAuthConfig {
    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }

    pub fn refresh_retry_delay(&self) -> Duration {
        Duration::from_secs(self.refresh_retry_delay_secs)
    }

    pub fn refresh_wait(&self) -> Duration {
        Duration::from_secs(self.refresh_wait_secs)
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_refresh_margin_secs() -> u64 {
    60
}

fn default_refresh_retries() -> u32 {
    10
}

fn default_refresh_retry_delay_secs() -> u64 {
    5
}

fn default_refresh_wait_secs() -> u64 {
    15
}
