//! Configuration types

use crate::codec::Codec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete harness configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Endpoints of the deployment under test
    #[serde(default)]
    pub api: ApiConfig,
    /// Login used for every scenario
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Deadlines
    #[serde(default)]
    pub timing: TimingConfig,
    /// Push-channel settings
    #[serde(default)]
    pub channel: ChannelConfig,
}

/// Endpoints of the deployment under test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// REST API base, e.g. `https://localhost:8080/api/v2`
    pub base_url: String,
    /// Auth service base, e.g. `https://localhost:8181/api/v2/auth`
    pub auth_url: String,
    /// Push-channel base, e.g. `wss://localhost:8080/ws/v2`
    pub channel_url: String,
    /// Path appended to `channel_url` when subscribing
    pub channel_path: String,
    /// Accept self-signed certificates on HTTPS and WSS connections
    pub accept_invalid_certs: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:8080/api/v2".to_string(),
            auth_url: "https://localhost:8181/api/v2/auth".to_string(),
            channel_url: "wss://localhost:8080/ws/v2".to_string(),
            channel_path: "/".to_string(),
            accept_invalid_certs: true,
        }
    }
}

impl ApiConfig {
    /// Full push-channel URL (`channel_url` + `channel_path`).
    pub fn channel_endpoint(&self) -> String {
        let base = self.channel_url.trim_end_matches('/');
        if self.channel_path.starts_with('/') {
            format!("{base}{}", self.channel_path)
        } else {
            format!("{base}/{}", self.channel_path)
        }
    }

    /// Join a relative API path such as `multicast/site/2`.
    pub fn api_endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Join a relative auth path such as `session`.
    pub fn auth_endpoint(&self, path: &str) -> String {
        join_url(&self.auth_url, path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Login used for every scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

/// Deadlines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wall-clock limit for one scenario's receive loop
    pub overall_deadline_secs: u64,
    /// Upper bound on a single wait for the next envelope
    pub per_message_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            overall_deadline_secs: 10,
            per_message_timeout_secs: 20,
        }
    }
}

impl TimingConfig {
    pub fn overall_deadline(&self) -> Duration {
        Duration::from_secs(self.overall_deadline_secs)
    }

    pub fn per_message_timeout(&self) -> Duration {
        Duration::from_secs(self.per_message_timeout_secs)
    }
}

/// Push-channel settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Envelope serialization accepted on the channel
    pub codec: Codec,
}
