//! Connector configuration, loadable from JSON.

use std::time::Duration;

use noderpc_core::dispatch::{DispatchConfig, RaceMode, Strategy};
use noderpc_core::node::NodeConfig;
use noderpc_core::request::JsonRpcBodyBuilder;
use serde::{Deserialize, Serialize};

/// Everything a [`Connector`](crate::Connector) needs besides a transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Endpoint URLs; all http(s) or all ws(s)
    #[serde(default)]
    pub nodes: Vec<String>,
    /// How long a rate-limited or denied node is skipped
    #[serde(default = "default_ban_timeout_secs")]
    pub ban_timeout_secs: u64,
    /// How long a node that looked down is skipped
    #[serde(default = "default_unavailable_timeout_secs")]
    pub unavailable_timeout_secs: u64,
    /// Per-request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upper bound for a whole sequential call (unset = one lap)
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
    /// Upper bound for a whole racing call
    #[serde(default = "default_race_timeout_ms")]
    pub race_timeout_ms: u64,
    /// Pause before a racing leg retries its node
    #[serde(default = "default_race_retry_backoff_ms")]
    pub race_retry_backoff_ms: u64,
    /// Pause after an unanticipated failure
    #[serde(default = "default_unexpected_cooldown_ms")]
    pub unexpected_cooldown_ms: u64,
    #[serde(default)]
    pub race_mode: RaceMode,
    /// Overrides the scheme's default strategy
    #[serde(default)]
    pub strategy: Option<Strategy>,
    /// API namespace wrapped around calls on full-API nodes
    #[serde(default = "default_api")]
    pub default_api: String,
    /// Default filter directive for binaries installing a subscriber
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_ban_timeout_secs() -> u64 { 2 * 60 }
fn default_unavailable_timeout_secs() -> u64 { 20 * 60 }
fn default_request_timeout_ms() -> u64 { 20_000 }
fn default_race_timeout_ms() -> u64 { 20_000 }
fn default_race_retry_backoff_ms() -> u64 { 5_000 }
fn default_unexpected_cooldown_ms() -> u64 { 60_000 }
fn default_api() -> String { JsonRpcBodyBuilder::DEFAULT_API.to_string() }
fn default_log_level() -> String { "info".to_string() }

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            nodes: vec![],
            ban_timeout_secs: default_ban_timeout_secs(),
            unavailable_timeout_secs: default_unavailable_timeout_secs(),
            request_timeout_ms: default_request_timeout_ms(),
            call_timeout_ms: None,
            race_timeout_ms: default_race_timeout_ms(),
            race_retry_backoff_ms: default_race_retry_backoff_ms(),
            unexpected_cooldown_ms: default_unexpected_cooldown_ms(),
            race_mode: RaceMode::default(),
            strategy: None,
            default_api: default_api(),
            log_level: default_log_level(),
        }
    }
}

impl ConnectorConfig {
    /// Defaults for the given endpoints.
    pub fn with_nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            ban_timeout: Duration::from_secs(self.ban_timeout_secs),
            unavailable_timeout: Duration::from_secs(self.unavailable_timeout_secs),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            call_timeout: self.call_timeout_ms.map(Duration::from_millis),
            race_timeout: Duration::from_millis(self.race_timeout_ms),
            race_retry_backoff: Duration::from_millis(self.race_retry_backoff_ms),
            unexpected_cooldown: Duration::from_millis(self.unexpected_cooldown_ms),
            race_mode: self.race_mode,
        }
    }
}
