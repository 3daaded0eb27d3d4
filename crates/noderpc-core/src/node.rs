//! One RPC endpoint and its health/capability state.
//!
//! Health flags heal themselves: a ban or unavailability mark carries an
//! expiry, and every read compares it against the injected clock.
//!
//! - `mark_banned`: working → banned until `now + ban_timeout`
//! - `mark_unavailable`: working → unavailable until `now + unavailable_timeout`
//! - expiry elapsed: flag cleared on the next read
//! - `reset`: both flags cleared immediately

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::capability::CapabilityRegistry;
use crate::clock::Clock;
use crate::error::Penalty;

/// Penalty windows applied to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    /// How long a rate-limited / denied node is skipped.
    pub ban_timeout: Duration,
    /// How long a node that looked down is skipped.
    pub unavailable_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ban_timeout: Duration::from_secs(2 * 60),
            unavailable_timeout: Duration::from_secs(20 * 60),
        }
    }
}

/// Point-in-time view of a node, for display and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub url: String,
    pub hostname: String,
    pub available: bool,
    pub banned: bool,
    pub full_api: bool,
}

impl NodeStatus {
    pub fn is_working(&self) -> bool {
        self.available && !self.banned
    }
}

#[derive(Debug, Default)]
struct Health {
    unavailable_until: Option<Instant>,
    banned_until: Option<Instant>,
}

/// A configured endpoint.
pub struct Node {
    url: String,
    hostname: String,
    config: NodeConfig,
    clock: Arc<dyn Clock>,
    capabilities: CapabilityRegistry,
    health: Mutex<Health>,
}

impl Node {
    pub fn new(
        url: impl Into<String>,
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        capabilities: CapabilityRegistry,
    ) -> Self {
        let url = url.into();
        Self {
            hostname: hostname_of(&url),
            url,
            config,
            clock,
            capabilities,
            health: Mutex::new(Health::default()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    fn health(&self) -> MutexGuard<'_, Health> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_available(&self) -> bool {
        let now = self.clock.now();
        let mut health = self.health();
        if health.unavailable_until.is_some_and(|until| now >= until) {
            health.unavailable_until = None;
            tracing::debug!(host = %self.hostname, "node available again");
        }
        health.unavailable_until.is_none()
    }

    pub fn is_banned(&self) -> bool {
        let now = self.clock.now();
        let mut health = self.health();
        if health.banned_until.is_some_and(|until| now >= until) {
            health.banned_until = None;
            tracing::debug!(host = %self.hostname, "node ban lifted");
        }
        health.banned_until.is_some()
    }

    /// Available and not banned.
    pub fn is_working(&self) -> bool {
        self.is_available() && !self.is_banned()
    }

    pub fn mark_unavailable(&self) {
        let until = self.clock.now() + self.config.unavailable_timeout;
        self.health().unavailable_until = Some(until);
        tracing::warn!(
            host = %self.hostname,
            secs = self.config.unavailable_timeout.as_secs(),
            "node marked unavailable"
        );
    }

    pub fn mark_banned(&self) {
        let until = self.clock.now() + self.config.ban_timeout;
        self.health().banned_until = Some(until);
        tracing::warn!(
            host = %self.hostname,
            secs = self.config.ban_timeout.as_secs(),
            "node banned"
        );
    }

    pub fn penalize(&self, penalty: Penalty) {
        match penalty {
            Penalty::Ban => self.mark_banned(),
            Penalty::Unavailable => self.mark_unavailable(),
        }
    }

    pub fn reset(&self) {
        let mut health = self.health();
        health.unavailable_until = None;
        health.banned_until = None;
    }

    pub fn uses_full_api(&self) -> bool {
        self.capabilities.uses_full_api(&self.url)
    }

    /// One-way: the node never regains the default API.
    pub fn downgrade_api(&self) {
        if self.capabilities.downgrade(&self.url) {
            tracing::info!(host = %self.hostname, "node downgraded to plain API calls");
        }
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            url: self.url.clone(),
            hostname: self.hostname.clone(),
            available: self.is_available(),
            banned: self.is_banned(),
            full_api: self.uses_full_api(),
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("url", &self.url)
            .field("working", &self.is_working())
            .field("full_api", &self.uses_full_api())
            .finish()
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hostname)
    }
}

fn hostname_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn node(clock: &Arc<ManualClock>) -> Node {
        Node::new(
            "https://api.example.com:8090/rpc",
            NodeConfig::default(),
            clock.clone(),
            CapabilityRegistry::new(),
        )
    }

    #[test]
    fn hostname_is_derived_from_url() {
        let clock = Arc::new(ManualClock::new());
        assert_eq!(node(&clock).hostname(), "api.example.com");
        assert_eq!(hostname_of("not a url"), "not a url");
    }

    #[test]
    fn starts_working() {
        let clock = Arc::new(ManualClock::new());
        let n = node(&clock);
        assert!(n.is_available());
        assert!(!n.is_banned());
        assert!(n.is_working());
        assert!(n.uses_full_api());
    }

    #[test]
    fn ban_expires_without_reset() {
        let clock = Arc::new(ManualClock::new());
        let n = node(&clock);
        n.mark_banned();
        assert!(n.is_banned());
        assert!(!n.is_working());

        clock.advance(Duration::from_secs(119));
        assert!(n.is_banned());

        clock.advance(Duration::from_secs(1));
        assert!(!n.is_banned());
        assert!(n.is_working());
    }

    #[test]
    fn unavailability_outlasts_ban() {
        let clock = Arc::new(ManualClock::new());
        let n = node(&clock);
        n.mark_unavailable();
        clock.advance(Duration::from_secs(5 * 60));
        assert!(!n.is_available());
        clock.advance(Duration::from_secs(15 * 60));
        assert!(n.is_available());
    }

    #[test]
    fn reset_clears_both_flags() {
        let clock = Arc::new(ManualClock::new());
        let n = node(&clock);
        n.mark_banned();
        n.mark_unavailable();
        n.reset();
        assert!(n.is_working());
    }

    #[test]
    fn downgrade_is_one_way_and_idempotent() {
        let clock = Arc::new(ManualClock::new());
        let n = node(&clock);
        n.downgrade_api();
        n.downgrade_api();
        assert!(!n.uses_full_api());
        n.reset();
        clock.advance(Duration::from_secs(24 * 60 * 60));
        assert!(!n.uses_full_api());
    }

    #[test]
    fn penalize_maps_to_marks() {
        let clock = Arc::new(ManualClock::new());
        let n = node(&clock);
        n.penalize(Penalty::Ban);
        let status = n.status();
        assert!(status.banned);
        assert!(status.available);
        assert!(!status.is_working());
    }
}
