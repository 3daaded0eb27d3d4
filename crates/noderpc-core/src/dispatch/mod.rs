//! Call dispatch over a [`NodeRing`]: body construction, sending,
//! classification and the two failover strategies.
//!
//! ```text
//! call → candidates → build body (per node capability) → Transport → classify
//!          ▲                                                            │
//!          └──────────── recoverable: penalize node, next candidate ◄───┘
//! ```

mod racing;
mod sequential;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::{classify, Outcome};
use crate::error::{ClientError, RpcError, TransportError};
use crate::node::Node;
use crate::request::{BodyBuilder, CallRequest, JsonRpcBodyBuilder};
use crate::ring::NodeRing;
use crate::transport::Transport;

/// How one logical call spreads over the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One node at a time, stop on the first success.
    Sequential,
    /// Every node at once, first acceptable completion wins.
    Racing,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Racing => write!(f, "racing"),
        }
    }
}

/// Which completion decides a race.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceMode {
    /// Skip recoverable failures and keep waiting; fatal errors still end the race.
    #[default]
    FirstSuccess,
    /// Whatever completes first decides, even a recoverable failure.
    FirstAnswer,
}

/// Timing and policy knobs for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Timeout for a single send to a single node.
    pub request_timeout: Duration,
    /// Upper bound for a whole sequential call (`None` = bounded by the lap only).
    pub call_timeout: Option<Duration>,
    /// Upper bound for a whole racing call.
    pub race_timeout: Duration,
    /// Pause before a racing leg retries its node after a transport failure.
    pub race_retry_backoff: Duration,
    /// Pause after an unanticipated failure before moving on.
    pub unexpected_cooldown: Duration,
    pub race_mode: RaceMode,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(20),
            call_timeout: None,
            race_timeout: Duration::from_secs(20),
            race_retry_backoff: Duration::from_secs(5),
            unexpected_cooldown: Duration::from_secs(60),
            race_mode: RaceMode::default(),
        }
    }
}

/// Everything needed to talk to one node; cheap to clone into tasks.
#[derive(Clone)]
pub(crate) struct Exchange {
    transport: Arc<dyn Transport>,
    builder: Arc<dyn BodyBuilder>,
    request_timeout: Duration,
    next_id: Arc<AtomicU64>,
}

impl Exchange {
    fn body(&self, call: &CallRequest, use_default_api: bool) -> Result<String, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.builder.build(call, use_default_api, id)
    }

    /// Send one body, classify the answer and penalize the node if needed.
    async fn send(&self, node: &Node, body: String) -> Outcome {
        let timeout = self.request_timeout;
        let sent = tokio::time::timeout(timeout, self.transport.send(node.url(), body, timeout)).await;
        let outcome = match sent {
            Err(_) => Outcome::Transport(TransportError::timeout(timeout)),
            Ok(Err(e)) => e.into(),
            Ok(Ok(raw)) => classify(node.hostname(), &raw),
        };
        if let Outcome::Transport(err) = &outcome {
            tracing::warn!(
                host = %node,
                transport = self.transport.name(),
                error = %err,
                "retry exception"
            );
            if let Some(penalty) = err.penalty() {
                node.penalize(penalty);
            }
        }
        outcome
    }

    /// One attempt against one node, including the downgrade-retry.
    async fn attempt(&self, node: &Node, call: &CallRequest) -> Result<Outcome, ClientError> {
        let full_api = call.use_default_api && node.uses_full_api();
        let outcome = self.send(node, self.body(call, full_api)?).await;
        Ok(match outcome {
            Outcome::Legacy(err) if full_api => {
                node.downgrade_api();
                tracing::error!(host = %node, error = %err, "downgrade-retry");
                match self.send(node, self.body(call, false)?).await {
                    Outcome::Legacy(err) => settle_legacy(err),
                    other => other,
                }
            }
            Outcome::Legacy(err) => settle_legacy(err),
            other => other,
        })
    }
}

/// A code-1 error from a node already on plain bodies is an ordinary RPC
/// error: recoverable only for the known transient messages.
fn settle_legacy(err: RpcError) -> Outcome {
    if err.is_recoverable() {
        Outcome::Recoverable(err)
    } else {
        Outcome::Fatal(err)
    }
}

/// Issues calls against a ring of interchangeable nodes.
pub struct Dispatcher {
    ring: Arc<NodeRing>,
    exchange: Exchange,
    strategy: Strategy,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        ring: Arc<NodeRing>,
        transport: Arc<dyn Transport>,
        strategy: Strategy,
        config: DispatchConfig,
    ) -> Self {
        Self {
            exchange: Exchange {
                transport,
                builder: Arc::new(JsonRpcBodyBuilder::default()),
                request_timeout: config.request_timeout,
                next_id: Arc::new(AtomicU64::new(1)),
            },
            ring,
            strategy,
            config,
        }
    }

    /// Replace the request body serializer.
    pub fn with_body_builder(mut self, builder: Arc<dyn BodyBuilder>) -> Self {
        self.exchange.builder = builder;
        self
    }

    pub fn ring(&self) -> &Arc<NodeRing> {
        &self.ring
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Execute `request`, failing over between nodes as needed.
    ///
    /// Only fatal RPC errors and exhaustion reach the caller.
    pub async fn call(&self, request: CallRequest) -> Result<Value, ClientError> {
        tracing::debug!(method = %request.method, strategy = %self.strategy, "dispatching call");
        match self.strategy {
            Strategy::Racing => racing::call(&self.ring, &self.exchange, &self.config, request).await,
            Strategy::Sequential => match self.config.call_timeout {
                None => sequential::call(&self.ring, &self.exchange, &self.config, &request).await,
                Some(limit) => {
                    let rotation = sequential::call(&self.ring, &self.exchange, &self.config, &request);
                    match tokio::time::timeout(limit, rotation).await {
                        Ok(result) => result,
                        Err(_) => {
                            tracing::warn!(
                                method = %request.method,
                                limit = ?limit,
                                "call timed out"
                            );
                            Err(ClientError::exhausted(&request.method))
                        }
                    }
                }
            },
        }
    }

    /// Execute `request` and deserialize the result.
    pub async fn call_as<T: DeserializeOwned>(&self, request: CallRequest) -> Result<T, ClientError> {
        let value = self.call(request).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Execute independent calls concurrently, at most `max_in_flight` at a
    /// time. Results come back in input order.
    pub async fn call_many(
        &self,
        requests: Vec<CallRequest>,
        max_in_flight: usize,
    ) -> Vec<Result<Value, ClientError>> {
        stream::iter(requests)
            .map(|request| self.call(request))
            .buffered(max_in_flight.max(1))
            .collect()
            .await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &self.exchange.transport.name())
            .field("strategy", &self.strategy)
            .field("ring", &self.ring)
            .finish()
    }
}
