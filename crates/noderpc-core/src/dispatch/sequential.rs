//! Sequential failover: one node at a time, first success wins.

use serde_json::Value;

use super::{DispatchConfig, Exchange};
use crate::classify::Outcome;
use crate::error::ClientError;
use crate::request::CallRequest;
use crate::ring::NodeRing;

pub(super) async fn call(
    ring: &NodeRing,
    exchange: &Exchange,
    config: &DispatchConfig,
    call: &CallRequest,
) -> Result<Value, ClientError> {
    for node in ring.candidates() {
        match exchange.attempt(&node, call).await? {
            Outcome::Success(value) => return Ok(value),
            Outcome::Fatal(err) => return Err(err.into()),
            Outcome::Recoverable(err) | Outcome::Legacy(err) => {
                tracing::warn!(host = %node, method = %call.method, error = %err, "recoverable RPC error");
            }
            // already logged and penalized by the exchange
            Outcome::Transport(_) => {}
            Outcome::Unexpected(msg) => {
                tracing::error!(
                    host = %node,
                    method = %call.method,
                    error = %msg,
                    cooldown = ?config.unexpected_cooldown,
                    "unexpected exception"
                );
                tokio::time::sleep(config.unexpected_cooldown).await;
            }
        }
    }
    tracing::error!(method = %call.method, nodes = ring.len(), "all candidates failed");
    Err(ClientError::exhausted(&call.method))
}
