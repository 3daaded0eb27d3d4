//! Concurrent racing: every node at once, first acceptable completion wins.
//!
//! Each leg runs as its own task in a [`JoinSet`]; dropping the set (on
//! return, timeout, or when the caller drops the call future) aborts the
//! stragglers, so a losing leg never delivers its answer.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinSet;

use super::{DispatchConfig, Exchange, RaceMode};
use crate::classify::Outcome;
use crate::error::ClientError;
use crate::node::Node;
use crate::request::CallRequest;
use crate::ring::NodeRing;

pub(super) async fn call(
    ring: &NodeRing,
    exchange: &Exchange,
    config: &DispatchConfig,
    call: CallRequest,
) -> Result<Value, ClientError> {
    let call = Arc::new(call);
    let mut legs = JoinSet::new();
    for node in ring.nodes() {
        let node = node.clone();
        let exchange = exchange.clone();
        let call = call.clone();
        let backoff = config.race_retry_backoff;
        legs.spawn(async move {
            let outcome = leg(&exchange, &node, &call, backoff).await;
            (node, outcome)
        });
    }

    let race = async {
        while let Some(joined) = legs.join_next().await {
            let (node, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(method = %call.method, error = %e, "racing task failed");
                    continue;
                }
            };
            match outcome? {
                Outcome::Success(value) => {
                    tracing::debug!(host = %node, method = %call.method, "race won");
                    return Ok(value);
                }
                Outcome::Fatal(err) => return Err(err.into()),
                other => {
                    tracing::warn!(host = %node, method = %call.method, outcome = ?other, "racing leg failed");
                    if config.race_mode == RaceMode::FirstAnswer {
                        return other.into_result();
                    }
                }
            }
        }
        Err(ClientError::exhausted(&call.method))
    };

    let result = tokio::time::timeout(config.race_timeout, race).await;
    legs.abort_all();
    result.unwrap_or_else(|_| {
        tracing::warn!(
            method = %call.method,
            limit = ?config.race_timeout,
            "no node answered in time"
        );
        Err(ClientError::exhausted(&call.method))
    })
}

/// One node's part of the race: a single retry after `backoff` on
/// transport-level failures, never rotating.
async fn leg(
    exchange: &Exchange,
    node: &Node,
    call: &CallRequest,
    backoff: Duration,
) -> Result<Outcome, ClientError> {
    let outcome = exchange.attempt(node, call).await?;
    if !outcome.is_transport_level() {
        return Ok(outcome);
    }
    tracing::debug!(host = %node, backoff = ?backoff, "retrying node");
    tokio::time::sleep(backoff).await;
    exchange.attempt(node, call).await
}
