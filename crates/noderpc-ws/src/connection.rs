//! Background task owning one endpoint's WebSocket connection.

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

use noderpc_core::error::TransportError;
use noderpc_core::transport::RawResponse;

pub(crate) type Reply = Result<RawResponse, TransportError>;

/// Command sent from callers to the connection task.
pub(crate) enum WsCommand {
    Send {
        body: String,
        tx: oneshot::Sender<Reply>,
    },
    Close,
}

/// Reconnect settings for a connection task.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Reconnect backoff starting duration.
    pub reconnect_initial: Duration,
    /// Maximum reconnect backoff.
    pub reconnect_max: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(60),
        }
    }
}

/// Give `body` a connection-unique id so the answer can be routed back.
pub(crate) fn tag(body: &str, id: u64) -> Result<String, TransportError> {
    let mut value: Value =
        serde_json::from_str(body).map_err(|e| TransportError::Other(format!("unsendable body: {e}")))?;
    let Value::Object(map) = &mut value else {
        return Err(TransportError::Other("request body is not a JSON object".into()));
    };
    map.insert("id".into(), Value::from(id));
    Ok(value.to_string())
}

/// The id of an incoming frame, if it answers a request.
pub(crate) fn reply_id(text: &str) -> Option<u64> {
    serde_json::from_str::<Value>(text)
        .ok()?
        .get("id")?
        .as_u64()
}

/// Requests sent on the current connection, keyed by their wire id.
#[derive(Default)]
pub(crate) struct Pending {
    waiting: HashMap<u64, oneshot::Sender<Reply>>,
}

impl Pending {
    /// Track `tx`, forgetting callers that already gave up.
    pub(crate) fn insert(&mut self, id: u64, tx: oneshot::Sender<Reply>) {
        self.waiting.retain(|_, waiting| !waiting.is_closed());
        self.waiting.insert(id, tx);
    }

    /// Hand `text` to the request it answers, if anyone still waits for it.
    pub(crate) fn resolve(&mut self, text: &str) -> bool {
        match reply_id(text).and_then(|id| self.waiting.remove(&id)) {
            Some(tx) => {
                let _ = tx.send(Ok(RawResponse::new(None, text)));
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.waiting.len()
    }
}

/// Fail everything already queued while the endpoint is unreachable.
fn fail_queued(cmd_rx: &mut mpsc::UnboundedReceiver<WsCommand>, reason: &str) -> bool {
    while let Ok(cmd) = cmd_rx.try_recv() {
        match cmd {
            WsCommand::Close => return false,
            WsCommand::Send { tx, .. } => {
                let _ = tx.send(Err(TransportError::Connection(reason.to_string())));
            }
        }
    }
    true
}

/// Sleep for `backoff`, failing requests that arrive meanwhile.
///
/// Returns `false` when the transport asked the task to stop.
async fn wait_out(cmd_rx: &mut mpsc::UnboundedReceiver<WsCommand>, backoff: Duration, reason: &str) -> bool {
    if !fail_queued(cmd_rx, reason) {
        return false;
    }
    let sleep = time::sleep(backoff);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = cmd_rx.recv() => match cmd {
                None | Some(WsCommand::Close) => return false,
                Some(WsCommand::Send { tx, .. }) => {
                    let _ = tx.send(Err(TransportError::Connection(reason.to_string())));
                }
            },
        }
    }
}

pub(crate) async fn run(url: String, mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>, config: WsConfig) {
    let mut backoff = config.reconnect_initial;
    let mut next_id: u64 = 1;

    loop {
        tracing::info!(url = %url, "connecting via WebSocket");

        let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(url = %url, error = %reason, "WS connect failed, retrying in {backoff:?}");
                if !wait_out(&mut cmd_rx, backoff, &reason).await {
                    return;
                }
                backoff = (backoff * 2).min(config.reconnect_max);
                continue;
            }
        };

        backoff = config.reconnect_initial;
        let (mut sink, mut stream) = ws_stream.split();
        // dropped on disconnect, which fails every request still in flight
        let mut pending = Pending::default();

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        None | Some(WsCommand::Close) => {
                            let _ = sink.send(Message::Close(None)).await;
                            return;
                        }
                        Some(WsCommand::Send { body, tx }) => {
                            let id = next_id;
                            next_id += 1;
                            let msg = match tag(&body, id) {
                                Ok(msg) => msg,
                                Err(e) => {
                                    let _ = tx.send(Err(e));
                                    continue;
                                }
                            };
                            pending.insert(id, tx);
                            if let Err(e) = sink.send(Message::Text(msg)).await {
                                tracing::warn!(url = %url, error = %e, "WS send failed");
                                break;
                            }
                        }
                    }
                }
                msg = stream.next() => {
                    match msg {
                        None => break,
                        Some(Err(e)) => {
                            tracing::warn!(url = %url, error = %e, "WS receive error");
                            break;
                        }
                        Some(Ok(Message::Text(text))) => {
                            if !pending.resolve(&text) {
                                tracing::debug!(url = %url, "unmatched WS frame");
                            }
                        }
                        Some(Ok(Message::Close(_))) => break,
                        _ => {}
                    }
                }
            }
        }

        tracing::warn!(url = %url, in_flight = pending.len(), "WS disconnected, reconnecting in {backoff:?}");
        drop(pending);
        if !wait_out(&mut cmd_rx, backoff, "reconnecting after disconnect").await {
            return;
        }
        backoff = (backoff * 2).min(config.reconnect_max);
    }
}
