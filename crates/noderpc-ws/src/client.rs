//! WebSocket JSON-RPC transport: one persistent connection per endpoint.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use noderpc_core::error::TransportError;
use noderpc_core::transport::{RawResponse, Transport};

use crate::connection::{self, WsCommand, WsConfig};

/// WebSocket transport.
///
/// Connections are opened lazily on the first request to an endpoint and
/// owned by background tasks that reconnect on their own.
pub struct WsTransport {
    config: WsConfig,
    connections: Mutex<HashMap<String, mpsc::UnboundedSender<WsCommand>>>,
}

impl WsTransport {
    pub fn new(config: WsConfig) -> Self {
        Self {
            config,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Number of endpoints with a live connection task.
    pub fn connection_count(&self) -> usize {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn connection(&self, url: &str) -> mpsc::UnboundedSender<WsCommand> {
        let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = connections.get(url).filter(|tx| !tx.is_closed()) {
            return tx.clone();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(connection::run(url.to_string(), rx, self.config.clone()));
        connections.insert(url.to_string(), tx.clone());
        tx
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(WsConfig::default())
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        let connections = self.connections.get_mut().unwrap_or_else(PoisonError::into_inner);
        for tx in connections.values() {
            let _ = tx.send(WsCommand::Close);
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(
        &self,
        url: &str,
        body: String,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.connection(url)
            .send(WsCommand::Send { body, tx })
            .map_err(|_| TransportError::WebSocket("WS task closed".into()))?;
        match tokio::time::timeout(timeout, rx).await {
            Err(_) => Err(TransportError::timeout(timeout)),
            Ok(Err(_)) => Err(TransportError::WebSocket("WS response dropped".into())),
            Ok(Ok(reply)) => reply,
        }
    }

    fn name(&self) -> &'static str {
        "ws"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};
    use serde_json::Value;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    /// Echo server answering every request with `{"id": <id>, "result": <method>}`.
    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
                    while let Some(Ok(msg)) = ws.next().await {
                        let Message::Text(text) = msg else { continue };
                        let req: Value = serde_json::from_str(text.as_str()).unwrap();
                        let reply = serde_json::json!({"jsonrpc": "2.0", "id": req["id"], "result": req["method"]});
                        ws.send(Message::Text(reply.to_string().into())).await.unwrap();
                    }
                });
            }
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn round_trip_over_one_connection() {
        let url = echo_server().await;
        let transport = WsTransport::default();

        for method in ["get_config", "get_block"] {
            let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": []});
            let raw = transport
                .send(&url, body.to_string(), Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(raw.status, None);
            let value: Value = serde_json::from_str(&raw.body).unwrap();
            assert_eq!(value["result"], method);
        }
        assert_eq!(transport.connection_count(), 1);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_without_waiting_for_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WsTransport::default();
        let err = transport
            .send(&format!("ws://{addr}"), "{}".into(), Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)), "got {err:?}");
    }

    /// Drops the first connection after reading one request, then echoes.
    async fn drop_first_connection_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            let _ = ws.next().await;
            drop(ws);

            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
                    while let Some(Ok(Message::Text(text))) = ws.next().await {
                        let req: Value = serde_json::from_str(text.as_str()).unwrap();
                        let reply = serde_json::json!({"jsonrpc": "2.0", "id": req["id"], "result": "back"});
                        ws.send(Message::Text(reply.to_string().into())).await.unwrap();
                    }
                });
            }
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn disconnect_fails_in_flight_request_then_reconnects() {
        let url = drop_first_connection_server().await;
        let transport = WsTransport::new(WsConfig {
            reconnect_initial: Duration::from_millis(20),
            reconnect_max: Duration::from_millis(100),
        });
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"get_config","params":[]}"#;

        let err = transport
            .send(&url, body.into(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::WebSocket(_)), "got {err:?}");

        let mut answered = None;
        for _ in 0..50 {
            match transport.send(&url, body.into(), Duration::from_secs(5)).await {
                Ok(raw) => {
                    answered = Some(raw);
                    break;
                }
                // still inside the reconnect pause
                Err(TransportError::Connection(_)) => tokio::time::sleep(Duration::from_millis(20)).await,
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
        let raw = answered.expect("no answer after reconnect");
        let value: Value = serde_json::from_str(&raw.body).unwrap();
        assert_eq!(value["result"], "back");
        assert_eq!(transport.connection_count(), 1);
    }
}
