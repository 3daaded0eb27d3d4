//! The `Transport` trait: how request bodies reach a node.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// What came back from a node before any JSON-RPC interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status, or `None` for transports without one (WebSocket).
    pub status: Option<u16>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: Option<u16>, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A 200 response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(Some(200), body)
    }
}

/// Sends one request body to one endpoint.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Deliver `body` to `url` and return the raw answer.
    ///
    /// Implementations should give up after `timeout`; the dispatcher also
    /// enforces it from the outside.
    async fn send(
        &self,
        url: &str,
        body: String,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
