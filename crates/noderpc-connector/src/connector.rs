//! The public call surface: one ring, one transport, one strategy.

use std::sync::Arc;

use noderpc_core::dispatch::{Dispatcher, Strategy};
use noderpc_core::error::ClientError;
use noderpc_core::node::NodeStatus;
use noderpc_core::request::{CallRequest, JsonRpcBodyBuilder};
use noderpc_core::ring::NodeRing;
use noderpc_core::transport::Transport;
use noderpc_http::{HttpConfig, HttpTransport};
use noderpc_ws::WsTransport;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ConnectorConfig;
use crate::scheme::{detect_scheme, normalize, Scheme};

/// Fault-tolerant client over a pool of interchangeable nodes.
///
/// HTTP pools fail over one node at a time; WS pools race every node.
///
/// ```rust,no_run
/// # async fn demo() -> Result<(), noderpc_core::ClientError> {
/// use noderpc_connector::Connector;
///
/// let client = Connector::new(["https://api.node-a.example", "https://api.node-b.example"])?;
/// let props = client.call("get_dynamic_global_properties", vec![]).await?;
/// println!("{props} via {:?}", client.hostname());
/// # Ok(())
/// # }
/// ```
pub struct Connector {
    dispatcher: Dispatcher,
    scheme: Scheme,
}

impl Connector {
    /// Connector with default timeouts.
    pub fn new<I, S>(nodes: I) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(ConnectorConfig::with_nodes(nodes))
    }

    /// Connector using the transport matching the node scheme.
    pub fn with_config(config: ConnectorConfig) -> Result<Self, ClientError> {
        let transport: Arc<dyn Transport> = match detect_scheme(&config.nodes)? {
            Scheme::Http => Arc::new(HttpTransport::new(HttpConfig::default())?),
            Scheme::Ws => Arc::new(WsTransport::default()),
        };
        Self::with_transport(config, transport)
    }

    /// Connector sending through `transport`, whatever the node scheme.
    pub fn with_transport(config: ConnectorConfig, transport: Arc<dyn Transport>) -> Result<Self, ClientError> {
        let scheme = detect_scheme(&config.nodes)?;
        let strategy = config.strategy.unwrap_or(match scheme {
            Scheme::Http => Strategy::Sequential,
            Scheme::Ws => Strategy::Racing,
        });
        let ring = Arc::new(NodeRing::new(
            config.nodes.iter().map(|url| normalize(url)),
            config.node_config(),
        ));
        tracing::info!(
            nodes = ring.len(),
            %scheme,
            %strategy,
            transport = transport.name(),
            "connector ready"
        );
        let dispatcher = Dispatcher::new(ring, transport, strategy, config.dispatch_config())
            .with_body_builder(Arc::new(JsonRpcBodyBuilder::new(config.default_api)));
        Ok(Self { dispatcher, scheme })
    }

    /// Call `method` with positional arguments.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, ClientError> {
        self.dispatcher.call(CallRequest::with_args(method, args)).await
    }

    /// Call with full control over arguments and API routing.
    pub async fn call_with(&self, request: CallRequest) -> Result<Value, ClientError> {
        self.dispatcher.call(request).await
    }

    pub async fn call_as<T: DeserializeOwned>(&self, request: CallRequest) -> Result<T, ClientError> {
        self.dispatcher.call_as(request).await
    }

    /// Run independent calls concurrently; results keep input order.
    pub async fn call_many(
        &self,
        requests: Vec<CallRequest>,
        max_in_flight: usize,
    ) -> Vec<Result<Value, ClientError>> {
        self.dispatcher.call_many(requests, max_in_flight).await
    }

    /// Hostname of the node the rotation currently points at.
    pub fn hostname(&self) -> Option<String> {
        self.dispatcher
            .ring()
            .current()
            .map(|node| node.hostname().to_string())
    }

    pub fn status(&self) -> Vec<NodeStatus> {
        self.dispatcher.ring().status()
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn strategy(&self) -> Strategy {
        self.dispatcher.strategy()
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("scheme", &self.scheme)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
