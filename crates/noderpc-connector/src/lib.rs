//! noderpc-connector: picks HTTP or WS by node scheme and exposes the
//! fault-tolerant call surface.
//!
//! # Quick start
//! ```rust,no_run
//! # async fn demo() -> Result<(), noderpc_core::ClientError> {
//! use noderpc_connector::{Connector, ConnectorConfig};
//!
//! let config = ConnectorConfig::from_json(r#"{"nodes": ["wss://ws.node-a.example", "wss://ws.node-b.example"]}"#)?;
//! let client = Connector::with_config(config)?;
//! let block = client.call("get_block", vec![1.into()]).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod scheme;

pub use config::ConnectorConfig;
pub use connector::Connector;
pub use scheme::{detect_scheme, Scheme};
