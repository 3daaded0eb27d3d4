//! noderpc-ws: persistent-connection JSON-RPC transport over WS(S).
//!
//! # Features
//! - One lazily opened connection per endpoint, shared by all calls
//! - Request multiplexing by connection-unique request id
//! - Auto-reconnect with exponential backoff
//! - Requests fail fast while an endpoint cannot be reached

pub mod client;
pub mod connection;

pub use client::WsTransport;
pub use connection::WsConfig;
