//! noderpc-http: request/response JSON-RPC transport over HTTP(S).
//!
//! ```rust,no_run
//! use noderpc_http::{HttpConfig, HttpTransport};
//!
//! let transport = HttpTransport::new(HttpConfig::default()).expect("http client");
//! ```

pub mod client;

pub use client::{HttpConfig, HttpTransport};
