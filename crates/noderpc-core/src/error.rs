//! Error types: transport-level failures and caller-facing errors.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while moving bytes to and from a node.
///
/// None of these ever reach the caller directly: the dispatcher absorbs
/// them and rotates to the next node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// HTTP request failed for a reason other than connect/timeout.
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connection/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The node could not be reached (refused, reset, DNS).
    #[error("connection error: {0}")]
    Connection(String),

    /// The node answered with a status outside the accepted set.
    #[error("{status} status")]
    Status { status: u16 },

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response body could not be decoded as JSON.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Anything the transport could not classify.
    #[error("{0}")]
    Other(String),
}

/// Health penalty a failed exchange applies to the node that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    /// Short quarantine after rate limiting or access denial.
    Ban,
    /// Long quarantine after the node looked down.
    Unavailable,
}

impl TransportError {
    /// Timeout after `limit`, saturating at `u64::MAX` milliseconds.
    pub fn timeout(limit: Duration) -> Self {
        Self::Timeout {
            ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// The penalty this failure earns the node, if any.
    pub fn penalty(&self) -> Option<Penalty> {
        match self {
            Self::Status { status: 403 | 429 } => Some(Penalty::Ban),
            Self::Status { status: 502..=504 } => Some(Penalty::Unavailable),
            Self::Connection(_) => Some(Penalty::Unavailable),
            _ => None,
        }
    }
}

/// A server-reported JSON-RPC error, tagged with the host that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub name: String,
    pub detail: String,
    pub host: String,
    pub data: Option<Value>,
}

impl RpcError {
    /// Error code legacy nodes return for every failure, including calls
    /// shaped for an API they do not serve.
    pub const LEGACY_CODE: i64 = 1;

    pub fn from_reply(err: JsonRpcError, host: &str) -> Self {
        let name = match &err.data {
            None => "error".to_string(),
            Some(data) => match data.get("name").and_then(Value::as_str) {
                Some(name) => name.to_string(),
                None => "unspecified error".to_string(),
            },
        };
        let detail = if err.code == Self::LEGACY_CODE {
            err.message.split('\n').take(2).collect::<Vec<_>>().join(":")
        } else {
            err.message
        };
        Self {
            code: err.code,
            name,
            detail,
            host: host.to_string(),
            data: err.data,
        }
    }

    /// Returns `true` if the node reported a condition that another node
    /// (or a later attempt) is likely to get past.
    pub fn is_recoverable(&self) -> bool {
        match self.detail.as_str() {
            "Unable to acquire database lock" | "Unknown exception" => true,
            "Internal Error" => self.code == -32603,
            _ => false,
        }
    }

    pub fn is_legacy(&self) -> bool {
        self.code == Self::LEGACY_CODE
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} from {} ({})", self.name, self.host, self.detail)
    }
}

impl std::error::Error for RpcError {}

/// Errors surfaced to callers of `call`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint list is empty, mixes HTTP and WS schemes, or uses neither.
    #[error("invalid node schemes: {0}")]
    InvalidNodeSchemes(String),

    /// The node rejected the call. Never retried.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Every candidate failed recoverably, or the call ran out of time.
    #[error("no node served `{method}`: retries exhausted")]
    NumRetriesReached { method: String },

    /// A request body or result could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A transport could not be constructed.
    #[error("transport setup failed: {0}")]
    Transport(#[from] TransportError),
}

impl ClientError {
    pub fn exhausted(method: &str) -> Self {
        Self::NumRetriesReached {
            method: method.to_string(),
        }
    }

    /// Returns `true` if the failure came from the node refusing the call
    /// rather than from infrastructure.
    pub fn is_rpc_error(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(code: i64, message: &str, data: Option<Value>) -> JsonRpcError {
        JsonRpcError {
            code,
            message: message.into(),
            data,
        }
    }

    #[test]
    fn timeout_saturates() {
        assert_eq!(TransportError::timeout(Duration::from_millis(1_500)), TransportError::Timeout { ms: 1_500 });
        assert_eq!(TransportError::timeout(Duration::MAX), TransportError::Timeout { ms: u64::MAX });
    }

    #[test]
    fn status_penalties() {
        assert_eq!(TransportError::Status { status: 429 }.penalty(), Some(Penalty::Ban));
        assert_eq!(TransportError::Status { status: 403 }.penalty(), Some(Penalty::Ban));
        assert_eq!(
            TransportError::Status { status: 503 }.penalty(),
            Some(Penalty::Unavailable)
        );
        assert_eq!(TransportError::Status { status: 404 }.penalty(), None);
        assert_eq!(TransportError::Timeout { ms: 10 }.penalty(), None);
        assert_eq!(
            TransportError::Connection("refused".into()).penalty(),
            Some(Penalty::Unavailable)
        );
    }

    #[test]
    fn name_falls_back_by_data_shape() {
        let no_data = RpcError::from_reply(reply(-32003, "Unable to acquire database lock", None), "a");
        assert_eq!(no_data.name, "error");

        let unnamed = RpcError::from_reply(reply(-32603, "Internal Error", Some(json!({"error_id": "x"}))), "a");
        assert_eq!(unnamed.name, "unspecified error");

        let named = RpcError::from_reply(
            reply(-32000, "Assert Exception", Some(json!({"name": "assert_exception"}))),
            "node.example.com",
        );
        assert_eq!(named.to_string(), "assert_exception from node.example.com (Assert Exception)");
    }

    #[test]
    fn recoverable_messages() {
        let lock = RpcError::from_reply(reply(-32003, "Unable to acquire database lock", None), "a");
        let unknown = RpcError::from_reply(reply(-32000, "Unknown exception", None), "a");
        let internal = RpcError::from_reply(reply(-32603, "Internal Error", None), "a");
        let other_internal = RpcError::from_reply(reply(-32000, "Internal Error", None), "a");
        let rejected = RpcError::from_reply(reply(-32000, "missing required posting authority", None), "a");

        assert!(lock.is_recoverable());
        assert!(unknown.is_recoverable());
        assert!(internal.is_recoverable());
        assert!(!other_internal.is_recoverable());
        assert!(!rejected.is_recoverable());
    }

    #[test]
    fn legacy_detail_keeps_two_lines() {
        let err = RpcError::from_reply(
            reply(1, "10 assert_exception: Assert Exception\nfalse: no method\n    {}\n    th_a", None),
            "old.example.com",
        );
        assert!(err.is_legacy());
        assert_eq!(err.detail, "10 assert_exception: Assert Exception:false: no method");
    }

    #[test]
    fn exhaustion_names_method() {
        let err = ClientError::exhausted("get_block");
        assert!(err.to_string().contains("get_block"));
        assert!(!err.is_rpc_error());
    }
}
