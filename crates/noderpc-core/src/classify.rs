//! Sorting a node's answer into what the dispatcher should do next.

use serde_json::Value;

use crate::error::{ClientError, RpcError, TransportError};
use crate::request::{parse_reply, Reply};
use crate::transport::RawResponse;

/// HTTP statuses whose body is worth decoding.
pub const ACCEPTED_STATUSES: [u16; 6] = [200, 301, 302, 303, 307, 308];

/// Classified result of one exchange with one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The node answered with a `result`.
    Success(Value),
    /// Connection trouble, timeout, bad status or undecodable body.
    Transport(TransportError),
    /// The node reported a transient condition; another node may succeed.
    Recoverable(RpcError),
    /// The node does not understand the default API envelope.
    Legacy(RpcError),
    /// The node rejected the call itself.
    Fatal(RpcError),
    /// A failure nobody anticipated; recoverable after a cooldown.
    Unexpected(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Failures that only call for trying again on some node.
    pub fn is_transport_level(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Unexpected(_))
    }

    /// The value on success, otherwise the error as the caller sees it.
    pub fn into_result(self) -> Result<Value, ClientError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Recoverable(err) | Self::Legacy(err) | Self::Fatal(err) => Err(err.into()),
            Self::Transport(err) => Err(err.into()),
            Self::Unexpected(msg) => Err(TransportError::Other(msg).into()),
        }
    }
}

impl From<TransportError> for Outcome {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Other(msg) => Self::Unexpected(msg),
            err => Self::Transport(err),
        }
    }
}

/// Classify what `host` sent back.
pub fn classify(host: &str, raw: &RawResponse) -> Outcome {
    if let Some(status) = raw.status {
        if !ACCEPTED_STATUSES.contains(&status) {
            return Outcome::Transport(TransportError::Status { status });
        }
    }

    let reply = match parse_reply(&raw.body) {
        Ok(reply) => reply,
        Err(e) => return Outcome::Transport(TransportError::Malformed(e.to_string())),
    };

    match reply {
        Reply::Result(value) => Outcome::Success(value),
        Reply::Blank => Outcome::Fatal(RpcError {
            code: 0,
            name: "error".into(),
            detail: "result entirely blank".into(),
            host: host.to_string(),
            data: None,
        }),
        Reply::Error(err) => {
            let err = RpcError::from_reply(err, host);
            if err.is_legacy() {
                Outcome::Legacy(err)
            } else if err.is_recoverable() {
                Outcome::Recoverable(err)
            } else {
                Outcome::Fatal(err)
            }
        }
    }
}
