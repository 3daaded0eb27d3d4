//! JSON-RPC 2.0 wire types and request body construction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;

/// JSON-RPC request ID: string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request envelope.
///
/// `params` is either a positional array or a keyword object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RpcId,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: RpcId::Number(id),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<RpcId>,
    #[serde(default, deserialize_with = "present")]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// Keeps `"result": null` distinct from a missing `result` key.
fn present<'de, D>(de: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(de).map(Some)
}

/// What a node said, once the body is decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Result(Value),
    Error(JsonRpcError),
    /// Empty body, `null`, or an object with neither `result` nor `error`.
    Blank,
}

/// Decode a raw response body.
pub fn parse_reply(raw: &str) -> Result<Reply, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Reply::Blank);
    }
    let value: Value = serde_json::from_str(raw)?;
    let empty = match &value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Ok(Reply::Blank);
    }
    let resp: JsonRpcResponse = serde_json::from_value(value)?;
    Ok(match (resp.error, resp.result) {
        (Some(err), _) => Reply::Error(err),
        (None, Some(result)) => Reply::Result(result),
        (None, None) => Reply::Blank,
    })
}

/// One logical call issued by a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub method: String,
    pub args: Vec<Value>,
    pub kwargs: Option<Map<String, Value>>,
    /// Explicit API namespace, honoured when the default API is not used.
    pub api: Option<String>,
    /// Wrap the call in the default API envelope (when the node supports it).
    pub use_default_api: bool,
}

impl CallRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            args: Vec::new(),
            kwargs: None,
            api: None,
            use_default_api: true,
        }
    }

    pub fn with_args(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            args,
            ..Self::new(method)
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn api(mut self, api: impl Into<String>) -> Self {
        self.api = Some(api.into());
        self
    }

    /// Suppress the default API envelope for this call only.
    pub fn without_default_api(mut self) -> Self {
        self.use_default_api = false;
        self
    }

    /// Keyword arguments when present, positional ones otherwise.
    fn params(&self) -> Value {
        match &self.kwargs {
            Some(kwargs) => Value::Object(kwargs.clone()),
            None => Value::Array(self.args.clone()),
        }
    }
}

/// Turns a call into the bytes sent to one node.
pub trait BodyBuilder: Send + Sync + 'static {
    fn build(&self, call: &CallRequest, use_default_api: bool, id: u64) -> Result<String, ClientError>;
}

/// Builds `call`-style envelopes for nodes that route through an API
/// namespace, and plain method envelopes for the rest.
#[derive(Debug, Clone)]
pub struct JsonRpcBodyBuilder {
    pub default_api: String,
}

impl JsonRpcBodyBuilder {
    pub const DEFAULT_API: &'static str = "condenser_api";

    pub fn new(default_api: impl Into<String>) -> Self {
        Self {
            default_api: default_api.into(),
        }
    }

    pub fn request(&self, call: &CallRequest, use_default_api: bool, id: u64) -> JsonRpcRequest {
        let api = if use_default_api {
            Some(self.default_api.as_str())
        } else {
            call.api.as_deref()
        };
        match api {
            Some(api) => JsonRpcRequest::new(
                id,
                "call",
                Value::Array(vec![api.into(), call.method.clone().into(), call.params()]),
            ),
            None => JsonRpcRequest::new(id, call.method.clone(), call.params()),
        }
    }
}

impl Default for JsonRpcBodyBuilder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_API)
    }
}

impl BodyBuilder for JsonRpcBodyBuilder {
    fn build(&self, call: &CallRequest, use_default_api: bool, id: u64) -> Result<String, ClientError> {
        Ok(serde_json::to_string(&self.request(call, use_default_api, id))?)
    }
}
