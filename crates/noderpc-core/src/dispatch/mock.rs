//! Scripted transport for dispatcher tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::TransportError;
use crate::transport::{RawResponse, Transport};

struct Step {
    delay: Duration,
    result: Result<RawResponse, TransportError>,
}

/// Answers each URL from its own queue of canned replies.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    seen: Mutex<Vec<(String, Value)>>,
    completed: Mutex<HashMap<String, usize>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: &str, result: Result<RawResponse, TransportError>) -> &Self {
        self.push_delayed(url, Duration::ZERO, result)
    }

    pub fn push_delayed(
        &self,
        url: &str,
        delay: Duration,
        result: Result<RawResponse, TransportError>,
    ) -> &Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Step { delay, result });
        self
    }

    /// Bodies sent to `url`, in order.
    pub fn bodies(&self, url: &str) -> Vec<Value> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Sends to `url` that ran to completion (were not cancelled).
    pub fn completed(&self, url: &str) -> usize {
        self.completed.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        url: &str,
        body: String,
        _timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        self.seen
            .lock()
            .unwrap()
            .push((url.to_string(), serde_json::from_str(&body).unwrap()));
        let step = self.scripts.lock().unwrap().get_mut(url).and_then(VecDeque::pop_front);
        let Some(step) = step else {
            return Err(TransportError::Connection(format!("no script left for {url}")));
        };
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        *self.completed.lock().unwrap().entry(url.to_string()).or_default() += 1;
        step.result
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub(crate) fn result(value: Value) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::ok(json!({"jsonrpc": "2.0", "id": 1, "result": value}).to_string()))
}

pub(crate) fn rpc_error(code: i64, message: &str) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::ok(
        json!({"jsonrpc": "2.0", "id": 1, "error": {"code": code, "message": message}}).to_string(),
    ))
}

pub(crate) fn status(status: u16) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(Some(status), "<html>error</html>"))
}
