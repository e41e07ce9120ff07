use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::sync::Mutex;

use crate::providers::base::{Provider, ProviderKind};

/// A mock provider that returns pre-configured responses for testing
///
/// Every payload it receives is recorded so tests can inspect what was sent. Once the
/// scripted responses run out it answers with empty text in the format of its `kind`.
#[derive(Clone)]
pub struct MockProvider {
    kind: ProviderKind,
    responses: Arc<Mutex<Vec<Value>>>,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Value>) -> Self {
        Self {
            kind: ProviderKind::OpenAi,
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer in the wire format of `kind` once the scripted responses are used up
    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }

    /// Payloads received so far, oldest first
    pub fn requests(&self) -> Vec<Value> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// An openai-style completion carrying plain text
    pub fn openai_text(text: &str) -> Value {
        json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": text},
                "finish_reason": "stop"
            }]
        })
    }

    /// An openai-style completion requesting the given `(id, name, arguments)` tool calls
    pub fn openai_tool_calls(calls: &[(&str, &str, &str)]) -> Value {
        let tool_calls: Vec<Value> = calls
            .iter()
            .map(|(id, name, arguments)| {
                json!({
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                })
            })
            .collect();

        json!({
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": null, "tool_calls": tool_calls},
                "finish_reason": "tool_calls"
            }]
        })
    }

    /// An anthropic-style completion carrying plain text
    pub fn anthropic_text(text: &str) -> Value {
        json!({
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn"
        })
    }

    /// An anthropic-style completion requesting the given `(id, name, input)` tool calls
    pub fn anthropic_tool_calls(calls: &[(&str, &str, Value)]) -> Value {
        let content: Vec<Value> = calls
            .iter()
            .map(|(id, name, input)| {
                json!({"type": "tool_use", "id": id, "name": name, "input": input})
            })
            .collect();

        json!({
            "role": "assistant",
            "content": content,
            "stop_reason": "tool_use"
        })
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, payload: Value) -> Result<Value> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("mock provider lock poisoned"))?
            .push(payload);

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| anyhow!("mock provider lock poisoned"))?;
        if responses.is_empty() {
            Ok(match self.kind {
                ProviderKind::OpenAi => Self::openai_text(""),
                ProviderKind::Anthropic => Self::anthropic_text(""),
            })
        } else {
            Ok(responses.remove(0))
        }
    }
}
