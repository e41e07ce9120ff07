use anyhow::Result;
use serde_json::{json, Value};

use super::base::ProviderKind;
use super::configs::DEFAULT_MAX_TOKENS;
use super::utils::{
    anthropic_response_to_message, check_openai_context_length_error, messages_to_anthropic_spec,
    messages_to_openai_spec, openai_response_to_message, tools_to_anthropic_spec,
    tools_to_openai_spec,
};
use crate::models::message::Message;
use crate::models::tool::ToolSchema;

/// Everything needed to ask a provider for the next assistant message
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    /// Resolved agent instructions
    pub system: &'a str,
    /// The full history, not including the system message
    pub messages: &'a [Message],
    /// Tool schemas with the context variables parameter already stripped
    pub tools: &'a [ToolSchema],
    pub model: &'a str,
    pub tool_choice: Option<&'a str>,
    pub parallel_tool_calls: bool,
}

impl CompletionRequest<'_> {
    /// The outbound message list: system message followed by the history
    pub fn outbound_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.push(Message::system().with_text(self.system));
        messages.extend_from_slice(self.messages);
        messages
    }
}

/// Per-provider translation between the internal models and a wire format
pub trait ProviderFormat: Send + Sync {
    /// Build the provider-native request body
    fn build_payload(&self, request: &CompletionRequest<'_>) -> Result<Value>;

    /// Normalize a provider-native response into an assistant message
    fn normalize_completion(&self, response: &Value) -> Result<Message>;
}

pub struct OpenAiFormat;

impl ProviderFormat for OpenAiFormat {
    fn build_payload(&self, request: &CompletionRequest<'_>) -> Result<Value> {
        let tools_spec = tools_to_openai_spec(request.tools)?;

        let mut payload = json!({
            "model": request.model,
            "messages": messages_to_openai_spec(&request.outbound_messages()),
            "stream": false,
        });

        // An empty tool list is sent as absent, never as an empty array
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
            payload["parallel_tool_calls"] = json!(request.parallel_tool_calls);
        }
        if let Some(tool_choice) = request.tool_choice {
            payload["tool_choice"] = json!(tool_choice);
        }

        Ok(payload)
    }

    fn normalize_completion(&self, response: &Value) -> Result<Message> {
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow::anyhow!("OpenAI API error: {}", error));
        }
        openai_response_to_message(response)
    }
}

pub struct AnthropicFormat;

impl ProviderFormat for AnthropicFormat {
    fn build_payload(&self, request: &CompletionRequest<'_>) -> Result<Value> {
        let tools_spec = tools_to_anthropic_spec(request.tools)?;

        let mut payload = json!({
            "model": request.model,
            "system": request.system,
            "messages": messages_to_anthropic_spec(&request.outbound_messages()),
            "stream": false,
            "max_tokens": DEFAULT_MAX_TOKENS,
        });

        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }

        Ok(payload)
    }

    fn normalize_completion(&self, response: &Value) -> Result<Message> {
        if let Some(error) = response.get("error") {
            return Err(anyhow::anyhow!("Anthropic API error: {}", error));
        }
        anthropic_response_to_message(response)
    }
}

/// The wire format for a provider kind
pub fn format_for(kind: ProviderKind) -> &'static dyn ProviderFormat {
    match kind {
        ProviderKind::OpenAi => &OpenAiFormat,
        ProviderKind::Anthropic => &AnthropicFormat,
    }
}
