use std::collections::HashSet;

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::{ToolCallRequest, ToolSchema};

/// Convert internal Message format to OpenAI's API message specification
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages.iter().map(message_to_openai_spec).collect()
}

fn message_to_openai_spec(message: &Message) -> Value {
    let mut converted = json!({
        "role": message.role,
        "content": message.content,
    });

    if !message.tool_calls.is_empty() {
        converted["tool_calls"] = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments,
                    }
                })
            })
            .collect();
    }
    if let Some(tool_call_id) = &message.tool_call_id {
        converted["tool_call_id"] = json!(tool_call_id);
    }

    converted
}

/// Convert tool schemas to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[ToolSchema]) -> Result<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(tool.name()) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name()));
        }
        result.push(tool.to_value());
    }

    Ok(result)
}

/// Convert an OpenAI tool schema into Anthropic's flatter `{name, description, input_schema}`.
///
/// Returns `None` when the source schema is malformed.
pub fn tool_to_anthropic_spec(openai_tool: &Value) -> Option<Value> {
    let function = openai_tool.get("function")?;
    let name = function.get("name")?.as_str()?;
    let description = function
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let parameters = function.get("parameters")?;
    let properties = parameters.get("properties")?.as_object()?;
    let required = parameters.get("required").cloned().unwrap_or(json!([]));

    Some(json!({
        "name": name,
        "description": description,
        "input_schema": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    }))
}

/// Convert tool schemas to Anthropic's API tool specification, dropping malformed ones
pub fn tools_to_anthropic_spec(tools: &[ToolSchema]) -> Result<Vec<Value>> {
    Ok(tools_to_openai_spec(tools)?
        .iter()
        .filter_map(tool_to_anthropic_spec)
        .collect())
}

/// Convert a single message to Anthropic's message specification.
///
/// System and user messages both become `user`; Anthropic takes the system prompt out of
/// band. Tool calls and tool results are rendered as prose rather than tool-use blocks.
pub fn message_to_anthropic_spec(message: &Message) -> Value {
    let role = match message.role {
        Role::User | Role::System => "user",
        Role::Assistant | Role::Tool => "assistant",
    };

    let mut content = message.text().to_string();
    for call in &message.tool_calls {
        content.push_str(&format!("\n\nFunction call: {}", call.name));
        if !call.arguments.is_empty() {
            content.push_str(&format!("\nArguments: {}", call.arguments));
        }
    }

    if message.role == Role::Tool {
        content = format!(
            "Function result for {}: {}",
            message.tool_name.as_deref().unwrap_or_default(),
            message.text()
        );
    }

    json!({
        "role": role,
        "content": content,
    })
}

/// Convert a message sequence for Anthropic; the final message always goes out as `user`
pub fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
    let mut converted: Vec<Value> = messages.iter().map(message_to_anthropic_spec).collect();
    if let Some(last) = converted.last_mut() {
        last["role"] = json!("user");
    }
    converted
}

/// Convert OpenAI's API response to internal Message format
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("Invalid response format from OpenAI API: missing choices"))?;

    let mut message = Message::assistant();
    if let Some(text) = original.get("content").and_then(Value::as_str) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(Value::as_array) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default();
            let name = tool_call["function"]["name"].as_str().unwrap_or_default();
            let arguments = match &tool_call["function"]["arguments"] {
                Value::String(arguments) => arguments.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            message = message.with_tool_call(ToolCallRequest::new(id, name, arguments));
        }
    }

    Ok(message)
}

/// Convert Anthropic's API response to internal Message format.
///
/// `text` blocks are concatenated into the content and `tool_use` blocks become tool calls
/// whose arguments are the JSON encoding of the block input.
pub fn anthropic_response_to_message(response: &Value) -> Result<Message> {
    let blocks = response
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Invalid response format from Anthropic API: missing content"))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => text.push_str(block["text"].as_str().unwrap_or_default()),
            Some("tool_use") => tool_calls.push(ToolCallRequest::new(
                block["id"].as_str().unwrap_or_default(),
                block["name"].as_str().unwrap_or_default(),
                block.get("input").cloned().unwrap_or(json!({})).to_string(),
            )),
            _ => {} // Skip other block types
        }
    }

    let mut message = Message::assistant();
    if !text.is_empty() {
        message = message.with_text(text);
    }
    message.tool_calls = tool_calls;
    Ok(message)
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ParametersSchema;
    use serde_json::Map;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "1",
                    "type": "function",
                    "function": {
                        "name": "example_fn",
                        "arguments": "{\"param\": \"value\"}"
                    }
                }]
            }
        }]
    }"#;

    fn weather_tool() -> ToolSchema {
        let mut properties = Map::new();
        properties.insert("location".into(), json!({"type": "string"}));
        properties.insert("time".into(), json!({"type": "string"}));
        ToolSchema::new(
            "get_weather",
            "Get the weather",
            ParametersSchema::new(properties, vec!["location".into()]),
        )
    }

    #[test]
    fn test_messages_to_openai_spec() {
        let messages = vec![
            Message::user().with_text("How are you?"),
            Message::assistant()
                .with_tool_call(ToolCallRequest::new("tool1", "example", r#"{"a":1}"#))
                .with_sender("Alice"),
            Message::tool_result("tool1", "example", "Result"),
        ];

        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 3);
        assert_eq!(spec[0], json!({"role": "user", "content": "How are you?"}));
        assert_eq!(spec[1]["role"], "assistant");
        assert_eq!(spec[1]["content"], Value::Null);
        assert_eq!(spec[1]["tool_calls"][0]["function"]["arguments"], r#"{"a":1}"#);
        assert!(spec[1].get("sender").is_none());
        assert_eq!(spec[2]["role"], "tool");
        assert_eq!(spec[2]["content"], "Result");
        assert_eq!(spec[2]["tool_call_id"], spec[1]["tool_calls"][0]["id"]);
    }

    #[test]
    fn test_tools_to_openai_spec_duplicate() {
        let result = tools_to_openai_spec(&[weather_tool(), weather_tool()]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Duplicate tool name"));
    }

    #[test]
    fn test_tool_to_anthropic_spec() -> Result<()> {
        let spec = tools_to_anthropic_spec(&[weather_tool()])?;
        assert_eq!(
            spec[0],
            json!({
                "name": "get_weather",
                "description": "Get the weather",
                "input_schema": {
                    "type": "object",
                    "properties": {
                        "location": {"type": "string"},
                        "time": {"type": "string"}
                    },
                    "required": ["location"]
                }
            })
        );
        Ok(())
    }

    #[test]
    fn test_tool_to_anthropic_spec_malformed() {
        assert!(tool_to_anthropic_spec(&json!({"type": "function"})).is_none());
        assert!(tool_to_anthropic_spec(&json!({
            "function": {"name": "f", "parameters": {"type": "object"}}
        }))
        .is_none());

        let no_required = tool_to_anthropic_spec(&json!({
            "function": {"name": "f", "parameters": {"properties": {}}}
        }))
        .unwrap();
        assert_eq!(no_required["input_schema"]["required"], json!([]));
        assert_eq!(no_required["description"], "");
    }

    #[test]
    fn test_message_to_anthropic_roles() {
        let system = message_to_anthropic_spec(&Message::system().with_text("Be nice"));
        assert_eq!(system, json!({"role": "user", "content": "Be nice"}));

        let user = message_to_anthropic_spec(&Message::user());
        assert_eq!(user, json!({"role": "user", "content": ""}));

        let assistant = message_to_anthropic_spec(&Message::assistant().with_text("Hi"));
        assert_eq!(assistant["role"], "assistant");
    }

    #[test]
    fn test_message_to_anthropic_collapses_tool_calls() {
        let message = Message::assistant()
            .with_text("Let me check.")
            .with_tool_call(ToolCallRequest::new("1", "get_weather", r#"{"location":"Paris"}"#))
            .with_tool_call(ToolCallRequest::new("2", "transfer_to_bob", ""));

        let spec = message_to_anthropic_spec(&message);
        assert_eq!(
            spec["content"],
            "Let me check.\n\nFunction call: get_weather\nArguments: {\"location\":\"Paris\"}\n\nFunction call: transfer_to_bob"
        );
    }

    #[test]
    fn test_message_to_anthropic_tool_result_replaces_content() {
        let message = Message::tool_result("1", "get_weather", "65 degrees");
        let spec = message_to_anthropic_spec(&message);
        assert_eq!(spec["role"], "assistant");
        assert_eq!(spec["content"], "Function result for get_weather: 65 degrees");
    }

    #[test]
    fn test_messages_to_anthropic_forces_last_role() {
        let messages = vec![
            Message::user().with_text("weather?"),
            Message::tool_result("1", "get_weather", "65 degrees"),
        ];
        let spec = messages_to_anthropic_spec(&messages);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[1]["role"], "user");
        assert!(messages_to_anthropic_spec(&[]).is_empty());
    }

    #[test]
    fn test_openai_response_to_message_text() -> Result<()> {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello from John Cena!"}}]
        });

        let message = openai_response_to_message(&response)?;
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text(), "Hello from John Cena!");
        assert!(!message.has_tool_calls());
        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_tool_calls() -> Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        let message = openai_response_to_message(&response)?;

        assert!(message.content.is_none());
        assert_eq!(
            message.tool_calls,
            vec![ToolCallRequest::new("1", "example_fn", r#"{"param": "value"}"#)]
        );
        Ok(())
    }

    #[test]
    fn test_openai_response_keeps_invalid_arguments_raw() -> Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] =
            json!("invalid json {");

        let message = openai_response_to_message(&response)?;
        assert_eq!(message.tool_calls[0].arguments, "invalid json {");
        Ok(())
    }

    #[test]
    fn test_openai_response_missing_choices() {
        assert!(openai_response_to_message(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_anthropic_response_to_message() -> Result<()> {
        let response = json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Checking "},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"location": "Paris"}},
                {"type": "text", "text": "now."}
            ],
            "stop_reason": "tool_use"
        });

        let message = anthropic_response_to_message(&response)?;
        assert_eq!(message.text(), "Checking now.");
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].id, "toolu_1");
        assert_eq!(message.tool_calls[0].name, "get_weather");
        let arguments: Value = serde_json::from_str(&message.tool_calls[0].arguments)?;
        assert_eq!(arguments, json!({"location": "Paris"}));
        Ok(())
    }

    #[test]
    fn test_anthropic_response_missing_content() {
        assert!(anthropic_response_to_message(&json!({"type": "error"})).is_err());
    }

    #[test]
    fn test_check_openai_context_length_error() {
        let error = json!({
            "code": "context_length_exceeded",
            "message": "This message is too long"
        });

        let result = check_openai_context_length_error(&error);
        assert_eq!(
            result.unwrap().to_string(),
            "Context length exceeded. Message: This message is too long"
        );

        let error = json!({"code": "other_error", "message": "Some other error"});
        assert!(check_openai_context_length_error(&error).is_none());
    }
}
