//! Tool dispatch: resolve, decode, invoke and normalize each requested tool call.
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::context::ContextVariables;
use crate::errors::{SwarmError, SwarmResult, ToolError};
use crate::function::{AgentFunction, FunctionOutput, ToolResult};
use crate::models::message::Message;
use crate::models::tool::ToolCallRequest;

/// Everything one batch of tool calls produced
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// One tool message per request, in request order
    pub messages: Vec<Message>,
    /// Context updates folded in request order
    pub context_variables: ContextVariables,
    /// The last handoff requested in the batch
    pub agent: Option<Arc<Agent>>,
}

/// Execute every tool call sequentially, in request order.
///
/// Tool failures become tool messages describing the failure. Only a result that cannot
/// be turned into text aborts the batch.
pub async fn execute_all(
    requests: &[ToolCallRequest],
    functions: &[AgentFunction],
    context_variables: &ContextVariables,
) -> SwarmResult<DispatchOutcome> {
    // Later definitions shadow earlier ones with the same name
    let function_map: HashMap<&str, &AgentFunction> =
        functions.iter().map(|f| (f.name(), f)).collect();

    let mut outcome = DispatchOutcome::default();
    let mut visible = context_variables.clone();

    for request in requests {
        let result = match dispatch_tool_call(request, &function_map, &visible).await {
            Ok(output) => handle_function_result(output)?,
            Err(error) => {
                warn!(tool = %request.name, id = %request.id, "{}", error);
                ToolResult::new(error.to_string())
            }
        };

        debug!(tool = %request.name, id = %request.id, result = %result.value, "tool call finished");
        outcome.messages.push(Message::tool_result(
            &request.id,
            &request.name,
            result.value,
        ));

        visible.merge(result.context_variables.clone());
        outcome.context_variables.merge(result.context_variables);
        if let Some(agent) = result.agent {
            outcome.agent = Some(agent);
        }
    }

    Ok(outcome)
}

async fn dispatch_tool_call(
    request: &ToolCallRequest,
    function_map: &HashMap<&str, &AgentFunction>,
    context_variables: &ContextVariables,
) -> Result<FunctionOutput, ToolError> {
    let function = function_map
        .get(request.name.as_str())
        .ok_or_else(|| ToolError::NotFound(request.name.clone()))?;

    let arguments: Map<String, Value> =
        serde_json::from_str(&request.arguments).map_err(|e| ToolError::InvalidArguments {
            name: request.name.clone(),
            reason: e.to_string(),
        })?;

    debug!(tool = %request.name, arguments = %request.arguments, "calling tool");
    function
        .call(arguments, context_variables)
        .await
        .map_err(|e| ToolError::Execution {
            name: request.name.clone(),
            reason: format!("{:#}", e),
        })
}

/// Normalize whatever a function returned into a [`ToolResult`]
pub fn handle_function_result(output: FunctionOutput) -> SwarmResult<ToolResult> {
    match output {
        FunctionOutput::Result(result) => Ok(result),
        FunctionOutput::Handoff(agent) => {
            Ok(ToolResult::new(json!({ "assistant": agent.name }).to_string()).with_agent(agent))
        }
        FunctionOutput::Value(value) => {
            let mut text = String::new();
            write!(text, "{}", value).map_err(|_| {
                SwarmError::ResultCoercion(
                    "tool returned a value whose Display implementation failed".to_string(),
                )
            })?;
            Ok(ToolResult::new(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::fmt;

    struct Unprintable;

    impl fmt::Display for Unprintable {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    fn set_key(key: &'static str, value: i64) -> AgentFunction {
        AgentFunction::builder(format!("set_{}_{}", key, value))
            .build(move |_| Ok(ToolResult::new("ok").with_context_variable(key, json!(value))))
    }

    #[tokio::test]
    async fn test_results_follow_request_order() -> anyhow::Result<()> {
        let echo = AgentFunction::builder("echo")
            .param::<String>("text")
            .build(|args| Ok(args.str("text")?.to_uppercase()));

        let requests = vec![
            ToolCallRequest::new("call_1", "echo", r#"{"text": "one"}"#),
            ToolCallRequest::new("call_2", "doSomething", "{}"),
            ToolCallRequest::new("call_3", "echo", "not json"),
            ToolCallRequest::new("call_4", "echo", "{}"),
        ];

        let outcome = execute_all(&requests, &[echo], &ContextVariables::new()).await?;
        let ids: Vec<_> = outcome
            .messages
            .iter()
            .map(|m| m.tool_call_id.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["call_1", "call_2", "call_3", "call_4"]);

        assert_eq!(outcome.messages[0].text(), "ONE");
        assert_eq!(outcome.messages[1].text(), "Error: Tool doSomething not found.");
        assert!(outcome.messages[2]
            .text()
            .starts_with("Error: Invalid function arguments. Error decoding JSON for function echo:"));
        assert_eq!(
            outcome.messages[3].text(),
            "Error: Function execution failed. Error executing function echo: echo() missing required argument 'text'"
        );
        assert!(outcome.agent.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_raised_fault_is_isolated() -> anyhow::Result<()> {
        let broken = AgentFunction::builder("broken").build(|_| -> anyhow::Result<String> {
            Err(anyhow!("disk on fire"))
        });
        let fine = AgentFunction::builder("fine").build(|_| Ok("fine"));

        let requests = vec![
            ToolCallRequest::new("1", "broken", "{}"),
            ToolCallRequest::new("2", "fine", "{}"),
        ];
        let outcome = execute_all(&requests, &[broken, fine], &ContextVariables::new()).await?;

        assert!(outcome.messages[0].text().ends_with("broken: disk on fire"));
        assert_eq!(outcome.messages[1].text(), "fine");
        Ok(())
    }

    #[tokio::test]
    async fn test_context_updates_merge_in_order() -> anyhow::Result<()> {
        let functions = vec![set_key("a", 1), set_key("a", 2), set_key("b", 3)];
        let requests = vec![
            ToolCallRequest::new("1", "set_a_1", "{}"),
            ToolCallRequest::new("2", "set_a_2", "{}"),
            ToolCallRequest::new("3", "set_b_3", "{}"),
        ];

        let outcome = execute_all(&requests, &functions, &ContextVariables::new()).await?;
        assert_eq!(outcome.context_variables.get("a"), Some(&json!(2)));
        assert_eq!(outcome.context_variables.get("b"), Some(&json!(3)));
        Ok(())
    }

    #[tokio::test]
    async fn test_later_calls_see_earlier_updates() -> anyhow::Result<()> {
        let read = AgentFunction::builder("read")
            .context_variables()
            .build(|args| {
                let ctx = args.context_variables().cloned().unwrap_or_default();
                Ok(format!("{}/{}", ctx.get_str("user"), ctx.get_str("a")))
            });
        let functions = vec![set_key("a", 1), read];
        let requests = vec![
            ToolCallRequest::new("1", "set_a_1", "{}"),
            ToolCallRequest::new("2", "read", "{}"),
        ];
        let ctx = ContextVariables::new().with("user", json!("ada"));

        let outcome = execute_all(&requests, &functions, &ctx).await?;
        assert_eq!(outcome.messages[1].text(), "ada/1");
        // Only updates are reported, the caller's variables are untouched
        assert!(!outcome.context_variables.contains_key("user"));
        assert!(!ctx.contains_key("a"));
        Ok(())
    }

    #[tokio::test]
    async fn test_last_handoff_wins() -> anyhow::Result<()> {
        let first = Arc::new(Agent::builder("First").build());
        let second = Arc::new(Agent::builder("Second").build());
        let to_first = AgentFunction::builder("to_first").build(move |_| Ok(first.clone()));
        let to_second = AgentFunction::builder("to_second").build(move |_| Ok(second.clone()));

        let requests = vec![
            ToolCallRequest::new("1", "to_first", "{}"),
            ToolCallRequest::new("2", "to_second", "{}"),
        ];
        let outcome =
            execute_all(&requests, &[to_first, to_second], &ContextVariables::new()).await?;

        assert_eq!(outcome.messages[0].text(), r#"{"assistant":"First"}"#);
        assert_eq!(outcome.agent.map(|a| a.name.clone()), Some("Second".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_names_resolve_to_last_definition() -> anyhow::Result<()> {
        let old = AgentFunction::builder("lookup").build(|_| Ok("old"));
        let new = AgentFunction::builder("lookup").build(|_| Ok("new"));
        let requests = vec![ToolCallRequest::new("1", "lookup", "{}")];

        let outcome = execute_all(&requests, &[old, new], &ContextVariables::new()).await?;
        assert_eq!(outcome.messages[0].text(), "new");
        Ok(())
    }

    #[tokio::test]
    async fn test_coercion_failure_is_fatal() {
        let bad = AgentFunction::builder("bad").build(|_| Ok(FunctionOutput::value(Unprintable)));
        let requests = vec![ToolCallRequest::new("1", "bad", "{}")];

        let err = execute_all(&requests, &[bad], &ContextVariables::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::ResultCoercion(_)));
    }

    #[test]
    fn test_handle_function_result_values() -> anyhow::Result<()> {
        let result = handle_function_result(FunctionOutput::from(json!({"temp": 67})))?;
        assert_eq!(result.value, r#"{"temp":67}"#);
        assert!(result.agent.is_none());

        let result = handle_function_result(FunctionOutput::value(42))?;
        assert_eq!(result.value, "42");
        Ok(())
    }
}
