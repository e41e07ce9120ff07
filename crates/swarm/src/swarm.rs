use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::context::ContextVariables;
use crate::dispatch::execute_all;
use crate::errors::{SwarmError, SwarmResult};
use crate::function::strip_context_variables;
use crate::models::message::Message;
use crate::models::tool::ToolSchema;
use crate::providers::base::{Provider, ProviderKind};
use crate::providers::configs::ProviderConfig;
use crate::providers::factory::get_provider;
use crate::providers::format::{format_for, CompletionRequest};

/// Per-run settings for [`Swarm::run`]
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub context_variables: ContextVariables,
    /// Takes precedence over every agent's own model
    pub model_override: Option<String>,
    /// Upper bound on completion requests; `None` is unbounded
    pub max_turns: Option<usize>,
    pub execute_tools: bool,
    /// Applied to each provider call separately
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            context_variables: ContextVariables::new(),
            model_override: None,
            max_turns: None,
            execute_tools: true,
            timeout: None,
            cancellation: None,
        }
    }
}

impl RunOptions {
    pub fn with_context_variables(mut self, context_variables: ContextVariables) -> Self {
        self.context_variables = context_variables;
        self
    }

    pub fn with_model_override<S: Into<String>>(mut self, model: S) -> Self {
        self.model_override = Some(model.into());
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn with_execute_tools(mut self, execute_tools: bool) -> Self {
        self.execute_tools = execute_tools;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

/// The outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunResponse {
    /// Only the messages appended during the run
    pub messages: Vec<Message>,
    /// The agent that was active when the run stopped
    pub agent: Arc<Agent>,
    pub context_variables: ContextVariables,
}

/// Swarm drives conversations between a caller and a graph of agents
#[derive(Clone, Default)]
pub struct Swarm {
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
}

impl Swarm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the completion service used for agents of `kind`
    pub fn with_provider(mut self, kind: ProviderKind, provider: Arc<dyn Provider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    /// Build a swarm with an HTTP client for each configuration
    pub fn from_configs<I>(configs: I) -> SwarmResult<Self>
    where
        I: IntoIterator<Item = ProviderConfig>,
    {
        let mut swarm = Self::new();
        for config in configs {
            let kind = config.kind();
            let provider = get_provider(config).map_err(|e| {
                SwarmError::Configuration(format!("Failed to create {} provider: {:#}", kind, e))
            })?;
            swarm.providers.insert(kind, provider);
        }
        Ok(swarm)
    }

    /// Request the next assistant message from `agent` given the history so far
    pub async fn get_chat_completion(
        &self,
        agent: &Agent,
        history: &[Message],
        context_variables: &ContextVariables,
        options: &RunOptions,
    ) -> SwarmResult<Message> {
        let instructions = agent.instructions.resolve(context_variables);
        let tools = agent
            .functions
            .iter()
            .map(|function| function.describe().map(strip_context_variables))
            .collect::<Result<Vec<ToolSchema>, _>>()?;
        let model = options.model_override.as_deref().unwrap_or(&agent.model);

        let provider = self.providers.get(&agent.provider).ok_or_else(|| {
            SwarmError::Configuration(format!("No provider registered for {}", agent.provider))
        })?;
        let format = format_for(agent.provider);

        let request = CompletionRequest {
            system: &instructions,
            messages: history,
            tools: &tools,
            model,
            tool_choice: agent.tool_choice.as_deref(),
            parallel_tool_calls: agent.parallel_tool_calls,
        };
        let payload = format
            .build_payload(&request)
            .map_err(|e| SwarmError::Configuration(format!("Agent {}: {}", agent.name, e)))?;

        debug!(agent = %agent.name, model, tools = tools.len(), "requesting completion");
        let response = self.complete(provider.as_ref(), payload, options).await?;

        let message = format
            .normalize_completion(&response)
            .map_err(SwarmError::Provider)?;
        Ok(message.with_sender(&agent.name))
    }

    /// The single suspension point of a run, bounded by the caller's timeout and token
    async fn complete(
        &self,
        provider: &dyn Provider,
        payload: serde_json::Value,
        options: &RunOptions,
    ) -> SwarmResult<serde_json::Value> {
        let call = async {
            match options.timeout {
                Some(limit) => match tokio::time::timeout(limit, provider.complete(payload)).await {
                    Ok(response) => response.map_err(SwarmError::Provider),
                    Err(_) => Err(SwarmError::Timeout(limit)),
                },
                None => provider.complete(payload).await.map_err(SwarmError::Provider),
            }
        };

        match &options.cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(SwarmError::Cancelled),
                response = call => response,
            },
            None => call.await,
        }
    }

    /// Run the conversation until an agent answers without tool calls.
    ///
    /// The caller's history is not modified. On error nothing accumulated during the run
    /// is returned.
    pub async fn run(
        &self,
        agent: Arc<Agent>,
        messages: Vec<Message>,
        options: RunOptions,
    ) -> SwarmResult<RunResponse> {
        let mut active_agent = agent;
        let mut context_variables = options.context_variables.clone();
        let mut history = messages;
        let init_len = history.len();
        let mut turns = 0;

        while options.max_turns.map_or(true, |max| turns < max) {
            if options.is_cancelled() {
                info!(agent = %active_agent.name, turns, "run cancelled");
                return Err(SwarmError::Cancelled);
            }

            info!(agent = %active_agent.name, turn = turns + 1, "starting turn");
            let message = self
                .get_chat_completion(&active_agent, &history, &context_variables, &options)
                .await?;
            turns += 1;

            let tool_calls = message.tool_calls.clone();
            history.push(message);

            if tool_calls.is_empty() || !options.execute_tools {
                info!(agent = %active_agent.name, "ending turn");
                break;
            }

            let outcome = execute_all(&tool_calls, &active_agent.functions, &context_variables).await?;
            history.extend(outcome.messages);
            context_variables.merge(outcome.context_variables);
            if let Some(next_agent) = outcome.agent {
                info!(from = %active_agent.name, to = %next_agent.name, "handing off");
                active_agent = next_agent;
            }
        }

        Ok(RunResponse {
            messages: history.split_off(init_len),
            agent: active_agent,
            context_variables,
        })
    }
}
