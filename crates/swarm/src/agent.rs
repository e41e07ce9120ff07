use std::fmt;
use std::sync::Arc;

use crate::context::ContextVariables;
use crate::function::AgentFunction;
use crate::providers::base::ProviderKind;

pub const DEFAULT_AGENT_NAME: &str = "Agent";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful agent.";

type DynamicInstructions = Arc<dyn Fn(&ContextVariables) -> String + Send + Sync>;

/// The system prompt of an agent, either fixed or computed from the context variables
#[derive(Clone)]
pub enum Instructions {
    Text(String),
    Dynamic(DynamicInstructions),
}

impl Instructions {
    pub fn resolve(&self, context_variables: &ContextVariables) -> String {
        match self {
            Instructions::Text(text) => text.clone(),
            Instructions::Dynamic(render) => render(context_variables),
        }
    }
}

impl fmt::Debug for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instructions::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Instructions::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for Instructions {
    fn from(text: &str) -> Self {
        Instructions::Text(text.to_string())
    }
}

impl From<String> for Instructions {
    fn from(text: String) -> Self {
        Instructions::Text(text)
    }
}

/// A named persona with its own model, provider, instructions and functions.
///
/// Agents are immutable once built; share them as `Arc<Agent>`.
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub model: String,
    pub provider: ProviderKind,
    pub instructions: Instructions,
    pub functions: Vec<AgentFunction>,
    pub tool_choice: Option<String>,
    pub parallel_tool_calls: bool,
}

impl Default for Agent {
    fn default() -> Self {
        Agent {
            name: DEFAULT_AGENT_NAME.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider: ProviderKind::OpenAi,
            instructions: Instructions::Text(DEFAULT_INSTRUCTIONS.to_string()),
            functions: Vec::new(),
            tool_choice: None,
            parallel_tool_calls: true,
        }
    }
}

impl Agent {
    pub fn builder<S: Into<String>>(name: S) -> AgentBuilder {
        AgentBuilder {
            agent: Agent {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    pub fn function(&self, name: &str) -> Option<&AgentFunction> {
        self.functions.iter().rev().find(|f| f.name() == name)
    }
}

pub struct AgentBuilder {
    agent: Agent,
}

impl AgentBuilder {
    pub fn model<S: Into<String>>(mut self, model: S) -> Self {
        self.agent.model = model.into();
        self
    }

    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.agent.provider = provider;
        self
    }

    pub fn instructions<I: Into<Instructions>>(mut self, instructions: I) -> Self {
        self.agent.instructions = instructions.into();
        self
    }

    /// Compute the instructions from the context variables at every turn
    pub fn dynamic_instructions<F>(mut self, render: F) -> Self
    where
        F: Fn(&ContextVariables) -> String + Send + Sync + 'static,
    {
        self.agent.instructions = Instructions::Dynamic(Arc::new(render));
        self
    }

    pub fn function(mut self, function: AgentFunction) -> Self {
        self.agent.functions.push(function);
        self
    }

    pub fn functions<I: IntoIterator<Item = AgentFunction>>(mut self, functions: I) -> Self {
        self.agent.functions.extend(functions);
        self
    }

    pub fn tool_choice<S: Into<String>>(mut self, tool_choice: S) -> Self {
        self.agent.tool_choice = Some(tool_choice.into());
        self
    }

    pub fn parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.agent.parallel_tool_calls = enabled;
        self
    }

    pub fn build(self) -> Agent {
        self.agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_defaults() {
        let agent = Agent::default();
        assert_eq!(agent.name, "Agent");
        assert_eq!(agent.model, "gpt-4o");
        assert_eq!(agent.provider, ProviderKind::OpenAi);
        assert!(agent.parallel_tool_calls);
        assert!(agent.tool_choice.is_none());
    }

    #[test]
    fn test_dynamic_instructions() {
        let agent = Agent::builder("Greeter")
            .dynamic_instructions(|ctx| format!("Greet {} warmly.", ctx.get_str("user")))
            .build();

        let context = ContextVariables::new().with("user", json!("Ada"));
        assert_eq!(agent.instructions.resolve(&context), "Greet Ada warmly.");
        assert_eq!(
            agent.instructions.resolve(&ContextVariables::new()),
            "Greet  warmly."
        );
    }

    #[test]
    fn test_builder_sets_fields() {
        let agent = Agent::builder("Bob")
            .model("claude-3-5-sonnet")
            .provider(ProviderKind::Anthropic)
            .instructions("You are Bob.")
            .tool_choice("auto")
            .parallel_tool_calls(false)
            .function(AgentFunction::builder("noop").build(|_| Ok("")))
            .build();

        assert_eq!(agent.provider, ProviderKind::Anthropic);
        assert_eq!(agent.tool_choice.as_deref(), Some("auto"));
        assert!(!agent.parallel_tool_calls);
        assert!(agent.function("noop").is_some());
        assert!(agent.function("missing").is_none());
    }
}
