use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use swarm::agent::Agent;
use swarm::providers::base::ProviderKind;
use swarm::registry::AgentRegistry;

use crate::tools::file_tools;

pub const COORDINATOR: &str = "Coordinator Agent";
pub const DEVELOPER: &str = "Developer Agent";

const COORDINATOR_MODEL: &str = "gpt-4o";
const DEVELOPER_MODEL: &str = "claude-3-5-sonnet-20240620";

const COORDINATOR_INSTRUCTIONS: &str = "You are a coordinator agent responsible for managing feature implementation workflows.
When a user requests a new feature or a change to the code:
1. Transfer to the Developer Agent and provide clear instructions for implementing it.
2. Once the Developer Agent reports the work is complete, summarize the result for the user.
If a task involves file management or code editing, transfer to the Developer Agent.
Keep track of the current state of the work so the process is completed successfully.";

const DEVELOPER_INSTRUCTIONS: &str = "You are a developer agent capable of browsing the file system, viewing, and editing files.
Use the provided functions to interact with the file system and implement features.
When asked to implement a new feature:
1. Analyze the feature description and determine which files need to be created or modified.
2. Use the file system functions to make the necessary changes.
3. Provide a clear summary of the changes made and any additional steps required.
Be cautious when modifying or deleting files, and always ask for confirmation before performing destructive actions.
Transfer back to the coordinator when the task is done or falls outside of file work.";

/// The demo agents, wired so each can hand the conversation to the other
pub fn demo_registry(workdir: &Path) -> Result<Arc<AgentRegistry>> {
    let coordinator = Agent::builder(COORDINATOR)
        .model(COORDINATOR_MODEL)
        .provider(ProviderKind::OpenAi)
        .instructions(COORDINATOR_INSTRUCTIONS)
        .build();

    let developer = Agent::builder(DEVELOPER)
        .model(DEVELOPER_MODEL)
        .provider(ProviderKind::Anthropic)
        .instructions(DEVELOPER_INSTRUCTIONS)
        .functions(file_tools(workdir))
        .build();

    let registry = AgentRegistry::builder()
        .agent(coordinator)
        .agent(developer)
        .handoff_with_description(
            COORDINATOR,
            DEVELOPER,
            "Transfer to the Developer Agent for anything involving files or code.",
        )
        .handoff_with_description(
            DEVELOPER,
            COORDINATOR,
            "Call this function if a user is asking about a topic that is not handled by the current agent.",
        )
        .build()?;
    Ok(registry)
}

/// Find an agent by its full name or by its first word, ignoring case
pub fn find_agent(registry: &AgentRegistry, query: &str) -> Result<Arc<Agent>> {
    let query = query.trim();
    registry
        .agents()
        .find(|agent| {
            agent.name.eq_ignore_ascii_case(query)
                || agent
                    .name
                    .split_whitespace()
                    .next()
                    .is_some_and(|first| first.eq_ignore_ascii_case(query))
        })
        .cloned()
        .ok_or_else(|| {
            let known: Vec<_> = registry.agents().map(|a| a.name.as_str()).collect();
            anyhow!("Unknown agent '{}', expected one of: {}", query, known.join(", "))
        })
}
