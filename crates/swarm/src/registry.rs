use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use anyhow::anyhow;

use crate::agent::Agent;
use crate::errors::{SwarmError, SwarmResult};
use crate::function::{AgentFunction, FunctionOutput};

/// The wired set of agents a conversation can move between.
///
/// Built once before any run starts; every agent inside is immutable afterwards.
#[derive(Debug)]
pub struct AgentRegistry {
    agents: Vec<Arc<Agent>>,
    by_name: HashMap<String, usize>,
}

impl AgentRegistry {
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Agent>> {
        self.by_name.get(name).map(|&index| self.agents[index].clone())
    }

    /// Agents in registration order
    pub fn agents(&self) -> impl Iterator<Item = &Arc<Agent>> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Handoff {
    from: String,
    to: String,
    description: Option<String>,
}

#[derive(Debug, Default)]
pub struct AgentRegistryBuilder {
    agents: Vec<Agent>,
    handoffs: Vec<Handoff>,
}

impl AgentRegistryBuilder {
    pub fn agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    /// Give `from` a `transfer_to_<to>` function that hands the conversation to `to`
    pub fn handoff(self, from: &str, to: &str) -> Self {
        self.push_handoff(from, to, None)
    }

    pub fn handoff_with_description(self, from: &str, to: &str, description: &str) -> Self {
        self.push_handoff(from, to, Some(description.to_string()))
    }

    /// Wire handoffs in both directions between every pair of the given agents
    pub fn fully_connected(mut self, names: &[&str]) -> Self {
        for from in names {
            for to in names.iter().filter(|to| *to != from) {
                self = self.handoff(from, to);
            }
        }
        self
    }

    fn push_handoff(mut self, from: &str, to: &str, description: Option<String>) -> Self {
        self.handoffs.push(Handoff {
            from: from.to_string(),
            to: to.to_string(),
            description,
        });
        self
    }

    pub fn build(self) -> SwarmResult<Arc<AgentRegistry>> {
        let mut names = HashSet::new();
        for agent in &self.agents {
            if !names.insert(agent.name.as_str()) {
                return Err(SwarmError::Configuration(format!(
                    "Duplicate agent name: {}",
                    agent.name
                )));
            }
        }
        for handoff in &self.handoffs {
            for endpoint in [&handoff.from, &handoff.to] {
                if !names.contains(endpoint.as_str()) {
                    return Err(SwarmError::Configuration(format!(
                        "Handoff references unknown agent: {}",
                        endpoint
                    )));
                }
            }
        }

        // A repeated edge wires the same handoff once
        let mut seen = HashSet::new();
        let AgentRegistryBuilder { agents, mut handoffs } = self;
        handoffs.retain(|h| seen.insert((h.from.clone(), h.to.clone())));

        for agent in &agents {
            let mut function_names: HashSet<String> = HashSet::new();
            let generated = handoffs
                .iter()
                .filter(|h| h.from == agent.name)
                .map(|h| transfer_function_name(&h.to));
            for name in agent.functions.iter().map(|f| f.name().to_string()).chain(generated) {
                if !function_names.insert(name.clone()) {
                    return Err(SwarmError::Configuration(format!(
                        "Duplicate function name {} on agent {}",
                        name, agent.name
                    )));
                }
            }
        }

        Ok(Arc::new_cyclic(|registry: &Weak<AgentRegistry>| {
            let mut by_name = HashMap::new();
            let agents = agents
                .into_iter()
                .enumerate()
                .map(|(index, mut agent)| {
                    by_name.insert(agent.name.clone(), index);
                    for handoff in handoffs.iter().filter(|h| h.from == agent.name) {
                        agent.functions.push(transfer_function(handoff, registry.clone()));
                    }
                    Arc::new(agent)
                })
                .collect();
            AgentRegistry { agents, by_name }
        }))
    }
}

/// Name of the generated handoff function, e.g. `transfer_to_developer_agent`
pub fn transfer_function_name(agent_name: &str) -> String {
    let mut slug = String::new();
    for c in agent_name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    format!("transfer_to_{}", slug.trim_matches('_'))
}

// The weak reference lets agents hand off to each other in cycles without keeping the
// registry alive from inside itself.
fn transfer_function(handoff: &Handoff, registry: Weak<AgentRegistry>) -> AgentFunction {
    let target = handoff.to.clone();
    let description = handoff.description.clone().unwrap_or_else(|| {
        format!(
            "Transfer the conversation to {}. Call this function if the user is asking about a topic that {} handles better than the current agent.",
            target, target
        )
    });

    AgentFunction::builder(transfer_function_name(&target))
        .description(description)
        .build(move |_args| {
            let registry = registry
                .upgrade()
                .ok_or_else(|| anyhow!("agent registry is no longer available"))?;
            let agent = registry
                .get(&target)
                .ok_or_else(|| anyhow!("agent {} is not registered", target))?;
            Ok(FunctionOutput::Handoff(agent))
        })
}
