use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use bat::WrappingMode;
use cliclack::{input, spinner};
use console::style;
use swarm::agent::Agent;
use swarm::context::ContextVariables;
use swarm::models::message::Message;
use swarm::models::role::Role;
use swarm::swarm::{RunOptions, Swarm};
use tokio_util::sync::CancellationToken;

const THEME: &str = "zenburn";

/// An interactive session: history and the active agent carry over between inputs
pub struct Repl {
    swarm: Swarm,
    agent: Arc<Agent>,
    history: Vec<Message>,
    context_variables: ContextVariables,
    options: RunOptions,
    cancel: Arc<Mutex<CancellationToken>>,
}

impl Repl {
    pub fn new(swarm: Swarm, agent: Arc<Agent>, options: RunOptions) -> Result<Self> {
        let cancel = Arc::new(Mutex::new(CancellationToken::new()));

        // Ctrl-C aborts the run in flight instead of the whole process
        let handler_token = cancel.clone();
        ctrlc::set_handler(move || {
            if let Ok(token) = handler_token.lock() {
                token.cancel();
            }
        })?;

        Ok(Self {
            swarm,
            agent,
            history: Vec::new(),
            context_variables: options.context_variables.clone(),
            options,
            cancel,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        println!(
            "Starting swarm CLI with {} {}",
            style(&self.agent.name).cyan().bold(),
            style("- type \"exit\" to end the session").dim()
        );
        println!();

        loop {
            let message_text: String = input("Message:").placeholder("").interact()?;
            if message_text.trim().eq_ignore_ascii_case("exit") {
                break;
            }
            self.history.push(Message::user().with_text(message_text));

            let token = self.reset_cancellation()?;
            let options = self
                .options
                .clone()
                .with_context_variables(self.context_variables.clone())
                .with_cancellation(token);

            let spin = spinner();
            spin.start("awaiting reply");
            let result = self
                .swarm
                .run(self.agent.clone(), self.history.clone(), options)
                .await;
            spin.stop("");

            match result {
                Ok(response) => {
                    for message in &response.messages {
                        render(message)?;
                    }
                    self.history.extend(response.messages);
                    self.agent = response.agent;
                    self.context_variables = response.context_variables;
                }
                Err(err) => {
                    tracing::error!("run failed: {}", err);
                    // Nothing from a failed run is kept, including the prompt that started it
                    self.history.pop();
                    println!("{}", style(format!("Error: {}", err)).red());
                }
            }
            println!();
        }
        Ok(())
    }

    fn reset_cancellation(&self) -> Result<CancellationToken> {
        let mut current = self
            .cancel
            .lock()
            .map_err(|_| anyhow!("cancellation lock poisoned"))?;
        *current = CancellationToken::new();
        Ok(current.clone())
    }
}

fn render(message: &Message) -> Result<()> {
    if message.role != Role::Assistant {
        return Ok(());
    }

    let sender = message.sender.as_deref().unwrap_or("Assistant");
    if !message.text().is_empty() {
        println!("{}:", style(sender).blue().bold());
        print_markdown(message.text())?;
    }
    for call in &message.tool_calls {
        println!(
            "{}: {}({})",
            style(sender).blue().bold(),
            style(&call.name).magenta(),
            call.arguments.replace(':', "=")
        );
    }
    Ok(())
}

fn print_markdown(content: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(THEME)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("Failed to render reply: {}", e))?;
    println!();
    Ok(())
}
