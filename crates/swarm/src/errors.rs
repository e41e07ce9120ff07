use std::time::Duration;

use thiserror::Error;

/// Failures that abort a run. A run either returns a complete response or one of these.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SwarmError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Introspection(#[from] IntrospectionError),

    #[error("Failed to coerce tool result to string: {0}")]
    ResultCoercion(String),

    #[error("Provider call failed: {0:#}")]
    Provider(anyhow::Error),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Run cancelled")]
    Cancelled,
}

pub type SwarmResult<T> = Result<T, SwarmError>;

/// Raised when a function's declared signature cannot be turned into a tool schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntrospectionError {
    #[error("Failed to get signature for function '{0}': name must match [a-zA-Z0-9_-]+")]
    InvalidName(String),

    #[error("Failed to get signature for function '{function}': duplicate parameter '{parameter}'")]
    DuplicateParameter { function: String, parameter: String },
}

/// Tool failures that are fed back to the model instead of aborting the run.
///
/// The display text is written verbatim into the tool-role message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Error: Tool {0} not found.")]
    NotFound(String),

    #[error("Error: Invalid function arguments. Error decoding JSON for function {name}: {reason}")]
    InvalidArguments { name: String, reason: String },

    #[error("Error: Function execution failed. Error executing function {name}: {reason}")]
    Execution { name: String, reason: String },
}
