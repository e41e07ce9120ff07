use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::SwarmError;

/// The wire formats a completion can be requested in
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProviderKind {
    /// The provider-neutral, openai-style chat completions format
    OpenAi,
    /// The anthropic messages format
    Anthropic,
}

impl ProviderKind {
    /// Parse a provider name, treating anything unknown as a configuration error
    pub fn parse(name: &str) -> Result<Self, SwarmError> {
        name.parse()
            .map_err(|_| SwarmError::Configuration(format!("Unsupported provider: {}", name)))
    }
}

/// Base trait for completion services (OpenAI, Anthropic, etc).
///
/// Takes a provider-native request body and returns the provider-native response body.
/// Implementations must not retry; retry policy belongs to the caller.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, payload: Value) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(ProviderKind::parse("openai").unwrap(), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::parse("OpenAI").unwrap(), ProviderKind::OpenAi);
        assert_eq!(ProviderKind::parse("Anthropic").unwrap(), ProviderKind::Anthropic);

        let err = ProviderKind::parse("vertex").unwrap_err();
        assert!(matches!(err, SwarmError::Configuration(ref msg) if msg == "Unsupported provider: vertex"));
    }

    #[test]
    fn test_provider_kind_display_round_trips() {
        for kind in ProviderKind::iter() {
            assert_eq!(ProviderKind::parse(&kind.to_string()).unwrap(), kind);
        }
    }
}
