use std::env;

use anyhow::{anyhow, Result};

use super::base::ProviderKind;

pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Anthropic(AnthropicProviderConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::OpenAi(_) => ProviderKind::OpenAi,
            ProviderConfig::Anthropic(_) => ProviderKind::Anthropic,
        }
    }

    /// Load the configuration for `kind` from environment variables
    pub fn from_env(kind: ProviderKind) -> Result<Self> {
        match kind {
            ProviderKind::OpenAi => Ok(ProviderConfig::OpenAi(OpenAiProviderConfig::from_env()?)),
            ProviderKind::Anthropic => Ok(ProviderConfig::Anthropic(
                AnthropicProviderConfig::from_env()?,
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    /// When set, requests are routed to an Azure OpenAI deployment named after the model
    pub api_version: Option<String>,
}

impl OpenAiProviderConfig {
    pub fn new<H: Into<String>, K: Into<String>>(host: H, api_key: K) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            api_version: None,
        }
    }

    pub fn azure<H, K, V>(endpoint: H, api_key: K, api_version: V) -> Self
    where
        H: Into<String>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            host: endpoint.into(),
            api_key: api_key.into(),
            api_version: Some(api_version.into()),
        }
    }

    pub fn is_azure(&self) -> bool {
        self.api_version.is_some()
    }

    /// Azure settings win when `AZURE_OPENAI_ENDPOINT` is present
    pub fn from_env() -> Result<Self> {
        if let Some(endpoint) = get_env("AZURE_OPENAI_ENDPOINT", false, None)? {
            let api_key = get_env("AZURE_OPENAI_API_KEY", true, None)?
                .ok_or_else(|| anyhow!("Azure OpenAI API key should be present"))?;
            let api_version = get_env(
                "AZURE_OPENAI_API_VERSION",
                false,
                Some("2024-05-01-preview".to_string()),
            )?
            .unwrap_or_else(|| "2024-05-01-preview".to_string());
            return Ok(Self::azure(endpoint, api_key, api_version));
        }

        let api_key = get_env("OPENAI_API_KEY", true, None)?
            .ok_or_else(|| anyhow!("OpenAI API key should be present"))?;
        let host = get_env("OPENAI_HOST", false, Some(OPENAI_HOST.to_string()))?
            .unwrap_or_else(|| OPENAI_HOST.to_string());
        Ok(Self::new(host, api_key))
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    /// Overrides the `max_tokens` of every request when set
    pub max_tokens: Option<u32>,
}

impl AnthropicProviderConfig {
    pub fn new<H: Into<String>, K: Into<String>>(host: H, api_key: K) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            max_tokens: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = get_env("ANTHROPIC_API_KEY", true, None)?
            .ok_or_else(|| anyhow!("Anthropic API key should be present"))?;
        let host = get_env("ANTHROPIC_HOST", false, Some(ANTHROPIC_HOST.to_string()))?
            .unwrap_or_else(|| ANTHROPIC_HOST.to_string());
        let max_tokens = get_env("ANTHROPIC_MAX_TOKENS", false, None)?
            .map(|value| value.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("ANTHROPIC_MAX_TOKENS must be a positive integer: {}", e))?;

        Ok(Self {
            host,
            api_key,
            max_tokens,
        })
    }
}

/// Helper function to get environment variables with error handling
fn get_env(key: &str, required: bool, default: Option<String>) -> Result<Option<String>> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) if !required => Ok(default),
        Err(env::VarError::NotPresent) => Err(anyhow!(
            "Environment variable '{}' is required but not set.",
            key
        )),
        Err(e) => Err(e.into()),
    }
}
