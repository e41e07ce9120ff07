use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use super::base::Provider;
use super::configs::OpenAiProviderConfig;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn url(&self, model: &str) -> String {
        let host = self.config.host.trim_end_matches('/');
        match &self.config.api_version {
            Some(api_version) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                host, model, api_version
            ),
            None => format!("{}/v1/chat/completions", host),
        }
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let model = payload["model"].as_str().unwrap_or_default();
        let request = self.client.post(self.url(model));
        let request = if self.config.is_azure() {
            request.header("api-key", &self.config.api_key)
        } else {
            request.header("Authorization", format!("Bearer {}", self.config.api_key))
        };

        let response = request.json(&payload).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                // Error bodies carry the context length code the format layer checks for
                let body: Value = response.json().await.unwrap_or(Value::Null);
                if body.get("error").is_some() {
                    return Ok(body);
                }
                Err(anyhow!("Request failed: {}", status))
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(&self, payload: Value) -> Result<Value> {
        tracing::debug!(payload = %payload, "sending openai completion request");
        self.post(payload).await
    }
}
