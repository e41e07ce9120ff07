use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::Provider;
use super::configs::{AnthropicProviderConfig, ANTHROPIC_VERSION};

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let error_text = response.text().await?;
                Err(anyhow!("Request failed: {} - {}", status, error_text))
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(&self, mut payload: Value) -> Result<Value> {
        if let Some(max_tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        tracing::debug!(payload = %payload, "sending anthropic completion request");
        self.post(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::format::{AnthropicFormat, ProviderFormat};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(
        response_body: Value,
        max_tokens: Option<u32>,
    ) -> (MockServer, AnthropicProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_api_key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let mut config = AnthropicProviderConfig::new(mock_server.uri(), "test_api_key");
        config.max_tokens = max_tokens;

        let provider = AnthropicProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "text",
                "text": "Hello! How can I assist you today?"
            }],
            "model": "claude-3-5-sonnet-20240620",
            "stop_reason": "end_turn",
            "stop_sequence": null,
            "usage": {
                "input_tokens": 12,
                "output_tokens": 15
            }
        });

        let (_server, provider) = setup_mock_server(response_body, None).await;

        let response = provider
            .complete(json!({"model": "claude-3-5-sonnet-20240620", "messages": []}))
            .await?;
        let message = AnthropicFormat.normalize_completion(&response)?;
        assert_eq!(message.text(), "Hello! How can I assist you today?");
        Ok(())
    }

    #[tokio::test]
    async fn test_max_tokens_override() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(json!({"max_tokens": 1024})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"content": []})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = AnthropicProviderConfig::new(mock_server.uri(), "test_api_key");
        config.max_tokens = Some(1024);
        let provider = AnthropicProvider::new(config)?;

        provider
            .complete(json!({"model": "claude", "messages": [], "max_tokens": 4096}))
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_request_failure() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
            .mount(&mock_server)
            .await;

        let provider =
            AnthropicProvider::new(AnthropicProviderConfig::new(mock_server.uri(), "bad"))?;
        let err = provider.complete(json!({"model": "claude"})).await.unwrap_err();
        assert!(err.to_string().contains("invalid x-api-key"));
        Ok(())
    }
}
