use crate::config::LlmConfig;
use crate::llm::{ChatRequest, CompletionClient, LlmError, ModelTier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Local Ollama provider; uses the generate endpoint with `format: "json"`
/// so responses can be held to the same strict schemas as the remote
/// provider.
pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    model: String,
    refine_model: String,
}

#[derive(Serialize, Debug)]
struct OllamaRequest {
    model: String,
    system: String,
    prompt: String,
    format: &'static str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize, Debug)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize, Debug)]
struct OllamaResponse {
    response: String,
    #[serde(flatten)]
    _extra: std::collections::HashMap<String, serde_json::Value>,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434/api/generate".to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            model: config.model.clone(),
            refine_model: config.refine_model.clone(),
        })
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Full => &self.model,
            ModelTier::Refine => &self.refine_model,
        }
    }
}

#[async_trait]
impl CompletionClient for OllamaProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let body = OllamaRequest {
            model: self.model_for(request.tier).to_string(),
            system: request.system.clone(),
            prompt: request.user.clone(),
            format: "json",
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LlmError::ResponseError(format!(
                "Ollama responded with status code: {}",
                response.status()
            )));
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        Ok(parsed.response)
    }
}
