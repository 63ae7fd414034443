pub mod providers;
pub mod schemas;

use crate::config::LlmConfig;
use async_trait::async_trait;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum LlmError {
    ConnectionError(String),
    ResponseError(String),
    ConfigError(String),
    SchemaError(String),
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmError::ConnectionError(msg) => write!(f, "LLM connection error: {}", msg),
            LlmError::ResponseError(msg) => write!(f, "LLM response error: {}", msg),
            LlmError::ConfigError(msg) => write!(f, "LLM configuration error: {}", msg),
            LlmError::SchemaError(msg) => write!(f, "LLM schema error: {}", msg),
        }
    }
}

impl Error for LlmError {}

/// Cost tier for a completion call. `Refine` routes to the cheapest
/// configured model; everything else uses the full model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Full,
    Refine,
}

/// One structured-JSON chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub tier: ModelTier,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, tier: ModelTier) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            tier,
            temperature: 0.1,
            max_tokens: 2000,
        }
    }
}

/// Uniform interface to the completion service; every pipeline component
/// that talks to a model goes through this.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

pub struct LlmManager {
    client: Box<dyn CompletionClient + Send + Sync>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client: Box<dyn CompletionClient + Send + Sync> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { client })
    }

    #[cfg(test)]
    pub fn with_client(client: Box<dyn CompletionClient + Send + Sync>) -> Self {
        Self { client }
    }

    pub async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        self.client.complete(request).await
    }
}
