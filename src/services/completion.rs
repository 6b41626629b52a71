use async_openai::{
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    Client,
};
use tracing::{debug, info};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion API error: {0}")]
    ApiError(String),

    #[error("Invalid completion request: {0}")]
    InvalidRequest(String),

    #[error("Completion API returned no text")]
    EmptyResponse,
}

impl From<async_openai::error::OpenAIError> for CompletionError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        CompletionError::ApiError(err.to_string())
    }
}

/// A hosted text-generation model
#[async_trait::async_trait]
pub trait CompletionModel: Send + Sync {
    /// Send a single prompt and return the generated text verbatim
    async fn generate(&self, prompt: &str) -> Result<String, CompletionError>;

    fn model_name(&self) -> &str;
}

/// Gemini chat completions through the OpenAI-compatible endpoint
pub struct GeminiChat {
    client: Client<OpenAIConfig>,
    model: String,
}

impl GeminiChat {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);

        info!("Initialized Gemini chat model: {}", model);

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.gemini_api_key,
            &config.gemini_base_url,
            &config.chat_model,
        )
    }
}

#[async_trait::async_trait]
impl CompletionModel for GeminiChat {
    async fn generate(&self, prompt: &str) -> Result<String, CompletionError> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| CompletionError::InvalidRequest(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([message.into()])
            .build()
            .map_err(|e| CompletionError::InvalidRequest(e.to_string()))?;

        debug!("Sending {} prompt characters to {}", prompt.len(), self.model);

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
