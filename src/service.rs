#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Client side of the generative-text service.

use async_openai::{
    Client as OpenAIClient,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;

use crate::{config::EvaluatorConfig, error::ServiceError};

/// A remote text generator: one prompt in, one response out.
#[async_trait]
pub trait TextService: Send + Sync + 'static {
    /// Generates a response for `prompt`, sampling at `temperature` when one
    /// is given.
    async fn generate(&self, prompt: &str, temperature: Option<f32>)
    -> Result<String, ServiceError>;
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiService {
    /// Underlying HTTP client.
    client: OpenAIClient<OpenAIConfig>,
    /// Model identifier sent with each request.
    model:  String,
}

impl OpenAiService {
    /// Creates a client from the endpoint, key and model in `config`.
    pub fn new(config: &EvaluatorConfig) -> Self {
        let client = OpenAIClient::with_config(
            OpenAIConfig::new()
                .with_api_base(config.api_base().to_owned())
                .with_api_key(config.api_key().to_owned()),
        );
        Self {
            client,
            model: config.model().to_owned(),
        }
    }

    /// Returns the model this client targets.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextService for OpenAiService {
    async fn generate(
        &self,
        prompt: &str,
        temperature: Option<f32>,
    ) -> Result<String, ServiceError> {
        let request_err = |e: &dyn std::fmt::Display| ServiceError::Request(e.to_string());

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| request_err(&e))?
                .into(),
        ];

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone()).messages(messages).n(1);
        if let Some(t) = temperature {
            args.temperature(t);
        }
        let request = args.build().map_err(|e| request_err(&e))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| request_err(&e))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ServiceError::EmptyResponse)
    }
}
