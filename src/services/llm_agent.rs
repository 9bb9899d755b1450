use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, Role,
    },
    Client,
};
use futures::future::BoxFuture;

use crate::error::AppError;
use crate::services::insights::TextGenerator;

/// Chat-completion backed narrative generator.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: &str, model: &str) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let messages = vec![ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
                name: None,
                role: Role::User,
            },
        )];

        let request = CreateChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.2),
            max_tokens: Some(400),
            ..Default::default()
        };

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AppError::Llm(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::Llm("Empty completion".to_string()))
    }
}

impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, AppError>> {
        Box::pin(self.complete(prompt))
    }
}
