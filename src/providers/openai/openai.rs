use async_openai::{
    config::OpenAIConfig as ClientConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        CreateChatCompletionRequestArgs, Role,
    },
    Client,
};
use async_trait::async_trait;

use crate::config::OpenAIConfig;
use crate::error::{Result, RfpError};
use crate::providers::traits::{CompletionProvider, CompletionRequest};

pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

/// Builds a client from the configured key, or reports which variable is missing.
pub fn openai_client(config: &OpenAIConfig) -> Result<Client<ClientConfig>> {
    let api_key = config
        .api_key
        .as_deref()
        .ok_or(RfpError::CredentialMissing(OPENAI_KEY_VAR))?;
    Ok(Client::with_config(ClientConfig::new().with_api_key(api_key)))
}

#[derive(Clone)]
pub struct OpenAIProvider {
    // None when no key is configured; every call then fails with CredentialMissing
    client: Option<Client<ClientConfig>>,
    chat_model: String,
}

impl OpenAIProvider {
    pub fn new(config: &OpenAIConfig) -> Self {
        Self {
            client: openai_client(config).ok(),
            chat_model: config.chat_model.clone(),
        }
    }

    fn messages(request: &CompletionRequest) -> Vec<ChatCompletionRequestMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage {
                    role: Role::System,
                    content: system.clone(),
                    name: None,
                },
            ));
        }
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage {
                role: Role::User,
                content: ChatCompletionRequestUserMessageContent::Text(request.prompt.clone()),
                name: None,
            },
        ));
        messages
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let client = self
            .client
            .as_ref()
            .ok_or(RfpError::CredentialMissing(OPENAI_KEY_VAR))?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.chat_model).messages(Self::messages(&request));
        if let Some(temperature) = request.temperature {
            args.temperature(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            args.max_tokens(max_tokens);
        }
        let chat_request = args
            .build()
            .map_err(|e| RfpError::CompletionServiceError(e.to_string()))?;

        log::debug!("Sending completion request to {}", self.chat_model);
        let response = client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| RfpError::CompletionServiceError(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| RfpError::CompletionServiceError("No response content".to_string()))
    }

    fn model(&self) -> &str {
        &self.chat_model
    }
}
