use serde::Serialize;
use std::sync::Arc;

use crate::error::{Result, RfpError};
use crate::llm::embeddings::Embedder;
use crate::llm::retriever::Retriever;
use crate::providers::{CompletionProvider, CompletionRequest};

pub const CHAT_TOP_K: usize = 5;
pub const CHAT_SYSTEM_PROMPT: &str = "You are an expert RFP analyst assistant. Answer questions about the RFP document using the provided context. Be concise and specific.";
pub const NO_INFORMATION_REPLY: &str = "I couldn't find any relevant information in the documents. Please try rephrasing your question.";

const CHAT_TEMPERATURE: f32 = 0.3;
const CHAT_MAX_TOKENS: u16 = 500;

#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub num_matches: usize,
}

/// Free-form question answering over one index.
pub struct RfpChatbot {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    completion: Arc<dyn CompletionProvider>,
    top_k: usize,
}

impl RfpChatbot {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        retriever: Retriever,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            embedder,
            retriever,
            completion,
            top_k: CHAT_TOP_K,
        }
    }

    pub async fn answer(&self, index: &str, question: &str) -> Result<ChatAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RfpError::InvalidInput("Question is required".to_string()));
        }

        let vector = self.embedder.embed(question).await?;
        let matches = self.retriever.query(index, &vector, self.top_k, None).await?;
        log::info!("Chat query on '{}' matched {} passages", index, matches.len());

        // Nothing to ground an answer on
        if matches.is_empty() {
            return Ok(ChatAnswer {
                answer: NO_INFORMATION_REPLY.to_string(),
                num_matches: 0,
            });
        }

        let context = matches
            .iter()
            .map(|m| m.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let request = CompletionRequest::new(format!("Context: {}\n\nQuestion: {}", context, question))
            .with_system(CHAT_SYSTEM_PROMPT)
            .with_temperature(CHAT_TEMPERATURE)
            .with_max_tokens(CHAT_MAX_TOKENS);

        let answer = self.completion.complete(request).await?;
        if answer.trim().is_empty() {
            return Err(RfpError::CompletionServiceError(
                "Empty response from chatbot".to_string(),
            ));
        }

        Ok(ChatAnswer {
            answer,
            num_matches: matches.len(),
        })
    }
}
