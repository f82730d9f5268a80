use std::sync::Arc;

use crate::error::{Result, RfpError};
use crate::llm::embeddings::Embedder;
use crate::llm::retriever::Retriever;
use crate::llm::schema::{parse_model_reply, render_prompt, ExtractionResult};
use crate::providers::{CompletionProvider, CompletionRequest};

/// Retrieval seed and question used when the caller gives none.
pub const DEFAULT_ANALYSIS_QUERY: &str = "Extract all key information from this RFP document.";
pub const ANALYZER_TOP_K: usize = 3;

/// Structured extraction over the passages of one index.
pub struct RfpAnalyzer {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    completion: Arc<dyn CompletionProvider>,
    top_k: usize,
}

impl RfpAnalyzer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        retriever: Retriever,
        completion: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            embedder,
            retriever,
            completion,
            top_k: ANALYZER_TOP_K,
        }
    }


    /// Embed seed -> retrieve -> prompt -> complete -> parse.
    ///
    /// A reply that does not match the schema yields an empty result instead
    /// of an error; upstream failures still propagate.
    pub async fn analyze(&self, index: &str, seed: Option<&str>) -> Result<ExtractionResult> {
        let seed = seed
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_ANALYSIS_QUERY);

        let vector = self.embedder.embed(seed).await?;
        let matches = self.retriever.query(index, &vector, self.top_k, None).await?;
        log::info!("Analyzing '{}' with {} retrieved passages", index, matches.len());

        let documents: Vec<&str> = matches.iter().map(|m| m.chunk.content.as_str()).collect();
        let prompt = render_prompt(&documents, DEFAULT_ANALYSIS_QUERY);

        let reply = self.completion.complete(CompletionRequest::new(prompt)).await?;

        match parse_model_reply(&reply) {
            Ok(result) => Ok(result),
            Err(RfpError::MalformedModelOutput(reason)) => {
                log::warn!("Discarding malformed analysis reply: {}", reason);
                Ok(ExtractionResult::empty())
            }
            Err(e) => Err(e),
        }
    }
}
