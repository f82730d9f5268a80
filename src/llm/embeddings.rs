use async_openai::{
    config::OpenAIConfig as ClientConfig,
    types::{CreateEmbeddingRequestArgs, EmbeddingInput},
    Client,
};
use async_trait::async_trait;
use futures::future::try_join_all;

use crate::config::{OpenAIConfig, EMBEDDING_DIMENSION};
use crate::document::Chunk;
use crate::error::{Result, RfpError};
use crate::providers::openai::{openai_client, OPENAI_KEY_VAR};

/// Upper bound on inputs per embedding request.
pub const EMBEDDING_BATCH_SIZE: usize = 64;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Raw call to the embedding service, one vector per input, in order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION as usize
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        check_vectors(&vectors, 1, self.dimension())?;
        vectors
            .pop()
            .ok_or_else(|| RfpError::EmbeddingServiceError("No embedding returned".to_string()))
    }

    /// Returns the chunks with `embedding` set.
    async fn embed_batch(&self, mut chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        if chunks.is_empty() {
            return Ok(chunks);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embed_texts(&texts).await?;
        check_vectors(&vectors, texts.len(), self.dimension())?;

        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            chunk.embedding = Some(vector);
        }
        log::info!("Embedded {} chunks", chunks.len());
        Ok(chunks)
    }
}

/// Rejects short responses, wrong dimensions and all-zero vectors.
pub fn check_vectors(vectors: &[Vec<f32>], expected: usize, dimension: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(RfpError::EmbeddingServiceError(format!(
            "expected {} embeddings, got {}",
            expected,
            vectors.len()
        )));
    }

    for (i, vector) in vectors.iter().enumerate() {
        if vector.len() != dimension {
            return Err(RfpError::EmbeddingServiceError(format!(
                "embedding {} has dimension {} (expected {})",
                i,
                vector.len(),
                dimension
            )));
        }
        if vector.iter().all(|x| *x == 0.0) {
            return Err(RfpError::EmbeddingServiceError(format!(
                "embedding {} is an all-zero vector",
                i
            )));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct OpenAIEmbedder {
    client: Option<Client<ClientConfig>>,
    model: String,
}

impl OpenAIEmbedder {
    pub fn new(config: &OpenAIConfig) -> Self {
        Self {
            client: openai_client(config).ok(),
            model: config.embedding_model.clone(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = self
            .client
            .as_ref()
            .ok_or(RfpError::CredentialMissing(OPENAI_KEY_VAR))?;

        // Batches go out concurrently; try_join_all keeps them in input order
        let requests = texts.chunks(EMBEDDING_BATCH_SIZE).map(|batch| async move {
            log::debug!("Requesting {} embeddings from {}", batch.len(), self.model);

            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(EmbeddingInput::StringArray(batch.to_vec()))
                .build()
                .map_err(|e| RfpError::EmbeddingServiceError(e.to_string()))?;

            let response = client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| RfpError::EmbeddingServiceError(e.to_string()))?;

            let mut data = response.data;
            data.sort_by_key(|embedding| embedding.index);
            Ok::<_, RfpError>(data.into_iter().map(|embedding| embedding.embedding).collect::<Vec<_>>())
        });

        let batches = try_join_all(requests).await?;
        Ok(batches.into_iter().flatten().collect())
    }
}
