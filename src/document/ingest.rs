use std::sync::Arc;

use crate::database::{DocumentRecord, DocumentStore, DocumentWriter, IndexManager, IndexRecord, Scope};
use crate::document::chunker::{Chunk, SentenceChunker};
use crate::document::extractor::TextExtractor;
use crate::error::{Result, RfpError};
use crate::llm::Embedder;

/// Upload pipeline: extract, chunk, embed, reset the scope's index, write.
pub struct DocumentIngestor {
    extractor: Arc<dyn TextExtractor>,
    chunker: SentenceChunker,
    embedder: Arc<dyn Embedder>,
    indexes: Arc<IndexManager>,
    writer: DocumentWriter,
    documents: Arc<DocumentStore>,
}

impl DocumentIngestor {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        indexes: Arc<IndexManager>,
        writer: DocumentWriter,
        documents: Arc<DocumentStore>,
    ) -> Self {
        Self {
            extractor,
            chunker: SentenceChunker::default(),
            embedder,
            indexes,
            writer,
            documents,
        }
    }

    /// Replaces whatever the scope's index held with this document.
    ///
    /// Embedding runs before the reset, so an embedding failure leaves the
    /// previous contents queryable.
    pub async fn ingest(&self, file_name: &str, bytes: Vec<u8>, scope: Scope) -> Result<DocumentRecord> {
        let doc_id = uuid::Uuid::new_v4().to_string();
        log::info!("Ingesting '{}' as {} into {}", file_name, doc_id, scope);

        let text = self.extractor.extract(bytes).await?;

        let chunks = self.chunker.split(&text, &doc_id);
        if chunks.is_empty() {
            return Err(RfpError::ExtractionFailed(
                "No extractable text found in PDF".to_string(),
            ));
        }
        log::info!("Split into {} document chunks", chunks.len());

        let chunks = self.embedder.embed_batch(chunks).await?;
        let records = to_records(chunks)?;
        let chunk_count = records.len();

        let _guard = self.indexes.lock(&scope).await;
        let handle = self.indexes.reset(&scope).await?;
        self.writer.write(&handle.name, records).await?;

        let record = DocumentRecord::new(doc_id, file_name, scope, handle.name, chunk_count);
        self.documents.insert(record.clone());
        Ok(record)
    }
}

fn to_records(chunks: Vec<Chunk>) -> Result<Vec<IndexRecord>> {
    chunks
        .into_iter()
        .enumerate()
        .map(|(seq, chunk)| {
            let vector = chunk
                .embedding
                .ok_or_else(|| RfpError::Internal(format!("chunk {} has no embedding", seq)))?;
            Ok(IndexRecord {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                content: chunk.content,
                metadata: chunk.metadata,
                seq: seq as u64,
            })
        })
        .collect()
}
