pub mod analyzer;
pub mod chat;
pub mod embeddings;
pub mod retriever;
pub mod schema;

#[cfg(test)]
pub(crate) mod test_support;

pub use analyzer::RfpAnalyzer;
pub use chat::{ChatAnswer, RfpChatbot};
pub use embeddings::{Embedder, OpenAIEmbedder};
pub use retriever::{RetrievedChunk, Retriever};
pub use schema::{ExtractionResult, FieldValue};
