//! Deterministic stand-ins for the hosted models.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::config::EMBEDDING_DIMENSION;
use crate::database::{IndexRecord, IndexSpec, MemoryVectorDB, Metric, VectorIndex};
use crate::error::Result;
use crate::llm::embeddings::Embedder;
use crate::providers::{CompletionProvider, CompletionRequest};

pub const TEST_DIMENSION: usize = EMBEDDING_DIMENSION as usize;

/// Bag-of-words hashing embedder; the first component is always 1.0 so no
/// vector is all zeros.
pub struct HashEmbedder;

pub fn hash_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; TEST_DIMENSION];
    vector[0] = 1.0;
    for word in text.split_whitespace() {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        vector[1 + (hasher.finish() as usize % (TEST_DIMENSION - 1))] += 1.0;
    }
    vector
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        TEST_DIMENSION
    }
}

/// Returns a fixed reply and records every request.
pub struct ScriptedCompletion {
    reply: String,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.into(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.requests.lock().push(request);
        Ok(self.reply.clone())
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// An in-memory index named `name` holding `passages` in write order.
pub async fn seeded_index(name: &str, passages: &[&str]) -> Arc<MemoryVectorDB> {
    let db = Arc::new(MemoryVectorDB::new());
    db.create_index(&IndexSpec {
        name: name.to_string(),
        dimension: TEST_DIMENSION as u64,
        metric: Metric::Cosine,
    })
    .await
    .unwrap();

    let records = passages
        .iter()
        .enumerate()
        .map(|(i, text)| IndexRecord {
            id: uuid::Uuid::new_v4().to_string(),
            vector: hash_vector(text),
            content: text.to_string(),
            metadata: HashMap::new(),
            seq: i as u64,
        })
        .collect();
    db.upsert(name, records).await.unwrap();
    db
}
