//! In-process vector index.
//!
//! Brute-force cosine search over records held in memory. Used by the
//! `--memory-index` development mode and by tests that need an index without
//! a running Qdrant.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::vector_db::{
    IndexMatch, IndexRecord, IndexSpec, QueryOptions, VectorDBError, VectorIndex,
};

struct Collection {
    dimension: usize,
    records: Vec<IndexRecord>,
}

#[derive(Default)]
pub struct MemoryVectorDB {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryVectorDB {
    pub fn new() -> Self {
        Self::default()
    }

    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() {
            return 0.0;
        }

        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorDB {
    async fn list_indexes(&self) -> Result<Vec<String>, VectorDBError> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn index_exists(&self, name: &str) -> Result<bool, VectorDBError> {
        Ok(self.collections.read().contains_key(name))
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<(), VectorDBError> {
        let mut collections = self.collections.write();
        if collections.contains_key(&spec.name) {
            return Err(VectorDBError::CollectionExists(spec.name.clone()));
        }
        collections.insert(
            spec.name.clone(),
            Collection {
                dimension: spec.dimension as usize,
                records: Vec::new(),
            },
        );
        Ok(())
    }

    async fn is_ready(&self, name: &str) -> Result<bool, VectorDBError> {
        if self.collections.read().contains_key(name) {
            Ok(true)
        } else {
            Err(VectorDBError::NotFound(name.to_string()))
        }
    }

    async fn delete_index(&self, name: &str) -> Result<(), VectorDBError> {
        self.collections
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| VectorDBError::NotFound(name.to_string()))
    }

    async fn upsert(&self, name: &str, records: Vec<IndexRecord>) -> Result<(), VectorDBError> {
        let mut collections = self.collections.write();
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| VectorDBError::NotFound(name.to_string()))?;

        if let Some(bad) = records.iter().find(|r| r.vector.len() != collection.dimension) {
            return Err(VectorDBError::Operation(format!(
                "vector for '{}' has dimension {}, index expects {}",
                bad.id,
                bad.vector.len(),
                collection.dimension
            )));
        }

        for record in records {
            match collection.records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => collection.records.push(record),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        top_k: u64,
        options: QueryOptions<'_>,
    ) -> Result<Vec<IndexMatch>, VectorDBError> {
        let collections = self.collections.read();
        let collection = collections
            .get(name)
            .ok_or_else(|| VectorDBError::NotFound(name.to_string()))?;

        if vector.len() != collection.dimension {
            return Err(VectorDBError::Operation(format!(
                "query vector has dimension {}, index expects {}",
                vector.len(),
                collection.dimension
            )));
        }

        let mut results: Vec<IndexMatch> = collection
            .records
            .iter()
            .filter(|record| match options.filters {
                Some(filters) => filters
                    .iter()
                    .all(|(k, v)| record.metadata.get(k) == Some(v)),
                None => true,
            })
            .map(|record| IndexMatch {
                id: record.id.clone(),
                score: Self::cosine_similarity(vector, &record.vector),
                content: record.content.clone(),
                metadata: record.metadata.clone(),
                seq: record.seq,
                vector: options.include_vectors.then(|| record.vector.clone()),
            })
            .collect();

        // Stable sort keeps insertion order for equal scores
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k as usize);
        Ok(results)
    }

    async fn count(&self, name: &str) -> Result<u64, VectorDBError> {
        self.collections
            .read()
            .get(name)
            .map(|c| c.records.len() as u64)
            .ok_or_else(|| VectorDBError::NotFound(name.to_string()))
    }
}
