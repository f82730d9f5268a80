use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::database::{IndexMatch, QueryOptions, VectorDBError, VectorIndex};
use crate::document::Chunk;
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Top-k similarity lookup over one named index.
#[derive(Clone)]
pub struct Retriever {
    backend: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(backend: Arc<dyn VectorIndex>) -> Self {
        Self { backend }
    }

    /// Matches ordered by descending score, ties in write order. A missing
    /// or empty index yields no matches.
    pub async fn query(
        &self,
        index: &str,
        vector: &[f32],
        top_k: usize,
        filters: Option<&HashMap<String, String>>,
    ) -> Result<Vec<RetrievedChunk>> {
        let options = QueryOptions {
            filters,
            include_vectors: false,
        };

        let mut matches = match self.backend.query(index, vector, top_k as u64, options).await {
            Ok(matches) => matches,
            Err(VectorDBError::NotFound(_)) => {
                log::warn!("Index '{}' does not exist, returning no matches", index);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        sort_matches(&mut matches);
        matches.truncate(top_k);
        log::info!("Retrieved {} matches from '{}'", matches.len(), index);

        Ok(matches
            .into_iter()
            .map(|m| RetrievedChunk {
                score: m.score,
                chunk: Chunk {
                    content: m.content,
                    embedding: m.vector,
                    metadata: m.metadata,
                },
            })
            .collect())
    }
}

fn sort_matches(matches: &mut [IndexMatch]) {
    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.seq.cmp(&b.seq))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{IndexRecord, IndexSpec, MemoryVectorDB, Metric};

    async fn index_with(records: Vec<IndexRecord>) -> Arc<MemoryVectorDB> {
        let db = Arc::new(MemoryVectorDB::new());
        db.create_index(&IndexSpec {
            name: "idx".into(),
            dimension: 2,
            metric: Metric::Cosine,
        })
        .await
        .unwrap();
        db.upsert("idx", records).await.unwrap();
        db
    }

    fn record(id: &str, vector: Vec<f32>, seq: u64) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            vector,
            content: id.to_string(),
            metadata: HashMap::new(),
            seq,
        }
    }

    #[tokio::test]
    async fn test_scores_are_non_increasing() {
        let db = index_with(vec![
            record("c", vec![0.2, 1.0], 0),
            record("a", vec![1.0, 0.0], 1),
            record("b", vec![1.0, 0.5], 2),
        ])
        .await;

        let results = Retriever::new(db).query("idx", &[1.0, 0.0], 10, None).await.unwrap();
        let order: Vec<&str> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_ties_keep_write_order_and_top_k_is_a_hint() {
        let db = index_with(vec![
            record("first", vec![1.0, 1.0], 0),
            record("second", vec![1.0, 1.0], 1),
        ])
        .await;

        let results = Retriever::new(db).query("idx", &[1.0, 1.0], 5, None).await.unwrap();
        let order: Vec<&str> = results.iter().map(|r| r.chunk.content.as_str()).collect();
        assert_eq!(order, vec!["first", "second"]);
    }

    #[test]
    fn test_sort_breaks_ties_by_sequence() {
        let m = |seq: u64, score: f32| IndexMatch {
            id: seq.to_string(),
            score,
            content: String::new(),
            metadata: HashMap::new(),
            seq,
            vector: None,
        };
        let mut matches = vec![m(3, 0.5), m(1, 0.9), m(0, 0.5)];
        sort_matches(&mut matches);
        let seqs: Vec<u64> = matches.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![1, 0, 3]);
    }

    #[tokio::test]
    async fn test_empty_and_missing_index_yield_nothing() {
        let db = index_with(Vec::new()).await;
        let retriever = Retriever::new(db);
        assert!(retriever.query("idx", &[1.0, 0.0], 3, None).await.unwrap().is_empty());
        assert!(retriever.query("missing", &[1.0, 0.0], 3, None).await.unwrap().is_empty());
    }
}
