use serde::Serialize;

use super::vector_db::{QueryOptions, VectorDBError, VectorIndex};

pub const COMPARE_TOP_K: u64 = 400;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexComparison {
    pub similarity_score: f64,
    pub total_documents_compared: usize,
}

/// Queries `source` with an all-ones vector, then scores `target` against the
/// first vector found. Returns `None` when `source` holds no vectors.
pub async fn compare_indexes(
    backend: &dyn VectorIndex,
    source: &str,
    target: &str,
    dimension: usize,
) -> Result<Option<IndexComparison>, VectorDBError> {
    let ones = vec![1.0f32; dimension];
    let source_matches = match backend
        .query(
            source,
            &ones,
            COMPARE_TOP_K,
            QueryOptions {
                filters: None,
                include_vectors: true,
            },
        )
        .await
    {
        Ok(matches) => matches,
        Err(VectorDBError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    let Some(vector) = source_matches.into_iter().find_map(|m| m.vector) else {
        return Ok(None);
    };

    let target_matches = backend
        .query(target, &vector, COMPARE_TOP_K, QueryOptions::default())
        .await?;

    let total = target_matches.len();
    let mean = if total == 0 {
        0.0
    } else {
        target_matches.iter().map(|m| m.score as f64).sum::<f64>() / total as f64
    };

    log::info!(
        "Compared '{}' against '{}': {} documents, mean score {:.4}",
        source,
        target,
        total,
        mean
    );

    Ok(Some(IndexComparison {
        similarity_score: (mean * 10_000.0).round() / 10_000.0,
        total_documents_compared: total,
    }))
}
