use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PipelineTimings;

use super::vector_db::{IndexRecord, VectorDBError, VectorIndex};

/// Bounded retry with exponential backoff, applied to transient failures only.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before retrying after failed attempt number `attempt` (0-based).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(5) as u32;
        self.base_delay.saturating_mul(2u32.pow(capped))
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, VectorDBError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, VectorDBError>>,
    {
        let mut attempt = 0usize;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    log::warn!(
                        "Attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt + 1,
                        self.max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl From<&PipelineTimings> for RetryPolicy {
    fn from(timings: &PipelineTimings) -> Self {
        Self::new(timings.write_max_attempts, timings.write_backoff)
    }
}

/// Writes a batch of records and verifies they landed.
pub struct DocumentWriter {
    backend: Arc<dyn VectorIndex>,
    policy: RetryPolicy,
    verify_delay: Duration,
}

impl DocumentWriter {
    pub fn new(backend: Arc<dyn VectorIndex>, timings: &PipelineTimings) -> Self {
        Self {
            backend,
            policy: RetryPolicy::from(timings),
            verify_delay: timings.write_verify_delay,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the document count the index reports after the write.
    pub async fn write(&self, index: &str, records: Vec<IndexRecord>) -> Result<u64, VectorDBError> {
        let expected = records.len();
        let count = self
            .policy
            .run(|attempt| {
                let records = records.clone();
                async move {
                    log::info!(
                        "Writing {} documents to '{}' (attempt {})",
                        expected,
                        index,
                        attempt + 1
                    );
                    self.backend.upsert(index, records).await?;
                    tokio::time::sleep(self.verify_delay).await;

                    let count = self.backend.count(index).await?;
                    if count == 0 && expected > 0 {
                        return Err(VectorDBError::Transient(format!(
                            "index '{}' reports 0 documents after write",
                            index
                        )));
                    }
                    Ok(count)
                }
            })
            .await?;

        log::info!("Index '{}' now holds {} documents", index, count);
        Ok(count)
    }
}
