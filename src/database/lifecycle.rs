use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::config::{PipelineTimings, VectorIndexConfig, EMBEDDING_DIMENSION};
use crate::error::{Result, RfpError};

use super::vector_db::{IndexSpec, Metric, VectorDBError, VectorIndex};

const MAX_SESSION_ID_LEN: usize = 64;

/// Unit of index ownership.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Legacy process-wide slot shared by every caller.
    Global,
    Session(String),
}

impl Scope {
    /// Session ids are case-insensitive; the stored id is lowercased so lock
    /// keys, record keys and index names agree.
    pub fn session(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(RfpError::InvalidInput("session_id must not be empty".to_string()));
        }
        if id.len() > MAX_SESSION_ID_LEN {
            return Err(RfpError::InvalidInput(format!(
                "session_id must be at most {} characters",
                MAX_SESSION_ID_LEN
            )));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(RfpError::InvalidInput(
                "session_id may only contain letters, digits, '-' and '_'".to_string(),
            ));
        }
        Ok(Scope::Session(id.to_ascii_lowercase()))
    }

    /// `None` or a blank id selects the global slot.
    pub fn from_optional(session_id: Option<&str>) -> Result<Self> {
        match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => Self::session(id),
            None => Ok(Scope::Global),
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Session(id) => Some(id),
        }
    }

    pub fn key(&self) -> String {
        match self {
            Scope::Global => "global".to_string(),
            Scope::Session(id) => format!("session:{}", id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Session(id) => write!(f, "session {}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    Cosine,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexHandle {
    pub name: String,
    pub dimension: u64,
    pub similarity_metric: MetricName,
    #[serde(skip)]
    pub scope: Scope,
}

/// Creates, resets and deletes the named index behind each scope.
///
/// `reset` is not safe to run concurrently for one scope; callers take
/// [`IndexManager::lock`] around any reset-and-write sequence.
pub struct IndexManager {
    backend: Arc<dyn VectorIndex>,
    global_index: String,
    session_prefix: String,
    protected: Vec<String>,
    timings: PipelineTimings,
    locks: LockMap,
}

type LockMap = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Held while index-mutating work for one scope runs. The scope's entry is
/// dropped from the lock map once nobody holds or waits on it.
pub struct ScopeLock {
    key: String,
    locks: LockMap,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ScopeLock {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        drop(self.guard.take());
        // Waiters clone the entry under the map lock, so a count of one
        // means the map holds the only reference
        if locks.get(&self.key).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(&self.key);
        }
    }
}

impl IndexManager {
    pub fn new(
        backend: Arc<dyn VectorIndex>,
        config: &VectorIndexConfig,
        timings: PipelineTimings,
    ) -> Self {
        Self {
            backend,
            global_index: config.global_index.clone(),
            session_prefix: config.session_prefix.clone(),
            protected: config.protected.clone(),
            timings,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn index_name(&self, scope: &Scope) -> String {
        match scope {
            Scope::Global => self.global_index.clone(),
            Scope::Session(id) => format!("{}-{}", self.session_prefix, id),
        }
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.iter().any(|p| p == name)
    }

    fn handle(&self, scope: &Scope) -> IndexHandle {
        IndexHandle {
            name: self.index_name(scope),
            dimension: EMBEDDING_DIMENSION,
            similarity_metric: MetricName::Cosine,
            scope: scope.clone(),
        }
    }

    /// Serializes index-mutating work for one scope.
    pub async fn lock(&self, scope: &Scope) -> ScopeLock {
        let key = scope.key();
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        ScopeLock {
            key,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Creates the scope's index if needed and waits until it serves queries.
    pub async fn ensure_ready(&self, scope: &Scope) -> Result<IndexHandle> {
        let handle = self.handle(scope);

        if !self.backend.index_exists(&handle.name).await? {
            log::info!("Index '{}' not found. Creating index...", handle.name);
            let spec = IndexSpec {
                name: handle.name.clone(),
                dimension: handle.dimension,
                metric: Metric::Cosine,
            };
            match self.backend.create_index(&spec).await {
                Ok(()) => {}
                Err(VectorDBError::CollectionExists(_)) => {
                    log::info!("Index '{}' already exists, skipping creation", handle.name);
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.wait_until_ready(&handle.name).await?;
        log::info!("Index '{}' is ready for {}", handle.name, scope);
        Ok(handle)
    }

    /// Deletes the scope's index, waits for the deletion to commit, then
    /// recreates it.
    pub async fn reset(&self, scope: &Scope) -> Result<IndexHandle> {
        let name = self.index_name(scope);

        log::info!("Deleting existing index '{}'...", name);
        match self.backend.delete_index(&name).await {
            Ok(()) => {
                tokio::time::sleep(self.timings.delete_grace).await;
                self.wait_until_deleted(&name).await?;
            }
            Err(VectorDBError::NotFound(_)) => {
                log::debug!("Index '{}' did not exist, nothing to delete", name);
            }
            Err(e) => return Err(e.into()),
        }

        self.ensure_ready(scope).await
    }

    /// Deletes a session's index. Returns whether anything was deleted.
    pub async fn cleanup(&self, scope: &Scope) -> Result<bool> {
        let name = self.index_name(scope);
        if matches!(scope, Scope::Global) || self.is_protected(&name) {
            return Err(RfpError::ProtectedResource(name));
        }

        match self.backend.delete_index(&name).await {
            Ok(()) => {
                log::info!("Deleted index '{}' for {}", name, scope);
                Ok(true)
            }
            Err(VectorDBError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn wait_until_ready(&self, name: &str) -> Result<()> {
        let poll = async {
            loop {
                match self.backend.is_ready(name).await {
                    Ok(true) => return,
                    Ok(false) => log::info!("Waiting for index '{}' to be ready...", name),
                    Err(e) => log::warn!("Error checking index status for '{}': {}", name, e),
                }
                tokio::time::sleep(self.timings.poll_interval).await;
            }
        };

        self.bounded(name, poll).await
    }

    async fn wait_until_deleted(&self, name: &str) -> Result<()> {
        let poll = async {
            loop {
                match self.backend.index_exists(name).await {
                    Ok(false) => return,
                    Ok(true) => log::info!("Waiting for index '{}' deletion to commit...", name),
                    Err(e) => log::warn!("Error checking deletion of '{}': {}", name, e),
                }
                tokio::time::sleep(self.timings.poll_interval).await;
            }
        };

        self.bounded(name, poll).await
    }

    async fn bounded(&self, name: &str, poll: impl std::future::Future<Output = ()>) -> Result<()> {
        tokio::time::timeout(self.timings.ready_timeout, poll)
            .await
            .map_err(|_| RfpError::IndexUnavailable(name.to_string()))
    }
}
