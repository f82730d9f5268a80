use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;

use crate::llm::schema::ExtractionResult;

use super::lifecycle::Scope;

const DEFAULT_CAPACITY: usize = 256;

/// One uploaded RFP and the latest analysis run against it.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub file_name: String,
    #[serde(skip)]
    pub scope: Scope,
    pub session_id: Option<String>,
    pub index_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub chunk_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_result: Option<ExtractionResult>,
}

impl DocumentRecord {
    pub fn new(doc_id: String, file_name: &str, scope: Scope, index_name: String, chunk_count: usize) -> Self {
        Self {
            doc_id,
            file_name: file_name.to_string(),
            session_id: scope.session_id().map(str::to_string),
            scope,
            index_name,
            uploaded_at: Utc::now(),
            chunk_count,
            latest_result: None,
        }
    }
}

struct Inner {
    records: LruCache<String, DocumentRecord>,
    // scope key -> doc_id of its most recent upload
    latest: HashMap<String, String>,
}

/// Bounded in-memory store of document records, evicting least recently used.
pub struct DocumentStore {
    inner: Mutex<Inner>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DocumentStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                records: LruCache::new(capacity),
                latest: HashMap::new(),
            }),
        }
    }

    pub fn insert(&self, record: DocumentRecord) {
        let mut inner = self.inner.lock();
        inner.latest.insert(record.scope.key(), record.doc_id.clone());
        if let Some((evicted, _)) = inner.records.push(record.doc_id.clone(), record) {
            inner.latest.retain(|_, doc_id| *doc_id != evicted);
        }
    }

    pub fn get(&self, doc_id: &str) -> Option<DocumentRecord> {
        self.inner.lock().records.get(doc_id).cloned()
    }

    pub fn latest_for(&self, scope: &Scope) -> Option<DocumentRecord> {
        let mut inner = self.inner.lock();
        let doc_id = inner.latest.get(&scope.key())?.clone();
        inner.records.get(&doc_id).cloned()
    }

    /// Stores `result` on the scope's most recent document, returning its id.
    pub fn attach_result(&self, scope: &Scope, result: &ExtractionResult) -> Option<String> {
        let mut inner = self.inner.lock();
        let doc_id = inner.latest.get(&scope.key())?.clone();
        let record = inner.records.get_mut(&doc_id)?;
        record.latest_result = Some(result.clone());
        Some(doc_id)
    }

    /// Drops every record belonging to `scope`.
    pub fn forget_scope(&self, scope: &Scope) -> usize {
        let mut inner = self.inner.lock();
        let key = scope.key();
        inner.latest.remove(&key);

        let doomed: Vec<String> = inner
            .records
            .iter()
            .filter(|(_, record)| record.scope == *scope)
            .map(|(doc_id, _)| doc_id.clone())
            .collect();
        for doc_id in &doomed {
            inner.records.pop(doc_id);
        }
        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(scope: Scope) -> DocumentRecord {
        DocumentRecord::new(uuid::Uuid::new_v4().to_string(), "rfp.pdf", scope, "rfp-session-a".to_string(), 4)
    }

    #[test]
    fn test_latest_tracks_most_recent_upload() {
        let store = DocumentStore::default();
        let scope = Scope::session("a").unwrap();

        let first = record(scope.clone());
        let second = record(scope.clone());
        let second_id = second.doc_id.clone();
        store.insert(first);
        store.insert(second);

        assert_eq!(store.latest_for(&scope).unwrap().doc_id, second_id);
        assert!(store.latest_for(&Scope::Global).is_none());
    }

    #[test]
    fn test_attach_result_updates_latest_record() {
        let store = DocumentStore::default();
        let scope = Scope::session("a").unwrap();
        let rec = record(scope.clone());
        let doc_id = rec.doc_id.clone();
        store.insert(rec);

        let attached = store.attach_result(&scope, &ExtractionResult::blank());
        assert_eq!(attached.as_deref(), Some(doc_id.as_str()));
        assert!(store.get(&doc_id).unwrap().latest_result.is_some());

        assert!(store.attach_result(&Scope::Global, &ExtractionResult::blank()).is_none());
    }

    #[test]
    fn test_eviction_is_bounded() {
        let store = DocumentStore::new(2);
        let first = record(Scope::session("a").unwrap());
        let first_id = first.doc_id.clone();
        store.insert(first);
        store.insert(record(Scope::session("b").unwrap()));
        store.insert(record(Scope::session("c").unwrap()));

        assert_eq!(store.len(), 2);
        assert!(store.get(&first_id).is_none());
        assert!(store.latest_for(&Scope::session("a").unwrap()).is_none());
    }

    #[test]
    fn test_forget_scope_removes_its_records() {
        let store = DocumentStore::default();
        let a = Scope::session("a").unwrap();
        store.insert(record(a.clone()));
        store.insert(record(a.clone()));
        store.insert(record(Scope::session("b").unwrap()));

        assert_eq!(store.forget_scope(&a), 2);
        assert_eq!(store.len(), 1);
        assert!(store.latest_for(&a).is_none());
    }
}
