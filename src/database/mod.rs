pub mod compare;
pub mod documents;
pub mod lifecycle;
pub mod memory;
pub mod qdrant_config;
pub mod retry;
pub mod vector_db;

pub use compare::{compare_indexes, IndexComparison};
pub use documents::{DocumentRecord, DocumentStore};
pub use lifecycle::{IndexHandle, IndexManager, Scope, ScopeLock};
pub use memory::MemoryVectorDB;
pub use retry::{DocumentWriter, RetryPolicy};
pub use vector_db::{
    IndexMatch, IndexRecord, IndexSpec, Metric, QueryOptions, VectorDB, VectorDBError, VectorIndex,
};
